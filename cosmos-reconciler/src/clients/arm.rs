//! Azure Resource Manager client for database accounts.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Response, StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

use super::credentials::Credentials;
use super::documentdb::{
    CloudError, DatabaseAccount, DatabaseAccountCreateUpdateParameters, API_VERSION,
};
use super::AccountClient;
use crate::connector::ClientFactory;
use crate::error::{AuthError, RemoteError};

const USER_AGENT: &str = concat!("cosmos-reconciler/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Client for the `Microsoft.DocumentDB` resource provider.
///
/// Holds a bearer token for the lifetime of one reconciliation; a new
/// client (and token) is built on every connect.
pub struct ArmAccountClient {
    http: reqwest::Client,
    endpoint: String,
    subscription_id: String,
    token: String,
}

impl ArmAccountClient {
    /// Authenticate as the service principal and build a client.
    pub async fn connect(creds: &Credentials) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AuthError::Handshake(e.to_string()))?;
        let token = acquire_token(&http, creds).await?;

        Ok(Self {
            http,
            endpoint: creds
                .resource_manager_endpoint_url
                .trim_end_matches('/')
                .to_string(),
            subscription_id: creds.subscription_id.clone(),
            token,
        })
    }

    /// Join path segments onto the endpoint, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let invalid = || RemoteError::Transport(format!("invalid endpoint {}", self.endpoint));
        let mut url = Url::parse(&self.endpoint).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn account_url(&self, resource_group: &str, account_name: &str) -> Result<Url, RemoteError> {
        self.url(&[
            "subscriptions",
            self.subscription_id.as_str(),
            "resourceGroups",
            resource_group,
            "providers",
            "Microsoft.DocumentDB",
            "databaseAccounts",
            account_name,
        ])
    }

    fn name_url(&self, account_name: &str) -> Result<Url, RemoteError> {
        self.url(&[
            "providers",
            "Microsoft.DocumentDB",
            "databaseAccountNames",
            account_name,
        ])
    }
}

/// OAuth2 client-credentials grant against the Azure AD v1 token endpoint.
async fn acquire_token(http: &reqwest::Client, creds: &Credentials) -> Result<String, AuthError> {
    let url = format!(
        "{}/{}/oauth2/token",
        creds.active_directory_endpoint_url.trim_end_matches('/'),
        creds.tenant_id
    );
    debug!("Requesting token from {} for client {}", url, creds.client_id);

    let resp = http
        .post(&url)
        .form(&[
            ("grant_type", "client_credentials"),
            ("client_id", creds.client_id.as_str()),
            ("client_secret", creds.client_secret.as_str()),
            ("resource", creds.resource_manager_endpoint_url.as_str()),
        ])
        .send()
        .await
        .map_err(|e| AuthError::Handshake(e.to_string()))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(AuthError::Handshake(format!(
            "token endpoint returned {}: {}",
            status, body
        )));
    }

    let token: TokenResponse = resp
        .json()
        .await
        .map_err(|e| AuthError::Handshake(e.to_string()))?;
    Ok(token.access_token)
}

/// Turn a non-success response into a [`RemoteError`].
async fn error_from(resp: Response) -> RemoteError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<CloudError>(&body)
        .ok()
        .map(|e| e.error.message)
        .filter(|m| !m.is_empty())
        .unwrap_or(body);

    if status == StatusCode::NOT_FOUND {
        RemoteError::NotFound(message)
    } else {
        RemoteError::Status {
            status: status.as_u16(),
            message,
        }
    }
}

async fn decode_account(resp: Response) -> Result<DatabaseAccount, RemoteError> {
    let body = resp.text().await?;
    if body.trim().is_empty() {
        // 202 Accepted carries no body while the account provisions.
        return Ok(DatabaseAccount::default());
    }
    serde_json::from_str(&body).map_err(|e| RemoteError::Decode(e.to_string()))
}

#[async_trait]
impl AccountClient for ArmAccountClient {
    async fn check_name_exists(&self, account_name: &str) -> Result<bool, RemoteError> {
        debug!("Checking whether account name {} exists", account_name);
        let resp = self
            .http
            .head(self.name_url(account_name)?)
            .query(&[("api-version", API_VERSION)])
            .bearer_auth(&self.token)
            .send()
            .await?;

        match resp.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(error_from(resp).await),
        }
    }

    async fn get(
        &self,
        resource_group: &str,
        account_name: &str,
    ) -> Result<DatabaseAccount, RemoteError> {
        debug!("Getting account {}/{}", resource_group, account_name);
        let resp = self
            .http
            .get(self.account_url(resource_group, account_name)?)
            .query(&[("api-version", API_VERSION)])
            .bearer_auth(&self.token)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(error_from(resp).await);
        }
        decode_account(resp).await
    }

    async fn create_or_update(
        &self,
        resource_group: &str,
        account_name: &str,
        params: DatabaseAccountCreateUpdateParameters,
    ) -> Result<DatabaseAccount, RemoteError> {
        debug!("Creating or updating account {}/{}", resource_group, account_name);
        let resp = self
            .http
            .put(self.account_url(resource_group, account_name)?)
            .query(&[("api-version", API_VERSION)])
            .bearer_auth(&self.token)
            .json(&params)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(error_from(resp).await);
        }
        decode_account(resp).await
    }

    async fn delete(&self, resource_group: &str, account_name: &str) -> Result<(), RemoteError> {
        debug!("Deleting account {}/{}", resource_group, account_name);
        let resp = self
            .http
            .delete(self.account_url(resource_group, account_name)?)
            .query(&[("api-version", API_VERSION)])
            .bearer_auth(&self.token)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(error_from(resp).await);
        }
        Ok(())
    }
}

/// Builds [`ArmAccountClient`]s from the raw provider secret payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArmClientFactory;

#[async_trait]
impl ClientFactory for ArmClientFactory {
    async fn new_client(&self, credentials: &[u8]) -> Result<Arc<dyn AccountClient>, AuthError> {
        let creds = Credentials::from_slice(credentials)?;
        let client = ArmAccountClient::connect(&creds).await?;
        Ok(Arc::new(client))
    }
}
