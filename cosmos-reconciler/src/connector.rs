//! Connector - resolves credentials for a record and binds a reconciler.
//!
//! Credentials are looked up on every connect and never cached, so a
//! rotated secret takes effect on the next pass.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clients::AccountClient;
use crate::error::{AuthError, ConfigError, Error, Result};
use crate::reconciler::{AccountReconciler, ExternalClient, ExternalConnector};
use crate::resource::{CosmosDbAccount, Managed, ProviderReference, COSMOS_DB_ACCOUNT_KIND};

/// Location of a key inside a secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeySelector {
    pub namespace: String,
    pub name: String,
    pub key: String,
}

impl std::fmt::Display for SecretKeySelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A provider: where a set of records gets its credentials from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_secret_ref: Option<SecretKeySelector>,
}

/// Secret data, key to raw payload.
pub type SecretData = BTreeMap<String, Vec<u8>>;

/// Fetches providers and secrets. Failures are reported as plain strings;
/// the connector decides whether they are config or auth problems.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn provider(&self, reference: &ProviderReference) -> std::result::Result<Provider, String>;

    async fn secret(&self, selector: &SecretKeySelector)
        -> std::result::Result<SecretData, String>;
}

/// Builds an authenticated [`AccountClient`] from a credential payload.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn new_client(&self, credentials: &[u8])
        -> std::result::Result<Arc<dyn AccountClient>, AuthError>;
}

/// Connector for Cosmos DB account records.
pub struct AccountConnector {
    source: Arc<dyn CredentialSource>,
    factory: Arc<dyn ClientFactory>,
}

impl AccountConnector {
    pub fn new(source: Arc<dyn CredentialSource>, factory: Arc<dyn ClientFactory>) -> Self {
        Self { source, factory }
    }

    /// Resolve the credential payload for an account.
    async fn credentials(&self, acct: &CosmosDbAccount) -> Result<Vec<u8>> {
        let reference = acct
            .spec
            .provider_ref
            .as_ref()
            .ok_or(ConfigError::MissingProviderRef)?;

        let provider = self.source.provider(reference).await.map_err(|reason| {
            ConfigError::ProviderLookup {
                name: reference.to_string(),
                reason,
            }
        })?;

        let selector = provider
            .credentials_secret_ref
            .as_ref()
            .ok_or_else(|| ConfigError::MissingSecretRef(provider.name.clone()))?;

        let mut data = self
            .source
            .secret(selector)
            .await
            .map_err(|reason| AuthError::SecretLookup {
                name: selector.to_string(),
                reason,
            })?;

        let payload = data
            .remove(&selector.key)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AuthError::MissingKey {
                name: selector.to_string(),
                key: selector.key.clone(),
            })?;
        Ok(payload)
    }
}

#[async_trait]
impl ExternalConnector for AccountConnector {
    async fn connect(&self, mg: &dyn Managed) -> Result<Box<dyn ExternalClient>> {
        let acct = mg
            .as_any()
            .downcast_ref::<CosmosDbAccount>()
            .ok_or_else(|| Error::TypeMismatch {
                expected: COSMOS_DB_ACCOUNT_KIND,
                actual: mg.kind().to_string(),
            })?;

        if let Some(props) = &acct.spec.for_provider.properties {
            props.validate()?;
        }

        debug!("Connecting for database account {}", acct.external_name());
        let payload = self.credentials(acct).await?;
        let client = self.factory.new_client(&payload).await?;
        Ok(Box::new(AccountReconciler::new(client)))
    }
}

/// Credential source backed by JSON files:
/// - `<root>/providers/<name>.json` holds a [`Provider`]
/// - `<root>/secrets/<namespace>/<name>.json` holds a map of key to string
///   payload; object values are re-serialised as JSON
pub struct FileCredentialSource {
    root: PathBuf,
}

impl FileCredentialSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl CredentialSource for FileCredentialSource {
    async fn provider(&self, reference: &ProviderReference) -> std::result::Result<Provider, String> {
        let path = self
            .root
            .join("providers")
            .join(format!("{}.json", reference.name));
        let raw = tokio::fs::read(&path)
            .await
            .map_err(|e| format!("{}: {}", path.display(), e))?;
        serde_json::from_slice(&raw).map_err(|e| format!("{}: {}", path.display(), e))
    }

    async fn secret(
        &self,
        selector: &SecretKeySelector,
    ) -> std::result::Result<SecretData, String> {
        let path = self
            .root
            .join("secrets")
            .join(&selector.namespace)
            .join(format!("{}.json", selector.name));
        let raw = tokio::fs::read(&path)
            .await
            .map_err(|e| format!("{}: {}", path.display(), e))?;
        let entries: BTreeMap<String, serde_json::Value> =
            serde_json::from_slice(&raw).map_err(|e| format!("{}: {}", path.display(), e))?;

        Ok(entries
            .into_iter()
            .map(|(k, v)| {
                let bytes = match v {
                    serde_json::Value::String(s) => s.into_bytes(),
                    other => other.to_string().into_bytes(),
                };
                (k, bytes)
            })
            .collect())
    }
}
