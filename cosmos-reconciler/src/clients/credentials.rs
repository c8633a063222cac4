//! Azure service principal credentials as stored in the provider secret.

use std::fmt;

use serde::Deserialize;

use crate::error::AuthError;

/// Default Azure AD authority.
pub const DEFAULT_AAD_ENDPOINT: &str = "https://login.microsoftonline.com/";

/// Default Resource Manager endpoint.
pub const DEFAULT_RESOURCE_MANAGER_ENDPOINT: &str = "https://management.azure.com/";

/// Service principal credentials, in the format written by
/// `az ad sp create-for-rbac --sdk-auth`.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub tenant_id: String,
    pub subscription_id: String,
    #[serde(default = "default_aad_endpoint")]
    pub active_directory_endpoint_url: String,
    #[serde(default = "default_resource_manager_endpoint")]
    pub resource_manager_endpoint_url: String,
    #[serde(default)]
    pub active_directory_graph_resource_id: Option<String>,
    #[serde(default)]
    pub sql_management_endpoint_url: Option<String>,
    #[serde(default)]
    pub gallery_endpoint_url: Option<String>,
    #[serde(default)]
    pub management_endpoint_url: Option<String>,
}

fn default_aad_endpoint() -> String {
    DEFAULT_AAD_ENDPOINT.to_string()
}

fn default_resource_manager_endpoint() -> String {
    DEFAULT_RESOURCE_MANAGER_ENDPOINT.to_string()
}

impl Credentials {
    /// Parse the JSON credential payload.
    pub fn from_slice(data: &[u8]) -> Result<Self, AuthError> {
        Ok(serde_json::from_slice(data)?)
    }
}

// Keep the secret out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("tenant_id", &self.tenant_id)
            .field("subscription_id", &self.subscription_id)
            .field(
                "active_directory_endpoint_url",
                &self.active_directory_endpoint_url,
            )
            .field(
                "resource_manager_endpoint_url",
                &self.resource_manager_endpoint_url,
            )
            .finish_non_exhaustive()
    }
}
