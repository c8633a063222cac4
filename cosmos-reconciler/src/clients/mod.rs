//! Clients for the Azure Cosmos DB management plane.
//!
//! The engine only depends on [`AccountClient`], which exposes exactly the
//! four database account operations it consumes:
//! - existence check by account name
//! - get
//! - create-or-update
//! - delete
//!
//! [`arm::ArmAccountClient`] implements it against Azure Resource Manager.

pub mod arm;
pub mod credentials;
pub mod documentdb;

use async_trait::async_trait;

use crate::error::RemoteError;
use documentdb::{DatabaseAccount, DatabaseAccountCreateUpdateParameters};

pub use arm::{ArmAccountClient, ArmClientFactory};
pub use credentials::Credentials;

/// Database account operations on the remote service.
#[async_trait]
pub trait AccountClient: Send + Sync {
    /// Check whether an account name is taken.
    async fn check_name_exists(&self, account_name: &str) -> Result<bool, RemoteError>;

    /// Get an account.
    async fn get(
        &self,
        resource_group: &str,
        account_name: &str,
    ) -> Result<DatabaseAccount, RemoteError>;

    /// Create an account, or update it in place if it already exists.
    async fn create_or_update(
        &self,
        resource_group: &str,
        account_name: &str,
        params: DatabaseAccountCreateUpdateParameters,
    ) -> Result<DatabaseAccount, RemoteError>;

    /// Delete an account.
    async fn delete(&self, resource_group: &str, account_name: &str) -> Result<(), RemoteError>;
}
