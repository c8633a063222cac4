//! cosmos-reconciler: converges declared Azure Cosmos DB accounts.
//!
//! The engine observes the remote account, compares it with the declared
//! spec and issues at most one create, update or delete per pass. When a
//! pass runs is up to the caller.

pub mod clients;
pub mod compare;
pub mod connector;
pub mod error;
pub mod mapper;
pub mod reconciler;
pub mod resource;

pub use connector::{AccountConnector, CredentialSource, FileCredentialSource};
pub use error::{Error, Result};
pub use reconciler::{reconcile_once, ExternalClient, ExternalConnector, Outcome};
pub use resource::{CosmosDbAccount, Managed};
