//! Error types for the reconciliation engine.
//!
//! Remote failures are wrapped with the stage that issued the call and
//! passed upward untouched. Nothing here retries or reclassifies.

use std::fmt;

use thiserror::Error;

/// A reconciliation stage that talks to the remote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Connect,
    Observe,
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Connect => "connect",
            Operation::Observe => "observe",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// Errors returned by the Azure Resource Manager or the HTTP layer beneath it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// The resource (or its parent group) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any non-success status other than 404.
    #[error("unexpected status {status}: {message}")]
    Status { status: u16, message: String },

    /// Connection, TLS or timeout failure.
    #[error("transport: {0}")]
    Transport(String),

    /// The response body could not be decoded.
    #[error("decode: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RemoteError::Decode(e.to_string())
        } else {
            RemoteError::Transport(e.to_string())
        }
    }
}

/// Provider and secret reference problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The record does not name a provider.
    #[error("managed resource does not have a provider reference")]
    MissingProviderRef,

    /// The provider could not be fetched.
    #[error("cannot get provider {name}: {reason}")]
    ProviderLookup { name: String, reason: String },

    /// The provider exists but names no credentials secret.
    #[error("provider {0} does not have a secret reference")]
    MissingSecretRef(String),

    /// The declared properties violate a record invariant.
    #[error("invalid properties: {0}")]
    InvalidProperties(String),
}

/// Credential fetch, parse and authorization failures.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The credentials secret could not be fetched.
    #[error("cannot get provider secret {name}: {reason}")]
    SecretLookup { name: String, reason: String },

    /// The secret exists but has no value under the referenced key.
    #[error("provider secret {name} has no key {key}")]
    MissingKey { name: String, key: String },

    /// The payload is not valid credential JSON.
    #[error("cannot unmarshal Azure client secret data: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The token endpoint refused or could not be reached.
    #[error("failed to get authorizer from config: {0}")]
    Handshake(String),
}

/// Main error type for reconciliation.
#[derive(Debug, Error)]
pub enum Error {
    /// The record handed to the engine is not the kind it manages.
    #[error("managed resource is not a {expected} (got {actual})")]
    TypeMismatch {
        expected: &'static str,
        actual: String,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("cannot get Database Account: {0}")]
    Observe(#[source] RemoteError),

    #[error("cannot create Database Account: {0}")]
    Create(#[source] RemoteError),

    #[error("cannot update Database Account: {0}")]
    Update(#[source] RemoteError),

    #[error("cannot delete Database Account: {0}")]
    Delete(#[source] RemoteError),

    /// The caller cancelled the pass while a call was in flight.
    #[error("reconciliation cancelled during {operation}")]
    Cancelled { operation: Operation },
}

impl Error {
    /// The stage this error was raised in, if it came from a remote call.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            Error::Observe(_) => Some(Operation::Observe),
            Error::Create(_) => Some(Operation::Create),
            Error::Update(_) => Some(Operation::Update),
            Error::Delete(_) => Some(Operation::Delete),
            Error::Cancelled { operation } => Some(*operation),
            _ => None,
        }
    }

    /// The wrapped remote failure, if any.
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            Error::Observe(e) | Error::Create(e) | Error::Update(e) | Error::Delete(e) => Some(e),
            _ => None,
        }
    }

    /// Whether the remote side reported the resource as absent.
    ///
    /// Callers use this to treat a failed delete of an already-gone
    /// account as success.
    pub fn is_not_found(&self) -> bool {
        matches!(self.remote(), Some(RemoteError::NotFound(_)))
    }
}

/// Result type for reconciliation.
pub type Result<T> = std::result::Result<T, Error>;
