//! Reconcilers for managed resources.
//!
//! Each reconciler compares the desired spec on a record with the actual
//! state of the remote resource and issues at most one corrective call.
//! They are level-triggered: every invocation starts from a fresh observe.

pub mod account;
pub mod pass;

use async_trait::async_trait;

use crate::error::Result;
use crate::resource::Managed;

pub use account::AccountReconciler;
pub use pass::{reconcile_once, Outcome};

/// Where the remote resource stands, as seen by one observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// The remote resource does not exist.
    NotFound,
    /// Provisioned and matching the desired spec.
    UpToDate,
    /// Provisioned but differing from the desired spec.
    Drifted,
    /// Still being created, updated or deleted remotely.
    Provisioning,
    /// The remote side reports a failed provisioning.
    Failed,
}

/// Result of observing the remote resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalObservation {
    pub resource_exists: bool,
    pub resource_up_to_date: bool,
    pub lifecycle: Lifecycle,
}

impl ExternalObservation {
    pub fn not_found() -> Self {
        Self {
            resource_exists: false,
            resource_up_to_date: false,
            lifecycle: Lifecycle::NotFound,
        }
    }
}

/// Observe/create/update/delete contract for one resource kind.
///
/// Implementations reject records of other kinds with
/// [`crate::Error::TypeMismatch`] before making any remote call.
#[async_trait]
pub trait ExternalClient: Send + Sync {
    /// Fetch the remote state, record it on `mg`, and report drift.
    async fn observe(&self, mg: &mut dyn Managed) -> Result<ExternalObservation>;

    /// Create the remote resource.
    async fn create(&self, mg: &mut dyn Managed) -> Result<()>;

    /// Bring the remote resource in line with the spec.
    async fn update(&self, mg: &mut dyn Managed) -> Result<()>;

    /// Delete the remote resource.
    async fn delete(&self, mg: &mut dyn Managed) -> Result<()>;
}

/// Produces an [`ExternalClient`] bound to fresh credentials for a record.
#[async_trait]
pub trait ExternalConnector: Send + Sync {
    async fn connect(&self, mg: &dyn Managed) -> Result<Box<dyn ExternalClient>>;
}
