//! One reconciliation pass: connect, observe, then at most one action.

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::ExternalConnector;
use crate::error::{Error, Operation, Result};
use crate::resource::Managed;

/// What a pass did to the remote resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The resource was missing and a create was issued.
    Created,
    /// The resource had drifted and an update was issued.
    Updated,
    /// Deletion was requested and a delete was issued (or it was already gone).
    Deleted,
    /// Deletion was requested and the resource was not there.
    Absent,
    /// Nothing to do.
    Unchanged,
}

/// Run `fut` unless the token fires first. A cancelled call is dropped
/// mid-flight; its remote effect is left for the next observe to find.
async fn guarded<T>(
    cancel: &CancellationToken,
    operation: Operation,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled { operation }),
        res = fut => res,
    }
}

/// Reconcile a record once.
///
/// Retry and backoff belong to the caller, which re-invokes this on its
/// next trigger. Must not run concurrently for the same record.
pub async fn reconcile_once(
    connector: &dyn ExternalConnector,
    mg: &mut dyn Managed,
    cancel: &CancellationToken,
) -> Result<Outcome> {
    let name = mg.external_name().to_string();
    let external = guarded(cancel, Operation::Connect, connector.connect(&*mg)).await?;

    let observation = guarded(cancel, Operation::Observe, external.observe(&mut *mg)).await?;
    debug!("Observed {}: {:?}", name, observation);

    if mg.deletion_requested() {
        if !observation.resource_exists {
            debug!("{} already absent", name);
            return Ok(Outcome::Absent);
        }
        return match guarded(cancel, Operation::Delete, external.delete(&mut *mg)).await {
            Ok(()) => {
                info!("Deleted {}", name);
                Ok(Outcome::Deleted)
            }
            // Gone between observe and delete.
            Err(e) if e.is_not_found() => {
                debug!("{} vanished before delete: {}", name, e);
                Ok(Outcome::Deleted)
            }
            Err(e) => Err(e),
        };
    }

    if !observation.resource_exists {
        guarded(cancel, Operation::Create, external.create(&mut *mg)).await?;
        info!("Created {}", name);
        return Ok(Outcome::Created);
    }

    if !observation.resource_up_to_date {
        guarded(cancel, Operation::Update, external.update(&mut *mg)).await?;
        info!("Updated {}", name);
        return Ok(Outcome::Updated);
    }

    debug!("{} is up to date", name);
    Ok(Outcome::Unchanged)
}
