//! Database account reconciler - converges Cosmos DB accounts through ARM.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{ExternalClient, ExternalObservation, Lifecycle};
use crate::clients::documentdb::DatabaseAccountCreateUpdateParameters;
use crate::clients::AccountClient;
use crate::compare::is_up_to_date;
use crate::error::{Error, RemoteError, Result};
use crate::mapper;
use crate::resource::{
    Condition, CosmosDbAccount, Managed, ProvisioningState, COSMOS_DB_ACCOUNT_KIND,
};

/// Downcast a record to a database account or fail with `TypeMismatch`.
pub fn as_account(mg: &mut dyn Managed) -> Result<&mut CosmosDbAccount> {
    let actual = mg.kind().to_string();
    mg.as_any_mut()
        .downcast_mut::<CosmosDbAccount>()
        .ok_or(Error::TypeMismatch {
            expected: COSMOS_DB_ACCOUNT_KIND,
            actual,
        })
}

/// Reconciler for one database account, bound to an authenticated client.
///
/// Built by [`crate::connector::AccountConnector`] for a single pass and
/// dropped afterwards.
pub struct AccountReconciler {
    client: Arc<dyn AccountClient>,
}

impl AccountReconciler {
    pub fn new(client: Arc<dyn AccountClient>) -> Self {
        Self { client }
    }

    /// Issue the create-or-update call. The Ready condition reads
    /// `Creating` before the request leaves.
    async fn apply(
        &self,
        acct: &mut CosmosDbAccount,
        params: DatabaseAccountCreateUpdateParameters,
    ) -> std::result::Result<(), RemoteError> {
        let name = acct.external_name().to_string();
        let group = acct.spec.for_provider.resource_group_name.clone();

        acct.set_condition(Condition::creating());
        self.client
            .create_or_update(&group, &name, params)
            .await
            .map(|_| ())
    }
}

fn lifecycle_of(state: &ProvisioningState, up_to_date: bool) -> Lifecycle {
    match state {
        ProvisioningState::Failed => Lifecycle::Failed,
        ProvisioningState::Succeeded if up_to_date => Lifecycle::UpToDate,
        ProvisioningState::Succeeded => Lifecycle::Drifted,
        _ => Lifecycle::Provisioning,
    }
}

#[async_trait]
impl ExternalClient for AccountReconciler {
    async fn observe(&self, mg: &mut dyn Managed) -> Result<ExternalObservation> {
        let acct = as_account(mg)?;
        let name = acct.external_name().to_string();
        let group = acct.spec.for_provider.resource_group_name.clone();
        debug!("Observing database account {} in {}", name, group);

        let exists = self
            .client
            .check_name_exists(&name)
            .await
            .map_err(Error::Observe)?;
        if !exists {
            debug!("Database account {} does not exist", name);
            return Ok(ExternalObservation::not_found());
        }

        let account = match self.client.get(&group, &name).await {
            Ok(account) => account,
            // The name can be taken outside this group.
            Err(RemoteError::NotFound(msg)) => {
                debug!("Database account {} not found in {}: {}", name, group, msg);
                return Ok(ExternalObservation::not_found());
            }
            Err(e) => return Err(Error::Observe(e)),
        };

        let observation = mapper::to_observation(&account);
        match observation.state {
            ProvisioningState::Succeeded => acct.set_condition(Condition::available()),
            _ => acct.set_condition(Condition::unavailable()),
        }

        // Nothing declared means nothing can drift.
        let up_to_date = acct
            .spec
            .for_provider
            .properties
            .as_ref()
            .map_or(true, |desired| is_up_to_date(desired, &observation.properties));
        let lifecycle = lifecycle_of(&observation.state, up_to_date);
        if lifecycle == Lifecycle::Failed {
            warn!("Database account {} reports a failed provisioning", name);
        }
        acct.status.at_provider = Some(observation);

        Ok(ExternalObservation {
            resource_exists: true,
            resource_up_to_date: up_to_date,
            lifecycle,
        })
    }

    async fn create(&self, mg: &mut dyn Managed) -> Result<()> {
        let acct = as_account(mg)?;
        info!(
            "Creating database account {} in {}",
            acct.external_name(),
            acct.spec.for_provider.resource_group_name
        );
        let params = mapper::to_create_request(Some(&acct.spec));
        self.apply(acct, params).await.map_err(Error::Create)
    }

    // The remote entry point is an upsert, so updating is re-issuing the
    // full creation payload.
    async fn update(&self, mg: &mut dyn Managed) -> Result<()> {
        let acct = as_account(mg)?;
        info!(
            "Updating database account {} in {}",
            acct.external_name(),
            acct.spec.for_provider.resource_group_name
        );
        let params = mapper::to_update_request(Some(&acct.spec));
        self.apply(acct, params).await.map_err(Error::Update)
    }

    async fn delete(&self, mg: &mut dyn Managed) -> Result<()> {
        let acct = as_account(mg)?;
        let name = acct.external_name().to_string();
        let group = acct.spec.for_provider.resource_group_name.clone();
        info!("Deleting database account {} in {}", name, group);

        acct.set_condition(Condition::deleting());
        self.client
            .delete(&group, &name)
            .await
            .map_err(Error::Delete)
    }
}
