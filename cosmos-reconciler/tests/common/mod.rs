//! Shared test doubles for reconciler integration tests.

#![allow(dead_code)]

use std::any::Any;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use cosmos_reconciler::clients::documentdb::{
    self, DatabaseAccount, DatabaseAccountCreateUpdateParameters, DatabaseAccountProperties,
};
use cosmos_reconciler::clients::AccountClient;
use cosmos_reconciler::error::{RemoteError, Result};
use cosmos_reconciler::reconciler::{AccountReconciler, ExternalClient, ExternalConnector};
use cosmos_reconciler::resource::{
    set_condition, AccountLocation, AccountParameters, AccountProperties, Condition,
    ConsistencyLevel, ConsistencyPolicy, CosmosDbAccount, Managed, ObjectMeta,
};

/// In-memory stand-in for the DocumentDB API that records every call.
pub struct FakeClient {
    pub exists_result: std::result::Result<bool, RemoteError>,
    pub get_result: std::result::Result<DatabaseAccount, RemoteError>,
    pub create_error: Option<RemoteError>,
    pub delete_error: Option<RemoteError>,
    pub hang_on_create: bool,
    pub calls: Mutex<Vec<String>>,
    pub sent: Mutex<Vec<DatabaseAccountCreateUpdateParameters>>,
}

impl Default for FakeClient {
    fn default() -> Self {
        Self {
            exists_result: Ok(false),
            get_result: Err(RemoteError::NotFound("account".to_string())),
            create_error: None,
            delete_error: None,
            hang_on_create: false,
            calls: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
        }
    }
}

impl FakeClient {
    /// A client whose account exists and looks like `account`.
    pub fn existing(account: DatabaseAccount) -> Self {
        Self {
            exists_result: Ok(true),
            get_result: Ok(account),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl AccountClient for FakeClient {
    async fn check_name_exists(&self, account_name: &str) -> std::result::Result<bool, RemoteError> {
        self.record(format!("check_name_exists {}", account_name));
        self.exists_result.clone()
    }

    async fn get(
        &self,
        resource_group: &str,
        account_name: &str,
    ) -> std::result::Result<DatabaseAccount, RemoteError> {
        self.record(format!("get {}/{}", resource_group, account_name));
        self.get_result.clone()
    }

    async fn create_or_update(
        &self,
        resource_group: &str,
        account_name: &str,
        params: DatabaseAccountCreateUpdateParameters,
    ) -> std::result::Result<DatabaseAccount, RemoteError> {
        self.record(format!("create_or_update {}/{}", resource_group, account_name));
        self.sent.lock().unwrap().push(params);
        if self.hang_on_create {
            std::future::pending::<()>().await;
        }
        match &self.create_error {
            Some(e) => Err(e.clone()),
            None => Ok(DatabaseAccount::default()),
        }
    }

    async fn delete(&self, resource_group: &str, account_name: &str) -> std::result::Result<(), RemoteError> {
        self.record(format!("delete {}/{}", resource_group, account_name));
        match &self.delete_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

/// Connector that hands out reconcilers bound to one fake client.
pub struct StaticConnector {
    pub client: Arc<FakeClient>,
}

#[async_trait]
impl ExternalConnector for StaticConnector {
    async fn connect(&self, _mg: &dyn Managed) -> Result<Box<dyn ExternalClient>> {
        Ok(Box::new(AccountReconciler::new(self.client.clone())))
    }
}

/// A record of a kind the account reconciler does not manage.
#[derive(Default)]
pub struct SqlServer {
    pub metadata: ObjectMeta,
    pub conditions: Vec<Condition>,
}

impl Managed for SqlServer {
    fn kind(&self) -> &str {
        "SQLServer"
    }

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    fn set_condition(&mut self, condition: Condition) {
        set_condition(&mut self.conditions, condition);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub fn location(name: &str, priority: i32, zone_redundant: bool) -> AccountLocation {
    AccountLocation {
        location_name: name.to_string(),
        failover_priority: priority,
        is_zone_redundant: zone_redundant,
    }
}

pub fn desired_properties() -> AccountProperties {
    AccountProperties {
        consistency_policy: Some(ConsistencyPolicy {
            default_consistency_level: ConsistencyLevel::Session,
            max_staleness_prefix: None,
            max_interval_in_seconds: None,
        }),
        locations: vec![location("westus", 0, false), location("eastus", 1, true)],
        database_account_offer_type: Some("Standard".to_string()),
        enable_automatic_failover: Some(true),
        enable_multiple_write_locations: None,
        enable_cassandra_connector: None,
    }
}

pub fn account_record() -> CosmosDbAccount {
    CosmosDbAccount::new(
        "orders",
        AccountParameters {
            resource_group_name: "rg".to_string(),
            kind: None,
            location: "westus".to_string(),
            tags: Default::default(),
            properties: Some(desired_properties()),
        },
    )
}

pub fn wire_location(name: &str, priority: i32, zone_redundant: bool) -> documentdb::Location {
    documentdb::Location {
        location_name: Some(name.to_string()),
        failover_priority: Some(priority),
        is_zone_redundant: Some(zone_redundant),
        ..Default::default()
    }
}

/// A remote account in `state` whose read locations are `read_locations`.
pub fn remote_account(state: &str, read_locations: Vec<documentdb::Location>) -> DatabaseAccount {
    DatabaseAccount {
        id: Some("/subscriptions/sub/resourceGroups/rg/providers/Microsoft.DocumentDB/databaseAccounts/orders".to_string()),
        name: Some("orders".to_string()),
        location: Some("westus".to_string()),
        properties: Some(DatabaseAccountProperties {
            provisioning_state: Some(state.to_string()),
            document_endpoint: Some("https://orders.documents.azure.com:443/".to_string()),
            database_account_offer_type: Some("Standard".to_string()),
            consistency_policy: Some(documentdb::ConsistencyPolicy {
                default_consistency_level: "Session".to_string(),
                max_staleness_prefix: None,
                max_interval_in_seconds: None,
            }),
            read_locations: Some(read_locations.clone()),
            write_locations: Some(read_locations),
            enable_automatic_failover: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Remote account matching [`desired_properties`] exactly.
pub fn matching_account(state: &str) -> DatabaseAccount {
    remote_account(
        state,
        vec![wire_location("westus", 0, false), wire_location("eastus", 1, true)],
    )
}
