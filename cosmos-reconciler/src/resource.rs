//! Managed resource records.
//!
//! A record carries the user-declared spec (read-only to the engine) and a
//! status block (conditions and the last observation) that the engine
//! overwrites on every pass.

use std::any::Any;
use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Annotation that overrides the remote account name.
pub const EXTERNAL_NAME_ANNOTATION: &str = "cosmos-reconciler.io/external-name";

/// Kind name of [`CosmosDbAccount`] records.
pub const COSMOS_DB_ACCOUNT_KIND: &str = "CosmosDBAccount";

/// A record the reconciliation machinery can route to an external client.
///
/// The engine downcasts through [`Managed::as_any_mut`] to its concrete
/// record type and rejects anything else.
pub trait Managed: Any + Send + Sync {
    /// Kind name, e.g. `CosmosDBAccount`.
    fn kind(&self) -> &str;

    /// Record metadata.
    fn metadata(&self) -> &ObjectMeta;

    /// Current conditions.
    fn conditions(&self) -> &[Condition];

    /// Replace the condition of the same type.
    fn set_condition(&mut self, condition: Condition);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Name of the remote object, from the annotation or the record name.
    fn external_name(&self) -> &str {
        let meta = self.metadata();
        meta.annotations
            .get(EXTERNAL_NAME_ANNOTATION)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(&meta.name)
    }

    /// Whether the user asked for the remote resource to be removed.
    fn deletion_requested(&self) -> bool {
        self.metadata().deletion_requested
    }
}

/// Record metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub deletion_requested: bool,
}

// =============================================================================
// Conditions
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionType {
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// Why the Ready condition is in its current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionReason {
    Creating,
    Available,
    Unavailable,
    Deleting,
}

/// A lifecycle marker for external visibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub kind: ConditionType,
    pub status: ConditionStatus,
    pub reason: ConditionReason,
    pub last_transition_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Condition {
    fn ready(status: ConditionStatus, reason: ConditionReason) -> Self {
        Self {
            kind: ConditionType::Ready,
            status,
            reason,
            last_transition_time: Utc::now(),
            message: None,
        }
    }

    /// The remote account is being created.
    pub fn creating() -> Self {
        Self::ready(ConditionStatus::False, ConditionReason::Creating)
    }

    /// The remote account is provisioned and usable.
    pub fn available() -> Self {
        Self::ready(ConditionStatus::True, ConditionReason::Available)
    }

    /// The remote account exists but is not usable yet (or anymore).
    pub fn unavailable() -> Self {
        Self::ready(ConditionStatus::False, ConditionReason::Unavailable)
    }

    /// The remote account is being deleted.
    pub fn deleting() -> Self {
        Self::ready(ConditionStatus::False, ConditionReason::Deleting)
    }

    /// Same type, status, reason and message; timestamps are ignored.
    pub fn equivalent(&self, other: &Condition) -> bool {
        self.kind == other.kind
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
    }
}

/// Insert `condition`, replacing the existing one of the same type.
///
/// An equivalent existing condition is left alone so its transition time
/// keeps pointing at the real transition.
pub fn set_condition(conditions: &mut Vec<Condition>, condition: Condition) {
    match conditions.iter_mut().find(|c| c.kind == condition.kind) {
        Some(existing) if existing.equivalent(&condition) => {}
        Some(existing) => *existing = condition,
        None => conditions.push(condition),
    }
}

// =============================================================================
// Cosmos DB account
// =============================================================================

/// Reference to the provider that holds credentials for this record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderReference {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl std::fmt::Display for ProviderReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// API flavour of the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountKind {
    GlobalDocumentDB,
    MongoDB,
    Parse,
}

/// Default consistency level for reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConsistencyLevel {
    #[default]
    Eventual,
    Session,
    BoundedStaleness,
    Strong,
    ConsistentPrefix,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyPolicy {
    pub default_consistency_level: ConsistencyLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_staleness_prefix: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_interval_in_seconds: Option<i32>,
}

/// A geo-location the account is replicated to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountLocation {
    pub location_name: String,
    #[serde(default)]
    pub failover_priority: i32,
    #[serde(default)]
    pub is_zone_redundant: bool,
}

/// Account properties, shared between the desired spec and the observation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consistency_policy: Option<ConsistencyPolicy>,
    #[serde(default)]
    pub locations: Vec<AccountLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_account_offer_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_automatic_failover: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_multiple_write_locations: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_cassandra_connector: Option<bool>,
}

impl AccountProperties {
    /// Check that at least one location is declared and that location
    /// names and failover priorities are unique.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.locations.is_empty() {
            return Err(ConfigError::InvalidProperties(
                "at least one location is required".to_string(),
            ));
        }
        let mut names = HashSet::new();
        let mut priorities = HashSet::new();
        for location in &self.locations {
            if !names.insert(location.location_name.as_str()) {
                return Err(ConfigError::InvalidProperties(format!(
                    "duplicate location {}",
                    location.location_name
                )));
            }
            if !priorities.insert(location.failover_priority) {
                return Err(ConfigError::InvalidProperties(format!(
                    "duplicate failover priority {} ({})",
                    location.failover_priority, location.location_name
                )));
            }
        }
        Ok(())
    }
}

/// Desired state of the remote account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountParameters {
    pub resource_group_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<AccountKind>,
    #[serde(default)]
    pub location: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<AccountProperties>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_ref: Option<ProviderReference>,
    pub for_provider: AccountParameters,
}

/// Provisioning state reported by Azure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProvisioningState {
    Succeeded,
    Creating,
    Updating,
    Deleting,
    Failed,
    #[default]
    Unknown,
    Other(String),
}

impl From<String> for ProvisioningState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Succeeded" => ProvisioningState::Succeeded,
            "Creating" => ProvisioningState::Creating,
            "Updating" => ProvisioningState::Updating,
            "Deleting" => ProvisioningState::Deleting,
            "Failed" => ProvisioningState::Failed,
            "" => ProvisioningState::Unknown,
            _ => ProvisioningState::Other(s),
        }
    }
}

impl From<ProvisioningState> for String {
    fn from(s: ProvisioningState) -> Self {
        match s {
            ProvisioningState::Succeeded => "Succeeded".to_string(),
            ProvisioningState::Creating => "Creating".to_string(),
            ProvisioningState::Updating => "Updating".to_string(),
            ProvisioningState::Deleting => "Deleting".to_string(),
            ProvisioningState::Failed => "Failed".to_string(),
            ProvisioningState::Unknown => String::new(),
            ProvisioningState::Other(s) => s,
        }
    }
}

/// Last observed state of the remote account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountObservation {
    pub id: String,
    pub state: ProvisioningState,
    pub properties: AccountProperties,
    #[serde(default)]
    pub location: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub document_endpoint: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_provider: Option<AccountObservation>,
}

/// A Cosmos DB database account record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CosmosDbAccount {
    pub metadata: ObjectMeta,
    pub spec: AccountSpec,
    #[serde(default)]
    pub status: AccountStatus,
}

impl CosmosDbAccount {
    pub fn new(name: impl Into<String>, for_provider: AccountParameters) -> Self {
        Self {
            metadata: ObjectMeta {
                name: name.into(),
                ..Default::default()
            },
            spec: AccountSpec {
                provider_ref: None,
                for_provider,
            },
            status: AccountStatus::default(),
        }
    }

    /// The current Ready condition, if one was ever set.
    pub fn ready_condition(&self) -> Option<&Condition> {
        self.status
            .conditions
            .iter()
            .find(|c| c.kind == ConditionType::Ready)
    }
}

impl Managed for CosmosDbAccount {
    fn kind(&self) -> &str {
        COSMOS_DB_ACCOUNT_KIND
    }

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn conditions(&self) -> &[Condition] {
        &self.status.conditions
    }

    fn set_condition(&mut self, condition: Condition) {
        set_condition(&mut self.status.conditions, condition);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
