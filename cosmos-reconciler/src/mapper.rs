//! Translation between account records and the DocumentDB wire schema.
//!
//! All functions here are total: an absent spec produces an empty request
//! and missing response fields become zero values.

use std::collections::BTreeMap;

use crate::clients::documentdb::{
    self, DatabaseAccount, DatabaseAccountCreateUpdateParameters,
    DatabaseAccountCreateUpdateProperties, DatabaseAccountProperties,
};
use crate::resource::{
    AccountKind, AccountLocation, AccountObservation, AccountProperties, AccountSpec,
    ConsistencyLevel, ConsistencyPolicy, ProvisioningState,
};

/// Build the create-or-update payload for a spec.
pub fn to_create_request(spec: Option<&AccountSpec>) -> DatabaseAccountCreateUpdateParameters {
    let Some(spec) = spec else {
        return DatabaseAccountCreateUpdateParameters::default();
    };
    let p = &spec.for_provider;

    DatabaseAccountCreateUpdateParameters {
        kind: p.kind.map(|k| kind_name(k).to_string()),
        location: non_empty(&p.location),
        tags: (!p.tags.is_empty()).then(|| p.tags.clone()),
        properties: p.properties.as_ref().map(to_create_properties),
    }
}

/// Build the update payload for a spec.
///
/// The create-or-update call is an upsert, so an update re-asserts the
/// full creation payload.
pub fn to_update_request(spec: Option<&AccountSpec>) -> DatabaseAccountCreateUpdateParameters {
    to_create_request(spec)
}

/// Produce an observation from a service response.
pub fn to_observation(account: &DatabaseAccount) -> AccountObservation {
    let props = account.properties.as_ref();
    AccountObservation {
        id: account.id.clone().unwrap_or_default(),
        state: props
            .and_then(|p| p.provisioning_state.clone())
            .map(ProvisioningState::from)
            .unwrap_or_default(),
        properties: props.map(from_account_properties).unwrap_or_default(),
        location: account.location.clone().unwrap_or_default(),
        tags: account.tags.clone().unwrap_or_else(BTreeMap::new),
        document_endpoint: props
            .and_then(|p| p.document_endpoint.clone())
            .unwrap_or_default(),
    }
}

fn to_create_properties(a: &AccountProperties) -> DatabaseAccountCreateUpdateProperties {
    DatabaseAccountCreateUpdateProperties {
        consistency_policy: a.consistency_policy.as_ref().map(to_consistency_policy),
        locations: Some(a.locations.iter().map(to_location).collect()),
        database_account_offer_type: a
            .database_account_offer_type
            .as_deref()
            .and_then(non_empty),
        enable_automatic_failover: a.enable_automatic_failover,
        enable_multiple_write_locations: a.enable_multiple_write_locations,
        enable_cassandra_connector: a.enable_cassandra_connector,
    }
}

// Write locations are not declared by the spec; the read set names every
// replicated region, so it is what the spec's locations are compared to.
fn from_account_properties(a: &DatabaseAccountProperties) -> AccountProperties {
    AccountProperties {
        consistency_policy: a.consistency_policy.as_ref().map(from_consistency_policy),
        locations: a
            .read_locations
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(from_location)
            .collect(),
        database_account_offer_type: a.database_account_offer_type.clone(),
        enable_automatic_failover: a.enable_automatic_failover,
        enable_multiple_write_locations: a.enable_multiple_write_locations,
        enable_cassandra_connector: a.enable_cassandra_connector,
    }
}

fn to_consistency_policy(a: &ConsistencyPolicy) -> documentdb::ConsistencyPolicy {
    documentdb::ConsistencyPolicy {
        default_consistency_level: level_name(a.default_consistency_level).to_string(),
        max_staleness_prefix: a.max_staleness_prefix,
        max_interval_in_seconds: a.max_interval_in_seconds,
    }
}

fn from_consistency_policy(a: &documentdb::ConsistencyPolicy) -> ConsistencyPolicy {
    ConsistencyPolicy {
        default_consistency_level: parse_level(&a.default_consistency_level),
        max_staleness_prefix: a.max_staleness_prefix,
        max_interval_in_seconds: a.max_interval_in_seconds,
    }
}

fn to_location(a: &AccountLocation) -> documentdb::Location {
    documentdb::Location {
        location_name: Some(a.location_name.clone()),
        failover_priority: Some(a.failover_priority),
        is_zone_redundant: Some(a.is_zone_redundant),
        ..Default::default()
    }
}

fn from_location(a: &documentdb::Location) -> AccountLocation {
    AccountLocation {
        location_name: a.location_name.clone().unwrap_or_default(),
        failover_priority: a.failover_priority.unwrap_or_default(),
        is_zone_redundant: a.is_zone_redundant.unwrap_or_default(),
    }
}

fn kind_name(kind: AccountKind) -> &'static str {
    match kind {
        AccountKind::GlobalDocumentDB => "GlobalDocumentDB",
        AccountKind::MongoDB => "MongoDB",
        AccountKind::Parse => "Parse",
    }
}

fn level_name(level: ConsistencyLevel) -> &'static str {
    match level {
        ConsistencyLevel::Eventual => "Eventual",
        ConsistencyLevel::Session => "Session",
        ConsistencyLevel::BoundedStaleness => "BoundedStaleness",
        ConsistencyLevel::Strong => "Strong",
        ConsistencyLevel::ConsistentPrefix => "ConsistentPrefix",
    }
}

// Unknown levels fall back to the zero value like every other missing field.
fn parse_level(s: &str) -> ConsistencyLevel {
    match s {
        "Session" => ConsistencyLevel::Session,
        "BoundedStaleness" => ConsistencyLevel::BoundedStaleness,
        "Strong" => ConsistencyLevel::Strong,
        "ConsistentPrefix" => ConsistencyLevel::ConsistentPrefix,
        _ => ConsistencyLevel::Eventual,
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}
