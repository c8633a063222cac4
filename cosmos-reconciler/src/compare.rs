//! Drift detection between desired and observed account properties.
//!
//! Only settable fields are compared: consistency policy, locations and the
//! three feature flags. Offer type is server-normalised and never drifts.

use crate::resource::{AccountLocation, AccountProperties, ConsistencyPolicy};

/// Whether the observed properties already satisfy the desired ones.
pub fn is_up_to_date(desired: &AccountProperties, observed: &AccountProperties) -> bool {
    equal_consistency_policy_if_set(
        desired.consistency_policy.as_ref(),
        observed.consistency_policy.as_ref(),
    ) && equal_locations(&desired.locations, &observed.locations)
        && equal_bool_if_set(
            desired.enable_automatic_failover,
            observed.enable_automatic_failover,
        )
        && equal_bool_if_set(
            desired.enable_multiple_write_locations,
            observed.enable_multiple_write_locations,
        )
        && equal_bool_if_set(
            desired.enable_cassandra_connector,
            observed.enable_cassandra_connector,
        )
}

fn equal_consistency_policy_if_set(
    desired: Option<&ConsistencyPolicy>,
    observed: Option<&ConsistencyPolicy>,
) -> bool {
    let Some(d) = desired else {
        return true;
    };
    let default = ConsistencyPolicy::default();
    let o = observed.unwrap_or(&default);

    // The service reports staleness bounds for every level.
    d.default_consistency_level == o.default_consistency_level
        && equal_if_set(d.max_staleness_prefix, o.max_staleness_prefix)
        && equal_if_set(d.max_interval_in_seconds, o.max_interval_in_seconds)
}

fn equal_bool_if_set(desired: Option<bool>, observed: Option<bool>) -> bool {
    match desired {
        Some(d) => d == observed.unwrap_or_default(),
        None => true,
    }
}

fn equal_if_set<T: PartialEq>(desired: Option<T>, observed: Option<T>) -> bool {
    match desired {
        Some(d) => observed == Some(d),
        None => true,
    }
}

/// Compare location lists as sets keyed by location name.
fn equal_locations(a: &[AccountLocation], b: &[AccountLocation]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    sorted(a) == sorted(b)
}

fn sorted(locations: &[AccountLocation]) -> Vec<&AccountLocation> {
    let mut sorted: Vec<&AccountLocation> = locations.iter().collect();
    sorted.sort_by(|x, y| {
        (&x.location_name, x.failover_priority, x.is_zone_redundant).cmp(&(
            &y.location_name,
            y.failover_priority,
            y.is_zone_redundant,
        ))
    });
    sorted
}
