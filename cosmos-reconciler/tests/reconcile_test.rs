//! Integration tests for the account reconciler and the reconciliation pass.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use common::*;
use cosmos_reconciler::error::{Error, Operation, RemoteError};
use cosmos_reconciler::reconciler::{
    reconcile_once, AccountReconciler, ExternalClient, Lifecycle, Outcome,
};
use cosmos_reconciler::resource::{ConditionReason, ProvisioningState};

fn reconciler(client: &Arc<FakeClient>) -> AccountReconciler {
    AccountReconciler::new(client.clone())
}

fn ready_reason(record: &cosmos_reconciler::CosmosDbAccount) -> Option<ConditionReason> {
    record.ready_condition().map(|c| c.reason)
}

// =============================================================================
// Observe
// =============================================================================

#[tokio::test]
async fn test_observe_name_not_taken() {
    let client = Arc::new(FakeClient::default());
    let mut record = account_record();

    let obs = reconciler(&client).observe(&mut record).await.unwrap();

    assert!(!obs.resource_exists);
    assert_eq!(obs.lifecycle, Lifecycle::NotFound);
    assert!(record.status.at_provider.is_none());
    assert!(record.status.conditions.is_empty());
    assert_eq!(client.calls(), vec!["check_name_exists orders"]);
}

#[tokio::test]
async fn test_observe_not_found_on_get() {
    let client = Arc::new(FakeClient {
        exists_result: Ok(true),
        get_result: Err(RemoteError::NotFound("ResourceGroupNotFound".to_string())),
        ..Default::default()
    });
    let mut record = account_record();

    let obs = reconciler(&client).observe(&mut record).await.unwrap();

    assert!(!obs.resource_exists);
    assert!(record.status.at_provider.is_none());
}

#[tokio::test]
async fn test_observe_succeeded_and_matching() {
    let client = Arc::new(FakeClient::existing(matching_account("Succeeded")));
    let mut record = account_record();

    let obs = reconciler(&client).observe(&mut record).await.unwrap();

    assert!(obs.resource_exists);
    assert!(obs.resource_up_to_date);
    assert_eq!(obs.lifecycle, Lifecycle::UpToDate);
    assert_eq!(ready_reason(&record), Some(ConditionReason::Available));

    let at_provider = record.status.at_provider.as_ref().unwrap();
    assert_eq!(at_provider.state, ProvisioningState::Succeeded);
    assert_eq!(
        at_provider.document_endpoint,
        "https://orders.documents.azure.com:443/"
    );
    assert_eq!(
        client.calls(),
        vec!["check_name_exists orders", "get rg/orders"]
    );
}

#[tokio::test]
async fn test_observe_reordered_locations_are_up_to_date() {
    let client = Arc::new(FakeClient::existing(remote_account(
        "Succeeded",
        vec![wire_location("eastus", 1, true), wire_location("westus", 0, false)],
    )));
    let mut record = account_record();

    let obs = reconciler(&client).observe(&mut record).await.unwrap();

    assert!(obs.resource_up_to_date);
    // The declared list keeps its order.
    let desired = record.spec.for_provider.properties.as_ref().unwrap();
    assert_eq!(desired.locations[0].location_name, "westus");
}

#[tokio::test]
async fn test_observe_drifted() {
    let client = Arc::new(FakeClient::existing(remote_account(
        "Succeeded",
        vec![wire_location("westus", 0, false)],
    )));
    let mut record = account_record();

    let obs = reconciler(&client).observe(&mut record).await.unwrap();

    assert!(obs.resource_exists);
    assert!(!obs.resource_up_to_date);
    assert_eq!(obs.lifecycle, Lifecycle::Drifted);
    assert_eq!(ready_reason(&record), Some(ConditionReason::Available));
}

#[tokio::test]
async fn test_observe_provisioning_is_unavailable() {
    let client = Arc::new(FakeClient::existing(matching_account("Creating")));
    let mut record = account_record();

    let obs = reconciler(&client).observe(&mut record).await.unwrap();

    assert_eq!(obs.lifecycle, Lifecycle::Provisioning);
    assert_eq!(ready_reason(&record), Some(ConditionReason::Unavailable));
}

#[tokio::test]
async fn test_observe_failed_provisioning() {
    let client = Arc::new(FakeClient::existing(matching_account("Failed")));
    let mut record = account_record();

    let obs = reconciler(&client).observe(&mut record).await.unwrap();

    assert_eq!(obs.lifecycle, Lifecycle::Failed);
    assert_eq!(ready_reason(&record), Some(ConditionReason::Unavailable));
}

#[tokio::test]
async fn test_observe_without_declared_properties_is_up_to_date() {
    let client = Arc::new(FakeClient::existing(matching_account("Succeeded")));
    let mut record = account_record();
    record.spec.for_provider.properties = None;

    let obs = reconciler(&client).observe(&mut record).await.unwrap();

    assert!(obs.resource_up_to_date);
}

#[tokio::test]
async fn test_observe_remote_failure() {
    let client = Arc::new(FakeClient {
        exists_result: Ok(true),
        get_result: Err(RemoteError::Status {
            status: 403,
            message: "AuthorizationFailed".to_string(),
        }),
        ..Default::default()
    });
    let mut record = account_record();

    let err = reconciler(&client).observe(&mut record).await.unwrap_err();

    assert!(matches!(err, Error::Observe(RemoteError::Status { status: 403, .. })));
    assert!(record.status.at_provider.is_none());
}

#[tokio::test]
async fn test_observe_name_check_failure() {
    let client = Arc::new(FakeClient {
        exists_result: Err(RemoteError::Transport("connection reset".to_string())),
        ..Default::default()
    });
    let mut record = account_record();
    let before = record.status.clone();

    let err = reconciler(&client).observe(&mut record).await.unwrap_err();

    assert!(matches!(err, Error::Observe(RemoteError::Transport(_))));
    assert_eq!(err.operation(), Some(Operation::Observe));
    assert_eq!(record.status, before);
    assert_eq!(client.calls(), vec!["check_name_exists orders"]);
}

#[tokio::test]
async fn test_observe_ignores_reported_staleness_bounds() {
    let mut account = matching_account("Succeeded");
    if let Some(policy) = account
        .properties
        .as_mut()
        .and_then(|p| p.consistency_policy.as_mut())
    {
        policy.max_staleness_prefix = Some(100);
        policy.max_interval_in_seconds = Some(5);
    }
    let client = Arc::new(FakeClient::existing(account));
    let mut record = account_record();

    let obs = reconciler(&client).observe(&mut record).await.unwrap();

    assert!(obs.resource_up_to_date);
    assert_eq!(obs.lifecycle, Lifecycle::UpToDate);
    let observed = record.status.at_provider.as_ref().unwrap();
    assert_eq!(
        observed
            .properties
            .consistency_policy
            .as_ref()
            .and_then(|p| p.max_staleness_prefix),
        Some(100)
    );
}

// =============================================================================
// Create / Update / Delete
// =============================================================================

#[tokio::test]
async fn test_create_sends_mapped_request() {
    let client = Arc::new(FakeClient::default());
    let mut record = account_record();

    reconciler(&client).create(&mut record).await.unwrap();

    assert_eq!(ready_reason(&record), Some(ConditionReason::Creating));
    assert_eq!(client.calls(), vec!["create_or_update rg/orders"]);
    let sent = client.sent.lock().unwrap();
    let props = sent[0].properties.as_ref().unwrap();
    assert_eq!(props.locations.as_ref().unwrap().len(), 2);
    assert_eq!(props.enable_automatic_failover, Some(true));
    assert_eq!(sent[0].location.as_deref(), Some("westus"));
}

#[tokio::test]
async fn test_create_failure_keeps_creating() {
    let client = Arc::new(FakeClient {
        create_error: Some(RemoteError::Transport("connection reset".to_string())),
        ..Default::default()
    });
    let mut record = account_record();

    let err = reconciler(&client).create(&mut record).await.unwrap_err();

    assert!(matches!(err, Error::Create(RemoteError::Transport(_))));
    assert_eq!(err.operation(), Some(Operation::Create));
    assert_eq!(ready_reason(&record), Some(ConditionReason::Creating));
}

#[tokio::test]
async fn test_update_reissues_create_payload() {
    let client = Arc::new(FakeClient::default());
    let mut record = account_record();
    let r = reconciler(&client);

    r.create(&mut record).await.unwrap();
    r.update(&mut record).await.unwrap();

    let sent = client.sent.lock().unwrap();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0], sent[1]);
}

#[tokio::test]
async fn test_update_failure() {
    let client = Arc::new(FakeClient {
        create_error: Some(RemoteError::Status {
            status: 400,
            message: "BadRequest".to_string(),
        }),
        ..Default::default()
    });
    let mut record = account_record();

    let err = reconciler(&client).update(&mut record).await.unwrap_err();

    assert!(matches!(err, Error::Update(_)));
}

#[tokio::test]
async fn test_delete_failure_keeps_deleting() {
    let cause = RemoteError::Status {
        status: 409,
        message: "Conflict".to_string(),
    };
    let client = Arc::new(FakeClient {
        delete_error: Some(cause.clone()),
        ..Default::default()
    });
    let mut record = account_record();

    let err = reconciler(&client).delete(&mut record).await.unwrap_err();

    match err {
        Error::Delete(inner) => assert_eq!(inner, cause),
        other => panic!("expected delete error, got {other:?}"),
    }
    assert_eq!(ready_reason(&record), Some(ConditionReason::Deleting));
    assert_eq!(client.calls(), vec!["delete rg/orders"]);
}

#[tokio::test]
async fn test_wrong_kind_makes_no_remote_calls() {
    let client = Arc::new(FakeClient::existing(matching_account("Succeeded")));
    let r = reconciler(&client);
    let mut other = SqlServer::default();

    let results = vec![
        r.observe(&mut other).await.map(|_| ()),
        r.create(&mut other).await,
        r.update(&mut other).await,
        r.delete(&mut other).await,
    ];

    for result in results {
        match result {
            Err(Error::TypeMismatch { actual, .. }) => assert_eq!(actual, "SQLServer"),
            other => panic!("expected type mismatch, got {other:?}"),
        }
    }
    assert!(client.calls().is_empty());
    assert!(other.conditions.is_empty());
}

// =============================================================================
// Reconciliation pass
// =============================================================================

#[tokio::test]
async fn test_pass_creates_missing_account() {
    let client = Arc::new(FakeClient::default());
    let connector = StaticConnector {
        client: client.clone(),
    };
    let mut record = account_record();

    let outcome = reconcile_once(&connector, &mut record, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Created);
    assert_eq!(
        client.calls(),
        vec!["check_name_exists orders", "create_or_update rg/orders"]
    );
}

#[tokio::test]
async fn test_pass_updates_drifted_account() {
    let client = Arc::new(FakeClient::existing(remote_account("Succeeded", vec![])));
    let connector = StaticConnector {
        client: client.clone(),
    };
    let mut record = account_record();

    let outcome = reconcile_once(&connector, &mut record, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Updated);
}

#[tokio::test]
async fn test_pass_leaves_converged_account_alone() {
    let client = Arc::new(FakeClient::existing(matching_account("Succeeded")));
    let connector = StaticConnector {
        client: client.clone(),
    };
    let mut record = account_record();

    let outcome = reconcile_once(&connector, &mut record, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Unchanged);
    assert!(client.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_pass_deletes_when_requested() {
    let client = Arc::new(FakeClient::existing(matching_account("Succeeded")));
    let connector = StaticConnector {
        client: client.clone(),
    };
    let mut record = account_record();
    record.metadata.deletion_requested = true;

    let outcome = reconcile_once(&connector, &mut record, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Deleted);
    assert_eq!(ready_reason(&record), Some(ConditionReason::Deleting));
}

#[tokio::test]
async fn test_pass_tolerates_not_found_on_delete() {
    let client = Arc::new(FakeClient {
        delete_error: Some(RemoteError::NotFound("gone".to_string())),
        ..FakeClient::existing(matching_account("Succeeded"))
    });
    let connector = StaticConnector {
        client: client.clone(),
    };
    let mut record = account_record();
    record.metadata.deletion_requested = true;

    let outcome = reconcile_once(&connector, &mut record, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Deleted);
}

#[tokio::test]
async fn test_pass_skips_delete_of_absent_account() {
    let client = Arc::new(FakeClient::default());
    let connector = StaticConnector {
        client: client.clone(),
    };
    let mut record = account_record();
    record.metadata.deletion_requested = true;

    let outcome = reconcile_once(&connector, &mut record, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Absent);
    assert_eq!(client.calls(), vec!["check_name_exists orders"]);
}

#[tokio::test]
async fn test_pass_cancelled_mid_create() {
    let client = Arc::new(FakeClient {
        hang_on_create: true,
        ..Default::default()
    });
    let connector = StaticConnector {
        client: client.clone(),
    };
    let mut record = account_record();
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = reconcile_once(&connector, &mut record, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Cancelled {
            operation: Operation::Create
        }
    ));
    // Intent was recorded before the call went out.
    assert_eq!(ready_reason(&record), Some(ConditionReason::Creating));
}

#[tokio::test]
async fn test_pass_already_cancelled() {
    let client = Arc::new(FakeClient::default());
    let connector = StaticConnector {
        client: client.clone(),
    };
    let mut record = account_record();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = reconcile_once(&connector, &mut record, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Cancelled {
            operation: Operation::Connect
        }
    ));
    assert!(client.calls().is_empty());
}
