//! cosmos-reconciler: runs one reconciliation pass for a database account.
//!
//! Reads a record from a JSON file, resolves credentials from a directory
//! of provider and secret files, converges the remote account, and
//! optionally writes the updated status back.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cosmos_reconciler::clients::ArmClientFactory;
use cosmos_reconciler::{reconcile_once, AccountConnector, CosmosDbAccount, FileCredentialSource};

/// Cosmos DB account reconciler
#[derive(Parser, Debug)]
#[command(name = "cosmos-reconciler", version, about)]
struct Args {
    /// Path to the account record (JSON)
    #[arg(long)]
    record: PathBuf,

    /// Directory holding providers/ and secrets/
    #[arg(long, default_value = "/etc/cosmos-reconciler")]
    credentials_dir: PathBuf,

    /// Request deletion of the remote account
    #[arg(long)]
    delete: bool,

    /// Write the updated record back to --record
    #[arg(long)]
    write_status: bool,

    /// Abandon the pass after this many seconds
    #[arg(long, default_value = "300")]
    timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cosmos_reconciler=info,reqwest=warn,hyper=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let raw = tokio::fs::read(&args.record)
        .await
        .with_context(|| format!("Failed to read record {}", args.record.display()))?;
    let mut record: CosmosDbAccount = serde_json::from_slice(&raw)
        .with_context(|| format!("Failed to parse record {}", args.record.display()))?;
    if let Some(props) = &record.spec.for_provider.properties {
        props.validate().context("Invalid record")?;
    }
    if args.delete {
        record.metadata.deletion_requested = true;
    }

    info!(
        "Reconciling database account {} from {}",
        record.metadata.name,
        args.record.display()
    );

    let connector = AccountConnector::new(
        Arc::new(FileCredentialSource::new(&args.credentials_dir)),
        Arc::new(ArmClientFactory),
    );

    // Cancel on Ctrl-C or timeout
    let cancel = CancellationToken::new();
    let watchdog = {
        let cancel = cancel.clone();
        let timeout = Duration::from_secs(args.timeout);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => warn!("Interrupted, cancelling pass"),
                _ = tokio::time::sleep(timeout) => warn!("Pass exceeded {}s, cancelling", timeout.as_secs()),
            }
            cancel.cancel();
        })
    };

    let result = reconcile_once(&connector, &mut record, &cancel).await;
    watchdog.abort();

    // Status is written even on failure so the recorded intent survives.
    if args.write_status {
        let out = serde_json::to_vec_pretty(&record).context("Failed to serialize record")?;
        tokio::fs::write(&args.record, out)
            .await
            .with_context(|| format!("Failed to write record {}", args.record.display()))?;
    }

    match result {
        Ok(outcome) => {
            info!("Pass complete: {:?}", outcome);
            Ok(())
        }
        Err(e) => {
            error!("Pass failed: {}", e);
            Err(e).context("Reconciliation failed")
        }
    }
}
