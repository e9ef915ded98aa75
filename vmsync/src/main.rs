//! vmsync: VM inventory reconciliation daemon.
//!
//! This daemon:
//! - Lists the live VM instances of a cloud project via `gcloud`
//! - Diffs the inventory against the persisted set of provisioned instances
//! - Applies Crossplane manifests for new instances via `kubectl apply`
//! - Deletes manifests for departed instances via `kubectl delete`
//! - Repeats on a fixed interval until terminated

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vmsync::config::Config;
use vmsync::inventory::GcloudInventory;
use vmsync::reconciler::Reconciler;
use vmsync::store::VmStore;

/// vmsync reconciliation daemon
#[derive(Parser, Debug)]
#[command(name = "vmsync", version, about)]
struct Args {
    /// Path of the persisted known-instance file
    #[arg(long, default_value = "known_vms.json")]
    state_file: PathBuf,

    /// Manifest template containing the <vmName> placeholder
    #[arg(long, default_value = "config/instance_template.yaml")]
    template: PathBuf,

    /// Directory rendered manifests are written to
    #[arg(long, default_value = "instanceTemplates")]
    output_dir: PathBuf,

    /// Seconds between reconciliation cycles
    #[arg(long, default_value = "120")]
    poll_interval: u64,

    /// Maximum concurrent apply/remove tasks per cycle
    #[arg(long, default_value = "4")]
    concurrency: usize,

    /// Seconds before an external tool invocation is abandoned
    #[arg(long, default_value = "300")]
    tool_timeout: u64,

    /// Inventory tool binary
    #[arg(long, default_value = "gcloud")]
    gcloud_bin: PathBuf,

    /// Declarative apply/delete tool binary
    #[arg(long, default_value = "kubectl")]
    kubectl_bin: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vmsync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let project = std::env::var("GCP_PROJECT_ID").unwrap_or_default();
    if project.is_empty() {
        anyhow::bail!("GCP_PROJECT_ID environment variable is not set");
    }

    let config = Config {
        project,
        state_file: args.state_file,
        template_path: args.template,
        output_dir: args.output_dir,
        poll_interval: Duration::from_secs(args.poll_interval),
        concurrency: args.concurrency,
        tool_timeout: Duration::from_secs(args.tool_timeout),
        gcloud_bin: args.gcloud_bin,
        kubectl_bin: args.kubectl_bin,
    };

    info!(project = %config.project, "Starting vmsync");

    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create output directory {}",
                config.output_dir.display()
            )
        })?;

    let store = match VmStore::load(&config.state_file) {
        Ok(store) => {
            info!(known = store.len(), "Loaded state file");
            store
        }
        Err(e) => {
            warn!(error = %e, "Could not load state file, starting from an empty set");
            VmStore::empty(&config.state_file)
        }
    };

    let inventory = GcloudInventory::new(
        config.project.clone(),
        config.gcloud_bin.clone(),
        config.tool_timeout,
    );

    let mut reconciler = Reconciler::new(config, inventory, store);

    tokio::select! {
        _ = reconciler.run() => {}
        _ = signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    Ok(())
}
