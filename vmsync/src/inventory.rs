//! Instance inventory sources.
//!
//! The reconciler only needs the set of live instance names for a project.
//! `GcloudInventory` is the production source; tests substitute their own
//! implementation of the `Inventory` trait.

use std::collections::HashSet;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::error::{InventoryError, ToolError};

/// Source of the live instance inventory.
#[async_trait]
pub trait Inventory: Send + Sync {
    /// List the names of all live instances. Either the complete set is
    /// returned or the call fails; there are no partial results.
    async fn list_instances(&self) -> Result<HashSet<String>, InventoryError>;
}

/// Inventory backed by the `gcloud` CLI.
pub struct GcloudInventory {
    project: String,
    binary: PathBuf,
    timeout: Duration,
}

impl GcloudInventory {
    pub fn new(project: impl Into<String>, binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            project: project.into(),
            binary: binary.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Inventory for GcloudInventory {
    async fn list_instances(&self) -> Result<HashSet<String>, InventoryError> {
        debug!(project = %self.project, "Listing instances");

        let tool = self.binary.display().to_string();
        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.binary)
                .args([
                    "compute",
                    "instances",
                    "list",
                    "--project",
                    &self.project,
                    "--format=json",
                ])
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| ToolError::Timeout {
            tool: tool.clone(),
            timeout_secs: self.timeout.as_secs(),
        })?
        .map_err(|e| ToolError::Spawn {
            tool: tool.clone(),
            source: e,
        })?;

        if !output.status.success() {
            return Err(ToolError::Failed {
                tool,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }
            .into());
        }

        parse_instance_names(&String::from_utf8_lossy(&output.stdout))
    }
}

#[derive(Deserialize)]
struct InstanceEntry {
    name: String,
}

/// Parse `gcloud compute instances list --format=json` output into the set of
/// instance names. Duplicates collapse; anything that is not a JSON array of
/// objects carrying a `name` field is an error.
pub fn parse_instance_names(raw: &str) -> Result<HashSet<String>, InventoryError> {
    let entries: Vec<InstanceEntry> =
        serde_json::from_str(raw).map_err(|e| InventoryError::Parse(e.to_string()))?;
    Ok(entries.into_iter().map(|e| e.name).collect())
}
