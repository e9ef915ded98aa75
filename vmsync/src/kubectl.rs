//! Declarative apply/delete tool invocation.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::error::ToolError;

/// Runs the external declarative tool against rendered manifest files.
///
/// The binary is injected so tests can substitute a stub. Every invocation
/// runs under a deadline; a hung tool fails that instance's task instead of
/// stalling the whole cycle.
#[derive(Clone)]
pub struct Kubectl {
    binary: PathBuf,
    timeout: Duration,
}

impl Kubectl {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    /// `kubectl apply -f <manifest>`.
    pub async fn apply(&self, manifest: &Path) -> Result<(), ToolError> {
        self.run("apply", manifest).await
    }

    /// `kubectl delete -f <manifest>`.
    pub async fn delete(&self, manifest: &Path) -> Result<(), ToolError> {
        self.run("delete", manifest).await
    }

    async fn run(&self, verb: &str, manifest: &Path) -> Result<(), ToolError> {
        let tool = format!("{} {}", self.binary.display(), verb);
        debug!(manifest = %manifest.display(), "Running {}", tool);

        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.binary)
                .arg(verb)
                .arg("-f")
                .arg(manifest)
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
            });
        }

        Ok(())
    }
}
