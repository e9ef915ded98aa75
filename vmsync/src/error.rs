//! Error types for vmsync.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Errors from a single external tool invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The tool binary could not be spawned.
    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The tool ran but exited nonzero.
    #[error("{tool} exited with {status}: {stderr}")]
    Failed {
        tool: String,
        status: ExitStatus,
        stderr: String,
    },

    /// The tool did not finish before the deadline.
    #[error("{tool} timed out after {timeout_secs}s")]
    Timeout { tool: String, timeout_secs: u64 },
}

/// Errors while fetching the live instance inventory.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// The tool output was not the expected JSON instance list.
    #[error("failed to parse instance list: {0}")]
    Parse(String),
}

/// Errors while applying the manifest for one instance.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// The manifest template could not be read.
    #[error("failed to read template {path}: {source}")]
    Template {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The rendered manifest could not be written.
    #[error("failed to write manifest {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// Errors while removing a previously applied manifest.
#[derive(Debug, Error)]
pub enum RemoveError {
    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// Errors from the known-instance store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The state file exists but could not be read.
    #[error("failed to read state file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The state file exists but does not parse as a JSON object.
    #[error("state file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The state file could not be rewritten.
    #[error("failed to persist state to {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
