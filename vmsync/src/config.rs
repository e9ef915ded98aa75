//! Runtime configuration for the reconciler.

use std::path::PathBuf;
use std::time::Duration;

/// Everything the reconciler needs to know about its environment.
///
/// Paths, intervals and tool binaries are injected here instead of living as
/// module constants, so tests can point the reconciler at temporary
/// directories and stub tools.
#[derive(Debug, Clone)]
pub struct Config {
    /// Cloud project whose instances are reconciled.
    pub project: String,

    /// Path of the persisted known-instance file.
    pub state_file: PathBuf,

    /// Manifest template containing the instance-name placeholder.
    pub template_path: PathBuf,

    /// Directory rendered manifests are written to.
    pub output_dir: PathBuf,

    /// Pause between reconciliation cycles.
    pub poll_interval: Duration,

    /// Maximum number of concurrent apply/remove tasks per cycle.
    pub concurrency: usize,

    /// Deadline for a single external tool invocation.
    pub tool_timeout: Duration,

    /// Inventory tool binary.
    pub gcloud_bin: PathBuf,

    /// Declarative apply/delete tool binary.
    pub kubectl_bin: PathBuf,
}
