//! The reconciliation control loop.
//!
//! One cycle: fetch the live inventory, diff it against the known set, fan
//! out bounded concurrent apply/remove tasks, fold successful outcomes back
//! into the store, sleep. The store is only touched on the loop task; worker
//! tasks report outcomes over a channel.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{ApplyError, InventoryError, RemoveError};
use crate::inventory::Inventory;
use crate::kubectl::Kubectl;
use crate::manifest::ManifestRenderer;
use crate::store::VmStore;

/// Counts from one reconciliation cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleStats {
    pub discovered: usize,
    pub applied: usize,
    pub apply_failures: usize,
    pub removed: usize,
    pub remove_failures: usize,
}

/// New and departed instance names for one cycle.
///
/// `new` is `discovered - known`, `removed` is `known - discovered`; the two
/// are disjoint by construction.
pub fn diff(
    discovered: &HashSet<String>,
    known: &HashSet<String>,
) -> (HashSet<String>, HashSet<String>) {
    let new = discovered.difference(known).cloned().collect();
    let removed = known.difference(discovered).cloned().collect();
    (new, removed)
}

/// Render, write and apply the manifest for one new instance.
async fn apply_instance(
    renderer: Arc<ManifestRenderer>,
    kubectl: Kubectl,
    name: String,
) -> Result<(), ApplyError> {
    let rendered = renderer.render(&name).await?;
    let path = renderer.write(&name, &rendered).await?;
    kubectl.apply(&path).await?;
    Ok(())
}

/// Delete the previously generated manifest for one departed instance.
async fn remove_instance(
    renderer: Arc<ManifestRenderer>,
    kubectl: Kubectl,
    name: String,
) -> Result<(), RemoveError> {
    let path = renderer.manifest_path(&name);
    kubectl.delete(&path).await?;
    Ok(())
}

/// Drives the fetch-diff-apply-remove loop for one cloud project.
pub struct Reconciler<I: Inventory> {
    config: Config,
    inventory: I,
    store: VmStore,
    renderer: Arc<ManifestRenderer>,
    kubectl: Kubectl,
}

impl<I: Inventory> Reconciler<I> {
    pub fn new(config: Config, inventory: I, store: VmStore) -> Self {
        let renderer = Arc::new(ManifestRenderer::new(
            &config.template_path,
            &config.output_dir,
        ));
        let kubectl = Kubectl::new(&config.kubectl_bin, config.tool_timeout);
        Self {
            config,
            inventory,
            store,
            renderer,
            kubectl,
        }
    }

    /// Owned copy of the current known set.
    pub fn known(&self) -> HashSet<String> {
        self.store.snapshot()
    }

    /// Run reconciliation cycles until the process is terminated.
    pub async fn run(&mut self) {
        info!(
            project = %self.config.project,
            interval = ?self.config.poll_interval,
            "Starting reconciliation loop"
        );

        loop {
            match self.run_cycle().await {
                Ok(stats) => {
                    info!(
                        discovered = stats.discovered,
                        applied = stats.applied,
                        apply_failures = stats.apply_failures,
                        removed = stats.removed,
                        remove_failures = stats.remove_failures,
                        "Cycle complete"
                    );
                }
                Err(e) => {
                    error!(error = %e, "Inventory fetch failed, skipping cycle");
                }
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Execute exactly one fetch-diff-apply-remove cycle.
    ///
    /// Only an inventory failure is an error; per-instance failures are
    /// logged, counted in the returned stats and retried next cycle because
    /// the store is never mutated for a failed instance.
    pub async fn run_cycle(&mut self) -> Result<CycleStats, InventoryError> {
        let discovered = self.inventory.list_instances().await?;
        let known = self.store.snapshot();
        let (new, removed) = diff(&discovered, &known);

        let mut stats = CycleStats {
            discovered: discovered.len(),
            ..Default::default()
        };

        if new.is_empty() && removed.is_empty() {
            info!(known = known.len(), "Inventory unchanged");
            return Ok(stats);
        }

        info!(new = new.len(), removed = removed.len(), "Reconciling inventory");

        // Provision new instances first, then tear down departed ones.
        let renderer = Arc::clone(&self.renderer);
        let kubectl = self.kubectl.clone();
        let outcomes = self
            .fan_out(new, move |name| {
                apply_instance(Arc::clone(&renderer), kubectl.clone(), name)
            })
            .await;

        for (name, result) in outcomes {
            match result {
                Ok(()) => {
                    info!(instance = %name, "Applied manifest");
                    if let Err(e) = self.store.add(&name) {
                        warn!(instance = %name, error = %e, "State kept in memory only");
                    }
                    stats.applied += 1;
                }
                Err(e) => {
                    error!(instance = %name, error = %e, "Apply failed, will retry next cycle");
                    stats.apply_failures += 1;
                }
            }
        }

        let renderer = Arc::clone(&self.renderer);
        let kubectl = self.kubectl.clone();
        let outcomes = self
            .fan_out(removed, move |name| {
                remove_instance(Arc::clone(&renderer), kubectl.clone(), name)
            })
            .await;

        for (name, result) in outcomes {
            match result {
                Ok(()) => {
                    info!(instance = %name, "Deleted manifest");
                    if let Err(e) = self.store.remove(&name) {
                        warn!(instance = %name, error = %e, "State kept in memory only");
                    }
                    stats.removed += 1;
                }
                Err(e) => {
                    error!(instance = %name, error = %e, "Delete failed, will retry next cycle");
                    stats.remove_failures += 1;
                }
            }
        }

        Ok(stats)
    }

    /// Run one task per name, at most `concurrency` at a time, and collect
    /// every `(name, result)` outcome before returning.
    async fn fan_out<E, F, Fut>(
        &self,
        names: HashSet<String>,
        task: F,
    ) -> Vec<(String, Result<(), E>)>
    where
        E: Send + 'static,
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let (tx, mut rx) = mpsc::channel(names.len().max(1));
        let total = names.len();

        for name in names {
            let semaphore = Arc::clone(&semaphore);
            let tx = tx.clone();
            let work = task(name.clone());
            tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore never closed");
                let result = work.await;
                let _ = tx.send((name, result)).await;
            });
        }
        drop(tx);

        let mut outcomes = Vec::with_capacity(total);
        while let Some(outcome) = rx.recv().await {
            outcomes.push(outcome);
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> HashSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn diff_splits_new_and_removed() {
        let (new, removed) = diff(&set(&["vm-a", "vm-b"]), &set(&["vm-b", "vm-c"]));
        assert_eq!(new, set(&["vm-a"]));
        assert_eq!(removed, set(&["vm-c"]));
    }

    #[test]
    fn diff_sets_are_disjoint() {
        let discovered = set(&["vm-a", "vm-b", "vm-c"]);
        let known = set(&["vm-b", "vm-d"]);
        let (new, removed) = diff(&discovered, &known);
        assert!(new.is_disjoint(&removed));
    }

    #[test]
    fn diff_of_equal_sets_is_empty() {
        let names = set(&["vm-a", "vm-b"]);
        let (new, removed) = diff(&names, &names);
        assert!(new.is_empty());
        assert!(removed.is_empty());
    }

    #[test]
    fn diff_against_empty_known_is_all_new() {
        let discovered = set(&["vm-a", "vm-b"]);
        let (new, removed) = diff(&discovered, &HashSet::new());
        assert_eq!(new, discovered);
        assert!(removed.is_empty());
    }

    #[test]
    fn diff_against_empty_inventory_is_all_removed() {
        let known = set(&["vm-a", "vm-b"]);
        let (new, removed) = diff(&HashSet::new(), &known);
        assert!(new.is_empty());
        assert_eq!(removed, known);
    }
}
