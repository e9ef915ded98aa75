//! Persisted record of the instances that have been provisioned.
//!
//! The set lives in memory and is mirrored to a JSON file mapping each
//! instance name to an empty object. The file is rewritten atomically
//! (write to a sibling temp file, then rename), so a reader never observes a
//! half-written state file and a crash between cycles leaves the previous
//! consistent set in place.

use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::PathBuf;

use serde_json::Value;

use crate::error::StoreError;

/// The set of instance names the reconciler considers provisioned.
///
/// Owned by the reconciler and mutated only on the control-loop task; worker
/// tasks report outcomes instead of touching the store.
pub struct VmStore {
    path: PathBuf,
    names: HashSet<String>,
}

impl VmStore {
    /// Load the persisted set from `path`. A missing or empty file yields an
    /// empty store; unreadable or malformed content is an error the caller
    /// may degrade to an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(Self {
                    path,
                    names: HashSet::new(),
                });
            }
            Err(e) => return Err(StoreError::Read { path, source: e }),
        };

        if raw.trim().is_empty() {
            return Ok(Self {
                path,
                names: HashSet::new(),
            });
        }

        let entries: BTreeMap<String, Value> =
            serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
                path: path.clone(),
                source: e,
            })?;

        Ok(Self {
            path,
            names: entries.into_keys().collect(),
        })
    }

    /// An empty store persisting to `path`, ignoring whatever is currently on
    /// disk. Used to recover from a corrupt state file.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            names: HashSet::new(),
        }
    }

    /// Insert `name`, returning `true` if it was not already present.
    ///
    /// The in-memory insert stands even when persisting fails; the error is
    /// returned so the caller can log that disk lags memory until the next
    /// successful save.
    pub fn add(&mut self, name: &str) -> Result<bool, StoreError> {
        if !self.names.insert(name.to_string()) {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    /// Remove `name` if present, returning `true` if it was. Removing an
    /// absent name is a no-op that does not touch the file.
    pub fn remove(&mut self, name: &str) -> Result<bool, StoreError> {
        if !self.names.remove(name) {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    /// Owned copy of the current set for diffing.
    pub fn snapshot(&self) -> HashSet<String> {
        self.names.clone()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn save(&self) -> Result<(), StoreError> {
        // Sorted keys so the file diffs cleanly between runs.
        let entries: BTreeMap<&str, Value> = self
            .names
            .iter()
            .map(|n| (n.as_str(), Value::Object(Default::default())))
            .collect();

        let data = serde_json::to_string_pretty(&entries).map_err(|e| StoreError::Persist {
            path: self.path.clone(),
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })?;

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, data).map_err(|e| StoreError::Persist {
            path: self.path.clone(),
            source: e,
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| StoreError::Persist {
            path: self.path.clone(),
            source: e,
        })?;

        Ok(())
    }
}
