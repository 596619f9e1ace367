//! Per-path single-flight gate.
//!
//! At most one run per link-file path is active. A trigger that arrives while
//! a run is active is coalesced: the gate keeps only the latest binding, and
//! the active run's owner picks it up as a single follow-up run. The map lock
//! is only held for the duration of an entry operation, never across an await.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::host::ItemBinding;

/// Tracks which link files have a run in flight.
#[derive(Debug, Clone, Default)]
pub struct PathGate {
    /// In-flight paths, each with the latest trigger seen during the run.
    inflight: Arc<DashMap<PathBuf, Option<ItemBinding>>>,
}

impl PathGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the path for `binding`.
    ///
    /// Returns `None` if a run is already active for the path; the binding is
    /// then remembered as that run's follow-up.
    pub fn try_enter(&self, binding: &ItemBinding) -> Option<GatePermit> {
        match self.inflight.entry(binding.path.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(None);
                Some(GatePermit {
                    inflight: Arc::clone(&self.inflight),
                    path: binding.path.clone(),
                    released: false,
                })
            }
            Entry::Occupied(mut slot) => {
                slot.insert(Some(binding.clone()));
                None
            }
        }
    }

    pub fn is_active(&self, path: &Path) -> bool {
        self.inflight.contains_key(path)
    }

    /// Number of paths with a run in flight.
    pub fn active(&self) -> usize {
        self.inflight.len()
    }
}

/// Exclusive claim on one path. Dropping it releases the path.
#[derive(Debug)]
pub struct GatePermit {
    inflight: Arc<DashMap<PathBuf, Option<ItemBinding>>>,
    path: PathBuf,
    released: bool,
}

impl GatePermit {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mark the current run finished.
    ///
    /// If triggers arrived meanwhile, returns the latest one and keeps the
    /// path claimed for it. Otherwise releases the path.
    pub fn complete(&mut self) -> Option<ItemBinding> {
        if self.released {
            return None;
        }

        if self
            .inflight
            .remove_if(&self.path, |_, pending| pending.is_none())
            .is_some()
        {
            self.released = true;
            return None;
        }

        match self.inflight.get_mut(&self.path) {
            Some(mut pending) => pending.take(),
            None => {
                self.released = true;
                None
            }
        }
    }
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        if !self.released {
            self.inflight.remove(&self.path);
        }
    }
}
