//! Per-node cache entry with explicit status.
//!
//! # Invariants
//! - State transitions are whole-value swaps under the state lock; readers
//!   observe the prior state or the new one, never a partial collection.
//! - At most one load runs per entry; cached readers never wait for it.
//! - A load that overlaps `invalidate` returns its value to its caller but
//!   does not install it.
//! - A cancelled load installs nothing.

use super::cancel::{CancellationToken, Resolution};
use super::error::StorageError;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};

/// Observable cache status of one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeStatus {
    /// Never loaded, or invalidated since.
    Unresolved,
    /// Loaded; `children` is the cached child count (1 for leaf values).
    Resolved { children: usize },
    /// Last load failed; the error stays attached until invalidation.
    Failed(StorageError),
}

enum CacheState<V> {
    Unresolved,
    Resolved(V),
    Failed(StorageError),
}

/// Values that can report how many children they hold.
pub(crate) trait ChildCount {
    fn child_count(&self) -> usize;
}

impl<T> ChildCount for std::sync::Arc<Vec<T>> {
    fn child_count(&self) -> usize {
        self.len()
    }
}

pub(crate) struct NodeCache<V> {
    state: RwLock<CacheState<V>>,
    load_gate: Mutex<()>,
    generation: AtomicU64,
}

impl<V> Default for NodeCache<V> {
    fn default() -> Self {
        Self {
            state: RwLock::new(CacheState::Unresolved),
            load_gate: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }
}

impl<V: Clone> NodeCache<V> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value or failure without loading.
    pub(crate) fn cached(&self) -> Option<Result<V, StorageError>> {
        match &*self.state.read() {
            CacheState::Unresolved => None,
            CacheState::Resolved(value) => Some(Ok(value.clone())),
            CacheState::Failed(err) => Some(Err(err.clone())),
        }
    }

    pub(crate) fn status_with(&self, children: impl FnOnce(&V) -> usize) -> NodeStatus {
        match &*self.state.read() {
            CacheState::Unresolved => NodeStatus::Unresolved,
            CacheState::Resolved(value) => NodeStatus::Resolved {
                children: children(value),
            },
            CacheState::Failed(err) => NodeStatus::Failed(err.clone()),
        }
    }

    /// Serves from cache, or runs `load` once and caches its outcome.
    pub(crate) fn get_or_load<F>(
        &self,
        cancel: &CancellationToken,
        load: F,
    ) -> Result<Resolution<V>, StorageError>
    where
        F: FnOnce() -> Result<V, StorageError>,
    {
        if let Some(cached) = self.cached() {
            return cached.map(Resolution::Ready);
        }
        if cancel.is_cancelled() {
            return Ok(Resolution::Cancelled);
        }

        let _gate = self.load_gate.lock();
        if let Some(cached) = self.cached() {
            return cached.map(Resolution::Ready);
        }
        if cancel.is_cancelled() {
            return Ok(Resolution::Cancelled);
        }

        let generation = self.generation.load(Ordering::Acquire);
        let outcome = load();
        if cancel.is_cancelled() {
            return Ok(Resolution::Cancelled);
        }

        match outcome {
            Ok(value) => {
                self.install(generation, CacheState::Resolved(value.clone()));
                Ok(Resolution::Ready(value))
            }
            Err(err) => {
                self.install(generation, CacheState::Failed(err.clone()));
                Err(err)
            }
        }
    }

    /// Drops the cached state so the next access reloads.
    pub(crate) fn invalidate(&self) {
        let mut state = self.state.write();
        self.generation.fetch_add(1, Ordering::AcqRel);
        *state = CacheState::Unresolved;
    }

    fn install(&self, generation: u64, next: CacheState<V>) {
        let mut state = self.state.write();
        if self.generation.load(Ordering::Acquire) == generation {
            *state = next;
        }
    }
}

impl<V: Clone + ChildCount> NodeCache<V> {
    pub(crate) fn status(&self) -> NodeStatus {
        self.status_with(ChildCount::child_count)
    }
}
