//! Atomically swapped handle to the latest published snapshot.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::schema::{FieldStatus, PopulationSnapshot};

/// Readers clone the current `Arc`; the tick loop swaps in a new one at the
/// end of every tick. The lock is held only for the pointer copy, never while
/// a tick runs.
pub struct SnapshotHandle {
    inner: RwLock<Arc<PopulationSnapshot>>,
}

impl Default for SnapshotHandle {
    fn default() -> Self {
        Self::new(Arc::new(PopulationSnapshot::default()))
    }
}

impl SnapshotHandle {
    pub fn new(snapshot: Arc<PopulationSnapshot>) -> Self {
        Self {
            inner: RwLock::new(snapshot),
        }
    }

    /// Current snapshot.
    pub fn load(&self) -> Arc<PopulationSnapshot> {
        self.inner.read().clone()
    }

    /// Replace the current snapshot.
    pub fn publish(&self, snapshot: Arc<PopulationSnapshot>) {
        *self.inner.write() = snapshot;
    }

    /// Status view of the current snapshot.
    pub fn status(&self) -> FieldStatus {
        self.inner.read().status()
    }
}
