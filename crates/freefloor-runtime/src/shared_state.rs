//! [`SharedFloorState`] – the lock-guarded result of the latest pass.
//!
//! The detection loop holds the lock across classification and the write of
//! the new snapshot; the query handler holds it across the membership test
//! and the coordinate read.  A reader therefore sees either the previous pass
//! or the current one, never a mix.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use freefloor_perception::{GroundPointCloud, PassablePixelSet};

/// Output of one completed pass.
#[derive(Debug, Clone, Default)]
pub struct FloorSnapshot {
    /// Ground-frame cloud, indexed like the depth frame.
    pub cloud: GroundPointCloud,
    pub passable: PassablePixelSet,
    /// Number of passes written so far.
    pub pass: u64,
}

/// Handle shared between the loop and the query handler.  Clones share the
/// same snapshot.
#[derive(Debug, Clone, Default)]
pub struct SharedFloorState {
    inner: Arc<Mutex<FloorSnapshot>>,
}

impl SharedFloorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the snapshot.
    ///
    /// A poisoned lock is recovered: each pass overwrites the whole snapshot,
    /// so a panic mid-write leaves nothing that the next pass won't replace.
    pub fn lock(&self) -> MutexGuard<'_, FloorSnapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn passable_count(&self) -> usize {
        self.lock().passable.len()
    }

    pub fn pass_count(&self) -> u64 {
        self.lock().pass
    }
}
