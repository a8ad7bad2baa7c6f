//! [`LatestValueCache`] – single freshest-value slot shared by the listener
//! and the serial writer.
//!
//! The slot holds either nothing (no telemetry received yet) or exactly one
//! [`TelemetryRecord`].  Every `set` replaces the whole value; there is no
//! history and no expiry.
//!
//! The lock is a plain [`std::sync::Mutex`]: both operations copy a value in
//! or out and release the guard before returning, so no caller can hold it
//! across an `.await` point.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use roastlink_types::TelemetryRecord;

/// Cheaply clonable handle to the shared slot.  All clones refer to the same
/// value.
#[derive(Clone, Debug, Default)]
pub struct LatestValueCache {
    slot: Arc<Mutex<Option<TelemetryRecord>>>,
}

impl LatestValueCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a copy of the current value without clearing it.
    pub fn get(&self) -> Option<TelemetryRecord> {
        self.lock().clone()
    }

    /// Replace the current value.  Last writer wins, ordered by arrival at
    /// the lock.
    pub fn set(&self, record: TelemetryRecord) {
        *self.lock() = Some(record);
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_none()
    }

    // A panic while holding the guard cannot leave a torn record behind:
    // the slot is only ever assigned a fully built value.
    fn lock(&self) -> MutexGuard<'_, Option<TelemetryRecord>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
