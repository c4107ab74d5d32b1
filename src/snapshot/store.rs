// src/snapshot/store.rs
//! Lock-free publication of snapshots
//!
//! The current snapshot sits behind a `crossbeam-epoch` atomic pointer to
//! an `Arc<Snapshot>`. Readers pin, load the pointer, clone the `Arc` and
//! unpin: a handful of atomic operations, never a lock. The publisher
//! swaps in a new box and defers destruction of the old one until every
//! reader pinned at swap time has moved on. Readers keep their `Arc`, so a
//! snapshot lives exactly as long as its longest holder.
//!
//! In steady state two versions are alive: the one workers are reading and
//! the one the authoritative thread is building. A slow reader can stretch
//! that to three, never tear a snapshot.

use crate::observability::metrics as names;
use crate::snapshot::model::{Snapshot, SnapshotBuilder};
use crossbeam::epoch::{self, Atomic, Owned};
use metrics::gauge;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Shared handle to a published snapshot
#[derive(Debug, Clone)]
pub struct SnapshotRef {
    inner: Arc<Snapshot>,
}

impl SnapshotRef {
    pub fn version(&self) -> u64 {
        self.inner.version()
    }

    /// Number of live handles to this snapshot (including the store's own)
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl Deref for SnapshotRef {
    type Target = Snapshot;

    fn deref(&self) -> &Snapshot {
        &self.inner
    }
}

/// Versioned snapshot store
pub struct SnapshotStore {
    current: Atomic<Arc<Snapshot>>,

    /// Last version assigned; ahead of `current` while a publish is in progress
    assigned: AtomicU64,
    retired: AtomicU64,
}

impl SnapshotStore {
    /// Store holding the empty version-0 snapshot
    pub fn new() -> Self {
        Self {
            current: Atomic::new(Arc::new(Snapshot::empty())),
            assigned: AtomicU64::new(0),
            retired: AtomicU64::new(0),
        }
    }

    /// Start collecting state for the next snapshot
    pub fn builder(&self, tick: u64) -> SnapshotBuilder {
        SnapshotBuilder::with_capacity(tick, self.current().len())
    }

    /// Replace the current snapshot; returns the new version
    ///
    /// Called from the authoritative thread only.
    pub fn publish(&self, builder: SnapshotBuilder) -> u64 {
        let version = self.assigned.fetch_add(1, Ordering::AcqRel) + 1;
        let snapshot = Arc::new(builder.build(version));
        let entities = snapshot.len();

        let guard = epoch::pin();
        let previous = self
            .current
            .swap(Owned::new(snapshot), Ordering::AcqRel, &guard);
        // SAFETY: the swap unlinked `previous`, so no new reader can load it;
        // readers that already did are pinned and delay the destruction.
        unsafe {
            guard.defer_destroy(previous);
        }
        guard.flush();
        self.retired.fetch_add(1, Ordering::Relaxed);

        gauge!(names::SNAPSHOT_VERSION).set(version as f64);
        gauge!(names::SNAPSHOT_ENTITIES).set(entities as f64);
        trace!("Published snapshot v{} with {} entities", version, entities);

        version
    }

    /// The currently published snapshot
    pub fn current(&self) -> SnapshotRef {
        let guard = epoch::pin();
        let shared = self.current.load(Ordering::Acquire, &guard);
        // SAFETY: the pointer is non-null from construction on (only ever
        // swapped for another owned value) and cannot be reclaimed while
        // `guard` is pinned.
        let snapshot = unsafe { shared.deref() };
        SnapshotRef {
            inner: Arc::clone(snapshot),
        }
    }

    /// Version of the currently published snapshot
    pub fn version(&self) -> u64 {
        let guard = epoch::pin();
        let shared = self.current.load(Ordering::Acquire, &guard);
        // SAFETY: same as `current`: non-null, and pinned by `guard`.
        unsafe { shared.deref() }.version()
    }

    /// Snapshots replaced so far
    pub fn retired_versions(&self) -> u64 {
        self.retired.load(Ordering::Relaxed)
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SnapshotStore {
    fn drop(&mut self) {
        // SAFETY: `&mut self` means no reader can be loading the pointer.
        unsafe {
            let guard = epoch::unprotected();
            let current = self.current.load(Ordering::Relaxed, guard);
            if !current.is_null() {
                drop(current.into_owned());
            }
        }
    }
}
