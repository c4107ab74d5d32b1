// src/snapshot/mod.rs
//! Read-only world state for decision tasks
//!
//! - **Model**: positions, flags and per-entity state frozen at publish time
//! - **Store**: atomic, versioned publication; readers never block the
//!   publisher and never observe a half-built snapshot
//!
//! # Lifecycle
//!
//! ```text
//! authoritative thread:  builder(tick) → insert(..)* → publish() ──┐
//!                                                                   │ swap
//! workers:               current() ─► SnapshotRef (Arc) ◄───────────┘
//! ```

pub mod model;
pub mod store;

// Re-export commonly used types
pub use model::{EntityFlags, EntityState, Position, Snapshot, SnapshotBuilder};
pub use store::{SnapshotRef, SnapshotStore};
