// src/actions/mod.rs
//! Action pipeline: workers emit, the authoritative thread applies
//!
//! ```text
//! decision task ─► ActionSink ─► ActionQueue (lock-free, bounded)
//!                                     │
//!               authoritative thread  ▼
//!                               ActionProcessor ─► WorldMutator
//! ```

pub mod action;
pub mod processor;
pub mod queue;

pub use action::{Action, ActionKind};
pub use processor::{
    ActionProcessor, ApplyOutcome, DrainReport, DropCounts, DropReason, ProcessorStats,
};
pub use queue::{ActionQueue, ActionQueueStats, ActionSink};
