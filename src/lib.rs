// src/lib.rs
//! Botcore Engine Library
//!
//! Concurrency core for large-scale bot simulations: agent decision logic
//! runs on a work-stealing thread pool against immutable world snapshots,
//! and every resulting world change funnels back to a single authoritative
//! thread.
//!
//! # Architecture
//!
//! The engine is structured into several key modules:
//!
//! - **runtime**: Work-stealing thread pool with five priority tiers
//! - **snapshot**: Versioned, lock-free snapshot publication
//! - **actions**: Lock-free action queue and the single-consumer processor
//! - **behavior**: Per-agent behavior selection with exclusion rules
//! - **engine**: `SimulationCore`, the agent registry and `AuthorityToken`
//! - **world**: Host seams (`WorldReader`, `WorldMutator`) and an in-memory
//!   reference arena with stock behaviors
//! - **observability**: Tracing and Prometheus metrics
//! - **utils**: Configuration, errors and ids

// Public module exports
pub mod actions;
pub mod behavior;
pub mod engine;
pub mod observability;
pub mod runtime;
pub mod snapshot;
pub mod utils;
pub mod world;

// Re-export commonly used types
pub use actions::{Action, ActionKind, ActionQueue, ActionSink, DrainReport, DropReason};
pub use behavior::{Behavior, BehaviorDescriptor, BehaviorTier, DecisionContext};
pub use engine::{AuthorityToken, DispatchReport, SimulationCore, SkipReason};
pub use runtime::{TaskOutcome, TaskPriority, ThreadPool};
pub use snapshot::{Snapshot, SnapshotStore};
pub use utils::config::CoreConfig;
pub use utils::errors::{CoreError, Result};
pub use utils::ids::{BehaviorId, EntityId};
pub use world::{WorldMutator, WorldReader};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_HASH: &str = env!("GIT_HASH");

/// Engine build information
#[derive(Debug, Clone, serde::Serialize)]
pub struct BuildInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub build_timestamp: &'static str,
    pub rustc_version: &'static str,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self {
            version: VERSION,
            git_hash: GIT_HASH,
            build_timestamp: env!("BUILD_TIMESTAMP"),
            rustc_version: env!("RUSTC_VERSION"),
        }
    }
}
