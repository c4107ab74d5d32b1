// src/runtime/mod.rs
//! Decision-task execution runtime
//!
//! - **Thread Pool**: fixed set of worker threads with explicit shutdown
//! - **Work Stealing**: per-tier global queues, affinity inboxes and
//!   per-worker deques that idle peers steal from
//! - **Tasks**: five priority tiers, panic-safe execution, completion handles
//! - **Idle Gate**: bounded parking that always leaves one worker awake
//!
//! # Architecture
//!
//! ```text
//!   authoritative thread
//!          │ submit(Task)
//!          ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │  Critical │ High │ Normal │ Low │ Idle    (global queues) │
//! └─────────────────────────────────────────────────────────┘
//!          │ bounded batches
//!     ┌────┴─────┬──────────┬──────────┐
//!     ▼          ▼          ▼          ▼
//!  Worker 0   Worker 1   Worker 2   Worker 3   (local deques per tier)
//!     ▲          │
//!     └─ steal ──┘
//! ```

pub(crate) mod idle;
pub mod task;
pub mod thread_pool;
pub mod work_stealing;

// Re-export commonly used types
pub use task::{Task, TaskHandle, TaskOutcome, TaskPriority};
pub use thread_pool::{PoolConfig, PoolStats, ThreadPool};
pub use work_stealing::QueueStats;
