// src/behavior/mod.rs
//! Behavior selection
//!
//! - **Descriptor**: the `Behavior` trait, tiers and registration records
//! - **Exclusion**: tier pairs that may never be active together
//! - **Manager**: per-agent priority selection
//! - **State**: the agent's last selection, readable from any thread

pub mod descriptor;
pub mod exclusion;
pub mod manager;
pub mod state;

// Re-export commonly used types
pub use descriptor::{Behavior, BehaviorDescriptor, BehaviorTier, DecisionContext};
pub use exclusion::{BehaviorPolicy, ExclusionTable};
pub use manager::{BehaviorPriorityManager, Selection};
pub use state::{AgentBehaviorState, BehaviorStatus};
