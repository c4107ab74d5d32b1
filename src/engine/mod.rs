// src/engine/mod.rs
//! Simulation core and the authority capability
//!
//! - **Authority**: `!Send` token proving the caller is the authoritative
//!   thread
//! - **Agents**: registry of behavior managers with per-agent in-flight
//!   tracking
//! - **Core**: the tick API tying pool, snapshots, actions and behaviors
//!   together

pub mod agents;
pub mod authority;
pub mod core;

pub use self::core::{CoreStats, DispatchReport, SimulationCore, SkipReason};
pub use agents::AgentStatus;
pub use authority::AuthorityToken;
