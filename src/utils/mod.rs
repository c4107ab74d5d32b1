// src/utils/mod.rs
//! Shared utilities: errors, configuration and identifiers

pub mod config;
pub mod errors;
pub mod ids;

pub use config::{ActionConfig, BehaviorConfig, CoreConfig};
pub use errors::{CoreError, Result};
pub use ids::{BehaviorId, EntityId, TaskId};
