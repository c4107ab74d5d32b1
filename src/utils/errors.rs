// src/utils/errors.rs
//! Error types for the bot simulation core
//!
//! Only failures the caller must act on are represented here. Expected
//! degradations (stale actions, skipped ticks, panicking decision tasks)
//! are handled locally and surfaced through reports and metrics instead.

use crate::utils::ids::{BehaviorId, EntityId};
use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum CoreError {
    /// The thread pool no longer accepts tasks
    #[error("thread pool has been shut down")]
    PoolShutdown,

    /// A configuration value failed validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration sources could not be loaded or deserialized
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// An authority token issued by a different core was presented
    #[error("authority token was issued by another simulation core")]
    ForeignAuthority,

    /// Two behaviors with the same id were registered for one agent
    #[error("behavior {behavior} registered twice for agent {agent}")]
    DuplicateBehavior {
        agent: EntityId,
        behavior: BehaviorId,
    },

    /// The agent is not registered with the core
    #[error("agent {0} is not registered")]
    UnknownAgent(EntityId),

    /// Tracing or metrics could not be installed
    #[error("observability setup failed: {0}")]
    Observability(String),

    /// Thread spawn or file failures
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, CoreError>;
