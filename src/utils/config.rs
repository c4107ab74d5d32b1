// src/utils/config.rs
//! Core configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! file (`botcore.toml` or the path in `BOTCORE_CONFIG`), then environment
//! variables such as `BOTCORE__POOL__WORKER_COUNT=12`.
//!
//! Every threshold the core depends on lives here. None of them has a
//! universally right value; tune K and the worker floor per deployment.

use crate::behavior::BehaviorTier;
use crate::observability::ObservabilityConfig;
use crate::runtime::thread_pool::PoolConfig;
use crate::utils::errors::{CoreError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Environment variable naming an alternate config file
pub const CONFIG_PATH_ENV: &str = "BOTCORE_CONFIG";

/// Default config file stem (any format the `config` crate detects)
pub const DEFAULT_CONFIG_NAME: &str = "botcore";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Worker pool sizing and idle behavior
    pub pool: PoolConfig,

    /// Action queue capacity, backpressure and drain limits
    pub actions: ActionConfig,

    /// Behavior priorities and exclusion rules
    pub behavior: BehaviorConfig,

    /// Logging and metrics
    pub observability: ObservabilityConfig,
}

/// Action queue and processor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionConfig {
    /// Hard capacity of the action queue; enqueue fails beyond it
    pub queue_capacity: usize,

    /// K: dispatch is skipped while queued actions exceed `workers × K`
    pub backpressure_multiplier: usize,

    /// Maximum actions applied per drain
    pub max_per_tick: usize,

    /// Actions older than this many ticks are dropped (0 = never)
    pub action_ttl_ticks: u64,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 65_536,
            backpressure_multiplier: 15,
            max_per_tick: 4_096,
            action_ttl_ticks: 0,
        }
    }
}

/// Behavior scheduling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Priority overrides keyed by behavior name
    pub priority_overrides: HashMap<String, i32>,

    /// Pairs of tiers that may never be active together
    pub exclusions: Vec<(BehaviorTier, BehaviorTier)>,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            priority_overrides: HashMap::new(),
            exclusions: vec![
                (BehaviorTier::Combat, BehaviorTier::Follow),
                (BehaviorTier::Combat, BehaviorTier::Wander),
                (BehaviorTier::Flee, BehaviorTier::Combat),
                (BehaviorTier::Flee, BehaviorTier::Follow),
            ],
        }
    }
}

impl CoreConfig {
    /// Load from the default file location plus environment
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .unwrap_or_else(|_| DEFAULT_CONFIG_NAME.to_string());
        Self::load_from(&path)
    }

    /// Load from a specific file (optional) plus environment
    pub fn load_from(path: &str) -> Result<Self> {
        debug!("Loading configuration from {}", path);

        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("BOTCORE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: CoreConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Queue depth above which dispatch is skipped
    pub fn backpressure_threshold(&self) -> usize {
        self.pool.effective_workers() * self.actions.backpressure_multiplier
    }

    /// Reject values that cannot work together
    pub fn validate(&self) -> Result<()> {
        self.pool.validate()?;

        if self.actions.backpressure_multiplier == 0 {
            return Err(CoreError::InvalidConfig(
                "actions.backpressure_multiplier must be at least 1".into(),
            ));
        }
        if self.actions.max_per_tick == 0 {
            return Err(CoreError::InvalidConfig(
                "actions.max_per_tick must be at least 1".into(),
            ));
        }
        let threshold = self.backpressure_threshold();
        if self.actions.queue_capacity <= threshold {
            return Err(CoreError::InvalidConfig(format!(
                "actions.queue_capacity ({}) must exceed the backpressure threshold ({})",
                self.actions.queue_capacity, threshold
            )));
        }
        for (a, b) in &self.behavior.exclusions {
            if a == b {
                return Err(CoreError::InvalidConfig(format!(
                    "exclusion rule pairs tier {:?} with itself",
                    a
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_validate() {
        let config = CoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.actions.backpressure_multiplier, 15);
    }

    #[test]
    fn test_backpressure_threshold() {
        let mut config = CoreConfig::default();
        config.pool.worker_count = Some(16);
        config.actions.backpressure_multiplier = 15;
        assert_eq!(config.backpressure_threshold(), 240);
    }

    #[test]
    fn test_capacity_must_exceed_threshold() {
        let mut config = CoreConfig::default();
        config.pool.worker_count = Some(4);
        config.actions.backpressure_multiplier = 10;
        config.actions.queue_capacity = 40;
        assert!(matches!(config.validate(), Err(CoreError::InvalidConfig(_))));
    }

    #[test]
    fn test_self_exclusion_rejected() {
        let mut config = CoreConfig::default();
        config
            .behavior
            .exclusions
            .push((BehaviorTier::Follow, BehaviorTier::Follow));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[pool]
worker_count = 6
min_workers = 2

[actions]
backpressure_multiplier = 8
max_per_tick = 128

[behavior]
exclusions = [["combat", "follow"]]

[behavior.priority_overrides]
combat = 150
"#
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let config = CoreConfig::load_from(&path).unwrap();

        assert_eq!(config.pool.worker_count, Some(6));
        assert_eq!(config.actions.backpressure_multiplier, 8);
        assert_eq!(config.actions.max_per_tick, 128);
        assert_eq!(
            config.behavior.exclusions,
            vec![(BehaviorTier::Combat, BehaviorTier::Follow)]
        );
        assert_eq!(config.behavior.priority_overrides.get("combat"), Some(&150));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = CoreConfig::load_from("/nonexistent/botcore-test-config").unwrap();
        assert_eq!(config.actions.max_per_tick, ActionConfig::default().max_per_tick);
    }
}
