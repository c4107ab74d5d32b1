// src/behavior/exclusion.rs
//! Mutual-exclusion rules between behavior tiers
//!
//! Rules are unordered pairs: `(Combat, Follow)` and `(Follow, Combat)` are
//! the same rule. The table is built once from configuration and shared
//! read-only by every agent.

use crate::behavior::descriptor::BehaviorTier;
use crate::utils::config::BehaviorConfig;
use std::collections::{HashMap, HashSet};

/// Set of tier pairs that may never be active together
#[derive(Debug, Clone, Default)]
pub struct ExclusionTable {
    pairs: HashSet<(BehaviorTier, BehaviorTier)>,
}

impl ExclusionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rules<'a, I>(rules: I) -> Self
    where
        I: IntoIterator<Item = &'a (BehaviorTier, BehaviorTier)>,
    {
        let mut table = Self::new();
        for (a, b) in rules {
            table.add(*a, *b);
        }
        table
    }

    /// Add a rule; a tier paired with itself is ignored
    pub fn add(&mut self, a: BehaviorTier, b: BehaviorTier) {
        if a != b {
            self.pairs.insert(Self::key(a, b));
        }
    }

    /// Whether `a` being active forbids `b`
    pub fn excludes(&self, a: BehaviorTier, b: BehaviorTier) -> bool {
        if a == b {
            return false;
        }
        if a.overrides_all() || b.overrides_all() {
            return true;
        }
        self.pairs.contains(&Self::key(a, b))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    fn key(a: BehaviorTier, b: BehaviorTier) -> (BehaviorTier, BehaviorTier) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }
}

/// Startup-time behavior rules shared by every agent
#[derive(Debug, Clone, Default)]
pub struct BehaviorPolicy {
    pub exclusions: ExclusionTable,

    /// Priority overrides keyed by behavior name
    pub priority_overrides: HashMap<String, i32>,
}

impl BehaviorPolicy {
    pub fn from_config(config: &BehaviorConfig) -> Self {
        Self {
            exclusions: ExclusionTable::from_rules(&config.exclusions),
            priority_overrides: config.priority_overrides.clone(),
        }
    }

    /// Configured priority for `name`, or `default`
    pub fn priority_for(&self, name: &str, default: i32) -> i32 {
        self.priority_overrides.get(name).copied().unwrap_or(default)
    }
}
