// src/behavior/state.rs
//! Per-agent selection state
//!
//! Written only by the agent's own decision task (never two at once), read
//! by the authoritative thread for diagnostics.

use crate::utils::ids::BehaviorId;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

const NO_BEHAVIOR: u32 = u32::MAX;

/// Live selection state of one agent
#[derive(Debug)]
pub struct AgentBehaviorState {
    /// Active behavior id, `NO_BEHAVIOR` when nothing was selected
    active: AtomicU32,

    /// Tick of the last selection
    last_tick: AtomicU64,

    /// Selections made so far
    selections: AtomicU64,

    /// Selections that changed the active behavior
    switches: AtomicU64,
}

impl AgentBehaviorState {
    pub fn new() -> Self {
        Self {
            active: AtomicU32::new(NO_BEHAVIOR),
            last_tick: AtomicU64::new(0),
            selections: AtomicU64::new(0),
            switches: AtomicU64::new(0),
        }
    }

    /// Store the outcome of a selection made at `tick`
    pub(crate) fn record(&self, selected: Option<BehaviorId>, tick: u64) {
        let raw = selected.map(|id| id.0).unwrap_or(NO_BEHAVIOR);
        let previous = self.active.swap(raw, Ordering::AcqRel);
        if previous != raw {
            self.switches.fetch_add(1, Ordering::Relaxed);
        }
        self.last_tick.store(tick, Ordering::Release);
        self.selections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn active(&self) -> Option<BehaviorId> {
        match self.active.load(Ordering::Acquire) {
            NO_BEHAVIOR => None,
            raw => Some(BehaviorId(raw)),
        }
    }

    pub fn status(&self) -> BehaviorStatus {
        BehaviorStatus {
            active: self.active(),
            last_selection_tick: self.last_tick.load(Ordering::Acquire),
            selections: self.selections.load(Ordering::Relaxed),
            switches: self.switches.load(Ordering::Relaxed),
        }
    }
}

impl Default for AgentBehaviorState {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`AgentBehaviorState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BehaviorStatus {
    pub active: Option<BehaviorId>,
    pub last_selection_tick: u64,
    pub selections: u64,
    pub switches: u64,
}
