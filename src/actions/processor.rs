// src/actions/processor.rs
//! Applies queued actions on the authoritative thread
//!
//! Each drain pops at most `max` actions in queue order. Every action is
//! either applied, dropped (stale or invalid) or counted as failed when the
//! host rejects it. Nothing is retried and nothing panics: a drain always
//! returns a report.

use crate::actions::action::{Action, ActionKind};
use crate::actions::queue::ActionQueue;
use crate::engine::authority::AuthorityToken;
use crate::observability::metrics as names;
use crate::utils::config::ActionConfig;
use crate::utils::errors::{CoreError, Result};
use crate::world::WorldMutator;
use metrics::{counter, gauge};
use serde::Serialize;
use std::fmt;
use std::time::Instant;
use tracing::{debug, warn};

/// Why an action was discarded without reaching the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// The acting agent no longer exists
    AgentGone,

    /// The target no longer exists
    TargetGone,

    /// Attack, follow or interact without a target
    MissingTarget,

    /// Older than the configured time-to-live
    Expired,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::AgentGone => "agent_gone",
            DropReason::TargetGone => "target_gone",
            DropReason::MissingTarget => "missing_target",
            DropReason::Expired => "expired",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to one action
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    Applied,
    Dropped(DropReason),
    /// The host refused the mutation
    Failed(String),
}

/// Drop counts by reason
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DropCounts {
    pub agent_gone: usize,
    pub target_gone: usize,
    pub missing_target: usize,
    pub expired: usize,
}

impl DropCounts {
    fn record(&mut self, reason: DropReason) {
        match reason {
            DropReason::AgentGone => self.agent_gone += 1,
            DropReason::TargetGone => self.target_gone += 1,
            DropReason::MissingTarget => self.missing_target += 1,
            DropReason::Expired => self.expired += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.agent_gone + self.target_gone + self.missing_target + self.expired
    }
}

/// Result of one drain
#[derive(Debug, Clone, Default, Serialize)]
pub struct DrainReport {
    /// Actions taken off the queue
    pub drained: usize,

    pub applied: usize,

    pub dropped: DropCounts,

    pub failed: usize,

    /// Actions still queued when the drain stopped
    pub remaining: usize,

    pub elapsed_us: u64,
}

impl DrainReport {
    /// Every drained action was accounted for exactly once
    pub fn is_balanced(&self) -> bool {
        self.applied + self.dropped.total() + self.failed == self.drained
    }
}

/// Lifetime totals across drains
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ProcessorStats {
    pub drains: u64,
    pub applied: u64,
    pub dropped: u64,
    pub failed: u64,
}

/// Single-consumer side of the action pipeline
pub struct ActionProcessor {
    /// Core whose token may drive this processor
    core_id: u64,

    /// Drop actions older than this many ticks (0 = never)
    ttl_ticks: u64,

    /// Default cap per drain
    max_per_tick: usize,

    stats: ProcessorStats,
}

impl ActionProcessor {
    pub fn new(token: &AuthorityToken, config: &ActionConfig) -> Self {
        Self {
            core_id: token.core_id(),
            ttl_ticks: config.action_ttl_ticks,
            max_per_tick: config.max_per_tick,
            stats: ProcessorStats::default(),
        }
    }

    /// Configured cap per drain
    pub fn max_per_tick(&self) -> usize {
        self.max_per_tick
    }

    pub fn stats(&self) -> ProcessorStats {
        self.stats
    }

    /// Apply up to `max` queued actions to `world`
    pub fn drain_and_apply<W: WorldMutator>(
        &mut self,
        token: &AuthorityToken,
        queue: &ActionQueue,
        world: &mut W,
        max: usize,
        current_tick: u64,
    ) -> Result<DrainReport> {
        self.drain_and_apply_with(token, queue, world, max, current_tick, |_, _| {})
    }

    /// Like [`drain_and_apply`](Self::drain_and_apply), reporting each
    /// action's outcome to `observe` in processing order
    pub fn drain_and_apply_with<W, F>(
        &mut self,
        token: &AuthorityToken,
        queue: &ActionQueue,
        world: &mut W,
        max: usize,
        current_tick: u64,
        mut observe: F,
    ) -> Result<DrainReport>
    where
        W: WorldMutator,
        F: FnMut(&Action, &ApplyOutcome),
    {
        if token.core_id() != self.core_id {
            return Err(CoreError::ForeignAuthority);
        }

        let start = Instant::now();
        let mut report = DrainReport::default();

        while report.drained < max {
            let Some(action) = queue.pop() else {
                break;
            };
            report.drained += 1;

            let outcome = self.apply_one(token, world, &action, current_tick);
            match &outcome {
                ApplyOutcome::Applied => report.applied += 1,
                ApplyOutcome::Dropped(reason) => {
                    report.dropped.record(*reason);
                    counter!(names::ACTIONS_DROPPED, "reason" => reason.as_str()).increment(1);
                }
                ApplyOutcome::Failed(message) => {
                    report.failed += 1;
                    warn!(
                        "Host rejected {} from {}: {}",
                        action.kind().name(),
                        action.agent(),
                        message
                    );
                }
            }
            observe(&action, &outcome);
        }

        report.remaining = queue.len();
        report.elapsed_us = start.elapsed().as_micros() as u64;

        self.stats.drains += 1;
        self.stats.applied += report.applied as u64;
        self.stats.dropped += report.dropped.total() as u64;
        self.stats.failed += report.failed as u64;

        counter!(names::ACTIONS_APPLIED).increment(report.applied as u64);
        counter!(names::ACTIONS_FAILED).increment(report.failed as u64);
        gauge!(names::ACTION_QUEUE_DEPTH).set(report.remaining as f64);

        if report.drained > 0 {
            debug!(
                "Drained {} actions: {} applied, {} dropped, {} failed, {} remaining",
                report.drained,
                report.applied,
                report.dropped.total(),
                report.failed,
                report.remaining
            );
        }

        Ok(report)
    }

    fn apply_one<W: WorldMutator>(
        &self,
        token: &AuthorityToken,
        world: &mut W,
        action: &Action,
        current_tick: u64,
    ) -> ApplyOutcome {
        if let Some(reason) = self.validate(world, action, current_tick) {
            return ApplyOutcome::Dropped(reason);
        }

        let agent = action.agent();
        let result = match (*action.kind(), action.target()) {
            (ActionKind::Move { to }, _) => world.move_to(token, agent, to),
            (ActionKind::Attack, Some(target)) => world.attack(token, agent, target),
            (ActionKind::Cast { ability }, target) => world.cast(token, agent, ability, target),
            (ActionKind::Follow, Some(leader)) => world.follow(token, agent, leader),
            (ActionKind::Interact, Some(target)) => world.interact(token, agent, target),
            (ActionKind::Custom { .. }, _) => world.custom(token, action),
            (_, None) => return ApplyOutcome::Dropped(DropReason::MissingTarget),
        };

        match result {
            Ok(()) => ApplyOutcome::Applied,
            Err(e) => ApplyOutcome::Failed(e.to_string()),
        }
    }

    fn validate<W: WorldMutator>(
        &self,
        world: &W,
        action: &Action,
        current_tick: u64,
    ) -> Option<DropReason> {
        if self.ttl_ticks > 0 && current_tick.saturating_sub(action.tick()) > self.ttl_ticks {
            return Some(DropReason::Expired);
        }
        if !world.is_live(action.agent()) {
            return Some(DropReason::AgentGone);
        }
        match action.target() {
            Some(target) if !world.is_live(target) => Some(DropReason::TargetGone),
            None if action.kind().requires_target() => Some(DropReason::MissingTarget),
            _ => None,
        }
    }
}
