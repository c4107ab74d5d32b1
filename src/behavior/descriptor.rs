// src/behavior/descriptor.rs
//! Behavior trait, tiers and registration records

use crate::actions::queue::ActionSink;
use crate::snapshot::model::{EntityState, Snapshot};
use crate::utils::ids::{BehaviorId, EntityId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Coarse behavior category; exclusion rules are written against tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorTier {
    /// Dead, stunned or otherwise unable to act; overrides everything
    Incapacitated,
    Combat,
    Flee,
    Follow,
    Travel,
    Gather,
    Wander,
    Idle,
    /// Host-defined tier
    Custom(u16),
}

impl BehaviorTier {
    pub fn overrides_all(&self) -> bool {
        matches!(self, BehaviorTier::Incapacitated)
    }
}

/// Everything a behavior may look at while deciding
pub struct DecisionContext<'a> {
    /// Agent being decided for
    pub agent: EntityId,

    /// Snapshot the decision is computed from
    pub snapshot: &'a Snapshot,

    /// Tick of that snapshot
    pub tick: u64,

    /// Simulated seconds covered by this tick
    pub tick_delta: f32,
}

impl<'a> DecisionContext<'a> {
    pub fn new(agent: EntityId, snapshot: &'a Snapshot, tick_delta: f32) -> Self {
        Self {
            agent,
            snapshot,
            tick: snapshot.tick(),
            tick_delta,
        }
    }

    /// The agent's own entry in the snapshot
    pub fn me(&self) -> Option<&'a EntityState> {
        self.snapshot.get(self.agent)
    }
}

/// Decision logic for one behavior
///
/// Implementations run on worker threads against an immutable snapshot;
/// their only output is the actions they emit.
pub trait Behavior: Send + Sync {
    /// Whether this behavior wants to run this tick
    fn is_candidate(&self, ctx: &DecisionContext<'_>) -> bool;

    /// Emit zero or more actions; only called for the selected behavior
    fn decide(&self, ctx: &DecisionContext<'_>, sink: &mut ActionSink<'_>);
}

/// A behavior registered for an agent
#[derive(Clone)]
pub struct BehaviorDescriptor {
    pub id: BehaviorId,
    pub name: String,
    pub tier: BehaviorTier,
    /// Higher wins
    pub priority: i32,
    pub behavior: Arc<dyn Behavior>,
}

impl BehaviorDescriptor {
    pub fn new<B>(
        id: BehaviorId,
        name: impl Into<String>,
        tier: BehaviorTier,
        priority: i32,
        behavior: B,
    ) -> Self
    where
        B: Behavior + 'static,
    {
        Self {
            id,
            name: name.into(),
            tier,
            priority,
            behavior: Arc::new(behavior),
        }
    }

    /// Share an existing behavior object between agents
    pub fn shared(
        id: BehaviorId,
        name: impl Into<String>,
        tier: BehaviorTier,
        priority: i32,
        behavior: Arc<dyn Behavior>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            tier,
            priority,
            behavior,
        }
    }
}

impl fmt::Debug for BehaviorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviorDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("tier", &self.tier)
            .field("priority", &self.priority)
            .finish()
    }
}
