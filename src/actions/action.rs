// src/actions/action.rs
//! Intent records produced by decision tasks

use crate::snapshot::model::Position;
use crate::utils::ids::EntityId;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// What the agent wants to do
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Walk toward a point
    Move { to: Position },

    /// Attack the target
    Attack,

    /// Use an ability, optionally on the target
    Cast { ability: u32 },

    /// Follow the target
    Follow,

    /// Use or talk to the target
    Interact,

    /// Host-defined action; the payload carries its arguments
    Custom { code: u16 },
}

impl ActionKind {
    /// Whether the action is meaningless without a target
    pub fn requires_target(&self) -> bool {
        matches!(
            self,
            ActionKind::Attack | ActionKind::Follow | ActionKind::Interact
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Move { .. } => "move",
            ActionKind::Attack => "attack",
            ActionKind::Cast { .. } => "cast",
            ActionKind::Follow => "follow",
            ActionKind::Interact => "interact",
            ActionKind::Custom { .. } => "custom",
        }
    }
}

/// Immutable intent: built once by a worker, applied once by the
/// authoritative thread
#[derive(Debug, Clone)]
pub struct Action {
    agent: EntityId,
    kind: ActionKind,
    target: Option<EntityId>,
    payload: Bytes,
    tick: u64,
    sequence: u64,
    submitted_at: Instant,
}

impl Action {
    pub fn new(
        agent: EntityId,
        kind: ActionKind,
        target: Option<EntityId>,
        payload: Bytes,
        tick: u64,
        sequence: u64,
    ) -> Self {
        Self {
            agent,
            kind,
            target,
            payload,
            tick,
            sequence,
            submitted_at: Instant::now(),
        }
    }

    pub fn agent(&self) -> EntityId {
        self.agent
    }

    pub fn kind(&self) -> &ActionKind {
        &self.kind
    }

    pub fn target(&self) -> Option<EntityId> {
        self.target
    }

    /// Opaque host-defined bytes
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Tick whose snapshot the decision was computed from
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Queue-wide submission sequence
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn submitted_at(&self) -> Instant {
        self.submitted_at
    }
}
