// src/world/mod.rs
//! Host world seams
//!
//! The core never owns world state. A host exposes it through two traits:
//!
//! - [`WorldReader`] copies entity state into a snapshot builder once per
//!   tick.
//! - [`WorldMutator`] applies validated actions. Every mutating method
//!   takes an [`AuthorityToken`], so only the authoritative thread can call
//!   it.
//!
//! [`ArenaWorld`] is a small in-memory host used by the demo binary,
//! benches and tests.

pub mod arena;
pub mod behaviors;

use crate::actions::action::Action;
use crate::engine::authority::AuthorityToken;
use crate::snapshot::model::{Position, SnapshotBuilder};
use crate::utils::ids::EntityId;
use std::fmt;

pub use arena::{ArenaError, ArenaWorld};
pub use behaviors::{
    stock_behaviors, CombatBehavior, FleeBehavior, FollowBehavior, IncapacitatedBehavior,
    WanderBehavior,
};

/// Read side of the host world
pub trait WorldReader {
    /// Copy every entity visible to decision logic into `builder`
    fn collect_entities(&self, builder: &mut SnapshotBuilder);
}

/// Write side of the host world
pub trait WorldMutator {
    type Error: fmt::Display;

    /// Whether `entity` still exists and can act or be acted on
    fn is_live(&self, entity: EntityId) -> bool;

    fn move_to(
        &mut self,
        auth: &AuthorityToken,
        agent: EntityId,
        to: Position,
    ) -> Result<(), Self::Error>;

    fn attack(
        &mut self,
        auth: &AuthorityToken,
        agent: EntityId,
        target: EntityId,
    ) -> Result<(), Self::Error>;

    fn cast(
        &mut self,
        auth: &AuthorityToken,
        agent: EntityId,
        ability: u32,
        target: Option<EntityId>,
    ) -> Result<(), Self::Error>;

    fn follow(
        &mut self,
        auth: &AuthorityToken,
        agent: EntityId,
        leader: EntityId,
    ) -> Result<(), Self::Error>;

    fn interact(
        &mut self,
        auth: &AuthorityToken,
        agent: EntityId,
        target: EntityId,
    ) -> Result<(), Self::Error>;

    /// Host-defined actions; ignored unless the host overrides this
    fn custom(
        &mut self,
        _auth: &AuthorityToken,
        _action: &Action,
    ) -> Result<(), Self::Error> {
        Ok(())
    }
}
