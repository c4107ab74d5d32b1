// src/world/arena.rs
//! In-memory reference host
//!
//! A generational arena of entities: despawning a slot bumps its
//! generation, so ids handed out before the despawn stop resolving even
//! after the slot is reused.

use crate::actions::action::Action;
use crate::engine::authority::AuthorityToken;
use crate::snapshot::model::{EntityFlags, EntityState, Position, SnapshotBuilder};
use crate::utils::ids::EntityId;
use crate::world::{WorldMutator, WorldReader};
use serde::Serialize;
use thiserror::Error;
use tracing::trace;

/// Heals the target (or the caster) by [`HEAL_AMOUNT`]
pub const ABILITY_HEAL: u32 = 1;

/// Damages the target by [`FIREBALL_DAMAGE`] at any range
pub const ABILITY_FIREBALL: u32 = 2;

pub const HEAL_AMOUNT: u32 = 20;
pub const FIREBALL_DAMAGE: u32 = 30;

/// Host-side rejections of otherwise valid actions
#[derive(Debug, Error, PartialEq)]
pub enum ArenaError {
    #[error("entity {0} does not exist")]
    NotFound(EntityId),

    #[error("entity {0} is dead")]
    Dead(EntityId),

    #[error("entity {0} cannot move")]
    Immobile(EntityId),

    #[error("{target} is {distance:.1} away from {from}, range is {range:.1}")]
    OutOfRange {
        from: EntityId,
        target: EntityId,
        distance: f32,
        range: f32,
    },

    #[error("unknown ability {0}")]
    UnknownAbility(u32),
}

/// Tunables shared by every arena entity
#[derive(Debug, Clone, Copy)]
pub struct ArenaRules {
    /// Distance covered by one move or follow step
    pub move_step: f32,

    pub attack_range: f32,

    pub attack_damage: u32,

    pub interact_range: f32,

    /// Followers stop this close to their leader
    pub follow_distance: f32,
}

impl Default for ArenaRules {
    fn default() -> Self {
        Self {
            move_step: 2.0,
            attack_range: 3.0,
            attack_damage: 10,
            interact_range: 3.0,
            follow_distance: 2.0,
        }
    }
}

/// Mutations applied so far, by kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ArenaCounters {
    pub moves: u64,
    pub attacks: u64,
    pub casts: u64,
    pub follows: u64,
    pub interactions: u64,
    pub custom: u64,
}

impl ArenaCounters {
    pub fn total(&self) -> u64 {
        self.moves + self.attacks + self.casts + self.follows + self.interactions + self.custom
    }
}

struct Slot {
    generation: u32,
    state: Option<EntityState>,
}

/// Generational entity arena
pub struct ArenaWorld {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    rules: ArenaRules,
    counters: ArenaCounters,
}

impl ArenaWorld {
    pub fn new() -> Self {
        Self::with_rules(ArenaRules::default())
    }

    pub fn with_rules(rules: ArenaRules) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            rules,
            counters: ArenaCounters::default(),
        }
    }

    /// Add an entity; reuses a free slot with a newer generation
    pub fn spawn(&mut self, position: Position, faction: u32, flags: EntityFlags) -> EntityId {
        let id = match self.free.pop() {
            Some(index) => EntityId::new(index, self.slots[index as usize].generation),
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    state: None,
                });
                EntityId::new((self.slots.len() - 1) as u32, 0)
            }
        };

        let mut state = EntityState::new(id, position);
        state.faction = faction;
        state.flags = flags;
        self.slots[id.index()].state = Some(state);
        self.live += 1;
        id
    }

    /// Spawn an entity flagged as a bot agent
    pub fn spawn_agent(&mut self, position: Position, faction: u32) -> EntityId {
        self.spawn(position, faction, EntityFlags::AGENT)
    }

    /// Remove an entity; its id never resolves again
    pub fn despawn(&mut self, id: EntityId) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        let slot = &mut self.slots[id.index()];
        slot.state = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index() as u32);
        self.live -= 1;
        true
    }

    pub fn get(&self, id: EntityId) -> Option<&EntityState> {
        let slot = self.slots.get(id.index())?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.state.as_ref()
    }

    /// Direct host-side access, e.g. for scripted setup
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut EntityState> {
        let slot = self.slots.get_mut(id.index())?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.state.as_mut()
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityState> {
        self.slots.iter().filter_map(|slot| slot.state.as_ref())
    }

    /// Ids of every entity flagged as an agent
    pub fn agents(&self) -> Vec<EntityId> {
        self.iter()
            .filter(|e| e.flags.contains(EntityFlags::AGENT))
            .map(|e| e.id)
            .collect()
    }

    pub fn counters(&self) -> ArenaCounters {
        self.counters
    }

    pub fn rules(&self) -> &ArenaRules {
        &self.rules
    }

    fn living(&self, id: EntityId) -> Result<&EntityState, ArenaError> {
        let state = self.get(id).ok_or(ArenaError::NotFound(id))?;
        if !state.is_alive() {
            return Err(ArenaError::Dead(id));
        }
        Ok(state)
    }

    fn check_range(&self, from: EntityId, target: EntityId, range: f32) -> Result<(), ArenaError> {
        let a = self.living(from)?.position;
        let b = self.get(target).ok_or(ArenaError::NotFound(target))?.position;
        let distance = a.distance(&b);
        if distance > range {
            return Err(ArenaError::OutOfRange {
                from,
                target,
                distance,
                range,
            });
        }
        Ok(())
    }

    fn damage(&mut self, target: EntityId, amount: u32) -> Result<(), ArenaError> {
        let state = self.get_mut(target).ok_or(ArenaError::NotFound(target))?;
        if !state.is_alive() {
            return Err(ArenaError::Dead(target));
        }
        state.health = state.health.saturating_sub(amount);
        state.flags.insert(EntityFlags::IN_COMBAT);
        if state.health == 0 {
            state.flags.insert(EntityFlags::DEAD);
            trace!("{} died", target);
        }
        Ok(())
    }

    fn step(&mut self, agent: EntityId, toward: Position, stop_at: f32) -> Result<(), ArenaError> {
        let state = self.living(agent)?;
        if state.flags.intersects(EntityFlags::ROOTED | EntityFlags::STUNNED) {
            return Err(ArenaError::Immobile(agent));
        }
        let distance = state.position.distance(&toward);
        if distance <= stop_at {
            return Ok(());
        }
        let step = self.rules.move_step.min(distance - stop_at);
        let next = state.position.step_toward(&toward, step);
        if let Some(state) = self.get_mut(agent) {
            state.position = next;
        }
        Ok(())
    }
}

impl Default for ArenaWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldReader for ArenaWorld {
    fn collect_entities(&self, builder: &mut SnapshotBuilder) {
        for state in self.iter() {
            builder.insert(state.clone());
        }
    }
}

impl WorldMutator for ArenaWorld {
    type Error = ArenaError;

    fn is_live(&self, entity: EntityId) -> bool {
        self.get(entity).is_some()
    }

    fn move_to(&mut self, _auth: &AuthorityToken, agent: EntityId, to: Position) -> Result<(), ArenaError> {
        self.step(agent, to, 0.0)?;
        self.counters.moves += 1;
        Ok(())
    }

    fn attack(&mut self, _auth: &AuthorityToken, agent: EntityId, target: EntityId) -> Result<(), ArenaError> {
        self.check_range(agent, target, self.rules.attack_range)?;
        self.damage(target, self.rules.attack_damage)?;
        if let Some(attacker) = self.get_mut(agent) {
            attacker.target = Some(target);
            attacker.flags.insert(EntityFlags::IN_COMBAT);
        }
        self.counters.attacks += 1;
        Ok(())
    }

    fn cast(
        &mut self,
        _auth: &AuthorityToken,
        agent: EntityId,
        ability: u32,
        target: Option<EntityId>,
    ) -> Result<(), ArenaError> {
        self.living(agent)?;
        match ability {
            ABILITY_HEAL => {
                let id = target.unwrap_or(agent);
                let state = self.get_mut(id).ok_or(ArenaError::NotFound(id))?;
                if !state.is_alive() {
                    return Err(ArenaError::Dead(id));
                }
                state.health = (state.health + HEAL_AMOUNT).min(state.max_health);
            }
            ABILITY_FIREBALL => {
                let id = target.ok_or(ArenaError::NotFound(agent))?;
                self.damage(id, FIREBALL_DAMAGE)?;
            }
            other => return Err(ArenaError::UnknownAbility(other)),
        }
        self.counters.casts += 1;
        Ok(())
    }

    fn follow(&mut self, _auth: &AuthorityToken, agent: EntityId, leader: EntityId) -> Result<(), ArenaError> {
        let to = self.get(leader).ok_or(ArenaError::NotFound(leader))?.position;
        self.step(agent, to, self.rules.follow_distance)?;
        if let Some(state) = self.get_mut(agent) {
            state.target = Some(leader);
        }
        self.counters.follows += 1;
        Ok(())
    }

    fn interact(&mut self, _auth: &AuthorityToken, agent: EntityId, target: EntityId) -> Result<(), ArenaError> {
        self.check_range(agent, target, self.rules.interact_range)?;
        self.counters.interactions += 1;
        Ok(())
    }

    fn custom(&mut self, _auth: &AuthorityToken, action: &Action) -> Result<(), ArenaError> {
        self.living(action.agent())?;
        self.counters.custom += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_and_despawn() {
        let mut world = ArenaWorld::new();
        let a = world.spawn_agent(Position::default(), 1);
        let b = world.spawn(Position::new(1.0, 0.0, 0.0), 2, EntityFlags::NONE);
        assert_eq!(world.len(), 2);
        assert_eq!(world.agents(), vec![a]);

        assert!(world.despawn(a));
        assert!(!world.despawn(a));
        assert!(!world.is_live(a));

        let reused = world.spawn_agent(Position::default(), 1);
        assert_eq!(reused.index(), a.index());
        assert_ne!(reused, a);
        assert!(world.is_live(b));
        assert!(world.get(a).is_none());
    }

    #[test]
    fn test_collect_entities() {
        let mut world = ArenaWorld::new();
        world.spawn_agent(Position::default(), 1);
        world.spawn_agent(Position::default(), 2);

        let mut builder = SnapshotBuilder::new(3);
        world.collect_entities(&mut builder);
        assert_eq!(builder.len(), 2);
    }

    #[test]
    fn test_attack_range_and_death() {
        let token = AuthorityToken::issue();
        let mut world = ArenaWorld::new();
        let a = world.spawn_agent(Position::default(), 1);
        let near = world.spawn(Position::new(2.0, 0.0, 0.0), 2, EntityFlags::NONE);
        let far = world.spawn(Position::new(20.0, 0.0, 0.0), 2, EntityFlags::NONE);

        assert!(matches!(
            world.attack(&token, a, far),
            Err(ArenaError::OutOfRange { .. })
        ));

        for _ in 0..10 {
            world.attack(&token, a, near).unwrap();
        }
        let victim = world.get(near).unwrap();
        assert!(!victim.is_alive());
        assert!(victim.flags.contains(EntityFlags::DEAD));
        assert_eq!(world.attack(&token, a, near), Err(ArenaError::Dead(near)));
        assert_eq!(world.counters().attacks, 10);
    }

    #[test]
    fn test_move_and_follow() {
        let token = AuthorityToken::issue();
        let mut world = ArenaWorld::new();
        let a = world.spawn_agent(Position::default(), 1);
        let leader = world.spawn(Position::new(10.0, 0.0, 0.0), 1, EntityFlags::NONE);

        world.move_to(&token, a, Position::new(1.0, 0.0, 0.0)).unwrap();
        assert_eq!(world.get(a).unwrap().position.x, 1.0);

        for _ in 0..10 {
            world.follow(&token, a, leader).unwrap();
        }
        let distance = world.get(a).unwrap().position.distance(&Position::new(10.0, 0.0, 0.0));
        assert!((distance - world.rules().follow_distance).abs() < 1e-4);

        world.get_mut(a).unwrap().flags.insert(EntityFlags::ROOTED);
        assert_eq!(
            world.move_to(&token, a, Position::default()),
            Err(ArenaError::Immobile(a))
        );
    }

    #[test]
    fn test_cast_abilities() {
        let token = AuthorityToken::issue();
        let mut world = ArenaWorld::new();
        let a = world.spawn_agent(Position::default(), 1);
        let b = world.spawn(Position::new(50.0, 0.0, 0.0), 2, EntityFlags::NONE);

        world.cast(&token, a, ABILITY_FIREBALL, Some(b)).unwrap();
        assert_eq!(world.get(b).unwrap().health, 100 - FIREBALL_DAMAGE);

        world.get_mut(a).unwrap().health = 50;
        world.cast(&token, a, ABILITY_HEAL, None).unwrap();
        assert_eq!(world.get(a).unwrap().health, 50 + HEAL_AMOUNT);

        assert_eq!(
            world.cast(&token, a, 99, None),
            Err(ArenaError::UnknownAbility(99))
        );
        assert_eq!(world.counters().casts, 2);
    }
}
