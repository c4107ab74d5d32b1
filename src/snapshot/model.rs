// src/snapshot/model.rs
//! Snapshot contents: per-entity state frozen at publish time

use crate::utils::ids::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// World-space position
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance_squared(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    pub fn distance(&self, other: &Position) -> f32 {
        self.distance_squared(other).sqrt()
    }

    /// Step from `self` toward `target` by at most `max_step`
    pub fn step_toward(&self, target: &Position, max_step: f32) -> Position {
        let dist = self.distance(target);
        if dist <= max_step || dist == 0.0 {
            return *target;
        }
        let t = max_step / dist;
        Position {
            x: self.x + (target.x - self.x) * t,
            y: self.y + (target.y - self.y) * t,
            z: self.z + (target.z - self.z) * t,
        }
    }
}

/// Combat and control flags
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct EntityFlags(u32);

impl EntityFlags {
    pub const NONE: EntityFlags = EntityFlags(0);
    pub const IN_COMBAT: EntityFlags = EntityFlags(1 << 0);
    pub const DEAD: EntityFlags = EntityFlags(1 << 1);
    pub const STUNNED: EntityFlags = EntityFlags(1 << 2);
    pub const ROOTED: EntityFlags = EntityFlags(1 << 3);
    pub const CASTING: EntityFlags = EntityFlags(1 << 4);
    pub const PLAYER: EntityFlags = EntityFlags(1 << 5);
    pub const AGENT: EntityFlags = EntityFlags(1 << 6);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> Self {
        EntityFlags(bits)
    }

    pub const fn contains(self, other: EntityFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: EntityFlags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: EntityFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: EntityFlags) {
        self.0 &= !other.0;
    }
}

impl BitOr for EntityFlags {
    type Output = EntityFlags;

    fn bitor(self, rhs: EntityFlags) -> EntityFlags {
        EntityFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for EntityFlags {
    fn bitor_assign(&mut self, rhs: EntityFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for EntityFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityFlags({:#x})", self.0)
    }
}

/// State of one entity at publish time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub id: EntityId,
    pub position: Position,
    pub health: u32,
    pub max_health: u32,
    pub flags: EntityFlags,
    /// Controlling entity (pet owner, party leader, ...)
    pub owner: Option<EntityId>,
    pub faction: u32,
    /// Current attack or focus target
    pub target: Option<EntityId>,
}

impl EntityState {
    pub fn new(id: EntityId, position: Position) -> Self {
        Self {
            id,
            position,
            health: 100,
            max_health: 100,
            flags: EntityFlags::NONE,
            owner: None,
            faction: 0,
            target: None,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0 && !self.flags.contains(EntityFlags::DEAD)
    }

    /// Health as a fraction of max (0.0 when max is 0)
    pub fn health_fraction(&self) -> f32 {
        if self.max_health == 0 {
            0.0
        } else {
            self.health as f32 / self.max_health as f32
        }
    }

    pub fn is_hostile_to(&self, other: &EntityState) -> bool {
        self.faction != other.faction
    }
}

/// Immutable, versioned copy of world-entity state
#[derive(Debug, Clone)]
pub struct Snapshot {
    version: u64,
    tick: u64,
    entities: HashMap<EntityId, EntityState>,
}

impl Snapshot {
    /// The empty snapshot every store starts with
    pub fn empty() -> Self {
        Self {
            version: 0,
            tick: 0,
            entities: HashMap::new(),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Tick this snapshot was built for
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn get(&self, id: EntityId) -> Option<&EntityState> {
        self.entities.get(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityState> {
        self.entities.values()
    }

    /// Entities within `radius` of `center`
    pub fn entities_near(
        &self,
        center: Position,
        radius: f32,
    ) -> impl Iterator<Item = &EntityState> + '_ {
        let radius_sq = radius * radius;
        self.entities
            .values()
            .filter(move |e| e.position.distance_squared(&center) <= radius_sq)
    }

    /// Closest living entity hostile to `of` within `radius`
    pub fn nearest_hostile(&self, of: &EntityState, radius: f32) -> Option<&EntityState> {
        self.entities_near(of.position, radius)
            .filter(|e| e.id != of.id && e.is_alive() && of.is_hostile_to(e))
            .min_by(|a, b| {
                let da = a.position.distance_squared(&of.position);
                let db = b.position.distance_squared(&of.position);
                da.total_cmp(&db).then_with(|| a.id.cmp(&b.id))
            })
    }
}

/// Collects entity state on the authoritative thread before publishing
#[derive(Debug)]
pub struct SnapshotBuilder {
    tick: u64,
    entities: HashMap<EntityId, EntityState>,
}

impl SnapshotBuilder {
    pub fn new(tick: u64) -> Self {
        Self {
            tick,
            entities: HashMap::new(),
        }
    }

    pub fn with_capacity(tick: u64, capacity: usize) -> Self {
        Self {
            tick,
            entities: HashMap::with_capacity(capacity),
        }
    }

    /// Record an entity; a later insert for the same id replaces it
    pub fn insert(&mut self, state: EntityState) -> &mut Self {
        self.entities.insert(state.id, state);
        self
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Freeze into a snapshot with the given version
    pub(crate) fn build(self, version: u64) -> Snapshot {
        Snapshot {
            version,
            tick: self.tick,
            entities: self.entities,
        }
    }
}
