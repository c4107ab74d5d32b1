// src/world/behaviors.rs
//! Stock behaviors built on the snapshot query helpers

use crate::actions::queue::ActionSink;
use crate::behavior::descriptor::{Behavior, BehaviorDescriptor, BehaviorTier, DecisionContext};
use crate::snapshot::model::{EntityFlags, Position};
use crate::utils::ids::BehaviorId;
use crate::world::arena::ABILITY_HEAL;
use rand::Rng;

/// Dead or stunned: do nothing
pub struct IncapacitatedBehavior;

impl Behavior for IncapacitatedBehavior {
    fn is_candidate(&self, ctx: &DecisionContext<'_>) -> bool {
        match ctx.me() {
            Some(me) => !me.is_alive() || me.flags.contains(EntityFlags::STUNNED),
            None => false,
        }
    }

    fn decide(&self, _ctx: &DecisionContext<'_>, _sink: &mut ActionSink<'_>) {}
}

/// Engage the nearest hostile within `aggro_radius`
pub struct CombatBehavior {
    pub aggro_radius: f32,
    pub attack_range: f32,
}

impl Default for CombatBehavior {
    fn default() -> Self {
        Self {
            aggro_radius: 15.0,
            attack_range: 3.0,
        }
    }
}

impl Behavior for CombatBehavior {
    fn is_candidate(&self, ctx: &DecisionContext<'_>) -> bool {
        ctx.me()
            .and_then(|me| ctx.snapshot.nearest_hostile(me, self.aggro_radius))
            .is_some()
    }

    fn decide(&self, ctx: &DecisionContext<'_>, sink: &mut ActionSink<'_>) {
        let Some(me) = ctx.me() else { return };
        let Some(enemy) = ctx.snapshot.nearest_hostile(me, self.aggro_radius) else {
            return;
        };
        if me.position.distance(&enemy.position) <= self.attack_range {
            sink.attack(enemy.id);
        } else {
            sink.move_to(enemy.position);
        }
    }
}

/// Run from hostiles while wounded, healing on the way
pub struct FleeBehavior {
    /// Flee below this health fraction
    pub health_threshold: f32,
    pub danger_radius: f32,
}

impl Default for FleeBehavior {
    fn default() -> Self {
        Self {
            health_threshold: 0.25,
            danger_radius: 10.0,
        }
    }
}

impl Behavior for FleeBehavior {
    fn is_candidate(&self, ctx: &DecisionContext<'_>) -> bool {
        let Some(me) = ctx.me() else { return false };
        me.is_alive()
            && me.health_fraction() < self.health_threshold
            && ctx.snapshot.nearest_hostile(me, self.danger_radius).is_some()
    }

    fn decide(&self, ctx: &DecisionContext<'_>, sink: &mut ActionSink<'_>) {
        let Some(me) = ctx.me() else { return };
        let Some(threat) = ctx.snapshot.nearest_hostile(me, self.danger_radius) else {
            return;
        };
        let away = Position::new(
            me.position.x + (me.position.x - threat.position.x),
            me.position.y + (me.position.y - threat.position.y),
            me.position.z,
        );
        sink.move_to(away);
        sink.cast(ABILITY_HEAL, None);
    }
}

/// Stay close to the owner
pub struct FollowBehavior {
    pub distance: f32,
}

impl Default for FollowBehavior {
    fn default() -> Self {
        Self { distance: 4.0 }
    }
}

impl Behavior for FollowBehavior {
    fn is_candidate(&self, ctx: &DecisionContext<'_>) -> bool {
        let Some(me) = ctx.me() else { return false };
        let Some(owner) = me.owner.and_then(|id| ctx.snapshot.get(id)) else {
            return false;
        };
        me.position.distance(&owner.position) > self.distance
    }

    fn decide(&self, ctx: &DecisionContext<'_>, sink: &mut ActionSink<'_>) {
        if let Some(owner) = ctx.me().and_then(|me| me.owner) {
            sink.follow(owner);
        }
    }
}

/// Drift to a random nearby point
pub struct WanderBehavior {
    pub radius: f32,
}

impl Default for WanderBehavior {
    fn default() -> Self {
        Self { radius: 5.0 }
    }
}

impl Behavior for WanderBehavior {
    fn is_candidate(&self, ctx: &DecisionContext<'_>) -> bool {
        ctx.me().map(|me| me.is_alive()).unwrap_or(false)
    }

    fn decide(&self, ctx: &DecisionContext<'_>, sink: &mut ActionSink<'_>) {
        let Some(me) = ctx.me() else { return };
        let mut rng = rand::thread_rng();
        let to = Position::new(
            me.position.x + rng.gen_range(-self.radius..=self.radius),
            me.position.y + rng.gen_range(-self.radius..=self.radius),
            me.position.z,
        );
        sink.move_to(to);
    }
}

/// Default loadout: incapacitated, flee, combat, follow and wander
pub fn stock_behaviors() -> Vec<BehaviorDescriptor> {
    vec![
        BehaviorDescriptor::new(
            BehaviorId(0),
            "incapacitated",
            BehaviorTier::Incapacitated,
            0,
            IncapacitatedBehavior,
        ),
        BehaviorDescriptor::new(
            BehaviorId(1),
            "flee",
            BehaviorTier::Flee,
            150,
            FleeBehavior::default(),
        ),
        BehaviorDescriptor::new(
            BehaviorId(2),
            "combat",
            BehaviorTier::Combat,
            100,
            CombatBehavior::default(),
        ),
        BehaviorDescriptor::new(
            BehaviorId(3),
            "follow",
            BehaviorTier::Follow,
            50,
            FollowBehavior::default(),
        ),
        BehaviorDescriptor::new(
            BehaviorId(4),
            "wander",
            BehaviorTier::Wander,
            10,
            WanderBehavior::default(),
        ),
    ]
}
