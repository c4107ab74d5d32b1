// tests/selection.rs
//! Property tests for behavior selection

use botcore_engine::actions::ActionSink;
use botcore_engine::behavior::{
    Behavior, BehaviorDescriptor, BehaviorPolicy, BehaviorPriorityManager, BehaviorTier,
    DecisionContext, ExclusionTable,
};
use botcore_engine::snapshot::Snapshot;
use botcore_engine::{BehaviorId, EntityId};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

struct Fixed(bool);

impl Behavior for Fixed {
    fn is_candidate(&self, _ctx: &DecisionContext<'_>) -> bool {
        self.0
    }

    fn decide(&self, _ctx: &DecisionContext<'_>, _sink: &mut ActionSink<'_>) {}
}

const TIERS: [BehaviorTier; 8] = [
    BehaviorTier::Incapacitated,
    BehaviorTier::Combat,
    BehaviorTier::Flee,
    BehaviorTier::Follow,
    BehaviorTier::Travel,
    BehaviorTier::Gather,
    BehaviorTier::Wander,
    BehaviorTier::Idle,
];

fn tier() -> impl Strategy<Value = BehaviorTier> {
    (0..TIERS.len()).prop_map(|i| TIERS[i])
}

/// (tier, priority, candidate) per registered behavior
fn behaviors() -> impl Strategy<Value = Vec<(BehaviorTier, i32, bool)>> {
    prop::collection::vec((tier(), -50i32..50, any::<bool>()), 0..12)
}

fn rules() -> impl Strategy<Value = Vec<(BehaviorTier, BehaviorTier)>> {
    prop::collection::vec((tier(), tier()), 0..10)
}

proptest! {
    #[test]
    fn test_selection_invariants(specs in behaviors(), rules in rules()) {
        let table = ExclusionTable::from_rules(&rules);
        let policy = Arc::new(BehaviorPolicy {
            exclusions: table.clone(),
            ..BehaviorPolicy::default()
        });
        let agent = EntityId::new(0, 0);
        let mut manager = BehaviorPriorityManager::new(agent, policy);
        for (i, (tier, priority, candidate)) in specs.iter().enumerate() {
            manager
                .register(BehaviorDescriptor::new(
                    BehaviorId(i as u32),
                    format!("b{}", i),
                    *tier,
                    *priority,
                    Fixed(*candidate),
                ))
                .unwrap();
        }

        let snapshot = Snapshot::empty();
        let selection = manager.select(&DecisionContext::new(agent, &snapshot, 0.1));

        let candidates: HashSet<u32> = specs
            .iter()
            .enumerate()
            .filter(|(_, s)| s.2)
            .map(|(i, _)| i as u32)
            .collect();

        // Exactly one winner whenever anything is a candidate
        prop_assert_eq!(selection.selected.is_some(), !candidates.is_empty());
        let Some(BehaviorId(winner)) = selection.selected else {
            return Ok(());
        };
        let (winner_tier, winner_priority, _) = specs[winner as usize];

        // Winner, excluded and deferred partition the candidates
        let mut seen: HashSet<u32> = HashSet::new();
        seen.insert(winner);
        for id in selection.excluded.iter().chain(selection.deferred.iter()) {
            prop_assert!(seen.insert(id.0), "{} listed twice", id);
        }
        prop_assert_eq!(&seen, &candidates);

        let incapacitated = candidates
            .iter()
            .any(|i| specs[*i as usize].0 == BehaviorTier::Incapacitated);
        if incapacitated {
            prop_assert_eq!(winner_tier, BehaviorTier::Incapacitated);
        } else {
            // Highest priority, earliest registration on ties
            for i in &candidates {
                let priority = specs[*i as usize].1;
                prop_assert!(priority < winner_priority || (priority == winner_priority && *i >= winner));
            }
        }

        for id in &selection.excluded {
            prop_assert!(table.excludes(winner_tier, specs[id.0 as usize].0));
        }
        for id in &selection.deferred {
            prop_assert!(!table.excludes(winner_tier, specs[id.0 as usize].0));
        }
    }
}
