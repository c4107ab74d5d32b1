// src/behavior/manager.rs
//! Per-agent behavior selection
//!
//! Every tick the manager asks each registered behavior whether it is a
//! candidate, orders candidates by priority (higher first, ties broken by
//! registration order) and selects the first. An `Incapacitated` candidate
//! wins regardless of priority. Remaining candidates are split into those
//! the winner excludes and those merely deferred to a later tick. Only the
//! winner runs its decision logic.

use crate::actions::queue::ActionSink;
use crate::behavior::descriptor::{BehaviorDescriptor, BehaviorTier, DecisionContext};
use crate::behavior::exclusion::BehaviorPolicy;
use crate::behavior::state::{AgentBehaviorState, BehaviorStatus};
use crate::observability::metrics as names;
use crate::utils::errors::{CoreError, Result};
use crate::utils::ids::{BehaviorId, EntityId};
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, trace};

/// Outcome of one selection round
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    /// Behavior that runs this tick
    pub selected: Option<BehaviorId>,

    /// Candidates suppressed by an exclusion rule with the selected tier
    pub excluded: Vec<BehaviorId>,

    /// Candidates compatible with the winner that wait for a later tick
    pub deferred: Vec<BehaviorId>,
}

impl Selection {
    pub fn is_idle(&self) -> bool {
        self.selected.is_none()
    }
}

struct Registered {
    descriptor: BehaviorDescriptor,
    order: u32,
}

/// Selects one active behavior per tick for a single agent
pub struct BehaviorPriorityManager {
    agent: EntityId,

    /// Sorted by priority descending, then registration order
    behaviors: Vec<Registered>,

    policy: Arc<BehaviorPolicy>,

    state: AgentBehaviorState,

    registered: u32,
}

impl BehaviorPriorityManager {
    pub fn new(agent: EntityId, policy: Arc<BehaviorPolicy>) -> Self {
        Self {
            agent,
            behaviors: Vec::new(),
            policy,
            state: AgentBehaviorState::new(),
            registered: 0,
        }
    }

    /// Build a manager and register `descriptors` in order
    pub fn with_behaviors<I>(agent: EntityId, policy: Arc<BehaviorPolicy>, descriptors: I) -> Result<Self>
    where
        I: IntoIterator<Item = BehaviorDescriptor>,
    {
        let mut manager = Self::new(agent, policy);
        for descriptor in descriptors {
            manager.register(descriptor)?;
        }
        Ok(manager)
    }

    /// Register a behavior; its priority may be overridden by name
    pub fn register(&mut self, mut descriptor: BehaviorDescriptor) -> Result<()> {
        if self.behaviors.iter().any(|r| r.descriptor.id == descriptor.id) {
            return Err(CoreError::DuplicateBehavior {
                agent: self.agent,
                behavior: descriptor.id,
            });
        }

        let configured = self.policy.priority_for(&descriptor.name, descriptor.priority);
        if configured != descriptor.priority {
            debug!(
                "Priority of {} for {} overridden: {} -> {}",
                descriptor.name, self.agent, descriptor.priority, configured
            );
            descriptor.priority = configured;
        }

        self.behaviors.push(Registered {
            descriptor,
            order: self.registered,
        });
        self.registered += 1;
        self.behaviors.sort_by(|a, b| {
            b.descriptor
                .priority
                .cmp(&a.descriptor.priority)
                .then(a.order.cmp(&b.order))
        });
        Ok(())
    }

    pub fn agent(&self) -> EntityId {
        self.agent
    }

    /// Registered behaviors in selection order
    pub fn descriptors(&self) -> impl Iterator<Item = &BehaviorDescriptor> {
        self.behaviors.iter().map(|r| &r.descriptor)
    }

    pub fn len(&self) -> usize {
        self.behaviors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.behaviors.is_empty()
    }

    pub fn status(&self) -> BehaviorStatus {
        self.state.status()
    }

    /// Pick the active behavior without running it
    pub fn select(&self, ctx: &DecisionContext<'_>) -> Selection {
        let candidates: Vec<&BehaviorDescriptor> = self
            .descriptors()
            .filter(|d| d.behavior.is_candidate(ctx))
            .collect();

        let winner = candidates
            .iter()
            .position(|d| d.tier.overrides_all())
            .or(if candidates.is_empty() { None } else { Some(0) });

        let Some(winner) = winner else {
            return Selection::default();
        };
        let selected_tier: BehaviorTier = candidates[winner].tier;

        let mut selection = Selection {
            selected: Some(candidates[winner].id),
            ..Selection::default()
        };
        for (i, candidate) in candidates.iter().enumerate() {
            if i == winner {
                continue;
            }
            if self.policy.exclusions.excludes(selected_tier, candidate.tier) {
                selection.excluded.push(candidate.id);
            } else {
                selection.deferred.push(candidate.id);
            }
        }
        selection
    }

    /// Select, run the winner's decision logic and record the result
    pub fn run(&self, ctx: &DecisionContext<'_>, sink: &mut ActionSink<'_>) -> Selection {
        let selection = self.select(ctx);

        if let Some(id) = selection.selected {
            if let Some(descriptor) = self.descriptors().find(|d| d.id == id) {
                trace!("{} runs {} at tick {}", self.agent, descriptor.name, ctx.tick);
                descriptor.behavior.decide(ctx, sink);
            }
        }
        if !selection.excluded.is_empty() {
            counter!(names::BEHAVIORS_EXCLUDED).increment(selection.excluded.len() as u64);
        }

        self.state.record(selection.selected, ctx.tick);
        selection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::queue::ActionQueue;
    use crate::behavior::descriptor::Behavior;
    use crate::behavior::exclusion::ExclusionTable;
    use crate::snapshot::model::Snapshot;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Candidate flag plus a counter of decide calls
    struct Probe {
        candidate: bool,
        decided: Arc<AtomicUsize>,
    }

    impl Behavior for Probe {
        fn is_candidate(&self, _: &DecisionContext<'_>) -> bool {
            self.candidate
        }

        fn decide(&self, _: &DecisionContext<'_>, sink: &mut ActionSink<'_>) {
            self.decided.fetch_add(1, Ordering::SeqCst);
            sink.cast(0, None);
        }
    }

    fn counting(
        id: u32,
        name: &str,
        tier: BehaviorTier,
        priority: i32,
        candidate: bool,
    ) -> (BehaviorDescriptor, Arc<AtomicUsize>) {
        let decided = Arc::new(AtomicUsize::new(0));
        let descriptor = BehaviorDescriptor::new(
            BehaviorId(id),
            name,
            tier,
            priority,
            Probe {
                candidate,
                decided: Arc::clone(&decided),
            },
        );
        (descriptor, decided)
    }

    fn policy(rules: &[(BehaviorTier, BehaviorTier)]) -> Arc<BehaviorPolicy> {
        Arc::new(BehaviorPolicy {
            exclusions: ExclusionTable::from_rules(rules),
            ..BehaviorPolicy::default()
        })
    }

    fn agent() -> EntityId {
        EntityId::new(1, 0)
    }

    #[test]
    fn test_combat_excludes_follow() {
        let mut manager =
            BehaviorPriorityManager::new(agent(), policy(&[(BehaviorTier::Combat, BehaviorTier::Follow)]));
        let (follow, follow_calls) = counting(1, "follow", BehaviorTier::Follow, 50, true);
        let (combat, combat_calls) = counting(2, "combat", BehaviorTier::Combat, 100, true);
        manager.register(follow).unwrap();
        manager.register(combat).unwrap();

        let snapshot = Snapshot::empty();
        let queue = ActionQueue::new(8);
        let ctx = DecisionContext::new(agent(), &snapshot, 0.1);
        let mut sink = ActionSink::new(&queue, agent(), 0);
        let selection = manager.run(&ctx, &mut sink);

        assert_eq!(selection.selected, Some(BehaviorId(2)));
        assert_eq!(selection.excluded, vec![BehaviorId(1)]);
        assert!(selection.deferred.is_empty());
        assert_eq!(combat_calls.load(Ordering::SeqCst), 1);
        assert_eq!(follow_calls.load(Ordering::SeqCst), 0);
        assert_eq!(queue.len(), 1);
        assert_eq!(manager.status().active, Some(BehaviorId(2)));
    }

    #[test]
    fn test_compatible_candidates_deferred() {
        let mut manager = BehaviorPriorityManager::new(agent(), policy(&[]));
        manager.register(counting(1, "gather", BehaviorTier::Gather, 20, true).0).unwrap();
        manager.register(counting(2, "travel", BehaviorTier::Travel, 30, true).0).unwrap();
        manager.register(counting(3, "idle", BehaviorTier::Idle, 1, false).0).unwrap();

        let snapshot = Snapshot::empty();
        let selection = manager.select(&DecisionContext::new(agent(), &snapshot, 0.1));
        assert_eq!(selection.selected, Some(BehaviorId(2)));
        assert_eq!(selection.deferred, vec![BehaviorId(1)]);
        assert!(selection.excluded.is_empty());
    }

    #[test]
    fn test_ties_break_by_registration_order() {
        let mut manager = BehaviorPriorityManager::new(agent(), policy(&[]));
        manager.register(counting(7, "first", BehaviorTier::Wander, 10, true).0).unwrap();
        manager.register(counting(3, "second", BehaviorTier::Travel, 10, true).0).unwrap();

        let snapshot = Snapshot::empty();
        let selection = manager.select(&DecisionContext::new(agent(), &snapshot, 0.1));
        assert_eq!(selection.selected, Some(BehaviorId(7)));
    }

    #[test]
    fn test_incapacitated_overrides_priority() {
        let mut manager = BehaviorPriorityManager::new(agent(), policy(&[]));
        manager.register(counting(1, "combat", BehaviorTier::Combat, 100, true).0).unwrap();
        manager
            .register(counting(2, "incapacitated", BehaviorTier::Incapacitated, 0, true).0)
            .unwrap();
        manager.register(counting(3, "wander", BehaviorTier::Wander, 10, true).0).unwrap();

        let snapshot = Snapshot::empty();
        let selection = manager.select(&DecisionContext::new(agent(), &snapshot, 0.1));
        assert_eq!(selection.selected, Some(BehaviorId(2)));
        assert_eq!(selection.excluded, vec![BehaviorId(1), BehaviorId(3)]);
        assert!(selection.deferred.is_empty());
    }

    #[test]
    fn test_no_candidates() {
        let mut manager = BehaviorPriorityManager::new(agent(), policy(&[]));
        manager.register(counting(1, "idle", BehaviorTier::Idle, 1, false).0).unwrap();

        let snapshot = Snapshot::empty();
        let queue = ActionQueue::new(8);
        let ctx = DecisionContext::new(agent(), &snapshot, 0.1);
        let selection = manager.run(&ctx, &mut ActionSink::new(&queue, agent(), 0));
        assert!(selection.is_idle());
        assert!(queue.is_empty());
        assert_eq!(manager.status().selections, 1);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut manager = BehaviorPriorityManager::new(agent(), policy(&[]));
        manager.register(counting(1, "a", BehaviorTier::Idle, 1, true).0).unwrap();
        let err = manager
            .register(counting(1, "b", BehaviorTier::Wander, 2, true).0)
            .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateBehavior { .. }));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_priority_override_by_name() {
        let mut policy = BehaviorPolicy::default();
        policy.priority_overrides.insert("wander".into(), 500);
        let mut manager = BehaviorPriorityManager::new(agent(), Arc::new(policy));
        manager.register(counting(1, "combat", BehaviorTier::Combat, 100, true).0).unwrap();
        manager.register(counting(2, "wander", BehaviorTier::Wander, 10, true).0).unwrap();

        let first = manager.descriptors().next().unwrap();
        assert_eq!(first.id, BehaviorId(2));
        assert_eq!(first.priority, 500);
    }
}
