// tests/tick.rs
//! End-to-end ticks through `SimulationCore` against the arena host

use botcore_engine::actions::{Action, ActionSink};
use botcore_engine::behavior::{Behavior, BehaviorDescriptor, BehaviorTier, DecisionContext};
use botcore_engine::engine::SkipReason;
use botcore_engine::snapshot::{Position, SnapshotBuilder};
use botcore_engine::world::arena::ArenaError;
use botcore_engine::world::{stock_behaviors, ArenaWorld, WorldMutator, WorldReader};
use botcore_engine::{AuthorityToken, BehaviorId, CoreConfig, EntityId, SimulationCore};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::collections::HashMap;
use std::thread;
use std::time::{Duration, Instant};

fn config(workers: usize) -> CoreConfig {
    let mut config = CoreConfig::default();
    config.pool.worker_count = Some(workers);
    config.actions.queue_capacity = 8192;
    config
}

/// Emits three numbered casts per tick
struct Counter;

impl Behavior for Counter {
    fn is_candidate(&self, _ctx: &DecisionContext<'_>) -> bool {
        true
    }

    fn decide(&self, ctx: &DecisionContext<'_>, sink: &mut ActionSink<'_>) {
        for step in 0..3 {
            sink.cast((ctx.tick * 10 + step) as u32, None);
        }
    }
}

/// Casts the tick number; tick 1 blocks until the gate opens
struct Gated {
    open: Receiver<()>,
}

impl Behavior for Gated {
    fn is_candidate(&self, _ctx: &DecisionContext<'_>) -> bool {
        true
    }

    fn decide(&self, ctx: &DecisionContext<'_>, sink: &mut ActionSink<'_>) {
        if ctx.tick == 1 {
            let _ = self.open.recv_timeout(Duration::from_secs(10));
        }
        sink.cast(ctx.tick as u32, None);
    }
}

/// Panics on tick 1, moves afterwards
struct Faulty;

impl Behavior for Faulty {
    fn is_candidate(&self, _ctx: &DecisionContext<'_>) -> bool {
        true
    }

    fn decide(&self, ctx: &DecisionContext<'_>, sink: &mut ActionSink<'_>) {
        if ctx.tick == 1 {
            panic!("decision fault at tick {}", ctx.tick);
        }
        sink.move_to(Position::new(1.0, 0.0, 0.0));
    }
}

fn gated(open: &Receiver<()>) -> Vec<BehaviorDescriptor> {
    vec![BehaviorDescriptor::new(
        BehaviorId(0),
        "gated",
        BehaviorTier::Idle,
        1,
        Gated { open: open.clone() },
    )]
}

/// Arena that also logs every cast in apply order
struct LoggingWorld {
    arena: ArenaWorld,
    casts: Vec<(EntityId, u32)>,
}

impl WorldReader for LoggingWorld {
    fn collect_entities(&self, builder: &mut SnapshotBuilder) {
        self.arena.collect_entities(builder);
    }
}

impl WorldMutator for LoggingWorld {
    type Error = ArenaError;

    fn is_live(&self, entity: EntityId) -> bool {
        self.arena.is_live(entity)
    }

    fn move_to(&mut self, auth: &AuthorityToken, agent: EntityId, to: Position) -> Result<(), ArenaError> {
        self.arena.move_to(auth, agent, to)
    }

    fn attack(&mut self, auth: &AuthorityToken, agent: EntityId, target: EntityId) -> Result<(), ArenaError> {
        self.arena.attack(auth, agent, target)
    }

    fn cast(
        &mut self,
        _auth: &AuthorityToken,
        agent: EntityId,
        ability: u32,
        _target: Option<EntityId>,
    ) -> Result<(), ArenaError> {
        self.casts.push((agent, ability));
        Ok(())
    }

    fn follow(&mut self, auth: &AuthorityToken, agent: EntityId, leader: EntityId) -> Result<(), ArenaError> {
        self.arena.follow(auth, agent, leader)
    }

    fn interact(&mut self, auth: &AuthorityToken, agent: EntityId, target: EntityId) -> Result<(), ArenaError> {
        self.arena.interact(auth, agent, target)
    }

    fn custom(&mut self, auth: &AuthorityToken, action: &Action) -> Result<(), ArenaError> {
        self.arena.custom(auth, action)
    }
}

#[test]
fn test_per_agent_action_order() {
    let (mut core, token) = SimulationCore::new(config(4)).unwrap();
    let mut world = LoggingWorld {
        arena: ArenaWorld::new(),
        casts: Vec::new(),
    };
    for i in 0..32 {
        let agent = world.arena.spawn_agent(Position::new(i as f32, 0.0, 0.0), 0);
        let counter = BehaviorDescriptor::new(BehaviorId(0), "counter", BehaviorTier::Idle, 1, Counter);
        core.register_agent(agent, vec![counter]).unwrap();
    }

    // Small drains leave a backlog that spans ticks
    for _ in 0..20 {
        core.build_snapshot_and_dispatch(&token, &world, 0.1).unwrap();
        core.drain_and_apply(&token, &mut world, 17).unwrap();
    }
    core.wait_for_decisions(Duration::from_secs(5));
    while core.drain_and_apply(&token, &mut world, 64).unwrap().drained > 0 {}

    let mut last: HashMap<EntityId, u32> = HashMap::new();
    for (agent, ability) in &world.casts {
        if let Some(prev) = last.insert(*agent, *ability) {
            assert!(*ability > prev, "{} applied {} after {}", agent, ability, prev);
        }
    }
    assert_eq!(last.len(), 32);
}

/// Tick 1 blocks; the agent is replaced (`remove` first when `remove_first`),
/// then tick 2 must find it busy. Returns the applied cast order.
fn replace_agent_mid_decision(remove_first: bool) -> Vec<u32> {
    let (mut core, token) = SimulationCore::new(config(2)).unwrap();
    let mut world = LoggingWorld {
        arena: ArenaWorld::new(),
        casts: Vec::new(),
    };
    let bot = world.arena.spawn_agent(Position::default(), 0);
    let (open, gate): (Sender<()>, Receiver<()>) = bounded(1);
    core.register_agent(bot, gated(&gate)).unwrap();

    let first = core.build_snapshot_and_dispatch(&token, &world, 0.1).unwrap();
    assert_eq!(first.dispatched, 1);

    if remove_first {
        core.remove_agent(bot).unwrap();
    }
    core.register_agent(bot, gated(&gate)).unwrap();

    let second = core.build_snapshot_and_dispatch(&token, &world, 0.1).unwrap();
    assert_eq!(second.dispatched, 0);
    assert_eq!(second.busy, 1);
    assert_eq!(core.stats().agents_in_flight, 1);

    open.send(()).unwrap();
    assert!(core.wait_for_decisions(Duration::from_secs(10)));

    let third = core.build_snapshot_and_dispatch(&token, &world, 0.1).unwrap();
    assert_eq!(third.dispatched, 1);
    assert!(core.wait_for_decisions(Duration::from_secs(10)));
    while core.drain_and_apply(&token, &mut world, 16).unwrap().drained > 0 {}

    let state = core.agent_state(bot).unwrap();
    assert_eq!(state.busy_skips, 1);
    core.shutdown();
    world.casts.iter().map(|(_, ability)| *ability).collect()
}

#[test]
fn test_reregistered_agent_waits_for_running_decision() {
    assert_eq!(replace_agent_mid_decision(false), vec![1, 3]);
}

#[test]
fn test_removed_and_readded_agent_waits_for_running_decision() {
    assert_eq!(replace_agent_mid_decision(true), vec![1, 3]);
}

#[test]
fn test_panicking_decision_releases_agent() {
    let (mut core, token) = SimulationCore::new(config(2)).unwrap();
    let mut world = ArenaWorld::new();
    let bot = world.spawn_agent(Position::default(), 0);
    let faulty = BehaviorDescriptor::new(BehaviorId(0), "faulty", BehaviorTier::Idle, 1, Faulty);
    core.register_agent(bot, vec![faulty]).unwrap();

    let first = core.build_snapshot_and_dispatch(&token, &world, 0.1).unwrap();
    assert_eq!(first.dispatched, 1);
    assert!(core.wait_for_decisions(Duration::from_secs(5)));
    // The flag drops while unwinding, just before the pool counts the panic
    let deadline = Instant::now() + Duration::from_secs(5);
    while core.stats().pool.panicked == 0 && Instant::now() < deadline {
        thread::yield_now();
    }
    assert_eq!(core.stats().pool.panicked, 1);
    assert!(core.actions().is_empty());
    assert!(!core.agent_state(bot).unwrap().in_flight);

    let second = core.build_snapshot_and_dispatch(&token, &world, 0.1).unwrap();
    assert_eq!(second.dispatched, 1);
    assert_eq!(second.busy, 0);
    assert!(core.wait_for_decisions(Duration::from_secs(5)));
    assert_eq!(core.actions().len(), 1);

    let drain = core.drain_and_apply(&token, &mut world, 16).unwrap();
    assert_eq!(drain.applied, 1);
    assert_eq!(core.stats().pool.panicked, 1);
    core.shutdown();
}

#[test]
fn test_removed_target_dropped_without_error() {
    let (mut core, token) = SimulationCore::new(config(2)).unwrap();
    let mut world = ArenaWorld::new();
    let hunter = world.spawn_agent(Position::default(), 1);
    let prey = world.spawn(Position::new(2.0, 0.0, 0.0), 2, Default::default());
    core.register_agent(hunter, stock_behaviors()).unwrap();

    let dispatch = core.build_snapshot_and_dispatch(&token, &world, 0.1).unwrap();
    assert_eq!(dispatch.dispatched, 1);
    assert!(core.wait_for_decisions(Duration::from_secs(5)));

    assert!(world.despawn(prey));
    let drain = core.drain_and_apply(&token, &mut world, 16).unwrap();

    assert_eq!(drain.drained, 1);
    assert_eq!(drain.applied, 0);
    assert_eq!(drain.failed, 0);
    assert_eq!(drain.dropped.target_gone, 1);
    assert!(drain.is_balanced());
    assert_eq!(world.counters().attacks, 0);
}

/// 300 queued against a threshold of 240 skips one tick. Afterwards each
/// tick drains 60 while eight wandering bots add at most 8, so the backlog
/// shrinks on each of the next five ticks.
#[test]
fn test_backpressure_skips_one_tick_then_recovers() {
    let mut cfg = config(16);
    cfg.actions.backpressure_multiplier = 15;
    let (mut core, token) = SimulationCore::new(cfg).unwrap();
    assert_eq!(core.backpressure_threshold(), 240);

    let mut world = ArenaWorld::new();
    let bots: Vec<_> = (0..8)
        .map(|i| world.spawn_agent(Position::new(i as f32 * 100.0, 0.0, 0.0), 0))
        .collect();
    for bot in &bots {
        core.register_agent(*bot, stock_behaviors()).unwrap();
    }

    {
        let mut sink = core.action_sink(bots[0]);
        for _ in 0..300 {
            assert!(sink.move_to(Position::new(1.0, 1.0, 0.0)));
        }
    }

    let first = core.build_snapshot_and_dispatch(&token, &world, 0.1).unwrap();
    assert_eq!(
        first.skipped,
        Some(SkipReason::ActionBacklog {
            queued: 300,
            threshold: 240
        })
    );
    assert_eq!(first.dispatched, 0);

    let mut depths = vec![first.queued_actions];
    for _ in 0..5 {
        core.drain_and_apply(&token, &mut world, 60).unwrap();
        let report = core.build_snapshot_and_dispatch(&token, &world, 0.1).unwrap();
        assert!(!report.was_skipped(), "skipped at backlog {}", report.queued_actions);
        assert_eq!(report.dispatched, bots.len());
        depths.push(report.queued_actions);
        assert!(core.wait_for_decisions(Duration::from_secs(5)));
    }

    assert_eq!(depths.len(), 6);
    assert!(depths.windows(2).all(|w| w[1] < w[0]), "backlog {:?}", depths);
    assert_eq!(core.stats().skipped_ticks, 1);
}

#[test]
fn test_hundred_agents_one_tick() {
    let (mut core, token) = SimulationCore::new(config(8)).unwrap();
    let mut world = ArenaWorld::new();
    for i in 0..100 {
        let bot = world.spawn_agent(Position::new((i % 10) as f32 * 50.0, (i / 10) as f32 * 50.0, 0.0), 0);
        core.register_agent(bot, stock_behaviors()).unwrap();
    }

    let dispatch = core.build_snapshot_and_dispatch(&token, &world, 0.1).unwrap();
    assert_eq!(dispatch.dispatched, 100);
    assert!(core.wait_for_decisions(Duration::from_secs(10)));

    let queued = core.actions().len();
    assert!(queued <= 100, "{} actions from 100 agents", queued);

    let mut drained = 0;
    for _ in 0..2 {
        drained += core.drain_and_apply_configured(&token, &mut world).unwrap().drained;
    }
    assert_eq!(drained, queued);
    assert!(core.actions().is_empty());
    core.shutdown();
}

#[test]
fn test_combat_wins_over_follow() {
    let (mut core, token) = SimulationCore::new(config(2)).unwrap();
    let mut world = ArenaWorld::new();
    let leader = world.spawn_agent(Position::new(40.0, 0.0, 0.0), 1);
    let bot = world.spawn_agent(Position::default(), 1);
    let enemy = world.spawn(Position::new(2.0, 0.0, 0.0), 2, Default::default());
    if let Some(state) = world.get_mut(bot) {
        state.owner = Some(leader);
    }

    core.register_agent(bot, stock_behaviors()).unwrap();
    core.build_snapshot_and_dispatch(&token, &world, 0.1).unwrap();
    assert!(core.wait_for_decisions(Duration::from_secs(5)));
    core.drain_and_apply_configured(&token, &mut world).unwrap();

    let status = core.agent_state(bot).unwrap();
    assert_eq!(status.behavior.active, Some(BehaviorId(2)));
    assert_eq!(world.counters().attacks, 1);
    assert_eq!(world.counters().follows, 0);
    assert!(world.get(enemy).unwrap().health < 100);
}
