// src/engine/core.rs
//! The simulation core: one explicit context owning pool, store, queue and
//! agent registry
//!
//! # Tick
//!
//! ```text
//! authoritative thread                          workers
//! ────────────────────                          ───────
//! build_snapshot_and_dispatch(token, world)
//!   ├─ collect + publish snapshot
//!   ├─ backpressure check ── skip? ─► return
//!   └─ submit one decision task per idle agent ──► select behavior
//!                                                   emit actions ─► queue
//! drain_and_apply(token, world, max)  ◄──────────────────────────────┘
//! ```

use crate::actions::processor::{ActionProcessor, DrainReport, ProcessorStats};
use crate::actions::queue::{ActionQueue, ActionQueueStats, ActionSink};
use crate::behavior::descriptor::{BehaviorDescriptor, DecisionContext};
use crate::behavior::exclusion::BehaviorPolicy;
use crate::behavior::manager::BehaviorPriorityManager;
use crate::engine::agents::{AgentRegistry, AgentStatus};
use crate::engine::authority::AuthorityToken;
use crate::observability::metrics as names;
use crate::runtime::task::{Task, TaskPriority};
use crate::runtime::thread_pool::{PoolStats, ThreadPool};
use crate::snapshot::store::{SnapshotRef, SnapshotStore};
use crate::utils::config::CoreConfig;
use crate::utils::errors::{CoreError, Result};
use crate::utils::ids::EntityId;
use crate::world::{WorldMutator, WorldReader};
use crossbeam::utils::Backoff;
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Why a tick's decision dispatch was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum SkipReason {
    /// Queued actions exceed `workers × K`
    ActionBacklog { queued: usize, threshold: usize },

    /// The pool's task backlog exceeds its saturation limit
    PoolSaturated { queued: usize, limit: usize },
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::ActionBacklog { .. } => "action_backlog",
            SkipReason::PoolSaturated { .. } => "pool_saturated",
        }
    }
}

/// Result of one dispatch step
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
    pub tick: u64,

    pub snapshot_version: u64,

    /// Entities in the published snapshot
    pub entities: usize,

    /// Decision tasks submitted
    pub dispatched: usize,

    /// Agents whose previous task was still running
    pub busy: usize,

    /// Registered agents missing from the snapshot
    pub absent: usize,

    /// Set when the whole dispatch was skipped
    pub skipped: Option<SkipReason>,

    /// Action queue depth at dispatch time
    pub queued_actions: usize,
}

impl DispatchReport {
    pub fn was_skipped(&self) -> bool {
        self.skipped.is_some()
    }
}

/// Point-in-time view of the whole core
#[derive(Debug, Clone, Serialize)]
pub struct CoreStats {
    pub tick: u64,
    pub snapshot_version: u64,
    pub agents: usize,
    pub agents_in_flight: usize,
    pub skipped_ticks: u64,
    pub backpressure_threshold: usize,
    pub pool: PoolStats,
    pub queue: ActionQueueStats,
    pub processor: ProcessorStats,
}

/// Owns every concurrent component of the simulation
pub struct SimulationCore {
    config: CoreConfig,

    /// Identity of the token handed out at construction
    core_id: u64,

    pool: ThreadPool,

    snapshots: Arc<SnapshotStore>,

    actions: Arc<ActionQueue>,

    agents: AgentRegistry,

    processor: ActionProcessor,

    /// Queue depth above which dispatch is skipped
    backpressure_threshold: usize,

    tick: u64,

    skipped_ticks: u64,
}

impl SimulationCore {
    /// Build a core and the single authority token for it
    ///
    /// The token is `!Send`: the calling thread becomes the authoritative
    /// thread.
    pub fn new(config: CoreConfig) -> Result<(Self, AuthorityToken)> {
        config.validate()?;

        let token = AuthorityToken::issue();
        let pool = ThreadPool::new(config.pool.clone())?;
        let backpressure_threshold = pool.worker_count() * config.actions.backpressure_multiplier;
        let policy = BehaviorPolicy::from_config(&config.behavior);

        info!(
            "Simulation core {} ready: {} workers, queue capacity {}, backpressure at {} actions, {} exclusion rules",
            token.core_id(),
            pool.worker_count(),
            config.actions.queue_capacity,
            backpressure_threshold,
            policy.exclusions.len()
        );

        let core = Self {
            core_id: token.core_id(),
            snapshots: Arc::new(SnapshotStore::new()),
            actions: Arc::new(ActionQueue::new(config.actions.queue_capacity)),
            agents: AgentRegistry::new(policy),
            processor: ActionProcessor::new(&token, &config.actions),
            pool,
            backpressure_threshold,
            tick: 0,
            skipped_ticks: 0,
            config,
        };
        Ok((core, token))
    }

    /// Publish a snapshot of `world` and dispatch one decision task per idle
    /// agent, unless backpressure says to skip this tick
    pub fn build_snapshot_and_dispatch<W: WorldReader>(
        &mut self,
        token: &AuthorityToken,
        world: &W,
        tick_delta: f32,
    ) -> Result<DispatchReport> {
        self.check_authority(token)?;
        self.tick += 1;

        let mut builder = self.snapshots.builder(self.tick);
        world.collect_entities(&mut builder);
        let entities = builder.len();
        let version = self.snapshots.publish(builder);

        let mut report = DispatchReport {
            tick: self.tick,
            snapshot_version: version,
            entities,
            queued_actions: self.actions.len(),
            ..DispatchReport::default()
        };

        if let Some(reason) = self.backpressure(report.queued_actions) {
            self.skipped_ticks += 1;
            counter!(names::DISPATCH_SKIPPED, "reason" => reason.as_str()).increment(1);
            warn!("Tick {} dispatch skipped: {:?}", self.tick, reason);
            report.skipped = Some(reason);
            return Ok(report);
        }

        let snapshot = self.snapshots.current();
        let workers = self.pool.worker_count();

        for (agent, entry) in self.agents.entries() {
            if !snapshot.contains(agent) {
                report.absent += 1;
                continue;
            }
            let Some(guard) = entry.try_begin() else {
                report.busy += 1;
                continue;
            };

            let snapshot = snapshot.clone();
            let actions = Arc::clone(&self.actions);
            let task = Task::new(move || {
                decide(agent, &snapshot, &actions, tick_delta, guard.manager());
                drop(guard);
            })
            .with_priority(TaskPriority::Normal)
            .with_affinity(agent.index() % workers)
            .with_label(agent.to_string());

            self.pool.submit(task)?;
            report.dispatched += 1;
        }

        counter!(names::AGENTS_DISPATCHED).increment(report.dispatched as u64);
        if report.busy > 0 {
            counter!(names::AGENTS_BUSY).increment(report.busy as u64);
            debug!("Tick {}: {} agents still deciding", self.tick, report.busy);
        }
        Ok(report)
    }

    /// Apply up to `max_per_tick` queued actions to `world`
    pub fn drain_and_apply<W: WorldMutator>(
        &mut self,
        token: &AuthorityToken,
        world: &mut W,
        max_per_tick: usize,
    ) -> Result<DrainReport> {
        self.check_authority(token)?;
        self.processor
            .drain_and_apply(token, &self.actions, world, max_per_tick, self.tick)
    }

    /// [`drain_and_apply`](Self::drain_and_apply) with the configured maximum
    pub fn drain_and_apply_configured<W: WorldMutator>(
        &mut self,
        token: &AuthorityToken,
        world: &mut W,
    ) -> Result<DrainReport> {
        let max = self.processor.max_per_tick();
        self.drain_and_apply(token, world, max)
    }

    /// Register an agent; its next dispatch uses these behaviors
    ///
    /// Replacing an agent whose decision task is still running does not
    /// release it: the agent stays busy until that task ends.
    pub fn register_agent(&self, agent: EntityId, behaviors: Vec<BehaviorDescriptor>) -> Result<()> {
        self.agents.register(agent, behaviors)
    }

    /// Stop dispatching an agent; a task already in flight still finishes
    /// and still counts in [`wait_for_decisions`](Self::wait_for_decisions)
    pub fn remove_agent(&self, agent: EntityId) -> Result<()> {
        if self.agents.remove(agent) {
            Ok(())
        } else {
            Err(CoreError::UnknownAgent(agent))
        }
    }

    pub fn agent_state(&self, agent: EntityId) -> Result<AgentStatus> {
        self.agents
            .status(agent)
            .ok_or(CoreError::UnknownAgent(agent))
    }

    /// Block until every dispatched decision task has finished
    ///
    /// Returns `false` on timeout.
    pub fn wait_for_decisions(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let backoff = Backoff::new();
        while self.agents.in_flight() > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            if backoff.is_completed() {
                thread::sleep(Duration::from_micros(100));
            } else {
                backoff.snooze();
            }
        }
        true
    }

    pub fn stats(&self) -> CoreStats {
        CoreStats {
            tick: self.tick,
            snapshot_version: self.snapshots.version(),
            agents: self.agents.len(),
            agents_in_flight: self.agents.in_flight(),
            skipped_ticks: self.skipped_ticks,
            backpressure_threshold: self.backpressure_threshold,
            pool: self.pool.stats(),
            queue: self.actions.stats(),
            processor: self.processor.stats(),
        }
    }

    /// Stop the worker pool; queued decision tasks are abandoned
    pub fn shutdown(&self) {
        self.pool.shutdown();
        info!(
            "Simulation core {} stopped at tick {} ({} actions still queued)",
            self.core_id,
            self.tick,
            self.actions.len()
        );
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn backpressure_threshold(&self) -> usize {
        self.backpressure_threshold
    }

    pub fn worker_count(&self) -> usize {
        self.pool.worker_count()
    }

    /// Handle to the currently published snapshot
    pub fn snapshot(&self) -> SnapshotRef {
        self.snapshots.current()
    }

    /// Producer side of the action queue, for host-originated actions
    pub fn actions(&self) -> &ActionQueue {
        &self.actions
    }

    /// Sink stamping actions for `agent` with the current tick
    pub fn action_sink(&self, agent: EntityId) -> ActionSink<'_> {
        ActionSink::new(&self.actions, agent, self.tick)
    }

    fn check_authority(&self, token: &AuthorityToken) -> Result<()> {
        if token.core_id() == self.core_id {
            Ok(())
        } else {
            Err(CoreError::ForeignAuthority)
        }
    }

    fn backpressure(&self, queued: usize) -> Option<SkipReason> {
        if queued > self.backpressure_threshold {
            return Some(SkipReason::ActionBacklog {
                queued,
                threshold: self.backpressure_threshold,
            });
        }
        if self.pool.is_saturated() {
            return Some(SkipReason::PoolSaturated {
                queued: self.pool.queued(),
                limit: self.pool.saturation_limit(),
            });
        }
        None
    }
}

/// Body of one decision task
fn decide(
    agent: EntityId,
    snapshot: &SnapshotRef,
    actions: &ActionQueue,
    tick_delta: f32,
    manager: &BehaviorPriorityManager,
) {
    let ctx = DecisionContext::new(agent, snapshot, tick_delta);
    let mut sink = ActionSink::new(actions, agent, snapshot.tick());
    let selection = manager.run(&ctx, &mut sink);
    if sink.dropped() > 0 {
        debug!(
            "{} lost {} actions to a full queue at tick {}",
            agent,
            sink.dropped(),
            ctx.tick
        );
    }
    if selection.is_idle() {
        debug!("{} has no candidate behavior at tick {}", agent, ctx.tick);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::model::Position;
    use crate::world::arena::ArenaWorld;
    use crate::world::behaviors::stock_behaviors;

    fn small_config() -> CoreConfig {
        let mut config = CoreConfig::default();
        config.pool.worker_count = Some(2);
        config.actions.queue_capacity = 1024;
        config
    }

    #[test]
    fn test_tick_round_trip() {
        let (mut core, token) = SimulationCore::new(small_config()).unwrap();
        let mut world = ArenaWorld::new();
        let a = world.spawn_agent(Position::default(), 1);
        let b = world.spawn_agent(Position::new(2.0, 0.0, 0.0), 2);
        core.register_agent(a, stock_behaviors()).unwrap();
        core.register_agent(b, stock_behaviors()).unwrap();

        let report = core.build_snapshot_and_dispatch(&token, &world, 0.1).unwrap();
        assert_eq!(report.tick, 1);
        assert_eq!(report.entities, 2);
        assert_eq!(report.dispatched, 2);
        assert!(core.wait_for_decisions(Duration::from_secs(5)));

        let drain = core.drain_and_apply_configured(&token, &mut world).unwrap();
        assert_eq!(drain.applied, 2);
        assert_eq!(world.counters().attacks, 2);
        assert!(core.agent_state(a).unwrap().behavior.active.is_some());
        core.shutdown();
    }

    #[test]
    fn test_absent_agent_not_dispatched() {
        let (mut core, token) = SimulationCore::new(small_config()).unwrap();
        let world = ArenaWorld::new();
        core.register_agent(EntityId::new(7, 0), stock_behaviors()).unwrap();

        let report = core.build_snapshot_and_dispatch(&token, &world, 0.1).unwrap();
        assert_eq!(report.absent, 1);
        assert_eq!(report.dispatched, 0);
    }

    #[test]
    fn test_unknown_agent() {
        let (core, _token) = SimulationCore::new(small_config()).unwrap();
        let ghost = EntityId::new(3, 1);
        assert!(matches!(core.remove_agent(ghost), Err(CoreError::UnknownAgent(_))));
        assert!(matches!(core.agent_state(ghost), Err(CoreError::UnknownAgent(_))));
    }

    #[test]
    fn test_foreign_token_rejected() {
        let (mut core, _token) = SimulationCore::new(small_config()).unwrap();
        let (_other, foreign) = SimulationCore::new(small_config()).unwrap();
        let mut world = ArenaWorld::new();

        assert!(matches!(
            core.build_snapshot_and_dispatch(&foreign, &world, 0.1),
            Err(CoreError::ForeignAuthority)
        ));
        assert!(matches!(
            core.drain_and_apply(&foreign, &mut world, 10),
            Err(CoreError::ForeignAuthority)
        ));
        assert_eq!(core.tick(), 0);
    }

    #[test]
    fn test_dispatch_after_shutdown_fails() {
        let (mut core, token) = SimulationCore::new(small_config()).unwrap();
        let mut world = ArenaWorld::new();
        let a = world.spawn_agent(Position::default(), 1);
        core.register_agent(a, stock_behaviors()).unwrap();
        core.shutdown();

        let result = core.build_snapshot_and_dispatch(&token, &world, 0.1);
        assert!(matches!(result, Err(CoreError::PoolShutdown)));
        // the claimed flag was released with the rejected task
        assert!(!core.agent_state(a).unwrap().in_flight);
    }
}
