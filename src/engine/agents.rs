// src/engine/agents.rs
//! Agent registry
//!
//! Maps each agent to its behavior manager and an in-flight flag. The flag
//! is claimed when a decision task is submitted and released when the task
//! finishes, panics or is abandoned, so an agent never has two decision
//! tasks alive at once and its actions reach the queue in order.
//!
//! The flag belongs to the agent id, not to the entry: re-registering or
//! removing an agent while its task runs keeps the flag claimed until that
//! task ends.

use crate::behavior::descriptor::BehaviorDescriptor;
use crate::behavior::exclusion::BehaviorPolicy;
use crate::behavior::manager::BehaviorPriorityManager;
use crate::behavior::state::BehaviorStatus;
use crate::utils::errors::Result;
use crate::utils::ids::EntityId;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// One registered agent
pub(crate) struct AgentEntry {
    pub(crate) manager: BehaviorPriorityManager,

    /// Set while a decision task for this agent exists
    in_flight: Arc<AtomicBool>,

    /// Decision tasks submitted
    dispatched: AtomicU64,

    /// Ticks skipped because the previous task was still in flight
    busy_skips: AtomicU64,
}

impl AgentEntry {
    fn new(manager: BehaviorPriorityManager, in_flight: Arc<AtomicBool>) -> Self {
        Self {
            manager,
            in_flight,
            dispatched: AtomicU64::new(0),
            busy_skips: AtomicU64::new(0),
        }
    }

    /// Claim the in-flight flag; `None` if a task is already alive
    pub(crate) fn try_begin(self: &Arc<Self>) -> Option<InFlightGuard> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.dispatched.fetch_add(1, Ordering::Relaxed);
            Some(InFlightGuard {
                entry: Arc::clone(self),
            })
        } else {
            self.busy_skips.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    pub(crate) fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Releases the agent's in-flight flag when dropped
pub(crate) struct InFlightGuard {
    entry: Arc<AgentEntry>,
}

impl InFlightGuard {
    pub(crate) fn manager(&self) -> &BehaviorPriorityManager {
        &self.entry.manager
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.entry.in_flight.store(false, Ordering::Release);
    }
}

/// Diagnostic view of one agent
#[derive(Debug, Clone, Serialize)]
pub struct AgentStatus {
    pub agent: EntityId,
    pub behavior: BehaviorStatus,
    pub in_flight: bool,
    pub dispatched: u64,
    pub busy_skips: u64,
    pub behaviors: usize,
}

/// Concurrent agent registry
pub(crate) struct AgentRegistry {
    agents: DashMap<EntityId, Arc<AgentEntry>>,

    /// In-flight flags by agent; outlive the entries that share them
    flights: DashMap<EntityId, Arc<AtomicBool>>,

    policy: Arc<BehaviorPolicy>,
}

impl AgentRegistry {
    pub(crate) fn new(policy: BehaviorPolicy) -> Self {
        Self {
            agents: DashMap::new(),
            flights: DashMap::new(),
            policy: Arc::new(policy),
        }
    }

    /// Register (or replace) an agent with its behaviors
    pub(crate) fn register(&self, agent: EntityId, behaviors: Vec<BehaviorDescriptor>) -> Result<()> {
        let count = behaviors.len();
        let manager =
            BehaviorPriorityManager::with_behaviors(agent, Arc::clone(&self.policy), behaviors)?;
        let in_flight = Arc::clone(self.flights.entry(agent).or_default().value());
        let entry = Arc::new(AgentEntry::new(manager, in_flight));
        if self.agents.insert(agent, entry).is_some() {
            info!("Agent {} re-registered with {} behaviors", agent, count);
        } else {
            debug!("Agent {} registered with {} behaviors", agent, count);
        }
        Ok(())
    }

    pub(crate) fn remove(&self, agent: EntityId) -> bool {
        let removed = self.agents.remove(&agent).is_some();
        // A running task keeps its flag so a later registration waits for it
        self.flights
            .remove_if(&agent, |_, flag| !flag.load(Ordering::Acquire));
        if removed {
            debug!("Agent {} removed", agent);
        }
        removed
    }

    pub(crate) fn status(&self, agent: EntityId) -> Option<AgentStatus> {
        let entry = self.agents.get(&agent)?;
        Some(AgentStatus {
            agent,
            behavior: entry.manager.status(),
            in_flight: entry.is_in_flight(),
            dispatched: entry.dispatched.load(Ordering::Relaxed),
            busy_skips: entry.busy_skips.load(Ordering::Relaxed),
            behaviors: entry.manager.len(),
        })
    }

    /// Registered agents in id order
    pub(crate) fn entries(&self) -> Vec<(EntityId, Arc<AgentEntry>)> {
        let mut entries: Vec<_> = self
            .agents
            .iter()
            .map(|e| (*e.key(), Arc::clone(e.value())))
            .collect();
        entries.sort_unstable_by_key(|(id, _)| *id);
        entries
    }

    /// Decision tasks that have not finished yet, removed agents included
    pub(crate) fn in_flight(&self) -> usize {
        self.flights
            .retain(|agent, flag| flag.load(Ordering::Acquire) || self.agents.contains_key(agent));
        self.flights
            .iter()
            .filter(|flag| flag.load(Ordering::Acquire))
            .count()
    }

    pub(crate) fn len(&self) -> usize {
        self.agents.len()
    }
}
