// src/runtime/work_stealing.rs
//! Priority-tiered work-stealing queues
//!
//! Every tier has its own set of queues:
//!
//! ```text
//!              submit()                        submit(affinity = w)
//!                 │                                    │
//!        Global Injector [tier]              Inbox Injector [w][tier]
//!                 │ batch                              │ batch
//!                 ▼                                    ▼
//!   Worker 0 deque[tier]   Worker 1 deque[tier]   ...  Worker w deque[tier]
//!        ▲                      │
//!        └────── Steal ─────────┘
//! ```
//!
//! A worker looks for work in this order, walking tiers from Critical to
//! Idle at each step: its own deque, its inbox, the global injector, and
//! finally peers' deques and inboxes, starting at a random peer and going
//! round-robin. Refills from injectors move a bounded batch into the local
//! deque, which keeps local deques short enough to stay stealable.
//!
//! Every `starvation_guard_interval`-th lookup walks the tiers from Idle
//! to Critical instead, so a steady stream of urgent work cannot starve
//! the low tiers forever.

use crate::runtime::task::{Task, TaskPriority};
use crossbeam::deque::{Injector, Steal, Stealer, Worker};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::trace;

const TIERS: usize = TaskPriority::COUNT;

/// Where a task was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TaskSource {
    Local,
    Inbox,
    Global,
    Stolen,
}

/// Queues shared by all workers
pub(crate) struct WorkStealingScheduler {
    /// Global task queues, one per tier
    global: [Injector<Task>; TIERS],

    /// Per-worker affinity inboxes
    inboxes: Vec<[Injector<Task>; TIERS]>,

    /// Stealers for each worker's local deques
    stealers: Vec<[Stealer<Task>; TIERS]>,

    /// Tasks queued anywhere and not yet taken
    pending: AtomicUsize,

    /// Max tasks moved from an injector into a local deque at once
    batch_limit: usize,

    /// Every n-th lookup walks tiers lowest-first (0 disables)
    starvation_guard_interval: u64,

    num_workers: usize,
}

/// Queues owned by one worker thread
pub(crate) struct LocalQueues {
    worker_id: usize,
    deques: [Worker<Task>; TIERS],
    lookups: u64,
    rng: SmallRng,
}

impl LocalQueues {
    pub(crate) fn worker_id(&self) -> usize {
        self.worker_id
    }
}

impl WorkStealingScheduler {
    /// Create the shared queues plus one set of local queues per worker
    pub(crate) fn new(
        num_workers: usize,
        batch_limit: usize,
        starvation_guard_interval: u64,
    ) -> (Self, Vec<LocalQueues>) {
        let mut locals = Vec::with_capacity(num_workers);
        let mut stealers = Vec::with_capacity(num_workers);

        for worker_id in 0..num_workers {
            let deques: [Worker<Task>; TIERS] = std::array::from_fn(|_| Worker::new_fifo());
            stealers.push(std::array::from_fn(|tier| deques[tier].stealer()));
            locals.push(LocalQueues {
                worker_id,
                deques,
                lookups: 0,
                rng: SmallRng::from_entropy(),
            });
        }

        let scheduler = Self {
            global: std::array::from_fn(|_| Injector::new()),
            inboxes: (0..num_workers)
                .map(|_| std::array::from_fn(|_| Injector::new()))
                .collect(),
            stealers,
            pending: AtomicUsize::new(0),
            batch_limit: batch_limit.max(1),
            starvation_guard_interval,
            num_workers,
        };

        (scheduler, locals)
    }

    /// Queue a task (global queue, or the preferred worker's inbox)
    pub(crate) fn push(&self, task: Task) {
        let tier = task.priority.index();
        // Count before publishing so a worker never sees a task it cannot account for.
        self.pending.fetch_add(1, Ordering::SeqCst);
        match task.affinity {
            Some(worker) => {
                trace!("Queueing {} for worker {}", task.id, worker % self.num_workers);
                self.inboxes[worker % self.num_workers][tier].push(task);
            }
            None => {
                trace!("Queueing {} on global {} queue", task.id, task.priority.as_str());
                self.global[tier].push(task);
            }
        }
    }

    /// Tasks queued and not yet taken by a worker
    pub(crate) fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Find the next task for a worker (with work stealing)
    pub(crate) fn next_task(&self, local: &mut LocalQueues) -> Option<(Task, TaskSource)> {
        local.lookups = local.lookups.wrapping_add(1);
        let lowest_first = self.starvation_guard_interval > 0
            && local.lookups % self.starvation_guard_interval == 0;

        let found = self
            .take_own(local, lowest_first)
            .or_else(|| self.steal_from_others(local, lowest_first));

        if found.is_some() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
        }
        found
    }

    fn take_own(&self, local: &LocalQueues, lowest_first: bool) -> Option<(Task, TaskSource)> {
        for tier in tier_order(lowest_first) {
            let deque = &local.deques[tier];

            if let Some(task) = deque.pop() {
                return Some((task, TaskSource::Local));
            }
            if let Some(task) = self.refill(&self.inboxes[local.worker_id][tier], deque) {
                return Some((task, TaskSource::Inbox));
            }
            if let Some(task) = self.refill(&self.global[tier], deque) {
                return Some((task, TaskSource::Global));
            }
        }
        None
    }

    /// Move a bounded batch from `injector` into `deque`, returning one task
    fn refill(&self, injector: &Injector<Task>, deque: &Worker<Task>) -> Option<Task> {
        loop {
            match injector.steal_batch_with_limit_and_pop(deque, self.batch_limit) {
                Steal::Success(task) => return Some(task),
                Steal::Empty => return None,
                Steal::Retry => continue,
            }
        }
    }

    /// Try to steal a task from other workers
    fn steal_from_others(
        &self,
        local: &mut LocalQueues,
        lowest_first: bool,
    ) -> Option<(Task, TaskSource)> {
        if self.num_workers < 2 {
            return None;
        }
        let me = local.worker_id;
        let start = local.rng.gen_range(0..self.num_workers);

        for tier in tier_order(lowest_first) {
            for offset in 0..self.num_workers {
                let peer = (start + offset) % self.num_workers;
                if peer == me {
                    continue;
                }
                if let Some(task) = steal_one(&self.stealers[peer][tier]) {
                    trace!("Worker {} stole {} from worker {}", me, task.id, peer);
                    return Some((task, TaskSource::Stolen));
                }
                // Affinity is a hint: a busy or parked owner must not strand its inbox.
                if let Some(task) = self.refill(&self.inboxes[peer][tier], &local.deques[tier]) {
                    trace!("Worker {} took {} from worker {}'s inbox", me, task.id, peer);
                    return Some((task, TaskSource::Stolen));
                }
            }
        }
        None
    }

    /// Drop every task still sitting in a shared queue
    ///
    /// Only called once all workers have exited. Tasks in local deques are
    /// dropped with their worker.
    pub(crate) fn abandon_all(&self) -> usize {
        let mut dropped = 0;
        for injector in self.global.iter().chain(self.inboxes.iter().flatten()) {
            loop {
                match injector.steal() {
                    Steal::Success(task) => {
                        drop(task);
                        dropped += 1;
                    }
                    Steal::Empty => break,
                    Steal::Retry => continue,
                }
            }
        }
        let pending = self.pending.swap(0, Ordering::SeqCst);
        pending.max(dropped)
    }

    /// Snapshot of queue lengths
    pub(crate) fn stats(&self) -> QueueStats {
        let global: usize = self.global.iter().map(Injector::len).sum();
        let inboxes: usize = self
            .inboxes
            .iter()
            .flat_map(|tiers| tiers.iter())
            .map(Injector::len)
            .sum();
        let per_tier = std::array::from_fn(|tier| {
            self.global[tier].len()
                + self.inboxes.iter().map(|inbox| inbox[tier].len()).sum::<usize>()
        });

        QueueStats {
            pending: self.pending(),
            global,
            inboxes,
            injected_per_tier: per_tier,
        }
    }
}

/// Queue length statistics
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    /// Tasks submitted and not yet started
    pub pending: usize,

    /// Tasks in the global injectors
    pub global: usize,

    /// Tasks in affinity inboxes
    pub inboxes: usize,

    /// Injector-resident tasks per tier (excludes local deques)
    pub injected_per_tier: [usize; TIERS],
}

fn tier_order(lowest_first: bool) -> impl Iterator<Item = usize> {
    (0..TIERS).map(move |i| if lowest_first { TIERS - 1 - i } else { i })
}

fn steal_one(stealer: &Stealer<Task>) -> Option<Task> {
    loop {
        match stealer.steal() {
            Steal::Success(task) => return Some(task),
            Steal::Empty => return None,
            Steal::Retry => continue,
        }
    }
}
