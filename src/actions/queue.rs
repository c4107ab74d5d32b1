// src/actions/queue.rs
//! Lock-free action queue
//!
//! Many workers push, the authoritative thread pops. Backed by a bounded
//! `ArrayQueue`: pushes never block and fail once the queue is at
//! capacity, in which case the action is dropped and counted.
//!
//! Pushes from one decision task happen in program order, and an agent is
//! never dispatched while its previous task is still running, so one
//! agent's actions leave the queue in the order they were emitted.

use crate::actions::action::{Action, ActionKind};
use crate::observability::metrics as names;
use crate::snapshot::model::Position;
use crate::utils::ids::EntityId;
use bytes::Bytes;
use crossbeam::queue::ArrayQueue;
use metrics::counter;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// Lock-free MPSC action queue
pub struct ActionQueue {
    /// Underlying bounded queue
    queue: ArrayQueue<Action>,

    /// Next submission sequence number
    sequence: AtomicU64,

    /// Actions accepted
    enqueued: AtomicU64,

    /// Actions taken by the processor
    dequeued: AtomicU64,

    /// Actions refused (queue full)
    rejected: AtomicU64,
}

impl ActionQueue {
    /// Create a new action queue
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity.max(1)),
            sequence: AtomicU64::new(0),
            enqueued: AtomicU64::new(0),
            dequeued: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Push an action (non-blocking); `false` means it was dropped
    pub fn enqueue(&self, action: Action) -> bool {
        match self.queue.push(action) {
            Ok(()) => {
                self.enqueued.fetch_add(1, Ordering::Relaxed);
                counter!(names::ACTIONS_ENQUEUED).increment(1);
                true
            }
            Err(action) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                counter!(names::ACTIONS_REJECTED).increment(1);
                trace!(
                    "Action queue full, dropping {} from {}",
                    action.kind().name(),
                    action.agent()
                );
                false
            }
        }
    }

    /// Pop the oldest action; only the processor consumes
    pub(crate) fn pop(&self) -> Option<Action> {
        let action = self.queue.pop()?;
        self.dequeued.fetch_add(1, Ordering::Relaxed);
        Some(action)
    }

    /// Reserve the next submission sequence number
    pub fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    /// Get queue statistics
    pub fn stats(&self) -> ActionQueueStats {
        ActionQueueStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dequeued: self.dequeued.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            current_size: self.queue.len(),
            capacity: self.queue.capacity(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }

    /// Get current queue length
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}

/// Queue statistics
#[derive(Debug, Clone, Serialize)]
pub struct ActionQueueStats {
    /// Total actions accepted
    pub enqueued: u64,

    /// Total actions handed to the processor
    pub dequeued: u64,

    /// Total actions dropped because the queue was full
    pub rejected: u64,

    /// Current queue size
    pub current_size: usize,

    /// Queue capacity
    pub capacity: usize,
}

impl ActionQueueStats {
    /// Calculate fill percentage
    pub fn fill_percentage(&self) -> f64 {
        (self.current_size as f64 / self.capacity as f64) * 100.0
    }

    /// Calculate rejection rate
    pub fn rejection_rate(&self) -> f64 {
        let attempts = self.enqueued + self.rejected;
        if attempts == 0 {
            0.0
        } else {
            (self.rejected as f64 / attempts as f64) * 100.0
        }
    }
}

/// Emits actions on behalf of one agent during one decision task
///
/// Stamps every action with the agent, the snapshot tick and a queue
/// sequence number, so decision logic only states intent.
pub struct ActionSink<'a> {
    queue: &'a ActionQueue,
    agent: EntityId,
    tick: u64,
    emitted: u32,
    dropped: u32,
}

impl<'a> ActionSink<'a> {
    pub fn new(queue: &'a ActionQueue, agent: EntityId, tick: u64) -> Self {
        Self {
            queue,
            agent,
            tick,
            emitted: 0,
            dropped: 0,
        }
    }

    /// Emit an action; `false` if the queue refused it
    pub fn emit(&mut self, kind: ActionKind, target: Option<EntityId>, payload: Bytes) -> bool {
        let action = Action::new(
            self.agent,
            kind,
            target,
            payload,
            self.tick,
            self.queue.next_sequence(),
        );
        let accepted = self.queue.enqueue(action);
        if accepted {
            self.emitted += 1;
        } else {
            self.dropped += 1;
        }
        accepted
    }

    pub fn move_to(&mut self, to: Position) -> bool {
        self.emit(ActionKind::Move { to }, None, Bytes::new())
    }

    pub fn attack(&mut self, target: EntityId) -> bool {
        self.emit(ActionKind::Attack, Some(target), Bytes::new())
    }

    pub fn cast(&mut self, ability: u32, target: Option<EntityId>) -> bool {
        self.emit(ActionKind::Cast { ability }, target, Bytes::new())
    }

    pub fn follow(&mut self, leader: EntityId) -> bool {
        self.emit(ActionKind::Follow, Some(leader), Bytes::new())
    }

    pub fn interact(&mut self, target: EntityId) -> bool {
        self.emit(ActionKind::Interact, Some(target), Bytes::new())
    }

    pub fn custom(&mut self, code: u16, target: Option<EntityId>, payload: Bytes) -> bool {
        self.emit(ActionKind::Custom { code }, target, payload)
    }

    pub fn agent(&self) -> EntityId {
        self.agent
    }

    /// Actions accepted by the queue so far
    pub fn emitted(&self) -> u32 {
        self.emitted
    }

    /// Actions refused by the queue so far
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}
