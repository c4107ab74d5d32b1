// src/runtime/task.rs
//! Tasks, priorities and completion handles
//!
//! A [`Task`] is moved from the submitter into exactly one queue and from
//! there into exactly one worker; it is never shared. Its outcome travels
//! back over a one-shot `crossbeam-channel` to the [`TaskHandle`].

use crate::utils::ids::TaskId;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Boxed unit of work
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Scheduling tier, most urgent first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Critical,
    High,
    Normal,
    Low,
    Idle,
}

impl TaskPriority {
    /// Number of tiers
    pub const COUNT: usize = 5;

    /// All tiers, most urgent first
    pub const ALL: [TaskPriority; Self::COUNT] = [
        TaskPriority::Critical,
        TaskPriority::High,
        TaskPriority::Normal,
        TaskPriority::Low,
        TaskPriority::Idle,
    ];

    /// Queue slot for this tier (0 = most urgent)
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskPriority::Critical => "critical",
            TaskPriority::High => "high",
            TaskPriority::Normal => "normal",
            TaskPriority::Low => "low",
            TaskPriority::Idle => "idle",
        }
    }
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Normal
    }
}

/// How a task ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The closure returned normally
    Completed,

    /// The closure panicked; the message is kept for diagnostics
    Panicked(String),

    /// The task was dropped before running (pool shut down)
    Abandoned,
}

/// A unit of work waiting to be scheduled
pub struct Task {
    pub(crate) id: TaskId,
    pub(crate) priority: TaskPriority,
    pub(crate) affinity: Option<usize>,
    pub(crate) label: Option<String>,
    pub(crate) job: Job,
    pub(crate) completion: Option<Sender<TaskOutcome>>,
    pub(crate) submitted_at: Instant,
}

impl Task {
    /// Wrap a closure as a normal-priority task
    pub fn new<F>(job: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            id: TaskId(0),
            priority: TaskPriority::Normal,
            affinity: None,
            label: None,
            job: Box::new(job),
            completion: None,
            submitted_at: Instant::now(),
        }
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Prefer running on this worker (taken modulo the worker count)
    pub fn with_affinity(mut self, worker: usize) -> Self {
        self.affinity = Some(worker);
        self
    }

    /// Identity reported in logs if the task panics
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn priority(&self) -> TaskPriority {
        self.priority
    }

    pub fn affinity(&self) -> Option<usize> {
        self.affinity
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("affinity", &self.affinity)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Handle to a submitted task
#[derive(Debug)]
pub struct TaskHandle {
    id: TaskId,
    receiver: Receiver<TaskOutcome>,
    outcome: OnceCell<TaskOutcome>,
}

impl TaskHandle {
    /// Create the handle and the sender the worker reports through
    pub(crate) fn channel(id: TaskId) -> (Self, Sender<TaskOutcome>) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let handle = Self {
            id,
            receiver: rx,
            outcome: OnceCell::new(),
        };
        (handle, tx)
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Non-blocking check for the outcome
    pub fn poll(&self) -> Option<&TaskOutcome> {
        if let Some(outcome) = self.outcome.get() {
            return Some(outcome);
        }
        match self.receiver.try_recv() {
            Ok(outcome) => Some(self.outcome.get_or_init(|| outcome)),
            Err(TryRecvError::Disconnected) => {
                Some(self.outcome.get_or_init(|| TaskOutcome::Abandoned))
            }
            Err(TryRecvError::Empty) => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.poll().is_some()
    }

    /// Block until the task ends
    pub fn wait(&self) -> TaskOutcome {
        if let Some(outcome) = self.outcome.get() {
            return outcome.clone();
        }
        let outcome = self.receiver.recv().unwrap_or(TaskOutcome::Abandoned);
        self.outcome.get_or_init(|| outcome).clone()
    }

    /// Block for at most `timeout`; `None` if the task is still pending
    pub fn wait_timeout(&self, timeout: Duration) -> Option<TaskOutcome> {
        if let Some(outcome) = self.outcome.get() {
            return Some(outcome.clone());
        }
        match self.receiver.recv_timeout(timeout) {
            Ok(outcome) => Some(self.outcome.get_or_init(|| outcome).clone()),
            Err(RecvTimeoutError::Disconnected) => {
                Some(self.outcome.get_or_init(|| TaskOutcome::Abandoned).clone())
            }
            Err(RecvTimeoutError::Timeout) => None,
        }
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        assert!(TaskPriority::Critical < TaskPriority::Idle);
        for (i, tier) in TaskPriority::ALL.iter().enumerate() {
            assert_eq!(tier.index(), i);
        }
        assert_eq!(TaskPriority::default(), TaskPriority::Normal);
    }

    #[test]
    fn test_task_builder() {
        let task = Task::new(|| {})
            .with_priority(TaskPriority::High)
            .with_affinity(3)
            .with_label("agent-7");
        assert_eq!(task.priority(), TaskPriority::High);
        assert_eq!(task.affinity(), Some(3));
        assert_eq!(task.label(), Some("agent-7"));
    }

    #[test]
    fn test_handle_reports_outcome() {
        let (handle, tx) = TaskHandle::channel(TaskId(1));
        assert!(!handle.is_finished());
        tx.send(TaskOutcome::Completed).unwrap();
        assert_eq!(handle.wait(), TaskOutcome::Completed);
        assert!(handle.is_finished());
    }

    #[test]
    fn test_dropped_sender_means_abandoned() {
        let (handle, tx) = TaskHandle::channel(TaskId(2));
        drop(tx);
        assert_eq!(handle.poll(), Some(&TaskOutcome::Abandoned));
        assert_eq!(
            handle.wait_timeout(Duration::from_millis(1)),
            Some(TaskOutcome::Abandoned)
        );
    }

    #[test]
    fn test_wait_timeout_pending() {
        let (handle, _tx) = TaskHandle::channel(TaskId(3));
        assert_eq!(handle.wait_timeout(Duration::from_millis(5)), None);
    }

    #[test]
    fn test_panic_message() {
        let payload = std::panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_message(&*payload), "boom");
    }
}
