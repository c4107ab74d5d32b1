// src/runtime/thread_pool.rs
//! Fixed-size worker pool running decision tasks
//!
//! # Architecture
//!
//! ```text
//! ThreadPool
//! ├─ Workers: [botcore-worker-0, botcore-worker-1, ...]  (OS threads)
//! ├─ Scheduler: per-tier global queues + per-worker deques (work stealing)
//! └─ IdleGate: parks idle workers, at most W-1 at a time
//! ```
//!
//! Tasks are closures; a panicking task is caught at the pool boundary,
//! logged with its id and label, and reported through its handle. The
//! worker survives and moves on to the next task.

use crate::observability::metrics as names;
use crate::runtime::idle::IdleGate;
use crate::runtime::task::{panic_message, Task, TaskHandle, TaskOutcome, TaskPriority};
use crate::runtime::work_stealing::{LocalQueues, QueueStats, TaskSource, WorkStealingScheduler};
use crate::utils::errors::{CoreError, Result};
use crate::utils::ids::TaskId;
use crossbeam::utils::Backoff;
use metrics::{counter, gauge, histogram};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Configuration for the worker pool
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Requested worker count (default: available parallelism)
    pub worker_count: Option<usize>,

    /// Floor on the worker count, applied after auto-detection
    pub min_workers: usize,

    /// Longest a parked worker sleeps before re-checking (milliseconds)
    pub idle_sleep_ms: u64,

    /// Nap taken by the always-awake worker between polls (microseconds)
    pub poll_interval_us: u64,

    /// Max tasks moved from a shared queue into a local deque at once
    pub local_batch_limit: usize,

    /// Backlog above `worker_count × saturation_multiplier` is saturation
    pub saturation_multiplier: usize,

    /// Every n-th lookup serves the lowest tier first (0 disables)
    pub starvation_guard_interval: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: None,
            min_workers: 2,
            idle_sleep_ms: 5,
            poll_interval_us: 200,
            local_batch_limit: 16,
            saturation_multiplier: 128,
            starvation_guard_interval: 32,
        }
    }
}

impl PoolConfig {
    /// Worker count after auto-detection and the floor
    pub fn effective_workers(&self) -> usize {
        let requested = self.worker_count.unwrap_or_else(|| {
            thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });
        requested.max(self.min_workers).max(1)
    }

    /// Backlog above which the pool reports saturation
    pub fn saturation_limit(&self) -> usize {
        self.effective_workers() * self.saturation_multiplier
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_workers == 0 {
            return Err(CoreError::InvalidConfig(
                "pool.min_workers must be at least 1".into(),
            ));
        }
        if self.worker_count == Some(0) {
            return Err(CoreError::InvalidConfig(
                "pool.worker_count must be at least 1 when set".into(),
            ));
        }
        if self.idle_sleep_ms == 0 {
            return Err(CoreError::InvalidConfig(
                "pool.idle_sleep_ms must be at least 1".into(),
            ));
        }
        if self.local_batch_limit == 0 {
            return Err(CoreError::InvalidConfig(
                "pool.local_batch_limit must be at least 1".into(),
            ));
        }
        if self.saturation_multiplier == 0 {
            return Err(CoreError::InvalidConfig(
                "pool.saturation_multiplier must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// State shared between the pool handle and its workers
struct PoolShared {
    scheduler: WorkStealingScheduler,
    idle: IdleGate,
    shutdown: AtomicBool,
    saturated: AtomicBool,
    saturation_limit: usize,
    idle_sleep: Duration,
    poll_interval: Duration,
    next_id: AtomicU64,
    counters: PoolCounters,
}

#[derive(Default)]
struct PoolCounters {
    submitted: AtomicU64,
    completed: AtomicU64,
    panicked: AtomicU64,
    stolen: AtomicU64,
}

/// Work-stealing thread pool
pub struct ThreadPool {
    shared: Arc<PoolShared>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
}

impl ThreadPool {
    /// Spawn the workers
    pub fn new(config: PoolConfig) -> Result<Self> {
        config.validate()?;
        let worker_count = config.effective_workers();

        info!("Initializing thread pool with {} workers", worker_count);

        let (scheduler, locals) = WorkStealingScheduler::new(
            worker_count,
            config.local_batch_limit,
            config.starvation_guard_interval,
        );

        let shared = Arc::new(PoolShared {
            scheduler,
            idle: IdleGate::new(worker_count),
            shutdown: AtomicBool::new(false),
            saturated: AtomicBool::new(false),
            saturation_limit: config.saturation_limit(),
            idle_sleep: Duration::from_millis(config.idle_sleep_ms),
            poll_interval: Duration::from_micros(config.poll_interval_us),
            next_id: AtomicU64::new(1),
            counters: PoolCounters::default(),
        });

        let pool = Self {
            shared,
            handles: Mutex::new(Vec::with_capacity(worker_count)),
            worker_count,
        };

        for local in locals {
            let shared = Arc::clone(&pool.shared);
            let name = format!("botcore-worker-{}", local.worker_id());
            let spawned = thread::Builder::new()
                .name(name)
                .spawn(move || run_worker(shared, local));

            match spawned {
                Ok(handle) => pool.handles.lock().push(handle),
                Err(e) => {
                    warn!("Failed to spawn worker thread: {}", e);
                    pool.shutdown();
                    return Err(e.into());
                }
            }
        }

        debug!(
            "Thread pool ready (saturation limit {} tasks)",
            pool.shared.saturation_limit
        );
        Ok(pool)
    }

    /// Submit a task
    pub fn submit(&self, mut task: Task) -> Result<TaskHandle> {
        if self.shared.shutdown.load(Ordering::Acquire) {
            return Err(CoreError::PoolShutdown);
        }

        let id = TaskId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        let (handle, completion) = TaskHandle::channel(id);
        task.id = id;
        task.completion = Some(completion);
        task.submitted_at = std::time::Instant::now();

        self.shared.scheduler.push(task);
        if self.shared.shutdown.load(Ordering::Acquire) {
            // Raced with shutdown: nobody will run it.
            self.shared.scheduler.abandon_all();
            return Ok(handle);
        }
        self.shared.counters.submitted.fetch_add(1, Ordering::Relaxed);
        counter!(names::TASKS_SUBMITTED).increment(1);

        self.shared.idle.notify_one();
        self.update_saturation();

        Ok(handle)
    }

    /// Submit a closure at the given priority
    pub fn spawn<F>(&self, priority: TaskPriority, job: F) -> Result<TaskHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(Task::new(job).with_priority(priority))
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Tasks submitted but not yet started
    pub fn queued(&self) -> usize {
        self.shared.scheduler.pending()
    }

    /// Whether the backlog currently exceeds the saturation limit
    pub fn is_saturated(&self) -> bool {
        self.update_saturation()
    }

    pub fn saturation_limit(&self) -> usize {
        self.shared.saturation_limit
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.shutdown.load(Ordering::Acquire)
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStats {
        let counters = &self.shared.counters;
        PoolStats {
            worker_count: self.worker_count,
            queued: self.queued(),
            sleeping_workers: self.shared.idle.sleeping(),
            submitted: counters.submitted.load(Ordering::Relaxed),
            completed: counters.completed.load(Ordering::Relaxed),
            panicked: counters.panicked.load(Ordering::Relaxed),
            stolen: counters.stolen.load(Ordering::Relaxed),
            saturated: self.shared.saturated.load(Ordering::Relaxed),
            queues: self.shared.scheduler.stats(),
        }
    }

    /// Stop the workers; queued tasks are abandoned
    ///
    /// Tasks already running finish first. Idempotent.
    pub fn shutdown(&self) {
        if self.shared.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Shutting down thread pool");

        self.shared.idle.notify_all();

        let handles: Vec<JoinHandle<()>> = self.handles.lock().drain(..).collect();
        for handle in handles {
            if handle.join().is_err() {
                error!("Worker thread exited abnormally");
            }
        }

        // Dropping the tasks drops their completion senders, so every
        // outstanding handle resolves to `Abandoned`.
        let abandoned = self.shared.scheduler.abandon_all();
        if abandoned > 0 {
            warn!("{} queued tasks abandoned at shutdown", abandoned);
        }
        gauge!(names::TASK_QUEUE_DEPTH).set(0.0);
    }

    fn update_saturation(&self) -> bool {
        let queued = self.queued();
        let saturated = queued > self.shared.saturation_limit;
        let was = self.shared.saturated.swap(saturated, Ordering::Relaxed);

        gauge!(names::TASK_QUEUE_DEPTH).set(queued as f64);
        if saturated != was {
            gauge!(names::POOL_SATURATED).set(if saturated { 1.0 } else { 0.0 });
            if saturated {
                warn!(
                    "Thread pool saturated: {} queued tasks (limit {})",
                    queued, self.shared.saturation_limit
                );
            } else {
                debug!("Thread pool backlog recovered: {} queued tasks", queued);
            }
        }
        saturated
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Pool statistics
#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    pub worker_count: usize,
    pub queued: usize,
    pub sleeping_workers: usize,
    pub submitted: u64,
    pub completed: u64,
    pub panicked: u64,
    pub stolen: u64,
    pub saturated: bool,
    pub queues: QueueStats,
}

fn run_worker(shared: Arc<PoolShared>, mut local: LocalQueues) {
    let worker_id = local.worker_id();
    let backoff = Backoff::new();
    debug!("Worker {} started", worker_id);

    loop {
        if shared.shutdown.load(Ordering::Acquire) {
            break;
        }

        if let Some((task, source)) = shared.scheduler.next_task(&mut local) {
            backoff.reset();
            if source == TaskSource::Stolen {
                shared.counters.stolen.fetch_add(1, Ordering::Relaxed);
                counter!(names::TASKS_STOLEN).increment(1);
            }
            execute(&shared, task, worker_id);
            continue;
        }

        if shared.idle.try_begin_sleep() {
            shared.idle.sleep(shared.idle_sleep, || {
                shared.scheduler.pending() > 0 || shared.shutdown.load(Ordering::Acquire)
            });
        } else if backoff.is_completed() {
            // Designated poller: stay awake, but do not spin hot.
            thread::sleep(shared.poll_interval);
        } else {
            backoff.snooze();
        }
    }

    debug!("Worker {} stopped", worker_id);
}

fn execute(shared: &PoolShared, task: Task, worker_id: usize) {
    let Task {
        id,
        priority,
        label,
        job,
        completion,
        submitted_at,
        ..
    } = task;

    histogram!(names::TASK_LATENCY).record(submitted_at.elapsed().as_secs_f64());

    let outcome = match panic::catch_unwind(AssertUnwindSafe(job)) {
        Ok(()) => {
            shared.counters.completed.fetch_add(1, Ordering::Relaxed);
            counter!(names::TASKS_COMPLETED).increment(1);
            TaskOutcome::Completed
        }
        Err(payload) => {
            let message = panic_message(&*payload);
            shared.counters.panicked.fetch_add(1, Ordering::Relaxed);
            counter!(names::TASKS_PANICKED).increment(1);
            error!(
                task = %id,
                label = label.as_deref().unwrap_or("-"),
                priority = priority.as_str(),
                worker = worker_id,
                "Task panicked: {}",
                message
            );
            TaskOutcome::Panicked(message)
        }
    };

    if let Some(completion) = completion {
        // The handle may have been dropped; nobody is waiting then.
        let _ = completion.send(outcome);
    }
}
