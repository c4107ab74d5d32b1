// src/runtime/idle.rs
//! Idle-worker parking with a wakefulness floor
//!
//! Idle workers park on a condition variable, but never all of them: at
//! most `W - 1` of `W` workers may be parked at once. The last idle worker
//! keeps polling with backoff instead. A check-then-sleep race can
//! otherwise leave every worker parked while a task sits in a queue, and
//! nothing would run it until a timeout fired.
//!
//! Parking itself is bounded by a timeout, so even a lost notification
//! costs at most one sleep interval.

use crate::observability::metrics as names;
use metrics::gauge;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub(crate) struct IdleGate {
    /// Workers currently parked (or about to park)
    sleepers: AtomicUsize,

    /// Upper bound on `sleepers`
    max_sleepers: usize,

    lock: Mutex<()>,
    wake: Condvar,
}

impl IdleGate {
    pub(crate) fn new(worker_count: usize) -> Self {
        Self {
            sleepers: AtomicUsize::new(0),
            max_sleepers: worker_count.saturating_sub(1),
            lock: Mutex::new(()),
            wake: Condvar::new(),
        }
    }

    /// Claim a sleeper slot; `false` means the caller must stay awake
    pub(crate) fn try_begin_sleep(&self) -> bool {
        let mut current = self.sleepers.load(Ordering::SeqCst);
        loop {
            if current >= self.max_sleepers {
                return false;
            }
            match self.sleepers.compare_exchange_weak(
                current,
                current + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => {
                    gauge!(names::SLEEPING_WORKERS).set((current + 1) as f64);
                    return true;
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Park for at most `timeout` unless `ready` already holds
    ///
    /// Must follow a successful [`try_begin_sleep`](Self::try_begin_sleep);
    /// releases the slot on return.
    pub(crate) fn sleep(&self, timeout: Duration, ready: impl Fn() -> bool) {
        {
            let mut guard = self.lock.lock();
            // Re-checked under the lock: a submitter that saw us as a
            // sleeper must take the lock before notifying.
            if !ready() {
                self.wake.wait_for(&mut guard, timeout);
            }
        }
        let remaining = self.sleepers.fetch_sub(1, Ordering::SeqCst) - 1;
        gauge!(names::SLEEPING_WORKERS).set(remaining as f64);
    }

    /// Wake one parked worker, if any
    pub(crate) fn notify_one(&self) {
        if self.sleepers.load(Ordering::SeqCst) > 0 {
            let _guard = self.lock.lock();
            self.wake.notify_one();
        }
    }

    pub(crate) fn notify_all(&self) {
        let _guard = self.lock.lock();
        self.wake.notify_all();
    }

    pub(crate) fn sleeping(&self) -> usize {
        self.sleepers.load(Ordering::SeqCst)
    }

    pub(crate) fn max_sleepers(&self) -> usize {
        self.max_sleepers
    }
}
