// src/observability/metrics.rs
//! Metric names emitted by the core

use ::metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

pub const TASKS_SUBMITTED: &str = "botcore_pool_tasks_submitted_total";
pub const TASKS_COMPLETED: &str = "botcore_pool_tasks_completed_total";
pub const TASKS_PANICKED: &str = "botcore_pool_tasks_panicked_total";
pub const TASKS_STOLEN: &str = "botcore_pool_tasks_stolen_total";
pub const TASK_QUEUE_DEPTH: &str = "botcore_pool_queue_depth";
pub const POOL_SATURATED: &str = "botcore_pool_saturated";
pub const SLEEPING_WORKERS: &str = "botcore_pool_sleeping_workers";
pub const TASK_LATENCY: &str = "botcore_pool_task_start_latency_seconds";

pub const SNAPSHOT_VERSION: &str = "botcore_snapshot_version";
pub const SNAPSHOT_ENTITIES: &str = "botcore_snapshot_entities";

pub const ACTIONS_ENQUEUED: &str = "botcore_actions_enqueued_total";
pub const ACTIONS_REJECTED: &str = "botcore_actions_rejected_total";
pub const ACTIONS_APPLIED: &str = "botcore_actions_applied_total";
pub const ACTIONS_DROPPED: &str = "botcore_actions_dropped_total";
pub const ACTIONS_FAILED: &str = "botcore_actions_failed_total";
pub const ACTION_QUEUE_DEPTH: &str = "botcore_action_queue_depth";

pub const DISPATCH_SKIPPED: &str = "botcore_dispatch_skipped_total";
pub const AGENTS_DISPATCHED: &str = "botcore_agents_dispatched_total";
pub const AGENTS_BUSY: &str = "botcore_agents_busy_total";
pub const BEHAVIORS_EXCLUDED: &str = "botcore_behaviors_excluded_total";

/// Register descriptions with the installed recorder
pub fn describe_all() {
    describe_counter!(TASKS_SUBMITTED, "Tasks accepted by the thread pool");
    describe_counter!(TASKS_COMPLETED, "Tasks that ran to completion");
    describe_counter!(TASKS_PANICKED, "Tasks that panicked and were abandoned");
    describe_counter!(TASKS_STOLEN, "Tasks taken from a peer worker's deque");
    describe_gauge!(TASK_QUEUE_DEPTH, "Tasks queued but not yet started");
    describe_gauge!(POOL_SATURATED, "1 while the task backlog exceeds the saturation limit");
    describe_gauge!(SLEEPING_WORKERS, "Workers parked on the wake condition");
    describe_histogram!(
        TASK_LATENCY,
        Unit::Seconds,
        "Delay between submission and first execution"
    );

    describe_gauge!(SNAPSHOT_VERSION, "Version of the currently published snapshot");
    describe_gauge!(SNAPSHOT_ENTITIES, "Entities in the currently published snapshot");

    describe_counter!(ACTIONS_ENQUEUED, "Actions accepted by the action queue");
    describe_counter!(ACTIONS_REJECTED, "Actions refused because the queue was full");
    describe_counter!(ACTIONS_APPLIED, "Actions applied to live world state");
    describe_counter!(ACTIONS_DROPPED, "Actions dropped at apply time, by reason");
    describe_counter!(ACTIONS_FAILED, "Actions whose host mutation returned an error");
    describe_gauge!(ACTION_QUEUE_DEPTH, "Actions waiting for the authoritative thread");

    describe_counter!(DISPATCH_SKIPPED, "Ticks whose decision dispatch was skipped, by reason");
    describe_counter!(AGENTS_DISPATCHED, "Decision tasks submitted for agents");
    describe_counter!(AGENTS_BUSY, "Agents skipped because their previous task was in flight");
    describe_counter!(BEHAVIORS_EXCLUDED, "Candidate behaviors suppressed by an exclusion rule");
}
