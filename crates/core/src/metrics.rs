//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Dispatch (tasks dispatched, attempts, retries, durations)
//! - Jobs (finished by status)
//! - Node registry (registrations, stale transitions)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Dispatch
// =============================================================================

/// Tasks handed to a node, by node.
pub static TASKS_DISPATCHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("encodefleet_tasks_dispatched_total", "Total task attempts dispatched to a node"),
        &["node"],
    )
    .unwrap()
});

/// Task attempts by outcome.
pub static TASK_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("encodefleet_task_attempts_total", "Total task attempts by result"),
        &["result"], // "succeeded", "transient", "fatal", "timeout", "cancelled"
    )
    .unwrap()
});

/// Retries scheduled after a retryable failure.
pub static RETRIES_SCHEDULED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("encodefleet_retries_scheduled_total", "Total task retries scheduled").unwrap()
});

/// Wall-clock duration of a task, all attempts included.
pub static TASK_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("encodefleet_task_duration_seconds", "Duration of encode tasks")
            .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 300.0, 900.0, 1800.0, 3600.0, 7200.0]),
        &["kind", "result"],
    )
    .unwrap()
});

/// Tasks currently running across all nodes.
pub static TASKS_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("encodefleet_tasks_running", "Tasks currently running").unwrap()
});

// =============================================================================
// Jobs
// =============================================================================

pub static JOBS_SUBMITTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("encodefleet_jobs_submitted_total", "Total jobs accepted for dispatch").unwrap()
});

/// Jobs reaching a terminal status.
pub static JOBS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("encodefleet_jobs_finished_total", "Total jobs finished by status"),
        &["status"],
    )
    .unwrap()
});

// =============================================================================
// Node registry
// =============================================================================

pub static NODE_REGISTRATIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("encodefleet_node_registrations_total", "Total node registrations").unwrap()
});

/// Nodes marked inactive by the stale sweep.
pub static NODES_MARKED_STALE: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "encodefleet_nodes_marked_stale_total",
        "Total nodes marked inactive after missing heartbeats",
    )
    .unwrap()
});

pub static NODES_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("encodefleet_nodes_active", "Nodes currently active").unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Holds a gauge incremented for as long as it lives.
///
/// The decrement happens on drop, so a future cancelled mid-await still
/// releases its count.
#[must_use = "the gauge is decremented as soon as the guard is dropped"]
pub struct GaugeGuard(IntGauge);

impl GaugeGuard {
    pub fn inc(gauge: &IntGauge) -> Self {
        gauge.inc();
        Self(gauge.clone())
    }
}

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.0.dec();
    }
}

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Dispatch
        Box::new(TASKS_DISPATCHED.clone()),
        Box::new(TASK_ATTEMPTS.clone()),
        Box::new(RETRIES_SCHEDULED.clone()),
        Box::new(TASK_DURATION.clone()),
        Box::new(TASKS_RUNNING.clone()),
        // Jobs
        Box::new(JOBS_SUBMITTED.clone()),
        Box::new(JOBS_FINISHED.clone()),
        // Registry
        Box::new(NODE_REGISTRATIONS.clone()),
        Box::new(NODES_MARKED_STALE.clone()),
        Box::new(NODES_ACTIVE.clone()),
    ]
}
