//! Prometheus metrics for the delivery pipeline.
//!
//! The callback surface follows the `{provider}.{canonical_status}` naming
//! of the delivery-receipt pipeline: one counter and one elapsed-time
//! histogram, labelled by provider and canonical status.

mod helpers;

pub use helpers::{encode_metrics, CallbackMetrics, DispatchMetrics, TaskMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    HistogramVec, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "notify";

lazy_static! {
    // ============================================================================
    // Callback Reconciliation Metrics
    // ============================================================================

    /// Callback outcomes by provider and canonical status
    pub static ref CALLBACK_STATUS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_callback_status_total", METRIC_PREFIX),
        "Provider callbacks reconciled, by provider and canonical status",
        &["provider", "status"]
    ).unwrap();

    /// Time between dispatch and the callback that settled the status
    pub static ref CALLBACK_ELAPSED_SECONDS: HistogramVec = register_histogram_vec!(
        format!("{}_callback_elapsed_seconds", METRIC_PREFIX),
        "Elapsed time between sent_at and the status-settling callback",
        &["provider", "status"],
        vec![1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 3600.0, 14400.0, 86400.0]
    ).unwrap();

    /// Callbacks whose reference matched no notification (foreign/test traffic)
    pub static ref CALLBACK_UNMATCHED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_callback_unmatched_total", METRIC_PREFIX),
        "Callbacks that referenced no known notification",
        &["provider"]
    ).unwrap();

    /// Callbacks accepted at the HTTP boundary
    pub static ref CALLBACKS_RECEIVED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_callbacks_received_total", METRIC_PREFIX),
        "Provider callbacks accepted at the boundary",
        &["provider"]
    ).unwrap();

    // ============================================================================
    // Dispatch Metrics
    // ============================================================================

    /// Dispatch outcomes by provider and resulting status
    pub static ref DISPATCH_STATUS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_dispatch_status_total", METRIC_PREFIX),
        "Provider submissions, by provider and resulting status",
        &["provider", "status"]
    ).unwrap();

    /// Time between creation and the dispatch status update
    pub static ref DISPATCH_ELAPSED_SECONDS: HistogramVec = register_histogram_vec!(
        format!("{}_dispatch_elapsed_seconds", METRIC_PREFIX),
        "Elapsed time between creation and the dispatch status update",
        &["provider", "status"],
        vec![0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0]
    ).unwrap();

    // ============================================================================
    // Task Runner Metrics
    // ============================================================================

    /// Tasks completed successfully
    pub static ref TASKS_PROCESSED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_tasks_processed_total", METRIC_PREFIX),
        "Tasks completed successfully",
        &["task"]
    ).unwrap();

    /// Tasks re-enqueued after a retryable failure
    pub static ref TASKS_RETRIED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_tasks_retried_total", METRIC_PREFIX),
        "Tasks re-enqueued after a retryable failure",
        &["task"]
    ).unwrap();

    /// Tasks abandoned after exhausting retries or failing fatally
    pub static ref TASKS_FAILED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_tasks_failed_total", METRIC_PREFIX),
        "Tasks abandoned after exhausting retries or failing fatally",
        &["task"]
    ).unwrap();

    /// Current queue depth (due plus delayed), sampled by workers
    pub static ref QUEUE_DEPTH: IntGauge = register_int_gauge!(
        format!("{}_queue_depth", METRIC_PREFIX),
        "Tasks waiting in the queue, due plus delayed"
    ).unwrap();

    // ============================================================================
    // Service Callback Metrics
    // ============================================================================

    /// Delivery receipts posted to service callback endpoints
    pub static ref SERVICE_CALLBACKS_SENT_TOTAL: IntCounter = register_int_counter!(
        format!("{}_service_callbacks_sent_total", METRIC_PREFIX),
        "Delivery receipts posted to service callback endpoints"
    ).unwrap();
}
