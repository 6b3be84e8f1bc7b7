//! Metrics helper structs for convenient metric recording

use chrono::{DateTime, Utc};
use prometheus::{Encoder, TextEncoder};

use crate::notification::NotificationStatus;

use super::{
    CALLBACKS_RECEIVED_TOTAL, CALLBACK_ELAPSED_SECONDS, CALLBACK_STATUS_TOTAL,
    CALLBACK_UNMATCHED_TOTAL, DISPATCH_ELAPSED_SECONDS, DISPATCH_STATUS_TOTAL,
    SERVICE_CALLBACKS_SENT_TOTAL, TASKS_FAILED_TOTAL, TASKS_PROCESSED_TOTAL, TASKS_RETRIED_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

fn elapsed_seconds(since: DateTime<Utc>) -> f64 {
    let elapsed = Utc::now().signed_duration_since(since);
    (elapsed.num_milliseconds().max(0) as f64) / 1000.0
}

/// Helper struct for recording callback reconciliation metrics
pub struct CallbackMetrics;

impl CallbackMetrics {
    /// Record a callback accepted at the boundary
    pub fn record_received(provider: &str) {
        CALLBACKS_RECEIVED_TOTAL.with_label_values(&[provider]).inc();
    }

    /// Record a settled callback status
    pub fn record_status(provider: &str, status: NotificationStatus) {
        CALLBACK_STATUS_TOTAL
            .with_label_values(&[provider, status.as_str()])
            .inc();
    }

    /// Record the time between dispatch and the settling callback
    pub fn record_elapsed(provider: &str, status: NotificationStatus, sent_at: DateTime<Utc>) {
        CALLBACK_ELAPSED_SECONDS
            .with_label_values(&[provider, status.as_str()])
            .observe(elapsed_seconds(sent_at));
    }

    /// Record a callback that matched no notification
    pub fn record_unmatched(provider: &str) {
        CALLBACK_UNMATCHED_TOTAL.with_label_values(&[provider]).inc();
    }
}

/// Helper struct for recording dispatch metrics
pub struct DispatchMetrics;

impl DispatchMetrics {
    /// Record a dispatch outcome and the time since creation
    pub fn record_result(provider: &str, status: NotificationStatus, created_at: DateTime<Utc>) {
        DISPATCH_STATUS_TOTAL
            .with_label_values(&[provider, status.as_str()])
            .inc();
        DISPATCH_ELAPSED_SECONDS
            .with_label_values(&[provider, status.as_str()])
            .observe(elapsed_seconds(created_at));
    }
}

/// Helper struct for recording task runner metrics
pub struct TaskMetrics;

impl TaskMetrics {
    pub fn record_processed(kind: &str) {
        TASKS_PROCESSED_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn record_retried(kind: &str) {
        TASKS_RETRIED_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn record_failed(kind: &str) {
        TASKS_FAILED_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn record_service_callback_sent() {
        SERVICE_CALLBACKS_SENT_TOTAL.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_seconds_never_negative() {
        let future = Utc::now() + chrono::Duration::seconds(60);
        assert_eq!(elapsed_seconds(future), 0.0);
    }

    #[test]
    fn test_record_helpers_do_not_panic() {
        CallbackMetrics::record_received("messagebox");
        CallbackMetrics::record_status("messagebox", NotificationStatus::Delivered);
        CallbackMetrics::record_elapsed(
            "messagebox",
            NotificationStatus::Delivered,
            Utc::now() - chrono::Duration::seconds(30),
        );
        CallbackMetrics::record_unmatched("spryng");
        DispatchMetrics::record_result("dvla", NotificationStatus::Sending, Utc::now());
        TaskMetrics::record_processed("deliver");
    }
}
