//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Vis4T metrics
pub const METRICS_PREFIX: &str = "vis4t";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s - roster uploads
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Upload metrics
    describe_counter!(
        format!("{}_uploads_total", METRICS_PREFIX),
        Unit::Count,
        "Total roster uploads by outcome"
    );

    describe_counter!(
        format!("{}_upload_rows_total", METRICS_PREFIX),
        Unit::Count,
        "Roster rows written by upload, by result"
    );

    describe_histogram!(
        format!("{}_upload_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Roster upload processing latency in seconds"
    );

    // Reconciliation metrics
    describe_counter!(
        format!("{}_reconcile_created_total", METRICS_PREFIX),
        Unit::Count,
        "Student-subject scores created by reconciliation"
    );

    describe_counter!(
        format!("{}_reconcile_skipped_total", METRICS_PREFIX),
        Unit::Count,
        "Score observations skipped by reconciliation, by reason"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Helper to record a roster upload
pub fn record_upload(duration_secs: f64, created: usize, updated: usize, failed: usize, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_uploads_total", METRICS_PREFIX),
        "status" => status
    )
    .increment(1);

    histogram!(format!("{}_upload_duration_seconds", METRICS_PREFIX)).record(duration_secs);

    for (result, count) in [("created", created), ("updated", updated), ("failed", failed)] {
        if count > 0 {
            counter!(
                format!("{}_upload_rows_total", METRICS_PREFIX),
                "result" => result
            )
            .increment(count as u64);
        }
    }
}

/// Helper to record one class's reconciliation pass
pub fn record_reconcile(
    class_name: &str,
    created: usize,
    skipped_existing: usize,
    skipped_unexamined: usize,
    unresolved: usize,
) {
    counter!(
        format!("{}_reconcile_created_total", METRICS_PREFIX),
        "class" => class_name.to_string()
    )
    .increment(created as u64);

    for (reason, count) in [
        ("existing", skipped_existing),
        ("unexamined", skipped_unexamined),
        ("unresolved", unresolved),
    ] {
        counter!(
            format!("{}_reconcile_skipped_total", METRICS_PREFIX),
            "reason" => reason
        )
        .increment(count as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_buckets() {
        let mut prev = 0.0;
        for &bucket in LATENCY_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }
    }

    #[test]
    fn test_request_metrics() {
        let metrics = RequestMetrics::start("GET", "/api/classes");
        std::thread::sleep(std::time::Duration::from_millis(10));
        metrics.finish(200);
        // Just verify it runs without panic
    }

    #[test]
    fn test_record_helpers_without_recorder() {
        record_upload(0.2, 2, 1, 0, true);
        record_reconcile("KHDL16A", 10, 2, 1, 0);
    }
}
