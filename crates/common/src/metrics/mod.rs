//! Metrics and observability utilities
//!
//! Prometheus metrics for request handling, thesis mutations and
//! authorization decisions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Prethesis metrics
pub const METRICS_PREFIX: &str = "prethesis";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms - typical multipart upload
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
];

/// Register all metric descriptions
pub fn register_metrics() {
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

    describe_counter!(
        format!("{}_thesis_mutations_total", METRICS_PREFIX),
        Unit::Count,
        "Committed thesis creates, updates and deletes"
    );

    describe_counter!(
        format!("{}_authorization_denials_total", METRICS_PREFIX),
        Unit::Count,
        "Thesis requests rejected by the authorizer or status guard"
    );

    describe_counter!(
        format!("{}_attachment_cleanup_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Attachment files that could not be removed after commit"
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

/// `operation` is one of create, update, delete
pub fn record_thesis_mutation(operation: &'static str) {
    counter!(
        format!("{}_thesis_mutations_total", METRICS_PREFIX),
        "operation" => operation
    )
    .increment(1);
}

/// `reason` is one of not_visible, status_guard, create_denied, not_employee
pub fn record_authorization_denial(reason: &'static str) {
    counter!(
        format!("{}_authorization_denials_total", METRICS_PREFIX),
        "reason" => reason
    )
    .increment(1);
}

pub fn record_attachment_cleanup_failure() {
    counter!(format!("{}_attachment_cleanup_failures_total", METRICS_PREFIX)).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_buckets_sorted() {
        let mut prev = 0.0;
        for &bucket in LATENCY_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }
    }

    #[test]
    fn test_recorders_without_exporter() {
        let metrics = RequestMetrics::start("GET", "/api/theses");
        metrics.finish(200);
        record_thesis_mutation("create");
        record_authorization_denial("status_guard");
        record_attachment_cleanup_failure();
    }
}
