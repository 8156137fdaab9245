// Metrics module for observability
// Request counters and latency histograms exposed in Prometheus format

use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

pub const REQUEST_TOTAL: &str = "request_total";
pub const REQUEST_SUCCESS_TOTAL: &str = "request_success_total";
pub const REQUEST_FAILURE_TOTAL: &str = "request_failure_total";
pub const REQUEST_DURATION_SECONDS: &str = "request_duration_seconds";
pub const REQUESTS_PER_SECOND: &str = "requests_per_second";
pub const ADMISSION_DECISIONS_TOTAL: &str = "admission_decisions_total";

/// Histogram buckets for request latency, in seconds
pub const REQUEST_DURATION_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0];

/// Floor applied to durations before taking the reciprocal
const MIN_RATE_DURATION_SECS: f64 = 1e-6;

/// Install the Prometheus recorder as the global `metrics` backend.
pub fn install_prometheus() -> Result<PrometheusHandle, BuildError> {
    prometheus_builder()?.install_recorder()
}

fn prometheus_builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full(REQUEST_DURATION_SECONDS.to_string()),
        REQUEST_DURATION_BUCKETS,
    )
}

/// Initialize all metric descriptions
/// Should be called once at application startup, after the recorder is installed
pub fn init_metrics() {
    describe_counter!(REQUEST_TOTAL, "Total number of HTTP requests received");
    describe_counter!(
        REQUEST_SUCCESS_TOTAL,
        "Total number of HTTP requests answered with a non-error status"
    );
    describe_counter!(
        REQUEST_FAILURE_TOTAL,
        "Total number of HTTP requests answered with a 4xx or 5xx status"
    );
    describe_histogram!(
        REQUEST_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "HTTP request duration in seconds"
    );
    describe_gauge!(
        REQUESTS_PER_SECOND,
        "Throughput implied by the latest request duration on a route"
    );
    describe_counter!(
        ADMISSION_DECISIONS_TOTAL,
        "Admission control decisions by outcome"
    );

    tracing::info!("Metrics initialized");
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    counter!(REQUEST_TOTAL, "method" => method.to_string(), "path" => path.to_string()).increment(1);
    histogram!(REQUEST_DURATION_SECONDS, "method" => method.to_string(), "path" => path.to_string()).record(duration_secs);
    gauge!(REQUESTS_PER_SECOND, "method" => method.to_string(), "path" => path.to_string())
        .set(1.0 / duration_secs.max(MIN_RATE_DURATION_SECS));

    if status >= 400 {
        counter!(REQUEST_FAILURE_TOTAL, "method" => method.to_string(), "path" => path.to_string(), "status" => status.to_string()).increment(1);
    } else {
        counter!(REQUEST_SUCCESS_TOTAL, "method" => method.to_string(), "path" => path.to_string()).increment(1);
    }
}

/// Record an admission decision
pub fn record_admission(admitted: bool) {
    let outcome = if admitted { "admitted" } else { "rejected" };
    counter!(ADMISSION_DECISIONS_TOTAL, "outcome" => outcome).increment(1);
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
