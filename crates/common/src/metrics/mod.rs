//! Metrics and observability utilities
//!
//! Prometheus metrics for the answer pipeline with standardized naming
//! conventions. Recording is a no-op until an exporter is installed.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Quro metrics
pub const METRICS_PREFIX: &str = "quro";

/// Histogram buckets for HTTP and retrieval latency (in seconds)
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
];

/// Buckets for LLM calls and full queries (several LLM calls chained)
pub const GENERATION_BUCKETS: &[f64] = &[
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.000,  // 2s
    5.000,  // 5s
    10.00,  // 10s
    20.00,  // 20s
    40.00,  // 40s
    60.00,  // 60s
    120.0,  // 2m
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

    // Pipeline metrics
    describe_counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Answered queries by mode and resolution method"
    );

    describe_histogram!(
        format!("{}_query_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "End-to-end answer latency in seconds"
    );

    describe_counter!(
        format!("{}_escalations_total", METRICS_PREFIX),
        Unit::Count,
        "Escalations to external search by mode and reason"
    );

    describe_counter!(
        format!("{}_judgment_parse_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Sufficiency judgments that could not be parsed"
    );

    describe_counter!(
        format!("{}_citation_violations_total", METRICS_PREFIX),
        Unit::Count,
        "Citation format violations found in final answers"
    );

    // Retrieval metrics
    describe_histogram!(
        format!("{}_retrieval_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Corpus retrieval latency in seconds"
    );

    describe_gauge!(
        format!("{}_retrieval_results_count", METRICS_PREFIX),
        Unit::Count,
        "Number of chunks returned by the last corpus retrieval"
    );

    describe_counter!(
        format!("{}_external_search_total", METRICS_PREFIX),
        Unit::Count,
        "External search calls by kind and status"
    );

    // Generation metrics
    describe_counter!(
        format!("{}_generation_requests_total", METRICS_PREFIX),
        Unit::Count,
        "LLM generation calls by purpose and status"
    );

    describe_histogram!(
        format!("{}_generation_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "LLM generation latency in seconds"
    );

    // Embedding metrics
    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding API requests"
    );

    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding generation latency in seconds"
    );

    // Session metrics
    describe_gauge!(
        format!("{}_sessions_active", METRICS_PREFIX),
        Unit::Count,
        "Live chat sessions"
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

/// Record a completed query
pub fn record_query(duration_secs: f64, mode: &str, method: &str) {
    counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        "mode" => mode.to_string(),
        "method" => method.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_query_duration_seconds", METRICS_PREFIX),
        "mode" => mode.to_string()
    )
    .record(duration_secs);
}

/// Record an escalation to external search
pub fn record_escalation(mode: &str, reason: &str) {
    counter!(
        format!("{}_escalations_total", METRICS_PREFIX),
        "mode" => mode.to_string(),
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Record a sufficiency judgment that fell back to the default
pub fn record_judgment_parse_failure() {
    counter!(format!("{}_judgment_parse_failures_total", METRICS_PREFIX)).increment(1);
}

/// Record citation format violations of one answer
pub fn record_citation_violations(kind: &str, count: usize) {
    if count == 0 {
        return;
    }
    counter!(
        format!("{}_citation_violations_total", METRICS_PREFIX),
        "kind" => kind.to_string()
    )
    .increment(count as u64);
}

/// Record a corpus retrieval
pub fn record_retrieval(duration_secs: f64, result_count: usize, success: bool) {
    histogram!(
        format!("{}_retrieval_duration_seconds", METRICS_PREFIX),
        "status" => if success { "success" } else { "error" }
    )
    .record(duration_secs);

    gauge!(format!("{}_retrieval_results_count", METRICS_PREFIX)).set(result_count as f64);
}

/// Record an external search call
pub fn record_external_search(kind: &str, success: bool) {
    counter!(
        format!("{}_external_search_total", METRICS_PREFIX),
        "kind" => kind.to_string(),
        "status" => if success { "success" } else { "error" }
    )
    .increment(1);
}

/// Record an LLM generation call
pub fn record_generation(purpose: &str, duration_secs: f64, success: bool) {
    counter!(
        format!("{}_generation_requests_total", METRICS_PREFIX),
        "purpose" => purpose.to_string(),
        "status" => if success { "success" } else { "error" }
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_generation_duration_seconds", METRICS_PREFIX),
            "purpose" => purpose.to_string()
        )
        .record(duration_secs);
    }
}

/// Helper to record embedding metrics
pub fn record_embedding(duration_secs: f64, model: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_embedding_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);
    }
}

/// Set the live session gauge
pub fn set_active_sessions(count: usize) {
    gauge!(format!("{}_sessions_active", METRICS_PREFIX)).set(count as f64);
}
