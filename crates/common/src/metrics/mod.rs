//! Metrics and observability utilities
//!
//! Prometheus-style metrics recorded through the `metrics` facade with
//! standardized naming. The gateway installs the exporter.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all RagForge metrics
pub const METRICS_PREFIX: &str = "ragforge";

/// Histogram buckets for request and search latency (in seconds)
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

/// Buckets for embedding and language model latency (typically slower)
pub const UPSTREAM_BUCKETS: &[f64] = &[
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.000,  // 2s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
    60.00,  // 60s
];

/// Full metric name with the service prefix
pub fn metric_name(suffix: &str) -> String {
    format!("{}_{}", METRICS_PREFIX, suffix)
}

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(metric_name("requests_total"), Unit::Count, "Total number of HTTP requests");
    describe_histogram!(
        metric_name("request_duration_seconds"),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Search
    describe_counter!(metric_name("search_queries_total"), Unit::Count, "Total number of search queries");
    describe_histogram!(
        metric_name("search_duration_seconds"),
        Unit::Seconds,
        "Search latency including mapping, in seconds"
    );
    describe_gauge!(
        metric_name("search_results_count"),
        Unit::Count,
        "Number of results returned by the last search"
    );

    // Embeddings
    describe_counter!(
        metric_name("embedding_requests_total"),
        Unit::Count,
        "Total embedding requests"
    );
    describe_counter!(metric_name("embedding_errors_total"), Unit::Count, "Total embedding errors");
    describe_histogram!(
        metric_name("embedding_duration_seconds"),
        Unit::Seconds,
        "Embedding latency in seconds"
    );

    // Chat
    describe_counter!(metric_name("chat_turns_total"), Unit::Count, "Total chat turns answered");
    describe_histogram!(
        metric_name("llm_duration_seconds"),
        Unit::Seconds,
        "Language model latency in seconds"
    );
    describe_histogram!(
        metric_name("prompt_chars"),
        Unit::Count,
        "Size of prompts sent to the language model, in characters"
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
            metric_name("requests_total"),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            metric_name("request_duration_seconds"),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Helper to record search metrics
pub fn record_search(duration_secs: f64, mode: &str, result_count: usize) {
    counter!(metric_name("search_queries_total"), "mode" => mode.to_string()).increment(1);
    histogram!(metric_name("search_duration_seconds"), "mode" => mode.to_string()).record(duration_secs);
    gauge!(metric_name("search_results_count"), "mode" => mode.to_string()).set(result_count as f64);
}

/// Helper to record embedding metrics
pub fn record_embedding(duration_secs: f64, model: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        metric_name("embedding_requests_total"),
        "model" => model.to_string(),
        "status" => status
    )
    .increment(1);

    if success {
        histogram!(metric_name("embedding_duration_seconds"), "model" => model.to_string())
            .record(duration_secs);
    } else {
        counter!(metric_name("embedding_errors_total"), "model" => model.to_string()).increment(1);
    }
}

/// Helper to record a completed chat turn
pub fn record_chat(llm_duration_secs: f64, documents_used: bool, prompt_chars: usize) {
    let documents = if documents_used { "true" } else { "false" };

    counter!(metric_name("chat_turns_total"), "documents" => documents).increment(1);
    histogram!(metric_name("llm_duration_seconds")).record(llm_duration_secs);
    histogram!(metric_name("prompt_chars")).record(prompt_chars as f64);
}
