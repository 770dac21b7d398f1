//! Logging and metrics exporter setup

use axum::{routing::get, Router};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use quro_common::{
    config::ObservabilityConfig,
    metrics::{self, GENERATION_BUCKETS, LATENCY_BUCKETS, METRICS_PREFIX},
};
use tracing_subscriber::EnvFilter;

/// Histograms spanning one or more LLM round trips
const SLOW_HISTOGRAMS: &[&str] = &[
    "request_duration_seconds",
    "query_duration_seconds",
    "generation_duration_seconds",
];

/// Histograms for vector search and embedding calls
const FAST_HISTOGRAMS: &[&str] = &[
    "retrieval_duration_seconds",
    "embedding_duration_seconds",
];

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
pub fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

/// Install the Prometheus recorder and return the `/metrics` router.
///
/// Returns `None` when `metrics_port` is 0; recording stays a no-op.
pub fn setup_metrics(config: &ObservabilityConfig) -> anyhow::Result<Option<Router>> {
    if config.metrics_port == 0 {
        return Ok(None);
    }

    let mut builder = PrometheusBuilder::new();
    for name in SLOW_HISTOGRAMS {
        builder = builder.set_buckets_for_metric(
            Matcher::Full(format!("{}_{}", METRICS_PREFIX, name)),
            GENERATION_BUCKETS,
        )?;
    }
    for name in FAST_HISTOGRAMS {
        builder = builder.set_buckets_for_metric(
            Matcher::Full(format!("{}_{}", METRICS_PREFIX, name)),
            LATENCY_BUCKETS,
        )?;
    }

    let handle = builder.install_recorder()?;
    metrics::register_metrics();

    Ok(Some(
        Router::new().route(
            "/metrics",
            get(move || {
                let handle = handle.clone();
                async move { handle.render() }
            }),
        ),
    ))
}
