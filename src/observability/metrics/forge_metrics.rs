//! # Forge Metrics
//!
//! Request counts and latencies for calls to the forge API.

use crate::observability::metrics::registry::REGISTRY;
use anyhow::Result;
use prometheus::{HistogramVec, IntCounterVec};
use std::sync::LazyLock;

static FORGE_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "forge_controller_forge_requests_total",
            "Total number of forge API requests",
        ),
        &["operation", "outcome"],
    )
    .expect("Failed to create FORGE_REQUESTS_TOTAL metric - this should never happen")
});

static FORGE_REQUEST_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "forge_controller_forge_request_duration_seconds",
            "Duration of forge API requests in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["operation"],
    )
    .expect("Failed to create FORGE_REQUEST_DURATION metric - this should never happen")
});

/// Register forge metrics with the registry
pub(crate) fn register_forge_metrics() -> Result<()> {
    REGISTRY.register(Box::new(FORGE_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(FORGE_REQUEST_DURATION.clone()))?;
    Ok(())
}

/// Record one forge request; `outcome` is `success`, `not_found` or `error`
pub fn observe_forge_request(operation: &str, outcome: &str, duration: f64) {
    FORGE_REQUESTS_TOTAL
        .with_label_values(&[operation, outcome])
        .inc();
    FORGE_REQUEST_DURATION
        .with_label_values(&[operation])
        .observe(duration);
}
