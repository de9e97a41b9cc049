// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for Tetra runs.
//!
//! All metrics share the `tetra_` namespace. A one-shot CLI has no scrape endpoint,
//! so [`gather_metrics`] renders the registry in the text exposition format, which
//! `--metrics-file` writes for a node-exporter textfile collector.
//!
//! # Metrics Categories
//!
//! - **Operation Metrics** - Provider operations by kind and outcome
//! - **Domain Metrics** - Per-domain reconciliation outcomes and durations
//!
//! # Example
//!
//! ```rust,no_run
//! use tetra::metrics::{gather_metrics, record_operation};
//!
//! record_operation("example.com", "create", "applied");
//! let text = gather_metrics().unwrap();
//! ```

use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all Tetra metrics
const METRICS_NAMESPACE: &str = "tetra";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Operation Metrics
// ============================================================================

/// Total number of provider operations
///
/// Labels:
/// - `domain`: Domain the operation belongs to
/// - `kind`: `create`, `update` or `delete`
/// - `outcome`: `planned`, `applied`, `failed` or `abandoned`
pub static OPERATIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_operations_total"),
        "Total number of provider operations by domain, kind and outcome",
    );
    let counter = CounterVec::new(opts, &["domain", "kind", "outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Domain Metrics
// ============================================================================

/// Total number of domain reconciliations by final status
///
/// Labels:
/// - `domain`: Domain name
/// - `status`: Final status (`converged`, `applied`, `planned`, `invalid`, `failed`)
pub static DOMAIN_RECONCILIATIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_domain_reconciliations_total"),
        "Total number of domain reconciliations by domain and status",
    );
    let counter = CounterVec::new(opts, &["domain", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of domain reconciliations in seconds
///
/// Labels:
/// - `domain`: Domain name
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of domain reconciliations in seconds",
    )
    .buckets(vec![0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]);
    let histogram = HistogramVec::new(opts, &["domain"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Number of desired record sets compiled for a domain
///
/// Labels:
/// - `domain`: Domain name
pub static DESIRED_RECORDS: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_desired_records"),
        "Number of desired record sets compiled for a domain",
    );
    let gauge = GaugeVec::new(opts, &["domain"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record one provider operation outcome
///
/// # Arguments
/// * `domain` - Domain the operation belongs to
/// * `kind` - Operation kind (`create`, `update`, `delete`)
/// * `outcome` - What happened to it
pub fn record_operation(domain: &str, kind: &str, outcome: &str) {
    OPERATIONS_TOTAL
        .with_label_values(&[domain, kind, outcome])
        .inc();
}

/// Record the end of a domain reconciliation
///
/// # Arguments
/// * `domain` - Domain name
/// * `status` - Final status of the domain
/// * `duration` - Wall time spent on the domain
pub fn record_domain_reconciliation(domain: &str, status: &str, duration: Duration) {
    DOMAIN_RECONCILIATIONS_TOTAL
        .with_label_values(&[domain, status])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[domain])
        .observe(duration.as_secs_f64());
}

/// Record the size of a domain's desired record set
#[allow(clippy::cast_precision_loss)]
pub fn record_desired_records(domain: &str, count: usize) {
    DESIRED_RECORDS
        .with_label_values(&[domain])
        .set(count as f64);
}

/// Gather all metrics in Prometheus text format
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
