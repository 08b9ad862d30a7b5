//! Prometheus metrics registration and export.
//!
//! This module defines all Prometheus metrics used by workerscope and provides
//! functions for initializing, registering, and exporting metrics.

use prometheus::{CounterVec, Encoder, Gauge, GaugeVec, Histogram, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

/// Global Prometheus registry for all workerscope metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Pending jobs per queue, as of the last stats report.
pub static QUEUE_PENDING: OnceLock<GaugeVec> = OnceLock::new();

/// Jobs executing per queue, as of the last stats report.
pub static ACTIVE_JOBS: OnceLock<GaugeVec> = OnceLock::new();

/// Size of the retry set, as of the last stats report.
pub static RETRY_SET_SIZE: OnceLock<Gauge> = OnceLock::new();

/// Identifier lookups, labeled by outcome (live, retry, not_found, error).
pub static LOOKUPS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Identifier lookup duration in seconds.
pub static LOOKUP_DURATION: OnceLock<Histogram> = OnceLock::new();

/// Initialize all metrics and register them with the registry.
///
/// This function should be called once at application startup.
///
/// # Errors
///
/// Returns a `prometheus::Error` if metric registration fails, typically due to
/// duplicate metric names or invalid metric configurations.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let registry = Registry::new();

    // Stats metrics
    let queue_pending = GaugeVec::new(
        Opts::new("workerscope_queue_pending", "Number of jobs waiting in queue"),
        &["queue"],
    )?;

    let active_jobs = GaugeVec::new(
        Opts::new("workerscope_active_jobs", "Number of jobs currently executing"),
        &["queue"],
    )?;

    let retry_set_size = Gauge::new(
        "workerscope_retry_set_size",
        "Number of jobs waiting in the retry set",
    )?;

    // Lookup metrics
    let lookups_total = CounterVec::new(
        Opts::new("workerscope_lookups_total", "Total identifier lookups"),
        &["outcome"],
    )?;

    let lookup_duration = Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "workerscope_lookup_duration_seconds",
            "Identifier lookup duration in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
    )?;

    registry.register(Box::new(queue_pending.clone()))?;
    registry.register(Box::new(active_jobs.clone()))?;
    registry.register(Box::new(retry_set_size.clone()))?;
    registry.register(Box::new(lookups_total.clone()))?;
    registry.register(Box::new(lookup_duration.clone()))?;

    // If any of these fail, metrics were already initialized (idempotent)
    let _ = REGISTRY.set(registry);
    let _ = QUEUE_PENDING.set(queue_pending);
    let _ = ACTIVE_JOBS.set(active_jobs);
    let _ = RETRY_SET_SIZE.set(retry_set_size);
    let _ = LOOKUPS_TOTAL.set(lookups_total);
    let _ = LOOKUP_DURATION.set(lookup_duration);

    tracing::info!("Prometheus metrics initialized successfully");

    Ok(())
}

/// Export all registered metrics in Prometheus text format.
///
/// If the registry has not been initialized or encoding fails, returns a
/// comment line describing the problem.
pub fn export_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return "# Metrics not initialized. Call init_metrics() first.\n".to_string();
    };

    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# Error encoding metrics: {}\n", e);
    }

    String::from_utf8(buffer)
        .unwrap_or_else(|e| format!("# Error converting metrics to UTF-8: {}\n", e))
}
