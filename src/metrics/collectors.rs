//! Recording helpers for workerscope metrics.
//!
//! `MetricsCollector` wraps the raw Prometheus metrics so call sites don't
//! deal with label ordering or uninitialized registries.

use super::prometheus::{
    ACTIVE_JOBS, LOOKUPS_TOTAL, LOOKUP_DURATION, QUEUE_PENDING, RETRY_SET_SIZE,
};
use crate::stats::StatsReport;
use prometheus::{Gauge, GaugeVec};

/// Metrics collector for introspection requests.
///
/// Recording is a no-op until `init_metrics()` has run.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    pub fn new() -> Self {
        Self
    }

    /// Publishes the gauges of a freshly generated report.
    ///
    /// Queue lengths and the retry set size that could not be read keep their
    /// previous value.
    pub fn record_report(&self, report: &StatsReport) {
        if let (Some(active_jobs), Some(queue_pending), Some(retry_set_size)) =
            (ACTIVE_JOBS.get(), QUEUE_PENDING.get(), RETRY_SET_SIZE.get())
        {
            publish_report(report, active_jobs, queue_pending, retry_set_size);
        }

        tracing::trace!(
            queues = report.jobs.len(),
            retries = report.retries,
            "Recorded stats metrics"
        );
    }

    /// Records a lookup.
    ///
    /// # Arguments
    ///
    /// * `outcome` - "live", "retry", "not_found" or "error"
    /// * `duration_secs` - Time spent in the lookup
    pub fn record_lookup(&self, outcome: &str, duration_secs: f64) {
        if let Some(lookups_total) = LOOKUPS_TOTAL.get() {
            lookups_total.with_label_values(&[outcome]).inc();
        }

        if let Some(lookup_duration) = LOOKUP_DURATION.get() {
            lookup_duration.observe(duration_secs);
        }

        tracing::trace!(
            outcome = outcome,
            duration_secs = duration_secs,
            "Recorded lookup metric"
        );
    }
}

fn publish_report(
    report: &StatsReport,
    active_jobs: &GaugeVec,
    queue_pending: &GaugeVec,
    retry_set_size: &Gauge,
) {
    for (queue, jobs) in &report.jobs {
        active_jobs
            .with_label_values(&[queue.as_str()])
            .set(jobs.len() as f64);
    }

    for queue in report.enqueued.keys() {
        if let Some(pending) = report.pending(queue) {
            queue_pending
                .with_label_values(&[queue.as_str()])
                .set(pending as f64);
        }
    }

    if let Some(size) = report.retry_set_size() {
        retry_set_size.set(size as f64);
    }
}
