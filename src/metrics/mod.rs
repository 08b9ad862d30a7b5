//! Prometheus metrics for introspection requests.
//!
//! Stats reports publish per-queue gauges and lookups publish counters, so a
//! Prometheus scrape of `/metrics` sees the same numbers as the dashboard.
//!
//! # Example
//!
//! ```ignore
//! use workerscope::metrics::{init_metrics, export_metrics, MetricsCollector};
//!
//! init_metrics().expect("Failed to initialize metrics");
//!
//! let collector = MetricsCollector::new();
//! collector.record_lookup("live", 0.002);
//!
//! let metrics_text = export_metrics();
//! ```

pub mod collectors;
pub mod prometheus;

pub use collectors::MetricsCollector;
pub use prometheus::{export_metrics, init_metrics};

pub use prometheus::{
    ACTIVE_JOBS, LOOKUPS_TOTAL, LOOKUP_DURATION, QUEUE_PENDING, REGISTRY, RETRY_SET_SIZE,
};
