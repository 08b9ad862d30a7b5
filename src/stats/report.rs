//! The stats report returned to dashboards.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::directory::ActiveJob;

/// Aggregate view of the worker pool.
///
/// Serializes as `{processed, failed, jobs, enqueued, retries}`. Pending
/// lengths are strings for compatibility with existing dashboards; an empty
/// string means the length could not be read.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsReport {
    pub processed: i64,
    pub failed: i64,
    /// Active jobs per queue, in manager then worker order.
    pub jobs: BTreeMap<String, Vec<ActiveJob>>,
    /// Pending length per queue.
    pub enqueued: BTreeMap<String, String>,
    pub retries: i64,
    /// Whether `retries` came from the store rather than the default.
    #[serde(skip)]
    pub(crate) retries_read: bool,
}

impl StatsReport {
    /// Total number of jobs currently executing.
    pub fn active_job_count(&self) -> usize {
        self.jobs.values().map(Vec::len).sum()
    }

    /// Pending length of `queue`, if it was read.
    pub fn pending(&self, queue: &str) -> Option<i64> {
        self.enqueued.get(queue).and_then(|v| v.parse().ok())
    }

    /// Retry set size, if it was read.
    pub fn retry_set_size(&self) -> Option<i64> {
        self.retries_read.then_some(self.retries)
    }

    /// Pretty-printed JSON, as served over HTTP.
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::JobMessage;
    use serde_json::json;

    #[test]
    fn test_report_shape() {
        let mut report = StatsReport {
            processed: 42,
            failed: 3,
            retries: 2,
            ..Default::default()
        };
        report.jobs.insert(
            "default".to_string(),
            vec![ActiveJob {
                message: JobMessage::new(json!({"args": ["order-17"]})),
                started_at: 1_690_000_000,
            }],
        );
        report.jobs.insert("mailers".to_string(), Vec::new());
        report.enqueued.insert("default".to_string(), "5".to_string());
        report.enqueued.insert("mailers".to_string(), String::new());

        let value = serde_json::to_value(&report).expect("report should serialize");
        assert_eq!(
            value,
            json!({
                "processed": 42,
                "failed": 3,
                "retries": 2,
                "jobs": {
                    "default": [{"message": {"args": ["order-17"]}, "started_at": 1_690_000_000}],
                    "mailers": []
                },
                "enqueued": {"default": "5", "mailers": ""}
            })
        );

        assert_eq!(report.active_job_count(), 1);
        assert_eq!(report.pending("default"), Some(5));
        assert_eq!(report.pending("mailers"), None);
        assert_eq!(report.retry_set_size(), None);
        assert!(report
            .to_pretty_json()
            .expect("pretty json")
            .contains("\n  \"processed\": 42"));
    }
}
