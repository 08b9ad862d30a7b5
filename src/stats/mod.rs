//! Stats aggregation.
//!
//! Merges the live worker directory with the durable counters in the store:
//!
//! 1. Seed every configured queue with an empty job list and an empty pending
//!    length, then add each active worker's job.
//! 2. Read processed/failed counters, retry set size and one pending length
//!    per queue in a single atomic batch.
//! 3. Decode the replies into the seeded report.
//!
//! The aggregator never fails. A store error leaves the counters at zero and
//! the pending lengths empty; a reply that cannot be decoded leaves only its
//! own field untouched; a batch answered with the wrong number of replies
//! drops every per-queue value (and, under [`MismatchPolicy::DiscardAll`],
//! the counters too).

pub mod report;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::MismatchPolicy;
use crate::directory::WorkerDirectory;
use crate::store::{Batch, BatchReplies, Command, KeyValueStore, Reply, StoreKeys};

pub use report::StatsReport;

/// Number of scalar requests at the head of the stats batch.
const SCALAR_FIELDS: usize = 3;

/// What a stats batch request reads.
#[derive(Debug, Clone, PartialEq, Eq)]
enum StatField {
    Processed,
    Failed,
    Retries,
    Pending(String),
}

/// Builds [`StatsReport`]s.
pub struct StatsAggregator {
    directory: Arc<dyn WorkerDirectory>,
    store: Arc<dyn KeyValueStore>,
    keys: StoreKeys,
    mismatch_policy: MismatchPolicy,
}

impl StatsAggregator {
    pub fn new(
        directory: Arc<dyn WorkerDirectory>,
        store: Arc<dyn KeyValueStore>,
        keys: StoreKeys,
    ) -> Self {
        Self {
            directory,
            store,
            keys,
            mismatch_policy: MismatchPolicy::default(),
        }
    }

    /// Sets what survives a batch answered with the wrong number of replies.
    pub fn with_mismatch_policy(mut self, policy: MismatchPolicy) -> Self {
        self.mismatch_policy = policy;
        self
    }

    /// Generates a report. Store problems degrade the report instead of
    /// failing the call.
    pub async fn generate(&self) -> StatsReport {
        let (mut report, queues) = self.seed();
        let batch = self.build_batch(&queues);

        match batch.execute(self.store.as_ref()).await {
            Ok(replies) => self.decode(&mut report, replies),
            Err(e) => {
                warn!(error = %e, "Couldn't retrieve stats, reporting live workers only");
            }
        }

        debug!(
            queues = queues.len(),
            active_jobs = report.active_job_count(),
            processed = report.processed,
            failed = report.failed,
            retries = report.retries,
            "Generated stats report"
        );

        report
    }

    /// Seeds the report from the directory and returns the queue order.
    fn seed(&self) -> (StatsReport, Vec<String>) {
        let mut report = StatsReport::default();
        let mut queues = Vec::new();

        for manager in self.directory.snapshot() {
            if !report.jobs.contains_key(&manager.queue) {
                queues.push(manager.queue.clone());
                report.enqueued.insert(manager.queue.clone(), String::new());
            }
            report
                .jobs
                .entry(manager.queue.clone())
                .or_default()
                .extend(manager.active_jobs());
        }

        (report, queues)
    }

    fn build_batch(&self, queues: &[String]) -> Batch<StatField> {
        let mut batch = Batch::new();
        batch
            .push(
                StatField::Processed,
                Command::Get(self.keys.processed().to_string()),
            )
            .push(
                StatField::Failed,
                Command::Get(self.keys.failed().to_string()),
            )
            .push(
                StatField::Retries,
                Command::ZCard(self.keys.retry().to_string()),
            );
        for queue in queues {
            batch.push(
                StatField::Pending(queue.clone()),
                Command::LLen(self.keys.queue(queue)),
            );
        }
        batch
    }

    fn decode(&self, report: &mut StatsReport, replies: BatchReplies<StatField>) {
        if replies.is_complete() {
            for (field, reply) in replies.into_prefix() {
                apply(report, field, &reply);
            }
            return;
        }

        warn!(
            expected = replies.expected(),
            received = replies.received(),
            policy = ?self.mismatch_policy,
            "Stats batch returned an unexpected number of replies, discarding queue lengths"
        );

        if self.mismatch_policy == MismatchPolicy::KeepCounters
            && replies.received() >= SCALAR_FIELDS
        {
            for (field, reply) in replies.into_prefix() {
                if !matches!(field, StatField::Pending(_)) {
                    apply(report, field, &reply);
                }
            }
        }
    }
}

fn apply(report: &mut StatsReport, field: StatField, reply: &Reply) {
    match field {
        StatField::Processed => match reply.as_counter() {
            Ok(Some(value)) => report.processed = value,
            Ok(None) => {}
            Err(e) => debug!(error = %e, "Ignoring undecodable processed counter"),
        },
        StatField::Failed => match reply.as_counter() {
            Ok(Some(value)) => report.failed = value,
            Ok(None) => {}
            Err(e) => debug!(error = %e, "Ignoring undecodable failed counter"),
        },
        StatField::Retries => match reply.as_integer() {
            Ok(value) => {
                report.retries = value;
                report.retries_read = true;
            }
            Err(e) => debug!(error = %e, "Ignoring undecodable retry set size"),
        },
        StatField::Pending(queue) => match reply.as_integer() {
            Ok(value) => {
                report.enqueued.insert(queue, value.to_string());
            }
            Err(e) => debug!(queue = %queue, error = %e, "Ignoring undecodable queue length"),
        },
    }
}
