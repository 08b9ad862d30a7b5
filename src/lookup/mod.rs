//! Identifier lookup.
//!
//! Answers "is a job with this identifier in its arguments running, or
//! waiting to be retried?" in two phases:
//!
//! 1. **Live scan**: the workers of the requested queue, in manager then
//!    worker order. Only string arguments can match. A message without `args`
//!    matches nothing, and one whose `args` is not an array aborts the lookup.
//! 2. **Retry scan**: only when the live scan finds nothing. Reads the whole
//!    retry sorted set in one command and decodes the entries in order. The
//!    retry set holds jobs of every queue, so the queue is not filtered here.
//!    An entry that is not a JSON object, or whose `args` contain a
//!    non-string value, aborts the lookup.
//!
//! The retry scan is O(size of the retry set) with no pagination; it can be
//! disabled through [`LookupOptions`].

pub mod response;

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::directory::{ActiveJob, RetryRecord, WorkerDirectory};
use crate::error::{LookupError, ShapeMismatch};
use crate::store::{Batch, Command, KeyValueStore, StoreKeys};

pub use response::{LookupRequest, LookupResponse};

/// Where an identifier was found.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    /// Running on a worker.
    Live(ActiveJob),
    /// Waiting in the retry set; holds the decoded record.
    Retry(Value),
    NotFound,
}

impl LookupOutcome {
    pub fn is_found(&self) -> bool {
        !matches!(self, LookupOutcome::NotFound)
    }

    /// Short label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            LookupOutcome::Live(_) => "live",
            LookupOutcome::Retry(_) => "retry",
            LookupOutcome::NotFound => "not_found",
        }
    }
}

/// Per-call lookup options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupOptions {
    /// Fall back to scanning the retry set when no live job matches.
    pub scan_retry_set: bool,
}

impl Default for LookupOptions {
    fn default() -> Self {
        Self {
            scan_retry_set: true,
        }
    }
}

/// Finds jobs by identifier.
pub struct IdentifierLookup {
    directory: Arc<dyn WorkerDirectory>,
    store: Arc<dyn KeyValueStore>,
    keys: StoreKeys,
    options: LookupOptions,
}

impl IdentifierLookup {
    pub fn new(
        directory: Arc<dyn WorkerDirectory>,
        store: Arc<dyn KeyValueStore>,
        keys: StoreKeys,
    ) -> Self {
        Self {
            directory,
            store,
            keys,
            options: LookupOptions::default(),
        }
    }

    /// Sets the default options used by [`IdentifierLookup::find_in_queue`].
    pub fn with_options(mut self, options: LookupOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> LookupOptions {
        self.options
    }

    /// Looks `identifier` up with the default options.
    pub async fn find_in_queue(
        &self,
        queue: &str,
        identifier: &str,
    ) -> Result<LookupOutcome, LookupError> {
        self.find_with(queue, identifier, self.options).await
    }

    /// Looks `identifier` up: live workers of `queue` first, then the retry set.
    pub async fn find_with(
        &self,
        queue: &str,
        identifier: &str,
        options: LookupOptions,
    ) -> Result<LookupOutcome, LookupError> {
        if let Some(job) = self.find_live(queue, identifier)? {
            debug!(queue = %queue, identifier = %identifier, "Identifier found on a live worker");
            return Ok(LookupOutcome::Live(job));
        }

        if !options.scan_retry_set {
            return Ok(LookupOutcome::NotFound);
        }

        match self.find_in_retry(identifier).await? {
            Some(record) => {
                debug!(identifier = %identifier, "Identifier found in retry set");
                Ok(LookupOutcome::Retry(record))
            }
            None => Ok(LookupOutcome::NotFound),
        }
    }

    /// Scans the live workers of `queue`. First match wins.
    pub fn find_live(
        &self,
        queue: &str,
        identifier: &str,
    ) -> Result<Option<ActiveJob>, LookupError> {
        for manager in self.directory.snapshot_queue(queue) {
            for job in manager.active_jobs() {
                let args =
                    job.message
                        .args()
                        .map_err(|source| LookupError::CorruptLiveMessage {
                            queue: queue.to_string(),
                            source,
                        })?;
                if args.iter().any(|arg| arg.matches(identifier)) {
                    return Ok(Some(job));
                }
            }
        }
        Ok(None)
    }

    /// Scans the whole retry set. First match wins.
    ///
    /// This reads and decodes every entry up to the match and can be slow on
    /// a large retry set.
    pub async fn find_in_retry(&self, identifier: &str) -> Result<Option<Value>, LookupError> {
        let mut batch = Batch::new();
        batch.push((), Command::zrange_all(self.keys.retry()));

        let (_, reply) = batch
            .execute(self.store.as_ref())
            .await?
            .into_named()?
            .into_iter()
            .next()
            .ok_or(ShapeMismatch {
                expected: 1,
                received: 0,
            })?;
        let entries = reply.into_entries()?;

        debug!(entries = entries.len(), "Scanning retry set");

        for (position, entry) in entries.iter().enumerate() {
            let record = RetryRecord::decode(entry)
                .map_err(|source| LookupError::CorruptRetryEntry { position, source })?;

            let Some(args) = record.args() else {
                continue;
            };
            let args =
                args.map_err(|source| LookupError::CorruptRetryEntry { position, source })?;

            for arg in &args {
                match arg.as_str() {
                    Some(value) if value == identifier => return Ok(Some(record.into_value())),
                    Some(_) => {}
                    None => {
                        return Err(LookupError::NonStringArgument {
                            position,
                            kind: arg.kind(),
                        })
                    }
                }
            }
        }

        Ok(None)
    }
}
