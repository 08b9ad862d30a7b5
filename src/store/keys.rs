//! Store key naming.
//!
//! Every key is prefixed with the configured namespace so several deployments
//! can share one store:
//!
//! - `{ns}stat:processed` / `{ns}stat:failed`: string counters
//! - `{ns}queue:<name>`: list of pending jobs for a queue
//! - `{ns}<retry_key>`: sorted set of jobs scheduled for retry

/// Default key of the retry sorted set (without namespace).
pub const DEFAULT_RETRY_KEY: &str = "goretry";

/// Namespaced store keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreKeys {
    namespace: String,
    processed: String,
    failed: String,
    retry: String,
}

impl StoreKeys {
    /// Builds the key set for `namespace`.
    ///
    /// A non-empty namespace is terminated with `:` if it is not already.
    pub fn new(namespace: impl Into<String>, retry_key: &str) -> Self {
        let namespace = normalize_namespace(namespace.into());
        Self {
            processed: format!("{namespace}stat:processed"),
            failed: format!("{namespace}stat:failed"),
            retry: format!("{namespace}{retry_key}"),
            namespace,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn processed(&self) -> &str {
        &self.processed
    }

    pub fn failed(&self) -> &str {
        &self.failed
    }

    pub fn retry(&self) -> &str {
        &self.retry
    }

    /// Pending list key for `queue`.
    pub fn queue(&self, queue: &str) -> String {
        format!("{}queue:{}", self.namespace, queue)
    }
}

impl Default for StoreKeys {
    fn default() -> Self {
        Self::new("", DEFAULT_RETRY_KEY)
    }
}

fn normalize_namespace(namespace: String) -> String {
    if namespace.is_empty() || namespace.ends_with(':') {
        namespace
    } else {
        format!("{namespace}:")
    }
}
