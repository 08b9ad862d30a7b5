//! Configuration for the introspection service.
//!
//! Configuration can be built from defaults with builder methods, read from
//! `WORKERSCOPE_*` environment variables, or loaded from a YAML file.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::DEFAULT_RETRY_KEY;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// IO error while reading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid YAML.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// What the stats aggregator keeps when the store returns the wrong number
/// of replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchPolicy {
    /// Drop every decoded value, counters included.
    #[default]
    DiscardAll,
    /// Keep processed/failed/retries, drop the per-queue values.
    KeepCounters,
}

impl std::str::FromStr for MismatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "discard_all" | "discard-all" => Ok(Self::DiscardAll),
            "keep_counters" | "keep-counters" => Ok(Self::KeepCounters),
            other => Err(format!(
                "unknown policy '{other}', expected discard_all or keep_counters"
            )),
        }
    }
}

/// A queue served by this process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    pub name: String,
    /// Number of worker slots.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl QueueConfig {
    pub fn new(name: impl Into<String>, concurrency: usize) -> Self {
        Self {
            name: name.into(),
            concurrency,
        }
    }
}

fn default_concurrency() -> usize {
    1
}

/// Configuration for the introspection service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectorConfig {
    /// Redis connection URL.
    pub redis_url: String,
    /// Prefix applied to every store key.
    pub namespace: String,
    /// Key of the retry sorted set, without namespace.
    pub retry_key: String,
    /// Address the HTTP server binds to.
    pub listen_addr: String,
    /// Queues served by this process.
    pub queues: Vec<QueueConfig>,
    pub mismatch_policy: MismatchPolicy,
    /// Whether identifier lookups fall back to scanning the retry set.
    pub scan_retry_set: bool,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            namespace: String::new(),
            retry_key: DEFAULT_RETRY_KEY.to_string(),
            listen_addr: "127.0.0.1:8080".to_string(),
            queues: Vec::new(),
            mismatch_policy: MismatchPolicy::DiscardAll,
            scan_retry_set: true,
        }
    }
}

impl InspectorConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `WORKERSCOPE_REDIS_URL`: Redis URL (default: redis://localhost:6379)
    /// - `WORKERSCOPE_NAMESPACE`: Key namespace (default: empty)
    /// - `WORKERSCOPE_RETRY_KEY`: Retry set key (default: goretry)
    /// - `WORKERSCOPE_LISTEN_ADDR`: HTTP bind address (default: 127.0.0.1:8080)
    /// - `WORKERSCOPE_QUEUES`: Comma-separated `name[:concurrency]` list
    /// - `WORKERSCOPE_MISMATCH_POLICY`: `discard_all` or `keep_counters`
    /// - `WORKERSCOPE_SCAN_RETRY_SET`: Scan the retry set on lookup (default: true)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yaml::from_str(&content)?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("WORKERSCOPE_REDIS_URL") {
            self.redis_url = val;
        }

        if let Ok(val) = std::env::var("WORKERSCOPE_NAMESPACE") {
            self.namespace = val;
        }

        if let Ok(val) = std::env::var("WORKERSCOPE_RETRY_KEY") {
            self.retry_key = val;
        }

        if let Ok(val) = std::env::var("WORKERSCOPE_LISTEN_ADDR") {
            self.listen_addr = val;
        }

        if let Ok(val) = std::env::var("WORKERSCOPE_QUEUES") {
            self.queues = parse_queue_list(&val, "WORKERSCOPE_QUEUES")?;
        }

        if let Ok(val) = std::env::var("WORKERSCOPE_MISMATCH_POLICY") {
            self.mismatch_policy = parse_env_value(&val, "WORKERSCOPE_MISMATCH_POLICY")?;
        }

        if let Ok(val) = std::env::var("WORKERSCOPE_SCAN_RETRY_SET") {
            self.scan_retry_set = parse_env_bool(&val, "WORKERSCOPE_SCAN_RETRY_SET")?;
        }

        Ok(())
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.redis_url.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "redis_url cannot be empty".to_string(),
            ));
        }

        if self.retry_key.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "retry_key cannot be empty".to_string(),
            ));
        }

        if self.listen_addr.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "listen_addr cannot be empty".to_string(),
            ));
        }

        for (i, queue) in self.queues.iter().enumerate() {
            if queue.name.is_empty() {
                return Err(ConfigError::ValidationFailed(format!(
                    "queue #{i} has an empty name"
                )));
            }
            if queue.concurrency == 0 {
                return Err(ConfigError::ValidationFailed(format!(
                    "queue '{}' must have a concurrency greater than 0",
                    queue.name
                )));
            }
            if self.queues[..i].iter().any(|q| q.name == queue.name) {
                return Err(ConfigError::ValidationFailed(format!(
                    "queue '{}' is configured more than once",
                    queue.name
                )));
            }
        }

        Ok(())
    }

    /// Sets the Redis URL.
    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = url.into();
        self
    }

    /// Sets the key namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Sets the retry set key.
    pub fn with_retry_key(mut self, key: impl Into<String>) -> Self {
        self.retry_key = key.into();
        self
    }

    /// Sets the HTTP bind address.
    pub fn with_listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = addr.into();
        self
    }

    /// Adds a queue.
    pub fn with_queue(mut self, name: impl Into<String>, concurrency: usize) -> Self {
        self.queues.push(QueueConfig::new(name, concurrency));
        self
    }

    pub fn with_mismatch_policy(mut self, policy: MismatchPolicy) -> Self {
        self.mismatch_policy = policy;
        self
    }

    pub fn with_scan_retry_set(mut self, enabled: bool) -> Self {
        self.scan_retry_set = enabled;
        self
    }
}

/// Parses an environment variable value.
fn parse_env_value<T: std::str::FromStr>(val: &str, key: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    val.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}

/// Parses a boolean environment variable value.
fn parse_env_bool(val: &str, key: &str) -> Result<bool, ConfigError> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected boolean, got '{}'", val),
        }),
    }
}

/// Parses `name[:concurrency]` entries separated by commas.
fn parse_queue_list(val: &str, key: &str) -> Result<Vec<QueueConfig>, ConfigError> {
    val.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once(':') {
            Some((name, concurrency)) => Ok(QueueConfig::new(
                name.trim(),
                parse_env_value(concurrency.trim(), key)?,
            )),
            None => Ok(QueueConfig::new(entry, default_concurrency())),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = InspectorConfig::default();
        assert_eq!(config.redis_url, "redis://localhost:6379");
        assert_eq!(config.namespace, "");
        assert_eq!(config.retry_key, "goretry");
        assert_eq!(config.mismatch_policy, MismatchPolicy::DiscardAll);
        assert!(config.scan_retry_set);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let config = InspectorConfig::new()
            .with_redis_url("redis://cache:6380")
            .with_namespace("myapp:")
            .with_retry_key("retry")
            .with_listen_addr("0.0.0.0:9000")
            .with_queue("default", 5)
            .with_queue("mailers", 2)
            .with_mismatch_policy(MismatchPolicy::KeepCounters)
            .with_scan_retry_set(false);

        assert_eq!(config.redis_url, "redis://cache:6380");
        assert_eq!(config.namespace, "myapp:");
        assert_eq!(config.retry_key, "retry");
        assert_eq!(config.listen_addr, "0.0.0.0:9000");
        assert_eq!(
            config.queues,
            vec![QueueConfig::new("default", 5), QueueConfig::new("mailers", 2)]
        );
        assert_eq!(config.mismatch_policy, MismatchPolicy::KeepCounters);
        assert!(!config.scan_retry_set);
    }

    #[test]
    fn test_validation_failures() {
        let config = InspectorConfig::new().with_redis_url("");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationFailed(_))
        ));

        let config = InspectorConfig::new().with_queue("default", 0);
        assert!(config.validate().is_err());

        let config = InspectorConfig::new()
            .with_queue("default", 1)
            .with_queue("default", 2);
        let err = config.validate().expect_err("duplicate queue");
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_parse_queue_list() {
        let queues = parse_queue_list("default:5, mailers ,", "Q").expect("list should parse");
        assert_eq!(
            queues,
            vec![QueueConfig::new("default", 5), QueueConfig::new("mailers", 1)]
        );

        let err = parse_queue_list("default:many", "Q").expect_err("bad concurrency");
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "Q"));
    }

    #[test]
    fn test_parse_env_bool() {
        assert!(parse_env_bool("yes", "K").expect("valid bool"));
        assert!(!parse_env_bool("0", "K").expect("valid bool"));
        assert!(parse_env_bool("maybe", "K").is_err());
    }

    #[test]
    fn test_mismatch_policy_from_str() {
        assert_eq!(
            "keep-counters".parse::<MismatchPolicy>(),
            Ok(MismatchPolicy::KeepCounters)
        );
        assert_eq!(
            "discard_all".parse::<MismatchPolicy>(),
            Ok(MismatchPolicy::DiscardAll)
        );
        assert!("sometimes".parse::<MismatchPolicy>().is_err());
    }

    #[test]
    fn test_yaml_config() {
        let yaml = r#"
redis_url: redis://example:6379
namespace: myapp
queues:
  - name: default
    concurrency: 10
  - name: mailers
mismatch_policy: keep_counters
"#;
        let config: InspectorConfig = serde_yaml::from_str(yaml).expect("yaml should parse");
        assert_eq!(config.redis_url, "redis://example:6379");
        assert_eq!(config.namespace, "myapp");
        assert_eq!(config.retry_key, "goretry");
        assert_eq!(
            config.queues,
            vec![QueueConfig::new("default", 10), QueueConfig::new("mailers", 1)]
        );
        assert_eq!(config.mismatch_policy, MismatchPolicy::KeepCounters);
        assert!(config.scan_retry_set);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "listen_addr: 0.0.0.0:7000\nqueues:\n  - name: critical\n    concurrency: 2")
            .expect("write config");

        let config = InspectorConfig::from_file(file.path()).expect("config should load");
        assert_eq!(config.queues, vec![QueueConfig::new("critical", 2)]);

        let missing = InspectorConfig::from_file("/nonexistent/workerscope.yaml");
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
