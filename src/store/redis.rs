//! Redis-backed store.
//!
//! Batches are sent as one atomic pipeline (MULTI ... EXEC). The connection
//! manager reconnects on its own; each batch works on its own clone of it, so
//! nothing is held once the call returns, whether it succeeded or not.

use ::redis::aio::ConnectionManager;
use ::redis::{Pipeline, Value};
use async_trait::async_trait;
use tracing::debug;

use super::{Command, KeyValueStore, Reply};
use crate::error::StoreError;

/// Redis implementation of [`KeyValueStore`].
#[derive(Clone)]
pub struct RedisStore {
    /// Redis connection manager (handles reconnection automatically).
    redis: ConnectionManager,
}

impl RedisStore {
    /// Connects to Redis.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ConnectionFailed` if the connection fails.
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = ::redis::Client::open(redis_url)
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        let redis = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        Ok(Self { redis })
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn execute(&self, commands: &[Command]) -> Result<Vec<Reply>, StoreError> {
        if commands.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.redis.clone();
        let pipe = build_pipeline(commands);
        let values: Vec<Value> = pipe.query_async(&mut conn).await?;

        debug!(
            commands = commands.len(),
            replies = values.len(),
            "Executed store batch"
        );

        Ok(values.into_iter().map(Reply::from).collect())
    }
}

fn build_pipeline(commands: &[Command]) -> Pipeline {
    let mut pipe = ::redis::pipe();
    pipe.atomic();
    for command in commands {
        match command {
            Command::Get(key) => {
                pipe.cmd("GET").arg(key);
            }
            Command::ZCard(key) => {
                pipe.cmd("ZCARD").arg(key);
            }
            Command::LLen(key) => {
                pipe.cmd("LLEN").arg(key);
            }
            Command::ZRange { key, start, stop } => {
                pipe.cmd("ZRANGE").arg(key).arg(*start).arg(*stop);
            }
        }
    }
    pipe
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        match value {
            Value::Nil => Reply::Nil,
            Value::Int(i) => Reply::Int(i),
            Value::Data(bytes) => Reply::Bytes(bytes),
            Value::Bulk(items) => Reply::Array(items.into_iter().map(Reply::from).collect()),
            Value::Status(status) => Reply::Status(status),
            Value::Okay => Reply::Status("OK".to_string()),
        }
    }
}
