//! Key-value store access.
//!
//! The core talks to the durable store only through [`KeyValueStore`]: a list
//! of read commands executed atomically (MULTI/EXEC on Redis), answered by one
//! [`Reply`] per command in submission order.
//!
//! Callers do not index into that reply list. They build a [`Batch`] whose
//! requests carry a caller-chosen key, and get the replies back paired with
//! those keys, so reordering requests cannot silently mis-map values:
//!
//! ```rust,ignore
//! let mut batch = Batch::new();
//! batch.push(Field::Processed, Command::Get(keys.processed().to_string()));
//! batch.push(Field::Retries, Command::ZCard(keys.retry().to_string()));
//! let replies = batch.execute(store.as_ref()).await?;
//! for (field, reply) in replies.into_named()? { /* ... */ }
//! ```

pub mod keys;
pub mod memory;
pub mod redis;

use async_trait::async_trait;

use crate::error::{DecodeError, ShapeMismatch, StoreError};

pub use keys::{StoreKeys, DEFAULT_RETRY_KEY};
pub use memory::MemoryStore;
pub use self::redis::RedisStore;

/// A read command understood by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// GET key
    Get(String),
    /// ZCARD key
    ZCard(String),
    /// LLEN key
    LLen(String),
    /// ZRANGE key start stop
    ZRange {
        key: String,
        start: isize,
        stop: isize,
    },
}

impl Command {
    /// ZRANGE over the whole sorted set.
    pub fn zrange_all(key: impl Into<String>) -> Self {
        Command::ZRange {
            key: key.into(),
            start: 0,
            stop: -1,
        }
    }
}

/// A single command reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Nil,
    Int(i64),
    Bytes(Vec<u8>),
    Array(Vec<Reply>),
    Status(String),
}

impl Reply {
    pub fn kind(&self) -> &'static str {
        match self {
            Reply::Nil => "nil",
            Reply::Int(_) => "integer",
            Reply::Bytes(_) => "bulk string",
            Reply::Array(_) => "array",
            Reply::Status(_) => "status",
        }
    }

    /// Decodes a string counter. A missing key decodes to `None`.
    pub fn as_counter(&self) -> Result<Option<i64>, DecodeError> {
        match self {
            Reply::Nil => Ok(None),
            Reply::Int(value) => Ok(Some(*value)),
            Reply::Bytes(bytes) => {
                let text = String::from_utf8_lossy(bytes);
                text.trim()
                    .parse::<i64>()
                    .map(Some)
                    .map_err(|_| DecodeError::InvalidInteger(text.into_owned()))
            }
            other => Err(DecodeError::UnexpectedReply {
                expected: "counter",
                found: other.kind(),
            }),
        }
    }

    /// Decodes a native integer reply (ZCARD, LLEN).
    pub fn as_integer(&self) -> Result<i64, DecodeError> {
        match self {
            Reply::Int(value) => Ok(*value),
            other => Err(DecodeError::UnexpectedReply {
                expected: "integer",
                found: other.kind(),
            }),
        }
    }

    /// Decodes an array of bulk strings (ZRANGE).
    pub fn into_entries(self) -> Result<Vec<Vec<u8>>, DecodeError> {
        match self {
            Reply::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Reply::Bytes(bytes) => Ok(bytes),
                    other => Err(DecodeError::UnexpectedReply {
                        expected: "bulk string",
                        found: other.kind(),
                    }),
                })
                .collect(),
            other => Err(DecodeError::UnexpectedReply {
                expected: "array",
                found: other.kind(),
            }),
        }
    }
}

/// A store that executes read batches atomically.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Executes `commands` as one atomic batch.
    ///
    /// On success returns the replies in submission order. Implementations
    /// acquire a connection for the duration of the call only.
    async fn execute(&self, commands: &[Command]) -> Result<Vec<Reply>, StoreError>;
}

/// A batch of named requests.
#[derive(Debug, Clone)]
pub struct Batch<K> {
    requests: Vec<(K, Command)>,
}

impl<K> Default for Batch<K> {
    fn default() -> Self {
        Self {
            requests: Vec::new(),
        }
    }
}

impl<K> Batch<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a request identified by `key`.
    pub fn push(&mut self, key: K, command: Command) -> &mut Self {
        self.requests.push((key, command));
        self
    }

    /// Executes the batch against `store`.
    pub async fn execute<S>(self, store: &S) -> Result<BatchReplies<K>, StoreError>
    where
        S: KeyValueStore + ?Sized,
    {
        let (keys, commands): (Vec<K>, Vec<Command>) = self.requests.into_iter().unzip();
        let replies = store.execute(&commands).await?;
        Ok(BatchReplies { keys, replies })
    }
}

/// Replies of an executed [`Batch`], not yet paired with their requests.
#[derive(Debug, Clone)]
pub struct BatchReplies<K> {
    keys: Vec<K>,
    replies: Vec<Reply>,
}

impl<K> BatchReplies<K> {
    pub fn expected(&self) -> usize {
        self.keys.len()
    }

    pub fn received(&self) -> usize {
        self.replies.len()
    }

    /// True when the store answered every request exactly once.
    pub fn is_complete(&self) -> bool {
        self.expected() == self.received()
    }

    /// Pairs every request with its reply.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeMismatch`] if the reply count differs from the request
    /// count; no pair is produced in that case.
    pub fn into_named(self) -> Result<Vec<(K, Reply)>, ShapeMismatch> {
        if !self.is_complete() {
            return Err(ShapeMismatch {
                expected: self.expected(),
                received: self.received(),
            });
        }
        Ok(self.keys.into_iter().zip(self.replies).collect())
    }

    /// Pairs requests with replies up to the shorter of the two lists.
    pub fn into_prefix(self) -> Vec<(K, Reply)> {
        self.keys.into_iter().zip(self.replies).collect()
    }
}
