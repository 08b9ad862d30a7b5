//! Error types for workerscope operations.
//!
//! Defines error types for the subsystems that can fail:
//! - Key-value store transport
//! - Decoding of stored and live job records
//! - Identifier lookup

use thiserror::Error;

/// Errors raised by a key-value store while executing a batch.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to connect to the store.
    #[error("Store connection failed: {0}")]
    ConnectionFailed(String),

    /// Redis operation failed.
    #[error("Redis operation failed: {0}")]
    Redis(#[from] redis::RedisError),

    /// The store is unavailable (used by the in-memory store for fault injection).
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The store answered with something other than one reply per command.
    #[error("Unexpected batch reply: {0}")]
    UnexpectedReply(String),
}

/// A batch came back with a different number of replies than requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Batch shape mismatch: expected {expected} replies, received {received}")]
pub struct ShapeMismatch {
    pub expected: usize,
    pub received: usize,
}

/// Errors raised while decoding a job record or a store reply.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("JSON decode error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Job record is not a JSON object (found {found})")]
    NotAnObject { found: &'static str },

    #[error("Job 'args' is not an array (found {found})")]
    ArgsNotArray { found: &'static str },

    #[error("Expected {expected} reply, found {found}")]
    UnexpectedReply {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Invalid integer value: {0:?}")]
    InvalidInteger(String),
}

/// Errors that abort an identifier lookup.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Corrupt job message in queue '{queue}': {source}")]
    CorruptLiveMessage {
        queue: String,
        #[source]
        source: DecodeError,
    },

    #[error("Corrupt retry entry at position {position}: {source}")]
    CorruptRetryEntry {
        position: usize,
        #[source]
        source: DecodeError,
    },

    #[error("Retry entry at position {position} has a non-string argument ({kind})")]
    NonStringArgument { position: usize, kind: &'static str },

    #[error("Unexpected retry set reply: {0}")]
    UnexpectedReply(#[from] DecodeError),

    #[error(transparent)]
    Shape(#[from] ShapeMismatch),
}
