//! Job records as seen by the introspection core.
//!
//! A job exists in two shapes: the live [`JobMessage`] held by a worker slot,
//! and the serialized [`RetryRecord`] stored in the retry sorted set. The only
//! schema both share is an `args` array, decoded into [`JobArg`] values.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DecodeError;

/// A single job argument.
#[derive(Debug, Clone, PartialEq)]
pub enum JobArg {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
    /// Nested array or object.
    Composite(Value),
}

impl JobArg {
    /// Converts a JSON value into an argument.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) => JobArg::Str(s.clone()),
            Value::Number(n) => match n.as_i64() {
                Some(i) => JobArg::Int(i),
                None => JobArg::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::Bool(b) => JobArg::Bool(*b),
            Value::Null => JobArg::Null,
            Value::Array(_) | Value::Object(_) => JobArg::Composite(value.clone()),
        }
    }

    /// Returns a short name for the argument kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            JobArg::Str(_) => "string",
            JobArg::Int(_) => "integer",
            JobArg::Float(_) => "float",
            JobArg::Bool(_) => "bool",
            JobArg::Null => "null",
            JobArg::Composite(_) => "composite",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            JobArg::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns true if this is a string argument equal to `identifier`.
    ///
    /// Non-string arguments never match; there is no type normalization.
    pub fn matches(&self, identifier: &str) -> bool {
        self.as_str() == Some(identifier)
    }
}

/// Decodes an `args` value into a list of arguments.
pub fn decode_args(value: &Value) -> Result<Vec<JobArg>, DecodeError> {
    match value {
        Value::Array(items) => Ok(items.iter().map(JobArg::from_value).collect()),
        other => Err(DecodeError::ArgsNotArray {
            found: json_kind(other),
        }),
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A job message held by a live worker.
///
/// The payload is kept as opaque JSON so it serializes back exactly as the
/// job-execution path produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobMessage(Value);

impl JobMessage {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Decodes the argument list.
    ///
    /// A message without `args` has no arguments. An `args` field that is not
    /// an array is an error.
    pub fn args(&self) -> Result<Vec<JobArg>, DecodeError> {
        match self.0.get("args") {
            Some(args) => decode_args(args),
            None => Ok(Vec::new()),
        }
    }
}

/// A decoded entry of the retry sorted set.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryRecord(Map<String, Value>);

impl RetryRecord {
    /// Decodes a stored entry. Anything other than a JSON object is rejected.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        match serde_json::from_slice::<Value>(bytes)? {
            Value::Object(map) => Ok(Self(map)),
            other => Err(DecodeError::NotAnObject {
                found: json_kind(&other),
            }),
        }
    }

    /// Decodes the argument list, or `None` if the record has no `args` field.
    pub fn args(&self) -> Option<Result<Vec<JobArg>, DecodeError>> {
        self.0.get("args").map(decode_args)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}
