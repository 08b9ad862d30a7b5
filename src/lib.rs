//! workerscope: introspection for a Redis-backed worker pool.
//!
//! Two read-only views over the same process:
//!
//! - [`StatsAggregator`] merges the jobs running on live workers with the
//!   global counters, queue backlogs and retry set size held in the store.
//! - [`IdentifierLookup`] finds a job by its first string argument, on a live
//!   worker first and in the retry set otherwise.
//!
//! Both read the in-process [`directory`] through snapshots and talk to the
//! store through one atomic [`store::Batch`] per request.

pub mod cli;
pub mod config;
pub mod directory;
pub mod error;
pub mod lookup;
pub mod metrics;
pub mod server;
pub mod stats;
pub mod store;

pub use config::{InspectorConfig, MismatchPolicy};
pub use directory::{ActiveJob, JobMessage, Manager, ManagerDirectory, Worker, WorkerDirectory};
pub use error::{DecodeError, LookupError, ShapeMismatch, StoreError};
pub use lookup::{IdentifierLookup, LookupOutcome, LookupRequest, LookupResponse};
pub use stats::{StatsAggregator, StatsReport};
pub use store::{KeyValueStore, MemoryStore, RedisStore, StoreKeys};
