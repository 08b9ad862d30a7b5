//! Live worker directory.
//!
//! The directory is the process-wide registry of managers (one per queue) and
//! their worker slots. The job-execution path writes into the slots while
//! introspection reads them, without any coordination between the two:
//!
//! ```text
//!   ManagerDirectory
//!     ├── Manager "default"  ── Worker ── Worker ── Worker
//!     └── Manager "mailers"  ── Worker
//! ```
//!
//! Readers never hold references into a slot. They take point-in-time
//! [`WorkerSnapshot`]s; a snapshot counts as an active job only when both the
//! message and the start time were observed set, so a read racing with a
//! write degrades to "idle".

pub mod message;

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::Serialize;

pub use message::{JobArg, JobMessage, RetryRecord};

/// A single execution slot owned by a [`Manager`].
#[derive(Debug, Default)]
pub struct Worker {
    message: Mutex<Option<JobMessage>>,
    /// Unix seconds, 0 when idle.
    started_at: AtomicI64,
}

impl Worker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the slot as executing `message`, starting now.
    pub fn begin(&self, message: JobMessage) {
        self.begin_at(message, Utc::now().timestamp());
    }

    /// Marks the slot as executing `message` since `started_at` (unix seconds).
    pub fn begin_at(&self, message: JobMessage, started_at: i64) {
        *self.message.lock().unwrap_or_else(|p| p.into_inner()) = Some(message);
        self.started_at.store(started_at, Ordering::SeqCst);
    }

    /// Marks the slot idle.
    pub fn finish(&self) {
        self.started_at.store(0, Ordering::SeqCst);
        *self.message.lock().unwrap_or_else(|p| p.into_inner()) = None;
    }

    /// Reads the slot. The two fields are read separately and may be torn.
    pub fn snapshot(&self) -> WorkerSnapshot {
        let message = self
            .message
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        let started_at = self.started_at.load(Ordering::SeqCst);
        WorkerSnapshot {
            message,
            started_at,
        }
    }
}

/// Point-in-time copy of a worker slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerSnapshot {
    pub message: Option<JobMessage>,
    pub started_at: i64,
}

impl WorkerSnapshot {
    /// Returns the active job, if both fields were set when read.
    pub fn active(&self) -> Option<ActiveJob> {
        match &self.message {
            Some(message) if self.started_at > 0 => Some(ActiveJob {
                message: message.clone(),
                started_at: self.started_at,
            }),
            _ => None,
        }
    }
}

/// A job currently executing on some worker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveJob {
    pub message: JobMessage,
    pub started_at: i64,
}

/// Owner of one named queue and its worker slots.
#[derive(Debug)]
pub struct Manager {
    queue: String,
    workers: Vec<Arc<Worker>>,
}

impl Manager {
    /// Creates a manager with `concurrency` idle workers.
    pub fn new(queue: impl Into<String>, concurrency: usize) -> Self {
        Self {
            queue: queue.into(),
            workers: (0..concurrency).map(|_| Arc::new(Worker::new())).collect(),
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.queue
    }

    pub fn workers(&self) -> &[Arc<Worker>] {
        &self.workers
    }

    pub fn snapshot(&self) -> ManagerSnapshot {
        ManagerSnapshot {
            queue: self.queue.clone(),
            workers: self.workers.iter().map(|w| w.snapshot()).collect(),
        }
    }
}

/// Point-in-time copy of a manager and its workers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManagerSnapshot {
    pub queue: String,
    pub workers: Vec<WorkerSnapshot>,
}

impl ManagerSnapshot {
    /// Active jobs in worker order.
    pub fn active_jobs(&self) -> impl Iterator<Item = ActiveJob> + '_ {
        self.workers.iter().filter_map(WorkerSnapshot::active)
    }
}

/// Read-only access to the live manager/worker registry.
///
/// Snapshots are taken manager by manager; there is no global consistency
/// point across managers.
pub trait WorkerDirectory: Send + Sync {
    /// Snapshots every manager in directory order.
    fn snapshot(&self) -> Vec<ManagerSnapshot>;

    /// Snapshots the managers serving `queue`.
    fn snapshot_queue(&self, queue: &str) -> Vec<ManagerSnapshot> {
        self.snapshot()
            .into_iter()
            .filter(|m| m.queue == queue)
            .collect()
    }
}

/// The process-wide manager registry.
///
/// Populated at start-up; the managers themselves are shared with the
/// job-execution path through `Arc`.
#[derive(Debug, Clone, Default)]
pub struct ManagerDirectory {
    managers: Vec<Arc<Manager>>,
}

impl ManagerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a directory of idle managers from `(queue, concurrency)` pairs.
    pub fn from_queues<I, S>(queues: I) -> Self
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        let mut directory = Self::new();
        for (queue, concurrency) in queues {
            directory.add(Manager::new(queue, concurrency));
        }
        directory
    }

    /// Registers a manager and returns a shared handle to it.
    pub fn add(&mut self, manager: Manager) -> Arc<Manager> {
        let manager = Arc::new(manager);
        self.managers.push(Arc::clone(&manager));
        manager
    }

    pub fn managers(&self) -> &[Arc<Manager>] {
        &self.managers
    }

    /// Returns the first manager serving `queue`.
    pub fn manager(&self, queue: &str) -> Option<&Arc<Manager>> {
        self.managers.iter().find(|m| m.queue_name() == queue)
    }

    pub fn len(&self) -> usize {
        self.managers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }
}

impl WorkerDirectory for ManagerDirectory {
    fn snapshot(&self) -> Vec<ManagerSnapshot> {
        self.managers.iter().map(|m| m.snapshot()).collect()
    }

    fn snapshot_queue(&self, queue: &str) -> Vec<ManagerSnapshot> {
        self.managers
            .iter()
            .filter(|m| m.queue_name() == queue)
            .map(|m| m.snapshot())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(arg: &str) -> JobMessage {
        JobMessage::new(json!({"queue": "default", "args": [arg]}))
    }

    #[test]
    fn test_worker_lifecycle() {
        let worker = Worker::new();
        assert!(worker.snapshot().active().is_none());

        worker.begin_at(message("a"), 1_690_000_000);
        let active = worker.snapshot().active().expect("worker should be active");
        assert_eq!(active.started_at, 1_690_000_000);
        assert_eq!(active.message, message("a"));

        worker.finish();
        assert_eq!(worker.snapshot(), WorkerSnapshot::default());
    }

    #[test]
    fn test_begin_uses_current_time() {
        let worker = Worker::new();
        worker.begin(message("a"));
        assert!(worker.snapshot().started_at > 0);
    }

    #[test]
    fn test_torn_snapshot_is_idle() {
        let message_only = WorkerSnapshot {
            message: Some(message("a")),
            started_at: 0,
        };
        assert!(message_only.active().is_none());

        let time_only = WorkerSnapshot {
            message: None,
            started_at: 1_690_000_000,
        };
        assert!(time_only.active().is_none());
    }

    #[test]
    fn test_directory_from_queues() {
        let directory = ManagerDirectory::from_queues([("default", 3), ("mailers", 1)]);
        assert_eq!(directory.len(), 2);
        assert_eq!(directory.managers()[0].workers().len(), 3);
        assert_eq!(
            directory.manager("mailers").map(|m| m.workers().len()),
            Some(1)
        );
        assert!(directory.manager("missing").is_none());
    }

    #[test]
    fn test_snapshot_preserves_order() {
        let directory = ManagerDirectory::from_queues([("default", 2), ("mailers", 2)]);
        let default = directory.manager("default").expect("default manager");
        default.workers()[1].begin_at(message("second"), 20);
        default.workers()[0].begin_at(message("first"), 10);

        let snapshot = directory.snapshot();
        let queues: Vec<_> = snapshot.iter().map(|m| m.queue.as_str()).collect();
        assert_eq!(queues, vec!["default", "mailers"]);

        let active: Vec<_> = snapshot[0].active_jobs().map(|j| j.started_at).collect();
        assert_eq!(active, vec![10, 20]);
        assert_eq!(snapshot[1].active_jobs().count(), 0);
    }

    #[test]
    fn test_snapshot_queue_filters() {
        let directory = ManagerDirectory::from_queues([("default", 1), ("mailers", 1)]);
        let snapshot = directory.snapshot_queue("mailers");
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].queue, "mailers");
        assert!(directory.snapshot_queue("missing").is_empty());
    }

    #[test]
    fn test_concurrent_writers_never_break_readers() {
        let directory = ManagerDirectory::from_queues([("default", 4)]);
        let manager = Arc::clone(directory.manager("default").expect("default manager"));

        let writer = std::thread::spawn(move || {
            for i in 0..1000 {
                let worker = &manager.workers()[i % 4];
                worker.begin_at(message("x"), i as i64 + 1);
                worker.finish();
            }
        });

        for _ in 0..1000 {
            for snapshot in directory.snapshot() {
                for job in snapshot.active_jobs() {
                    assert!(job.started_at > 0);
                }
            }
        }

        writer.join().expect("writer thread should finish");
    }
}
