//! In-process store.
//!
//! Keeps strings, lists and sorted sets in memory and answers the same read
//! commands as Redis. It records every command it executes and can be told to
//! fail, which makes it useful for embedding and for exercising fail-open
//! paths.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Command, KeyValueStore, Reply};
use crate::error::StoreError;

#[derive(Debug, Default)]
struct MemoryState {
    strings: HashMap<String, Vec<u8>>,
    lists: HashMap<String, Vec<Vec<u8>>>,
    /// Members kept sorted by (score, member).
    sorted_sets: HashMap<String, Vec<(f64, Vec<u8>)>>,
    failure: Option<String>,
    log: Vec<Command>,
    batches: usize,
}

/// In-memory implementation of [`KeyValueStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// SET key value
    pub fn set(&self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.state().strings.insert(key.into(), value.into());
    }

    /// RPUSH key value
    pub fn push(&self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.state()
            .lists
            .entry(key.into())
            .or_default()
            .push(value.into());
    }

    /// ZADD key score member
    pub fn zadd(&self, key: impl Into<String>, score: f64, member: impl Into<Vec<u8>>) {
        let member = member.into();
        let mut state = self.state();
        let set = state.sorted_sets.entry(key.into()).or_default();
        set.retain(|(_, existing)| *existing != member);
        let position = set
            .iter()
            .position(|(s, m)| (*s, m.as_slice()) > (score, member.as_slice()))
            .unwrap_or(set.len());
        set.insert(position, (score, member));
    }

    /// Makes every following batch fail with `reason`.
    pub fn fail_with(&self, reason: impl Into<String>) {
        self.state().failure = Some(reason.into());
    }

    /// Clears a failure set by [`MemoryStore::fail_with`].
    pub fn recover(&self) {
        self.state().failure = None;
    }

    /// Commands executed so far, in order.
    pub fn commands(&self) -> Vec<Command> {
        self.state().log.clone()
    }

    /// Number of batches executed so far.
    pub fn batches(&self) -> usize {
        self.state().batches
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn execute(&self, commands: &[Command]) -> Result<Vec<Reply>, StoreError> {
        let mut state = self.state();
        if let Some(reason) = &state.failure {
            return Err(StoreError::Unavailable(reason.clone()));
        }

        state.batches += 1;
        state.log.extend_from_slice(commands);

        Ok(commands.iter().map(|command| state.reply(command)).collect())
    }
}

impl MemoryState {
    fn reply(&self, command: &Command) -> Reply {
        match command {
            Command::Get(key) => self
                .strings
                .get(key)
                .map_or(Reply::Nil, |value| Reply::Bytes(value.clone())),
            Command::ZCard(key) => {
                Reply::Int(self.sorted_sets.get(key).map_or(0, |set| set.len()) as i64)
            }
            Command::LLen(key) => {
                Reply::Int(self.lists.get(key).map_or(0, |list| list.len()) as i64)
            }
            Command::ZRange { key, start, stop } => {
                let members = self.sorted_sets.get(key).map(Vec::as_slice).unwrap_or(&[]);
                let items = match resolve_range(members.len(), *start, *stop) {
                    Some((from, to)) => members[from..=to]
                        .iter()
                        .map(|(_, member)| Reply::Bytes(member.clone()))
                        .collect(),
                    None => Vec::new(),
                };
                Reply::Array(items)
            }
        }
    }
}

/// Resolves Redis-style inclusive indexes (negative counts from the end).
fn resolve_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start >= len || start > stop {
        return None;
    }
    Some((start as usize, stop as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_range() {
        assert_eq!(resolve_range(5, 0, -1), Some((0, 4)));
        assert_eq!(resolve_range(5, 1, 2), Some((1, 2)));
        assert_eq!(resolve_range(5, -2, -1), Some((3, 4)));
        assert_eq!(resolve_range(5, 0, 100), Some((0, 4)));
        assert_eq!(resolve_range(5, 4, 1), None);
        assert_eq!(resolve_range(0, 0, -1), None);
        assert_eq!(resolve_range(3, 0, -10), None);
    }

    #[tokio::test]
    async fn test_commands() {
        let store = MemoryStore::new();
        store.set("stat:processed", "42");
        store.push("queue:default", "a");
        store.push("queue:default", "b");
        store.zadd("goretry", 20.0, "late");
        store.zadd("goretry", 10.0, "early");

        let replies = store
            .execute(&[
                Command::Get("stat:processed".to_string()),
                Command::Get("stat:failed".to_string()),
                Command::LLen("queue:default".to_string()),
                Command::ZCard("goretry".to_string()),
                Command::zrange_all("goretry"),
            ])
            .await
            .expect("batch should run");

        assert_eq!(
            replies,
            vec![
                Reply::Bytes(b"42".to_vec()),
                Reply::Nil,
                Reply::Int(2),
                Reply::Int(2),
                Reply::Array(vec![
                    Reply::Bytes(b"early".to_vec()),
                    Reply::Bytes(b"late".to_vec())
                ]),
            ]
        );
        assert_eq!(store.batches(), 1);
        assert_eq!(store.commands().len(), 5);
    }

    #[test]
    fn test_zadd_replaces_member() {
        let store = MemoryStore::new();
        store.zadd("set", 1.0, "a");
        store.zadd("set", 3.0, "b");
        store.zadd("set", 5.0, "a");

        let state = store.state();
        let members: Vec<_> = state.sorted_sets["set"]
            .iter()
            .map(|(score, member)| (*score, member.clone()))
            .collect();
        assert_eq!(members, vec![(3.0, b"b".to_vec()), (5.0, b"a".to_vec())]);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = MemoryStore::new();
        store.fail_with("connection refused");

        let result = store.execute(&[Command::Get("k".to_string())]).await;
        assert!(matches!(result, Err(StoreError::Unavailable(ref r)) if r == "connection refused"));
        assert_eq!(store.batches(), 0);

        store.recover();
        assert!(store.execute(&[Command::Get("k".to_string())]).await.is_ok());
        assert_eq!(store.batches(), 1);
    }
}
