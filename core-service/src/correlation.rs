//! Operation ids and the pending-operation registry.
//!
//! Ids are a prefix plus a process-wide monotonic counter and are never
//! reused. The registry maps an id to exactly one waiting caller; resolving
//! an id removes and completes that entry alone.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationId(String);

impl OperationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OperationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Debug)]
pub struct OperationIdGenerator {
    prefix: String,
    counter: AtomicU64,
}

impl OperationIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }

    /// `{prefix}_{n}`, starting at 1.
    pub fn next(&self) -> OperationId {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        OperationId(format!("{}_{}", self.prefix, n))
    }
}

/// Callers waiting on out-of-band completions, keyed by operation id.
pub struct PendingOperations<T> {
    entries: Mutex<HashMap<OperationId, oneshot::Sender<T>>>,
}

impl<T> Default for PendingOperations<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> PendingOperations<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<OperationId, oneshot::Sender<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a waiter for `id`. Each id may be registered once.
    pub fn register(&self, id: OperationId) -> Result<oneshot::Receiver<T>> {
        let mut entries = self.lock();
        if entries.contains_key(&id) {
            return Err(CoreError::DuplicateOperation(id.to_string()));
        }
        let (tx, rx) = oneshot::channel();
        entries.insert(id, tx);
        Ok(rx)
    }

    /// Complete the waiter for `id` and remove it. Other entries are left
    /// alone. Returns false for an unknown (or already resolved) id.
    pub fn resolve(&self, id: &OperationId, value: T) -> bool {
        let Some(tx) = self.lock().remove(id) else {
            warn!(operation_id = %id, "Completion for unknown operation dropped");
            return false;
        };
        if tx.send(value).is_err() {
            debug!(operation_id = %id, "Caller stopped waiting before completion");
        }
        true
    }

    /// Remove `id` without completing it.
    pub fn cancel(&self, id: &OperationId) -> bool {
        self.lock().remove(id).is_some()
    }

    /// Complete every waiter with a value built from its id.
    pub fn fail_all(&self, make: impl Fn(&OperationId) -> T) -> usize {
        let drained: Vec<_> = self.lock().drain().collect();
        let count = drained.len();
        for (id, tx) in drained {
            let _ = tx.send(make(&id));
        }
        count
    }

    pub fn contains(&self, id: &OperationId) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_prefixed_and_unique() {
        let ids = OperationIdGenerator::new("AUTH");
        assert_eq!(ids.next().as_str(), "AUTH_1");
        assert_eq!(ids.next().as_str(), "AUTH_2");

        let seen: HashSet<OperationId> = (0..1000).map(|_| ids.next()).collect();
        assert_eq!(seen.len(), 1000);
    }

    #[test]
    fn test_ids_unique_across_threads() {
        let ids = std::sync::Arc::new(OperationIdGenerator::new("DB"));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = ids.clone();
                std::thread::spawn(move || (0..250).map(|_| ids.next()).collect::<Vec<_>>())
            })
            .collect();

        let all: HashSet<OperationId> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        assert_eq!(all.len(), 1000);
    }

    #[tokio::test]
    async fn test_resolve_touches_only_the_named_entry() {
        let pending = PendingOperations::<&'static str>::new();
        let first = pending.register(OperationId::from("OP_1")).unwrap();
        let mut second = pending.register(OperationId::from("OP_2")).unwrap();

        assert!(pending.resolve(&OperationId::from("OP_1"), "one"));

        assert_eq!(first.await.unwrap(), "one");
        assert!(second.try_recv().is_err());
        assert!(pending.contains(&OperationId::from("OP_2")));
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn test_resolve_is_at_most_once() {
        let pending = PendingOperations::<u8>::new();
        let _rx = pending.register(OperationId::from("OP_1")).unwrap();

        assert!(pending.resolve(&OperationId::from("OP_1"), 1));
        assert!(!pending.resolve(&OperationId::from("OP_1"), 2));
        assert!(!pending.resolve(&OperationId::from("OP_9"), 3));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let pending = PendingOperations::<u8>::new();
        let _rx = pending.register(OperationId::from("OP_1")).unwrap();
        assert!(matches!(
            pending.register(OperationId::from("OP_1")),
            Err(CoreError::DuplicateOperation(_))
        ));
    }

    #[tokio::test]
    async fn test_fail_all() {
        let pending = PendingOperations::<String>::new();
        let a = pending.register(OperationId::from("A_1")).unwrap();
        let b = pending.register(OperationId::from("A_2")).unwrap();

        assert_eq!(pending.fail_all(|id| format!("{} failed", id)), 2);

        assert_eq!(a.await.unwrap(), "A_1 failed");
        assert_eq!(b.await.unwrap(), "A_2 failed");
        assert!(pending.is_empty());
    }
}
