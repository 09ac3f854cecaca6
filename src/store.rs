use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Abstract storage interface for identity-keyed request counters.
///
/// This trait is designed to support both in-memory and distributed backends.
/// It assumes a key-value model where the value is an integer counter with an
/// optional time-to-live. Correctness of the admission decision depends on
/// [`incr`](CounterStore::incr) being atomic across concurrent callers for
/// the same key; the store is the only synchronization point in the system.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Error type for storage operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch the raw counter value for `key`.
    ///
    /// Returns `None` if the key was never written or its TTL has elapsed.
    /// The value is the store's string representation of the counter; callers
    /// own the parse.
    async fn get(&self, key: &str) -> Result<Option<String>, Self::Error>;

    /// Atomically increment the counter at `key` by 1, creating it at 1 if
    /// absent.
    async fn incr(&self, key: &str) -> Result<(), Self::Error>;

    /// Set or overwrite the remaining time-to-live on `key`.
    ///
    /// Has no effect on the counter's current value. A no-op for keys that
    /// don't exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone)]
struct Entry {
    count: u64,
    // None until `expire` is called, matching stores where a fresh counter
    // carries no TTL.
    deadline: Option<Instant>,
}

impl Entry {
    fn expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// Simple in-memory counter store.
///
/// Suitable for tests and single-process deployments; state is shared across
/// clones.
#[derive(Default, Clone, Debug)]
pub struct InMemoryCounterStore {
    data: Arc<Mutex<HashMap<String, Entry>>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time left until `key` expires, if the key exists and carries a TTL.
    pub fn remaining_ttl(&self, key: &str) -> Option<Duration> {
        let guard = self.data.lock().unwrap();
        let entry = guard.get(key)?;
        if entry.expired() {
            return None;
        }
        entry.deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    type Error = std::convert::Infallible;

    async fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        let mut guard = self.data.lock().unwrap();
        match guard.get(key) {
            Some(entry) if entry.expired() => {
                guard.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.count.to_string())),
            None => Ok(None),
        }
    }

    async fn incr(&self, key: &str) -> Result<(), Self::Error> {
        let mut guard = self.data.lock().unwrap();
        if guard.get(key).is_some_and(Entry::expired) {
            guard.remove(key);
        }
        let entry = guard
            .entry(key.to_string())
            .or_insert(Entry { count: 0, deadline: None });
        entry.count += 1;
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), Self::Error> {
        let mut guard = self.data.lock().unwrap();
        if let Some(entry) = guard.get_mut(key) {
            entry.deadline = Some(Instant::now() + ttl);
        }
        Ok(())
    }
}
