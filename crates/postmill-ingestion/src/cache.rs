//! Single-flight lookup cache.
//!
//! Concurrent lookups for the same key collapse into one backing query: the
//! first caller becomes the leader and runs the query, later callers queue
//! behind it and receive the leader's result.
//!
//! Resolved values, including "confirmed absent", are kept for the lifetime
//! of the cache and never refreshed. A profile that changes upstream after
//! it was resolved stays stale until the process restarts.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

use postmill_db::PublisherProfile;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::debug;

/// Publisher profiles keyed by `biz`.
pub type ProfileCache = CoalescingCache<String, PublisherProfile>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("backing lookup failed: {0}")]
    Backend(String),

    #[error("leading lookup was dropped before completing")]
    LeaderAborted,
}

/// A lookup result: the value, a confirmed absence, or the failure.
pub type Outcome<V> = Result<Option<V>, CacheError>;

struct CacheState<K, V> {
    /// `None` is the confirmed-absent sentinel.
    resolved: HashMap<K, Option<V>>,
    /// Present while a lookup for the key is in flight.
    waiters: HashMap<K, Vec<oneshot::Sender<Outcome<V>>>>,
}

pub struct CoalescingCache<K, V> {
    state: Mutex<CacheState<K, V>>,
}

impl<K, V> Default for CoalescingCache<K, V> {
    fn default() -> Self {
        Self {
            state: Mutex::new(CacheState {
                resolved: HashMap::new(),
                waiters: HashMap::new(),
            }),
        }
    }
}

impl<K, V> std::fmt::Debug for CoalescingCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("CoalescingCache")
            .field("resolved", &state.resolved.len())
            .field("in_flight", &state.waiters.len())
            .finish()
    }
}

enum Role<V> {
    Leader,
    Follower(oneshot::Receiver<Outcome<V>>),
}

impl<K, V> CoalescingCache<K, V>
where
    K: Eq + Hash + Clone + Display,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `key`, running `fetch` only if no result is cached and no
    /// lookup is already in flight.
    ///
    /// A failed lookup is reported to the leader and every queued follower
    /// and is not cached; the next call starts a fresh lookup.
    pub async fn resolve<F, Fut, E>(&self, key: &K, fetch: F) -> Outcome<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<V>, E>>,
        E: Display,
    {
        let role = {
            let mut state = self.lock();
            if let Some(value) = state.resolved.get(key) {
                return Ok(value.clone());
            }
            match state.waiters.get_mut(key) {
                Some(queue) => {
                    let (tx, rx) = oneshot::channel();
                    queue.push(tx);
                    Role::Follower(rx)
                }
                None => {
                    state.waiters.insert(key.clone(), Vec::new());
                    Role::Leader
                }
            }
        };

        match role {
            Role::Follower(rx) => {
                debug!(%key, "joining in-flight lookup");
                rx.await.unwrap_or(Err(CacheError::LeaderAborted))
            }
            Role::Leader => {
                let mut flight = Flight { cache: self, key: Some(key.clone()) };
                let outcome = fetch().await.map_err(|e| CacheError::Backend(e.to_string()));
                flight.complete(outcome.clone());
                outcome
            }
        }
    }

    /// Cached value without triggering a lookup. `Some(None)` is a cached absence.
    pub fn get(&self, key: &K) -> Option<Option<V>> {
        self.lock().resolved.get(key).cloned()
    }

    pub fn is_resolved(&self, key: &K) -> bool {
        self.lock().resolved.contains_key(key)
    }

    pub fn is_in_flight(&self, key: &K) -> bool {
        self.lock().waiters.contains_key(key)
    }

    /// Number of resolved keys.
    pub fn len(&self) -> usize {
        self.lock().resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<K, V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The leader's claim on a key. Dropping it without completing releases the
/// followers with [`CacheError::LeaderAborted`].
struct Flight<'a, K, V>
where
    K: Eq + Hash,
{
    cache: &'a CoalescingCache<K, V>,
    key: Option<K>,
}

impl<K, V> Flight<'_, K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn complete(&mut self, outcome: Outcome<V>) {
        let Some(key) = self.key.take() else { return };
        let waiters = {
            let mut state = self.cache.state.lock().unwrap_or_else(PoisonError::into_inner);
            let waiters = state.waiters.remove(&key).unwrap_or_default();
            if let Ok(value) = &outcome {
                state.resolved.insert(key, value.clone());
            }
            waiters
        };
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }
}

impl<K, V> Drop for Flight<'_, K, V>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            let mut state = self.cache.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.waiters.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    async fn slow_lookup(calls: &AtomicUsize, value: Option<u32>) -> Result<Option<u32>, String> {
        calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(value)
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_lookup() {
        let cache: CoalescingCache<String, u32> = CoalescingCache::new();
        let calls = AtomicUsize::new(0);
        let key = "biz".to_string();

        let lookups = (0..16).map(|_| cache.resolve(&key, || slow_lookup(&calls, Some(7))));
        let results = futures::future::join_all(lookups).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| *r == Ok(Some(7))));
        assert!(!cache.is_in_flight(&key));
    }

    #[tokio::test]
    async fn test_absent_result_is_cached() {
        let cache: CoalescingCache<String, u32> = CoalescingCache::new();
        let calls = AtomicUsize::new(0);
        let key = "missing".to_string();

        assert_eq!(cache.resolve(&key, || slow_lookup(&calls, None)).await, Ok(None));
        assert_eq!(cache.resolve(&key, || slow_lookup(&calls, Some(1))).await, Ok(None));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get(&key), Some(None));
        assert!(cache.is_resolved(&key));
    }

    #[tokio::test]
    async fn test_distinct_keys_lookup_independently() {
        let cache: CoalescingCache<String, u32> = CoalescingCache::new();
        let calls = AtomicUsize::new(0);
        let (a, b) = ("a".to_string(), "b".to_string());

        let (ra, rb) = tokio::join!(
            cache.resolve(&a, || slow_lookup(&calls, Some(1))),
            cache.resolve(&b, || slow_lookup(&calls, Some(2))),
        );

        assert_eq!((ra, rb), (Ok(Some(1)), Ok(Some(2))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_failure_reaches_followers_and_is_not_cached() {
        let cache: CoalescingCache<String, u32> = CoalescingCache::new();
        let calls = AtomicUsize::new(0);
        let key = "flaky".to_string();

        let counter = &calls;
        let failing = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Err::<Option<u32>, _>("connection reset")
        };
        let (leader, follower) = tokio::join!(
            cache.resolve(&key, failing),
            cache.resolve(&key, || slow_lookup(&calls, Some(3))),
        );

        let expected = Err(CacheError::Backend("connection reset".to_string()));
        assert_eq!(leader, expected);
        assert_eq!(follower, expected);
        assert!(!cache.is_resolved(&key));

        assert_eq!(cache.resolve(&key, || slow_lookup(&calls, Some(3))).await, Ok(Some(3)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_dropped_leader_releases_followers() {
        let cache: Arc<CoalescingCache<String, u32>> = Arc::new(CoalescingCache::new());
        let key = "stuck".to_string();

        let leader = {
            let cache = cache.clone();
            let key = key.clone();
            tokio::spawn(async move {
                cache
                    .resolve(&key, || std::future::pending::<Result<Option<u32>, String>>())
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(cache.is_in_flight(&key));

        let follower = {
            let cache = cache.clone();
            let key = key.clone();
            tokio::spawn(async move { cache.resolve(&key, || async { Ok::<_, String>(Some(1)) }).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        leader.abort();
        assert_eq!(follower.await.unwrap(), Err(CacheError::LeaderAborted));
        assert!(!cache.is_in_flight(&key));
        assert_eq!(cache.resolve(&key, || async { Ok::<_, String>(Some(9)) }).await, Ok(Some(9)));
    }
}
