use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// In-memory cache whose entries expire after a fixed TTL
///
/// A zero TTL disables the cache: `set` is a no-op and `get` always misses.
///
/// Every invalidation bumps a generation counter. Callers read it with
/// [`generation`](Self::generation) before fetching a value and hand it back
/// to [`set`](Self::set), which drops the value if an invalidation happened in
/// between.
#[derive(Debug, Clone)]
pub struct Cache<T> {
    store: Arc<RwLock<HashMap<String, (T, Instant)>>>,
    generation: Arc<AtomicU64>,
    ttl: Duration,
}

impl<T: Clone + Send + Sync + 'static> Cache<T> {
    /// Creates a new in-memory cache with the specified TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            store: Arc::new(RwLock::new(HashMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
            ttl,
        }
    }

    /// Whether entries are stored at all
    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    /// Current invalidation generation
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Retrieves a live value from the cache by its key
    pub async fn get(&self, key: &str) -> Option<T> {
        let store = self.store.read().await;
        store
            .get(key)
            .filter(|(_, time)| time.elapsed() < self.ttl)
            .map(|(value, _)| value.clone())
    }

    /// Stores a value fetched while `seen` was the current generation
    ///
    /// Returns `false` without storing when the cache is disabled or was
    /// invalidated since `seen`. Expired entries are evicted on every store.
    pub async fn set(&self, key: &str, value: T, seen: u64) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let mut store = self.store.write().await;
        if self.generation() != seen {
            return false;
        }
        let ttl = self.ttl;
        store.retain(|_, (_, time)| time.elapsed() < ttl);
        store.insert(key.to_string(), (value, Instant::now()));
        true
    }

    /// Removes an entry and every entry below it in the `/` hierarchy
    pub async fn invalidate_prefix(&self, key: &str) -> usize {
        let mut store = self.store.write().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        let before = store.len();
        let nested = format!("{}/", key.trim_end_matches('/'));
        store.retain(|k, _| k != key && !k.starts_with(&nested));
        before - store.len()
    }
}
