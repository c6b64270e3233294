//! Per-backend cache of normalized secrets
//!
//! Memoizes the last [`NormalizedSecret`] fetched for each service so that
//! several fields of the same service cost a single backend round-trip.
//! Entries expire after a TTL and the least recently used entry is evicted
//! once the capacity is reached.

use crate::secrets::types::NormalizedSecret;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;
use validator::Validate;

/// Default time-to-live of a cached service (5 minutes)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Default number of services kept per backend instance
pub const DEFAULT_CACHE_CAPACITY: usize = 32;

/// Cache behaviour of one backend instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CachePolicy {
    pub enabled: bool,
    #[validate(range(min = 1, max = 86400))]
    pub ttl_secs: u64,
    #[validate(range(min = 1, max = 10000))]
    pub capacity: usize,
}

impl CachePolicy {
    pub fn disabled() -> Self {
        Self { enabled: false, ..Self::default() }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self { enabled: true, ttl_secs: DEFAULT_CACHE_TTL_SECS, capacity: DEFAULT_CACHE_CAPACITY }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    secret: NormalizedSecret,
    inserted_at: Instant,
    last_used: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    tick: u64,
}

impl CacheState {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}

/// TTL + LRU cache keyed by lower-cased service name
#[derive(Debug, Clone)]
pub struct SecretCache {
    inner: Arc<Mutex<CacheState>>,
    ttl: Duration,
    capacity: usize,
}

impl SecretCache {
    /// Create a new cache with the specified TTL and capacity
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self { inner: Arc::new(Mutex::new(CacheState::default())), ttl, capacity: capacity.max(1) }
    }

    pub fn from_policy(policy: &CachePolicy) -> Self {
        Self::new(policy.ttl(), policy.capacity)
    }

    fn key(service: &str) -> String {
        service.to_lowercase()
    }

    /// Get a cached secret if present and not expired
    pub async fn get(&self, service: &str) -> Option<NormalizedSecret> {
        let key = Self::key(service);
        let mut state = self.inner.lock().await;
        let tick = state.next_tick();

        let expired = match state.entries.get_mut(&key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                entry.last_used = tick;
                debug!(service = %key, "Cache hit for service");
                return Some(entry.secret.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            debug!(service = %key, "Cache entry expired");
            state.entries.remove(&key);
        }
        None
    }

    /// Insert a secret, evicting the least recently used entry when full
    pub async fn insert(&self, service: &str, secret: NormalizedSecret) {
        let key = Self::key(service);
        let mut state = self.inner.lock().await;
        let tick = state.next_tick();

        if !state.entries.contains_key(&key) && state.entries.len() >= self.capacity {
            let ttl = self.ttl;
            state.entries.retain(|_, entry| entry.inserted_at.elapsed() < ttl);

            if state.entries.len() >= self.capacity {
                let oldest = state
                    .entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.last_used)
                    .map(|(name, _)| name.clone());
                if let Some(name) = oldest {
                    debug!(service = %name, "Evicting least recently used service");
                    state.entries.remove(&name);
                }
            }
        }

        debug!(service = %key, ttl_secs = %self.ttl.as_secs(), "Caching service");
        state
            .entries
            .insert(key, CacheEntry { secret, inserted_at: Instant::now(), last_used: tick });
    }

    /// Invalidate one service
    pub async fn invalidate(&self, service: &str) {
        let key = Self::key(service);
        debug!(service = %key, "Invalidating cached service");
        self.inner.lock().await.entries.remove(&key);
    }

    /// Clear all cache entries
    pub async fn clear(&self) {
        debug!("Clearing entire secret cache");
        self.inner.lock().await.entries.clear();
    }

    /// Get the number of entries in the cache
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    /// Check if the cache is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.entries.is_empty()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for SecretCache {
    fn default() -> Self {
        Self::from_policy(&CachePolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_secret(service: &str) -> NormalizedSecret {
        let mut secret = NormalizedSecret::new(service);
        secret.insert("api_key", "k1");
        secret
    }

    #[tokio::test]
    async fn test_cache_insert_and_get() {
        let cache = SecretCache::new(Duration::from_secs(60), 8);
        cache.insert("bugzilla", make_secret("bugzilla")).await;

        let cached = cache.get("bugzilla").await;
        assert!(cached.is_some());
        assert_eq!(cached.unwrap().get("api_key").unwrap().expose_secret(), "k1");
    }

    #[tokio::test]
    async fn test_cache_key_is_case_insensitive() {
        let cache = SecretCache::default();
        cache.insert("GitHub", make_secret("github")).await;

        assert!(cache.get("github").await.is_some());
        assert!(cache.get("GITHUB").await.is_some());
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_cache_expiration() {
        let cache = SecretCache::new(Duration::from_millis(50), 8);
        cache.insert("bugzilla", make_secret("bugzilla")).await;

        assert!(cache.get("bugzilla").await.is_some());

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(cache.get("bugzilla").await.is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_cache_evicts_least_recently_used() {
        let cache = SecretCache::new(Duration::from_secs(60), 2);

        cache.insert("a", make_secret("a")).await;
        cache.insert("b", make_secret("b")).await;
        // touch "a" so that "b" becomes the eviction candidate
        assert!(cache.get("a").await.is_some());
        cache.insert("c", make_secret("c")).await;

        assert_eq!(cache.len().await, 2);
        assert!(cache.get("a").await.is_some());
        assert!(cache.get("b").await.is_none());
        assert!(cache.get("c").await.is_some());
    }

    #[tokio::test]
    async fn test_cache_invalidate_and_clear() {
        let cache = SecretCache::default();
        cache.insert("one", make_secret("one")).await;
        cache.insert("two", make_secret("two")).await;

        cache.invalidate("ONE").await;
        assert!(cache.get("one").await.is_none());
        assert_eq!(cache.len().await, 1);

        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[test]
    fn test_cache_policy_defaults() {
        let policy = CachePolicy::default();
        assert!(policy.enabled);
        assert_eq!(policy.ttl(), Duration::from_secs(300));
        assert_eq!(policy.capacity, 32);
        assert!(!CachePolicy::disabled().enabled);
    }
}
