//! Generic TTL cache for provider responses.
//!
//! Backed by `DashMap` for concurrent access without a global lock.
//! Expiry is lazy: an entry past its deadline is dropped by whichever
//! `get` finds it, there is no background sweep. There is also no
//! single-flight: two tasks missing the same key at the same time both
//! run their compute and the later insert wins. Upstream reads here are
//! idempotent, so the duplicated call is harmless.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Time source for expiry checks, injectable so tests can steer it.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Real monotonic time.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Key-value cache where every entry carries its own time-to-live.
pub struct TtlCache<K, V> {
    store: DashMap<K, Entry<V>>,
    clock: Arc<dyn Clock>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            store: DashMap::new(),
            clock,
        }
    }

    /// Live value for `key`. An expired entry is removed and reported
    /// as a miss.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();

        match self.store.get(key) {
            None => return None,
            Some(entry) if entry.expires_at > now => return Some(entry.value.clone()),
            Some(_) => {}
        }

        // Re-check the deadline under the shard lock so a concurrent
        // refresh is not thrown away.
        self.store.remove_if(key, |_, entry| entry.expires_at <= now);
        None
    }

    /// Store `value` under `key` for `ttl`, replacing any previous entry.
    pub fn set(&self, key: K, value: V, ttl: Duration) {
        let entry = Entry {
            value,
            expires_at: self.clock.now() + ttl,
        };
        self.store.insert(key, entry);
    }

    /// Live value for `key`, or run `compute` and cache its success.
    /// Errors pass through uncached so the next caller retries.
    pub async fn get_or_set<E, F, Fut>(&self, key: K, ttl: Duration, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let value = compute().await?;
        self.set(key, value.clone(), ttl);
        Ok(value)
    }

    /// Number of stored entries, expired ones included until a `get`
    /// evicts them.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Standardized cache keys, so entries from different callers never
/// collide and coordinates are rounded to a stable precision.
pub mod keys {
    pub fn weather(provider: &str, lat: f64, lon: f64) -> String {
        format!("weather:{}:{:.4},{:.4}", provider, lat, lon)
    }

    pub fn beach_forecast(provider: &str, code: &str) -> String {
        format!("forecast:beach:{}:{}", provider, code)
    }

    pub fn slots(provider: &str, lat: f64, lon: f64) -> String {
        format!("forecast:slots:{}:{:.4},{:.4}", provider, lat, lon)
    }

    pub fn uv(provider: &str, lat: f64, lon: f64) -> String {
        format!("uv:{}:{:.4},{:.4}", provider, lat, lon)
    }

    pub fn flag(id: u32) -> String {
        format!("flag:redcross:{}", id)
    }
}

#[cfg(test)]
pub(crate) struct ManualClock {
    now: std::sync::Mutex<Instant>,
}

#[cfg(test)]
impl ManualClock {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            now: std::sync::Mutex::new(Instant::now()),
        })
    }

    pub(crate) fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn ttl() -> Duration {
        Duration::from_secs(300)
    }

    #[test]
    fn hit_within_ttl() {
        let clock = ManualClock::new();
        let cache: TtlCache<String, u32> = TtlCache::with_clock(clock.clone());

        cache.set("a".to_string(), 7, ttl());
        clock.advance(Duration::from_secs(299));

        assert_eq!(cache.get(&"a".to_string()), Some(7));
    }

    #[test]
    fn expired_entry_is_a_miss_and_is_evicted() {
        let clock = ManualClock::new();
        let cache: TtlCache<String, u32> = TtlCache::with_clock(clock.clone());

        cache.set("a".to_string(), 7, ttl());
        clock.advance(Duration::from_secs(300));

        assert_eq!(cache.get(&"a".to_string()), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn set_refreshes_the_deadline() {
        let clock = ManualClock::new();
        let cache: TtlCache<String, u32> = TtlCache::with_clock(clock.clone());

        cache.set("a".to_string(), 7, ttl());
        clock.advance(Duration::from_secs(200));
        cache.set("a".to_string(), 8, ttl());
        clock.advance(Duration::from_secs(200));

        assert_eq!(cache.get(&"a".to_string()), Some(8));
    }

    #[tokio::test]
    async fn get_or_set_computes_once() {
        let cache: TtlCache<String, u32> = TtlCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: Result<u32, ()> = cache
                .get_or_set("a".to_string(), ttl(), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                })
                .await;
            assert_eq!(value, Ok(42));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn get_or_set_does_not_cache_failures() {
        let cache: TtlCache<String, u32> = TtlCache::new();
        let calls = AtomicUsize::new(0);

        let first: Result<u32, &str> = cache
            .get_or_set("a".to_string(), ttl(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("upstream down")
            })
            .await;
        assert_eq!(first, Err("upstream down"));
        assert!(cache.is_empty());

        let second: Result<u32, &str> = cache
            .get_or_set("a".to_string(), ttl(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(42)
            })
            .await;
        assert_eq!(second, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn get_or_set_recomputes_after_expiry() {
        let clock = ManualClock::new();
        let cache: TtlCache<String, u32> = TtlCache::with_clock(clock.clone());
        let calls = AtomicUsize::new(0);

        let compute = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<u32, ()>(42)
        };

        let _ = cache.get_or_set("a".to_string(), ttl(), compute).await;
        clock.advance(Duration::from_secs(301));
        let _ = cache.get_or_set("a".to_string(), ttl(), compute).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn key_formats_are_stable() {
        assert_eq!(
            keys::weather("aemet", 43.4628, -3.8044),
            "weather:aemet:43.4628,-3.8044"
        );
        assert_eq!(
            keys::beach_forecast("aemet", "3907601"),
            "forecast:beach:aemet:3907601"
        );
        assert_eq!(keys::flag(1234), "flag:redcross:1234");
        assert_eq!(
            keys::uv("openweather", 43.46281, -3.80443),
            "uv:openweather:43.4628,-3.8044"
        );
    }
}
