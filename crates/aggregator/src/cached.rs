//! Cache-aside wrappers around the provider ports.
//!
//! Every upstream call the services make goes through one of these, so
//! a burst of lookups for the same beach hits each provider at most
//! once per TTL window. Failed fetches are never cached; the next call
//! retries the upstream.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::ports::{
    BeachForecastProvider, FlagProvider, SlotForecastProvider, UvProvider, WeatherProvider,
};
use common::{BeachForecast, FlagStatus, ForecastSeries, ProviderError, Weather};

use crate::cache::{keys, TtlCache};

/// Caching decorator for a [`WeatherProvider`].
pub struct CachedWeather {
    inner: Arc<dyn WeatherProvider>,
    cache: TtlCache<String, Weather>,
    ttl: Duration,
}

impl CachedWeather {
    pub fn new(inner: Arc<dyn WeatherProvider>, ttl: Duration) -> Self {
        Self {
            inner,
            cache: TtlCache::new(),
            ttl,
        }
    }
}

#[async_trait]
impl WeatherProvider for CachedWeather {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn current_by_coords(&self, lat: f64, lon: f64) -> Result<Weather, ProviderError> {
        let key = keys::weather(self.inner.name(), lat, lon);
        self.cache
            .get_or_set(key, self.ttl, || self.inner.current_by_coords(lat, lon))
            .await
    }
}

/// Caching decorator for a [`BeachForecastProvider`].
pub struct CachedBeachForecast {
    inner: Arc<dyn BeachForecastProvider>,
    cache: TtlCache<String, BeachForecast>,
    ttl: Duration,
}

impl CachedBeachForecast {
    pub fn new(inner: Arc<dyn BeachForecastProvider>, ttl: Duration) -> Self {
        Self {
            inner,
            cache: TtlCache::new(),
            ttl,
        }
    }
}

#[async_trait]
impl BeachForecastProvider for CachedBeachForecast {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn forecast_by_beach_code(&self, code: &str) -> Result<BeachForecast, ProviderError> {
        let key = keys::beach_forecast(self.inner.name(), code);
        self.cache
            .get_or_set(key, self.ttl, || self.inner.forecast_by_beach_code(code))
            .await
    }
}

/// Caching decorator for a [`SlotForecastProvider`].
pub struct CachedSlotForecast {
    inner: Arc<dyn SlotForecastProvider>,
    cache: TtlCache<String, ForecastSeries>,
    ttl: Duration,
}

impl CachedSlotForecast {
    pub fn new(inner: Arc<dyn SlotForecastProvider>, ttl: Duration) -> Self {
        Self {
            inner,
            cache: TtlCache::new(),
            ttl,
        }
    }
}

#[async_trait]
impl SlotForecastProvider for CachedSlotForecast {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn slots_by_coords(&self, lat: f64, lon: f64) -> Result<ForecastSeries, ProviderError> {
        let key = keys::slots(self.inner.name(), lat, lon);
        self.cache
            .get_or_set(key, self.ttl, || self.inner.slots_by_coords(lat, lon))
            .await
    }
}

/// Caching decorator for a [`UvProvider`].
pub struct CachedUv {
    inner: Arc<dyn UvProvider>,
    cache: TtlCache<String, f64>,
    ttl: Duration,
}

impl CachedUv {
    pub fn new(inner: Arc<dyn UvProvider>, ttl: Duration) -> Self {
        Self {
            inner,
            cache: TtlCache::new(),
            ttl,
        }
    }
}

#[async_trait]
impl UvProvider for CachedUv {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn uv_index_by_coords(&self, lat: f64, lon: f64) -> Result<f64, ProviderError> {
        let key = keys::uv(self.inner.name(), lat, lon);
        self.cache
            .get_or_set(key, self.ttl, || self.inner.uv_index_by_coords(lat, lon))
            .await
    }
}

/// Caching decorator for a [`FlagProvider`]. A confirmed "no flag
/// posted" answer is a valid result and is cached like any other.
pub struct CachedFlag {
    inner: Arc<dyn FlagProvider>,
    cache: TtlCache<String, Option<FlagStatus>>,
    ttl: Duration,
}

impl CachedFlag {
    pub fn new(inner: Arc<dyn FlagProvider>, ttl: Duration) -> Self {
        Self {
            inner,
            cache: TtlCache::new(),
            ttl,
        }
    }
}

#[async_trait]
impl FlagProvider for CachedFlag {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn flag_by_red_cross_id(&self, id: u32) -> Result<Option<FlagStatus>, ProviderError> {
        let key = keys::flag(id);
        self.cache
            .get_or_set(key, self.ttl, || self.inner.flag_by_red_cross_id(id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;
    use common::ProviderErrorKind;

    use super::*;

    struct CountingWeather {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingWeather {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl WeatherProvider for CountingWeather {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn current_by_coords(&self, lat: f64, _lon: f64) -> Result<Weather, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ProviderError::new(
                    "counting",
                    ProviderErrorKind::Network,
                    "unreachable",
                ));
            }
            Ok(Weather {
                source: "counting".to_string(),
                description: Some("despejado".to_string()),
                temperature_c: Some(lat),
                humidity_pct: None,
                pressure_hpa: None,
                wind_speed_ms: None,
                wind_direction_deg: None,
                clouds_pct: None,
                icon: None,
                timestamp: Utc::now(),
            })
        }
    }

    struct CountingFlags {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FlagProvider for CountingFlags {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn flag_by_red_cross_id(&self, _id: u32) -> Result<Option<FlagStatus>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    #[tokio::test]
    async fn repeated_lookups_hit_the_upstream_once() {
        let inner = CountingWeather::new(false);
        let cached = CachedWeather::new(inner.clone(), Duration::from_secs(300));

        for _ in 0..4 {
            let weather = cached.current_by_coords(43.4628, -3.8044).await.unwrap();
            assert_eq!(weather.temperature_c, Some(43.4628));
        }

        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_coordinates_get_distinct_entries() {
        let inner = CountingWeather::new(false);
        let cached = CachedWeather::new(inner.clone(), Duration::from_secs(300));

        cached.current_by_coords(43.4628, -3.8044).await.unwrap();
        cached.current_by_coords(43.4752, -3.8250).await.unwrap();

        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failures_pass_through_and_are_retried() {
        let inner = CountingWeather::new(true);
        let cached = CachedWeather::new(inner.clone(), Duration::from_secs(300));

        assert!(cached.current_by_coords(43.0, -3.0).await.is_err());
        assert!(cached.current_by_coords(43.0, -3.0).await.is_err());

        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn absent_flag_answers_are_cached() {
        let inner = Arc::new(CountingFlags {
            calls: AtomicUsize::new(0),
        });
        let cached = CachedFlag::new(inner.clone(), Duration::from_secs(300));

        assert_eq!(cached.flag_by_red_cross_id(42).await.unwrap(), None);
        assert_eq!(cached.flag_by_red_cross_id(42).await.unwrap(), None);

        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }
}
