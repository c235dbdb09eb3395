//! Provider ports consumed by the aggregation services.
//!
//! Each upstream integration implements one or more of these traits. The
//! aggregator only sees the traits, so providers can be wrapped (caching)
//! or replaced (tests) without touching the services.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::{BeachForecast, FlagStatus, ForecastSeries, Tides, Weather};

/// Current observed conditions by coordinates.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Short provider tag used in cache keys and logs.
    fn name(&self) -> &'static str;

    async fn current_by_coords(&self, lat: f64, lon: f64) -> Result<Weather, ProviderError>;
}

/// Two-day forecast keyed by a provider-specific beach code.
#[async_trait]
pub trait BeachForecastProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn forecast_by_beach_code(&self, code: &str) -> Result<BeachForecast, ProviderError>;
}

/// Fixed-interval forecast timesteps by coordinates.
#[async_trait]
pub trait SlotForecastProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn slots_by_coords(&self, lat: f64, lon: f64) -> Result<ForecastSeries, ProviderError>;
}

/// Current UV index by coordinates.
#[async_trait]
pub trait UvProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn uv_index_by_coords(&self, lat: f64, lon: f64) -> Result<f64, ProviderError>;
}

/// Surveillance flag by the surveillance service's own beach id.
#[async_trait]
pub trait FlagProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` when the service lists no flag for that id.
    async fn flag_by_red_cross_id(&self, id: u32) -> Result<Option<FlagStatus>, ProviderError>;
}

/// Tide table by coordinates.
#[async_trait]
pub trait TidesProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn tides_by_coords(&self, lat: f64, lon: f64) -> Result<Option<Tides>, ProviderError>;
}
