//! OpenWeather API client.
//!
//! Current conditions (`/weather`), 3-hourly forecast slots (`/forecast`)
//! and the current UV index (`/uvi`), all by coordinates. Requests are
//! metric and Spanish-localized so descriptions blend with the coastal
//! forecast texts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::ports::{SlotForecastProvider, UvProvider, WeatherProvider};
use common::{ForecastSeries, ForecastSlot, ProviderError, ProviderErrorKind, Weather};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

const PROVIDER: &str = "openweather";
const API_BASE: &str = "https://api.openweathermap.org/data/2.5";

/// OpenWeather API client with connection pooling.
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    client: reqwest::Client,
    api_key: String,
}

// ── OpenWeather response types ────────────────────────────────────────

/// Response from `/weather`.
#[derive(Debug, Deserialize)]
pub struct CurrentResponse {
    #[serde(default)]
    pub dt: Option<i64>,
    #[serde(default)]
    pub main: Option<MainBlock>,
    #[serde(default)]
    pub weather: Vec<ConditionBlock>,
    #[serde(default)]
    pub wind: Option<WindBlock>,
    #[serde(default)]
    pub clouds: Option<CloudsBlock>,
}

#[derive(Debug, Deserialize)]
pub struct MainBlock {
    #[serde(default)]
    pub temp: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub pressure: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConditionBlock {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WindBlock {
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub deg: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct CloudsBlock {
    #[serde(default)]
    pub all: Option<f64>,
}

/// Response from `/forecast` (5 day / 3 hour).
#[derive(Debug, Deserialize)]
pub struct ForecastResponse {
    #[serde(default)]
    pub list: Vec<ForecastRow>,
    #[serde(default)]
    pub city: Option<CityBlock>,
}

#[derive(Debug, Deserialize)]
pub struct ForecastRow {
    #[serde(default)]
    pub dt: Option<i64>,
    #[serde(default)]
    pub main: Option<MainBlock>,
    #[serde(default)]
    pub weather: Vec<ConditionBlock>,
    #[serde(default)]
    pub wind: Option<WindBlock>,
    #[serde(default)]
    pub clouds: Option<CloudsBlock>,
}

#[derive(Debug, Deserialize)]
pub struct CityBlock {
    /// UTC offset of the location in seconds.
    #[serde(default)]
    pub timezone: Option<i32>,
}

/// Response from `/uvi`.
#[derive(Debug, Deserialize)]
pub struct UvResponse {
    pub value: f64,
}

// ── Implementation ────────────────────────────────────────────────────

impl OpenWeatherClient {
    pub fn new(api_key: String, timeout: std::time::Duration) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("beachcast/0.1 (beach conditions service)")
            .pool_max_idle_per_host(4)
            .timeout(timeout)
            .build()
            .expect("failed to build OpenWeather HTTP client");

        Self { client, api_key }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        lat: f64,
        lon: f64,
    ) -> Result<T, ProviderError> {
        let key = self.api_key.trim();
        if key.is_empty() {
            return Err(ProviderError::missing_credentials(PROVIDER));
        }

        let url = format!("{}/{}", API_BASE, path);
        debug!("Fetching OpenWeather {}: lat={} lon={}", path, lat, lon);

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("units", "metric".to_string()),
                ("lang", "es".to_string()),
                ("appid", key.to_string()),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::status(
                PROVIDER,
                status,
                body.chars().take(300).collect::<String>(),
            ));
        }

        resp.json().await.map_err(|e| {
            ProviderError::bad_payload(
                PROVIDER,
                format!("JSON parse error for ({},{}): {}", lat, lon, e),
            )
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn current_by_coords(&self, lat: f64, lon: f64) -> Result<Weather, ProviderError> {
        let current: CurrentResponse = self.get_json("weather", lat, lon).await?;
        Ok(weather_from_current(&current))
    }
}

#[async_trait]
impl SlotForecastProvider for OpenWeatherClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn slots_by_coords(&self, lat: f64, lon: f64) -> Result<ForecastSeries, ProviderError> {
        let forecast: ForecastResponse = self.get_json("forecast", lat, lon).await?;
        let series = series_from_forecast(&forecast);

        if series.slots.is_empty() {
            return Err(ProviderError::bad_payload(
                PROVIDER,
                format!("no forecast timesteps for ({},{})", lat, lon),
            ));
        }

        debug!(
            "Got {} forecast timesteps for ({},{}), tz offset {}s",
            series.slots.len(),
            lat,
            lon,
            series.timezone_offset_secs
        );
        Ok(series)
    }
}

#[async_trait]
impl UvProvider for OpenWeatherClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn uv_index_by_coords(&self, lat: f64, lon: f64) -> Result<f64, ProviderError> {
        let uv: UvResponse = self.get_json("uvi", lat, lon).await?;
        Ok(uv.value)
    }
}

// ── Mapping helpers ───────────────────────────────────────────────────

fn weather_from_current(d: &CurrentResponse) -> Weather {
    let condition = d.weather.first();

    Weather {
        source: PROVIDER.to_string(),
        timestamp: d
            .dt
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or_else(Utc::now),
        temperature_c: d.main.as_ref().and_then(|m| m.temp),
        description: condition.and_then(|c| c.description.clone()),
        icon: condition.and_then(|c| c.icon.clone()),
        wind_speed_ms: d.wind.as_ref().and_then(|w| w.speed),
        wind_direction_deg: d.wind.as_ref().and_then(|w| w.deg),
        humidity_pct: d.main.as_ref().and_then(|m| m.humidity),
        pressure_hpa: d.main.as_ref().and_then(|m| m.pressure),
        clouds_pct: d.clouds.as_ref().and_then(|c| c.all),
    }
}

fn series_from_forecast(d: &ForecastResponse) -> ForecastSeries {
    ForecastSeries {
        source: PROVIDER.to_string(),
        timezone_offset_secs: d.city.as_ref().and_then(|c| c.timezone).unwrap_or(0),
        slots: d.list.iter().filter_map(slot_from_row).collect(),
    }
}

/// Rows without a timestamp cannot be placed on a day and are dropped.
fn slot_from_row(row: &ForecastRow) -> Option<ForecastSlot> {
    let timestamp = DateTime::from_timestamp(row.dt?, 0)?;
    let condition = row.weather.first();

    Some(ForecastSlot {
        timestamp,
        temperature_c: row.main.as_ref().and_then(|m| m.temp),
        description: condition.and_then(|c| c.description.clone()),
        icon: condition.and_then(|c| c.icon.clone()),
        wind_speed_ms: row.wind.as_ref().and_then(|w| w.speed),
        clouds_pct: row.clouds.as_ref().and_then(|c| c.all),
    })
}

fn transport_error(e: reqwest::Error) -> ProviderError {
    let kind = if e.is_timeout() {
        ProviderErrorKind::Timeout
    } else {
        ProviderErrorKind::Network
    };
    ProviderError::new(PROVIDER, kind, e.to_string())
}
