//! Service configuration types.

use serde::{Deserialize, Serialize};

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// AEMET OpenData API key (empty means AEMET calls fail fast).
    #[serde(default)]
    pub aemet_api_key: String,

    /// OpenWeather API key (empty means OpenWeather calls fail fast).
    #[serde(default)]
    pub openweather_api_key: String,

    /// Path to the static beach dataset.
    #[serde(default = "default_beaches_path")]
    pub beaches_path: String,

    /// Cache parameters.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Hedged-fetch parameters.
    #[serde(default)]
    pub hedge: HedgeConfig,

    /// Timing parameters.
    #[serde(default)]
    pub timing: TimingConfig,
}

/// TTL cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Time-to-live for cached provider responses (seconds).
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

/// Hedged weather-fetch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HedgeConfig {
    /// Head start given to the primary provider before the secondary is
    /// launched (milliseconds).
    #[serde(default = "default_hedge_delay")]
    pub delay_ms: u64,
}

/// Timing configuration (seconds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Per-request timeout for upstream provider calls.
    #[serde(default = "default_provider_timeout")]
    pub provider_timeout_secs: u64,

    /// Refresh interval for the watch loop.
    #[serde(default = "default_watch_interval")]
    pub watch_interval_secs: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_beaches_path() -> String {
    "data/beaches.json".into()
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_hedge_delay() -> u64 {
    300
}

fn default_provider_timeout() -> u64 {
    7
}

fn default_watch_interval() -> u64 {
    600
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
        }
    }
}

impl Default for HedgeConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_hedge_delay(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            provider_timeout_secs: default_provider_timeout(),
            watch_interval_secs: default_watch_interval(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            aemet_api_key: String::new(),
            openweather_api_key: String::new(),
            beaches_path: default_beaches_path(),
            cache: CacheConfig::default(),
            hedge: HedgeConfig::default(),
            timing: TimingConfig::default(),
        }
    }
}
