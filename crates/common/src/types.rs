//! Shared domain types for beach-condition aggregation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A beach from the static directory. Immutable after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Beach {
    pub id: String,
    pub name: String,
    pub municipality: String,
    /// AEMET beach forecast code (empty when the beach has none).
    pub forecast_code: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Cruz Roja surveillance id; `None` when the beach has no coverage.
    pub red_cross_id: Option<u32>,
}

/// Current observed conditions from one provider.
///
/// Everything except `source` and `timestamp` is optional: providers
/// report different subsets, and partial data is still useful downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Weather {
    /// Provider tag (e.g. "aemet", "openweather").
    pub source: String,
    /// When the observation was produced upstream; "now" only when the
    /// provider supplies no timestamp of its own.
    pub timestamp: DateTime<Utc>,
    pub temperature_c: Option<f64>,
    pub description: Option<String>,
    /// Provider-native icon code, unmapped.
    pub icon: Option<String>,
    pub wind_speed_ms: Option<f64>,
    pub wind_direction_deg: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub pressure_hpa: Option<f64>,
    pub clouds_pct: Option<f64>,
}

/// One merged day of beach conditions.
///
/// Fields start unset and are filled by enrichment layers in precedence
/// order; once a field has a value, later layers leave it alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub summary: Option<String>,
    pub temperature_c: Option<f64>,
    pub water_temperature_c: Option<f64>,
    /// Thermal sensation bucket ("frío" .. "calor intenso").
    pub sensation: Option<String>,
    /// Wind bucket ("calma" .. "fuerte").
    pub wind: Option<String>,
    /// Sea state bucket ("tranquilo" / "moderado" / "agitado").
    pub waves: Option<String>,
    pub uv_index: Option<f64>,
    /// Normalized sky code (100 clear .. 400 fog).
    pub icon: Option<u16>,
}

impl DailyForecast {
    /// Copy each field from `other` only where `self` has none yet.
    pub fn fill_missing_from(&mut self, other: &DailyForecast) {
        if self.summary.is_none() {
            self.summary = other.summary.clone();
        }
        if self.temperature_c.is_none() {
            self.temperature_c = other.temperature_c;
        }
        if self.water_temperature_c.is_none() {
            self.water_temperature_c = other.water_temperature_c;
        }
        if self.sensation.is_none() {
            self.sensation = other.sensation.clone();
        }
        if self.wind.is_none() {
            self.wind = other.wind.clone();
        }
        if self.waves.is_none() {
            self.waves = other.waves.clone();
        }
        if self.uv_index.is_none() {
            self.uv_index = other.uv_index;
        }
        if self.icon.is_none() {
            self.icon = other.icon;
        }
    }

    /// True while any field a generic forecast slot can supply is unset.
    pub fn missing_core_fields(&self) -> bool {
        self.summary.is_none()
            || self.temperature_c.is_none()
            || self.sensation.is_none()
            || self.wind.is_none()
            || self.icon.is_none()
    }
}

/// Two-day forecast from a beach-specific provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeachForecast {
    pub source: String,
    pub last_updated: DateTime<Utc>,
    pub today: DailyForecast,
    pub tomorrow: DailyForecast,
}

/// Fixed-interval forecast timesteps for one location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastSeries {
    pub source: String,
    /// UTC offset of the forecast location, for local-day selection.
    pub timezone_offset_secs: i32,
    pub slots: Vec<ForecastSlot>,
}

/// A single forecast timestep (typically 3-hourly).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastSlot {
    pub timestamp: DateTime<Utc>,
    pub temperature_c: Option<f64>,
    pub description: Option<String>,
    /// Provider-native icon code, unmapped.
    pub icon: Option<String>,
    pub wind_speed_ms: Option<f64>,
    pub clouds_pct: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagColor {
    Green,
    Yellow,
    Red,
    Black,
    /// A flag is posted but the color could not be determined.
    Unknown,
}

/// Surveillance flag published for one beach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagStatus {
    pub color: FlagColor,
    /// Free-text notice accompanying the flag, when present.
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// First day of the surveillance season, as published.
    pub coverage_from: Option<String>,
    /// Last day of the surveillance season, as published.
    pub coverage_to: Option<String>,
    /// Daily surveillance hours, as published.
    pub schedule: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TideKind {
    High,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TideEvent {
    pub time: DateTime<Utc>,
    pub height_m: Option<f64>,
    pub kind: TideKind,
}

/// Tide table for one beach.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tides {
    pub source: String,
    pub events: Vec<TideEvent>,
}

/// Aggregated live snapshot for one beach. An absent section means the
/// corresponding source was unavailable or not configured, never that
/// the whole lookup failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeachDetails {
    pub beach: Beach,
    pub weather: Option<Weather>,
    pub flag: Option<FlagStatus>,
    pub tides: Option<Tides>,
}

/// Merged today/tomorrow record for one beach.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedForecast {
    /// Tag of the highest-precedence source that contributed.
    pub source: String,
    pub last_updated: DateTime<Utc>,
    pub today: DailyForecast,
    pub tomorrow: DailyForecast,
}
