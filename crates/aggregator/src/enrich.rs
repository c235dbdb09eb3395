//! Forecast enrichment.
//!
//! Builds the merged today/tomorrow record for a beach by layering
//! sources in a fixed precedence order. Each layer only fills fields
//! that are still empty, so a more specific source is never overwritten
//! by a more generic one. The single exception is the sky icon: the
//! coastal forecast's summary text is more trustworthy than raw icon
//! codes, so an icon recomputed from that summary replaces whatever an
//! earlier layer set. Layer fetches that fail are logged and skipped;
//! the record simply stays sparser.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, TimeZone, Timelike, Utc};
use common::ports::{BeachForecastProvider, SlotForecastProvider, UvProvider};
use common::{
    BeachForecast, DailyForecast, EnrichedForecast, ForecastSeries, ForecastSlot, Result, Weather,
};
use tracing::{debug, warn};

use crate::details::DetailsService;

/// Assumed water temperature on this coast when no source supplies one.
const DEFAULT_WATER_TEMP_C: f64 = 17.0;

/// Clear-sky UV index the cloud-cover estimate scales down from.
const CLEAR_SKY_UV: f64 = 10.0;

pub struct EnrichService {
    details: Arc<DetailsService>,
    beach_forecast: Arc<dyn BeachForecastProvider>,
    slots: Arc<dyn SlotForecastProvider>,
    uv: Arc<dyn UvProvider>,
}

impl EnrichService {
    pub fn new(
        details: Arc<DetailsService>,
        beach_forecast: Arc<dyn BeachForecastProvider>,
        slots: Arc<dyn SlotForecastProvider>,
        uv: Arc<dyn UvProvider>,
    ) -> Self {
        Self {
            details,
            beach_forecast,
            slots,
            uv,
        }
    }

    /// Merged two-day record for one beach. Fails only when the beach
    /// id is unknown; every enrichment source is optional.
    pub async fn enriched_forecast(&self, id: &str) -> Result<EnrichedForecast> {
        let details = self.details.beach_details(id).await?;
        let beach = &details.beach;

        // Layer 1: today seeded from the live observation.
        let mut today = details
            .weather
            .as_ref()
            .map(today_from_weather)
            .unwrap_or_default();
        let mut tomorrow = DailyForecast::default();

        let mut source = details.weather.as_ref().map(|w| w.source.clone());
        let mut last_updated = details.weather.as_ref().map(|w| w.timestamp);

        // Layer 2: beach-specific coastal forecast.
        if !beach.forecast_code.is_empty() {
            match self
                .beach_forecast
                .forecast_by_beach_code(&beach.forecast_code)
                .await
            {
                Ok(forecast) => {
                    apply_beach_day(&mut today, &forecast.today);
                    apply_beach_day(&mut tomorrow, &forecast.tomorrow);
                    if source.is_none() {
                        source = Some(forecast.source.clone());
                    }
                    if last_updated.is_none() {
                        last_updated = Some(forecast.last_updated);
                    }
                }
                Err(e) => warn!("coastal forecast for beach {} failed: {}", beach.id, e),
            }
        } else {
            debug!("beach {} has no coastal forecast code", beach.id);
        }

        // Layer 3: generic forecast timestep for tomorrow, only while
        // the coastal forecast left gaps.
        let mut tomorrow_slot: Option<ForecastSlot> = None;
        if tomorrow.missing_core_fields() {
            match self
                .slots
                .slots_by_coords(beach.latitude, beach.longitude)
                .await
            {
                Ok(series) => {
                    if let Some(slot) = select_tomorrow_slot(Utc::now(), &series) {
                        tomorrow.fill_missing_from(&daily_from_slot(slot));
                        if source.is_none() {
                            source = Some(series.source.clone());
                        }
                        tomorrow_slot = Some(slot.clone());
                    }
                }
                Err(e) => warn!("slot forecast for beach {} failed: {}", beach.id, e),
            }
        }

        // Layer 4: UV. Today prefers the measured index; both days fall
        // back to a cloud-cover estimate.
        if today.uv_index.is_none() {
            match self
                .uv
                .uv_index_by_coords(beach.latitude, beach.longitude)
                .await
            {
                Ok(value) => today.uv_index = Some(value),
                Err(e) => {
                    warn!("uv lookup for beach {} failed: {}", beach.id, e);
                    today.uv_index = details
                        .weather
                        .as_ref()
                        .and_then(|w| w.clouds_pct)
                        .map(estimate_uv_from_clouds);
                }
            }
        }
        if tomorrow.uv_index.is_none() {
            tomorrow.uv_index = tomorrow_slot
                .as_ref()
                .and_then(|slot| slot.clouds_pct)
                .map(estimate_uv_from_clouds);
        }

        // Layer 5: sea state guessed from wind where the coastal
        // forecast had none.
        if today.waves.is_none() {
            today.waves = details
                .weather
                .as_ref()
                .and_then(|w| w.wind_speed_ms)
                .map(waves_from_wind);
        }
        if tomorrow.waves.is_none() {
            tomorrow.waves = tomorrow_slot
                .as_ref()
                .and_then(|slot| slot.wind_speed_ms)
                .map(waves_from_wind);
        }

        // Layer 6: regional default water temperature.
        if today.water_temperature_c.is_none() {
            today.water_temperature_c = Some(DEFAULT_WATER_TEMP_C);
        }
        if tomorrow.water_temperature_c.is_none() {
            tomorrow.water_temperature_c = Some(DEFAULT_WATER_TEMP_C);
        }

        Ok(EnrichedForecast {
            source: source.unwrap_or_else(|| "estimated".to_string()),
            last_updated: last_updated.unwrap_or_else(Utc::now),
            today,
            tomorrow,
        })
    }
}

// ── Layer construction ───────────────────────────────────────────────

fn today_from_weather(weather: &Weather) -> DailyForecast {
    DailyForecast {
        summary: weather.description.as_deref().map(capitalize_first),
        temperature_c: weather.temperature_c,
        water_temperature_c: None,
        sensation: weather.temperature_c.map(describe_sensation),
        wind: weather.wind_speed_ms.map(describe_wind),
        waves: None,
        uv_index: None,
        icon: weather.icon.as_deref().and_then(icon_from_provider_code),
    }
}

/// Merge one coastal-forecast day into a merged day. The summary
/// keywords may replace an earlier icon; everything else fills gaps.
fn apply_beach_day(day: &mut DailyForecast, from: &DailyForecast) {
    if let Some(icon) = from.summary.as_deref().and_then(icon_from_summary) {
        day.icon = Some(icon);
    }
    day.fill_missing_from(from);
}

fn daily_from_slot(slot: &ForecastSlot) -> DailyForecast {
    DailyForecast {
        summary: slot.description.as_deref().map(capitalize_first),
        temperature_c: slot.temperature_c,
        water_temperature_c: None,
        sensation: slot.temperature_c.map(describe_sensation),
        wind: slot.wind_speed_ms.map(describe_wind),
        waves: None,
        uv_index: None,
        icon: slot.icon.as_deref().and_then(icon_from_provider_code),
    }
}

// ── Slot selection ───────────────────────────────────────────────────

/// Pick the timestep that best represents tomorrow: the slot closest to
/// local midday of the next local calendar day. A day without a midday
/// window falls back to its middle slot, and a series that never
/// reaches tomorrow falls back to its last slot.
fn select_tomorrow_slot(now: DateTime<Utc>, series: &ForecastSeries) -> Option<&ForecastSlot> {
    let offset = FixedOffset::east_opt(series.timezone_offset_secs)
        .or_else(|| FixedOffset::east_opt(0))?;

    let local_now = now.with_timezone(&offset);
    let tomorrow_date = (local_now + ChronoDuration::days(1)).date_naive();

    let day_slots: Vec<&ForecastSlot> = series
        .slots
        .iter()
        .filter(|slot| slot.timestamp.with_timezone(&offset).date_naive() == tomorrow_date)
        .collect();

    if day_slots.is_empty() {
        return series.slots.last();
    }

    let midday = offset
        .from_local_datetime(&tomorrow_date.and_hms_opt(12, 0, 0)?)
        .single()?;

    let in_window = day_slots.iter().copied().filter(|slot| {
        let hour = slot.timestamp.with_timezone(&offset).hour();
        (11..14).contains(&hour)
    });
    if let Some(best) = in_window.min_by_key(|slot| {
        slot.timestamp.signed_duration_since(midday).num_seconds().abs()
    }) {
        return Some(best);
    }

    // No midday timestep; the middle of the day is the steadiest pick.
    day_slots.get(day_slots.len() / 2).copied()
}

// ── Derived buckets ──────────────────────────────────────────────────

/// Wind description from speed in m/s.
fn describe_wind(speed_ms: f64) -> String {
    let label = if speed_ms < 3.0 {
        "calma"
    } else if speed_ms < 6.0 {
        "flojo"
    } else if speed_ms < 10.0 {
        "moderado"
    } else if speed_ms < 15.0 {
        "fresco"
    } else {
        "fuerte"
    };
    label.to_string()
}

/// Thermal sensation from air temperature in °C.
fn describe_sensation(temp_c: f64) -> String {
    let label = if temp_c < 10.0 {
        "frío"
    } else if temp_c < 18.0 {
        "templado"
    } else if temp_c < 26.0 {
        "agradable"
    } else if temp_c < 32.0 {
        "calor moderado"
    } else {
        "calor intenso"
    };
    label.to_string()
}

/// Sea state guessed from wind. Thresholds are in km/h with wind
/// reported in m/s.
fn waves_from_wind(speed_ms: f64) -> String {
    let kmh = speed_ms * 3.6;
    let label = if kmh > 20.0 {
        "agitado"
    } else if kmh > 10.0 {
        "moderado"
    } else {
        "tranquilo"
    };
    label.to_string()
}

/// Clear-sky UV scaled down by cloud cover, floored at 1.
fn estimate_uv_from_clouds(clouds_pct: f64) -> f64 {
    (CLEAR_SKY_UV * (1.0 - clouds_pct / 100.0)).round().max(1.0)
}

// ── Sky codes ────────────────────────────────────────────────────────

/// Normalized sky code from summary keywords, Spanish and English.
/// Checked in severity order so "chubascos con tormenta" reads as a
/// storm, not as rain.
fn icon_from_summary(summary: &str) -> Option<u16> {
    let text = summary.to_lowercase();

    if text.contains("tormenta") || text.contains("storm") {
        Some(210)
    } else if text.contains("nieve") || text.contains("snow") {
        Some(300)
    } else if text.contains("lluvia")
        || text.contains("llovizna")
        || text.contains("chubasco")
        || text.contains("rain")
        || text.contains("drizzle")
    {
        Some(200)
    } else if text.contains("niebla") || text.contains("bruma") || text.contains("fog") {
        Some(400)
    } else if text.contains("muy nuboso") || text.contains("cubierto") || text.contains("overcast")
    {
        Some(120)
    } else if text.contains("intervalos")
        || text.contains("nuboso")
        || text.contains("nubes")
        || text.contains("partly")
        || text.contains("cloud")
    {
        Some(110)
    } else if text.contains("despejado")
        || text.contains("sol")
        || text.contains("clear")
        || text.contains("sunny")
    {
        Some(100)
    } else {
        None
    }
}

/// Normalized sky code from a provider icon code ("01d" .. "50n").
fn icon_from_provider_code(icon: &str) -> Option<u16> {
    match icon.get(..2)? {
        "01" => Some(100),
        "02" => Some(110),
        "03" | "04" => Some(120),
        "09" | "10" => Some(200),
        "11" => Some(210),
        "13" => Some(300),
        "50" => Some(400),
        _ => None,
    }
}

fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
