//! AEMET OpenData client.
//!
//! AEMET answers every API call with a small envelope pointing at a
//! separate `datos` URL holding the real payload, which is frequently
//! served as latin1. This client handles the two-step fetch for station
//! observations (nearest-station current weather) and for the
//! beach-specific two-day forecast.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use common::ports::{BeachForecastProvider, WeatherProvider};
use common::{BeachForecast, DailyForecast, ProviderError, ProviderErrorKind, Weather};
use serde::Deserialize;
use tracing::debug;

const PROVIDER: &str = "aemet";
const OPENDATA_BASE: &str = "https://opendata.aemet.es/opendata/api";

/// AEMET OpenData API client with connection pooling.
#[derive(Debug, Clone)]
pub struct AemetClient {
    client: reqwest::Client,
    api_key: String,
}

// ── AEMET response types ──────────────────────────────────────────────

/// Envelope returned by every OpenData endpoint.
#[derive(Debug, Deserialize)]
pub struct OpenDataMeta {
    #[serde(default)]
    pub estado: Option<i64>,
    #[serde(default)]
    pub descripcion: Option<String>,
    #[serde(default)]
    pub datos: Option<String>,
}

/// One station observation row from `/observacion/convencional/todas`.
/// Stations report hourly, so the payload carries several rows per station.
#[derive(Debug, Deserialize)]
pub struct ObservationRow {
    #[serde(default)]
    pub idema: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    /// Observation time, naive ISO without offset (UTC per AEMET docs).
    #[serde(default)]
    pub fint: String,
    /// Air temperature (°C).
    #[serde(default)]
    pub ta: Option<f64>,
    /// Wind speed (m/s).
    #[serde(default)]
    pub vv: Option<f64>,
    /// Wind direction (degrees).
    #[serde(default)]
    pub dv: Option<f64>,
    /// Relative humidity (%).
    #[serde(default)]
    pub hr: Option<f64>,
    /// Pressure (hPa).
    #[serde(default)]
    pub pres: Option<f64>,
}

/// Top-level beach forecast payload (the datos URL serves an array of one).
#[derive(Debug, Deserialize)]
pub struct BeachPayload {
    #[serde(default)]
    pub nombre: Option<String>,
    /// When AEMET produced the forecast, same naive ISO as `fint`.
    #[serde(default)]
    pub elaborado: Option<String>,
    pub prediccion: Prediccion,
}

#[derive(Debug, Deserialize)]
pub struct Prediccion {
    #[serde(default)]
    pub dia: Vec<BeachDay>,
}

/// One forecast day. Every section shares the same loose block shape.
#[derive(Debug, Default, Deserialize)]
pub struct BeachDay {
    #[serde(rename = "estadoCielo", default)]
    pub estado_cielo: DiaBlock,
    #[serde(default)]
    pub viento: DiaBlock,
    #[serde(default)]
    pub oleaje: DiaBlock,
    #[serde(default)]
    pub tmaxima: DiaBlock,
    #[serde(default)]
    pub stermica: DiaBlock,
    #[serde(default)]
    pub tagua: DiaBlock,
    #[serde(rename = "uvMax", default)]
    pub uv_max: DiaBlock,
    #[serde(default)]
    pub fecha: Option<i64>,
}

/// Generic AEMET day block: morning/afternoon descriptions plus a value.
/// Numeric fields arrive as numbers or strings depending on the endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct DiaBlock {
    #[serde(default)]
    pub f1: Option<serde_json::Value>,
    #[serde(default)]
    pub f2: Option<serde_json::Value>,
    #[serde(default)]
    pub descripcion1: Option<String>,
    #[serde(default)]
    pub descripcion2: Option<String>,
    #[serde(default)]
    pub valor1: Option<serde_json::Value>,
}

// ── Implementation ────────────────────────────────────────────────────

impl AemetClient {
    pub fn new(api_key: String, timeout: std::time::Duration) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("beachcast/0.1 (beach conditions service)")
            .pool_max_idle_per_host(4)
            .timeout(timeout)
            .build()
            .expect("failed to build AEMET HTTP client");

        Self { client, api_key }
    }

    /// Step 1: call an OpenData endpoint and extract the datos URL.
    async fn fetch_datos_url(&self, meta_url: &str) -> Result<String, ProviderError> {
        if self.api_key.trim().is_empty() {
            return Err(ProviderError::missing_credentials(PROVIDER));
        }

        debug!("Fetching AEMET metadata: {}", meta_url);

        let resp = self
            .client
            .get(meta_url)
            .header("api_key", &self.api_key)
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

        let meta: OpenDataMeta = resp
            .json()
            .await
            .map_err(|e| ProviderError::bad_payload(PROVIDER, format!("metadata parse error: {}", e)))?;

        meta.datos.filter(|d| !d.is_empty()).ok_or_else(|| {
            ProviderError::bad_payload(
                PROVIDER,
                format!(
                    "missing datos URL (estado={:?}, descripcion={:?})",
                    meta.estado, meta.descripcion
                ),
            )
        })
    }

    /// Step 2: fetch the datos payload as text, tolerating latin1 bodies.
    async fn fetch_datos_text(&self, datos_url: &str) -> Result<String, ProviderError> {
        debug!("Fetching AEMET datos payload: {}", datos_url);

        let resp = self
            .client
            .get(datos_url)
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

        let text = resp
            .text_with_charset("ISO-8859-1")
            .await
            .map_err(transport_error)?;

        // Expired datos URLs answer with an HTML error page and status 200.
        let head = text.trim_start();
        if head.starts_with("<!DOCTYPE") || head.starts_with("<html") {
            return Err(ProviderError::bad_payload(
                PROVIDER,
                "datos URL served HTML instead of JSON",
            ));
        }

        Ok(text)
    }
}

#[async_trait]
impl WeatherProvider for AemetClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn current_by_coords(&self, lat: f64, lon: f64) -> Result<Weather, ProviderError> {
        let meta_url = format!("{}/observacion/convencional/todas", OPENDATA_BASE);
        let datos_url = self.fetch_datos_url(&meta_url).await?;
        let text = self.fetch_datos_text(&datos_url).await?;

        let rows: Vec<ObservationRow> = serde_json::from_str(&text).map_err(|e| {
            ProviderError::bad_payload(PROVIDER, format!("observation parse error: {}", e))
        })?;

        let row = nearest_observation(lat, lon, &rows).ok_or_else(|| {
            ProviderError::bad_payload(PROVIDER, "no station observations with coordinates")
        })?;

        debug!(
            "Nearest AEMET station to ({:.4},{:.4}): {} at ({:?},{:?})",
            lat, lon, row.idema, row.lat, row.lon
        );

        Ok(weather_from_observation(row))
    }
}

#[async_trait]
impl BeachForecastProvider for AemetClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn forecast_by_beach_code(&self, code: &str) -> Result<BeachForecast, ProviderError> {
        let meta_url = format!("{}/prediccion/especifica/playa/{}", OPENDATA_BASE, code);
        let datos_url = self.fetch_datos_url(&meta_url).await?;
        let text = self.fetch_datos_text(&datos_url).await?;

        let parsed: Vec<BeachPayload> = serde_json::from_str(&text).map_err(|e| {
            ProviderError::bad_payload(PROVIDER, format!("beach forecast parse error: {}", e))
        })?;

        let payload = parsed.into_iter().next().ok_or_else(|| {
            ProviderError::bad_payload(PROVIDER, format!("empty beach forecast for code {}", code))
        })?;

        beach_forecast_from_payload(&payload, code)
    }
}

// ── Mapping helpers ───────────────────────────────────────────────────

/// Pick the observation row closest to the requested point. Rows from the
/// same station share coordinates, so ties resolve to the latest `fint`
/// (lexicographic works for ISO timestamps).
fn nearest_observation(lat: f64, lon: f64, rows: &[ObservationRow]) -> Option<&ObservationRow> {
    let mut best: Option<(&ObservationRow, f64)> = None;

    for row in rows {
        let (Some(row_lat), Some(row_lon)) = (row.lat, row.lon) else {
            continue;
        };
        let dist = (row_lat - lat).powi(2) + (row_lon - lon).powi(2);

        match best {
            Some((current, best_dist)) => {
                if dist < best_dist || (dist == best_dist && row.fint > current.fint) {
                    best = Some((row, dist));
                }
            }
            None => best = Some((row, dist)),
        }
    }

    best.map(|(row, _)| row)
}

fn weather_from_observation(row: &ObservationRow) -> Weather {
    Weather {
        source: PROVIDER.to_string(),
        timestamp: parse_aemet_time(&row.fint).unwrap_or_else(Utc::now),
        temperature_c: row.ta,
        description: None,
        icon: None,
        wind_speed_ms: row.vv,
        wind_direction_deg: row.dv,
        humidity_pct: row.hr,
        pressure_hpa: row.pres,
        clouds_pct: None,
    }
}

fn beach_forecast_from_payload(
    payload: &BeachPayload,
    code: &str,
) -> Result<BeachForecast, ProviderError> {
    let dias = &payload.prediccion.dia;
    let today = dias.first().ok_or_else(|| {
        ProviderError::bad_payload(PROVIDER, format!("no forecast days for code {}", code))
    })?;
    let tomorrow = dias.get(1).unwrap_or(today);

    Ok(BeachForecast {
        source: PROVIDER.to_string(),
        last_updated: payload
            .elaborado
            .as_deref()
            .and_then(parse_aemet_time)
            .unwrap_or_else(Utc::now),
        today: daily_from_dia(today),
        tomorrow: daily_from_dia(tomorrow),
    })
}

fn daily_from_dia(dia: &BeachDay) -> DailyForecast {
    DailyForecast {
        summary: text_pref(&dia.estado_cielo),
        temperature_c: number_in(&dia.tmaxima.valor1),
        water_temperature_c: number_in(&dia.tagua.valor1),
        sensation: text_pref(&dia.stermica),
        wind: text_pref(&dia.viento),
        waves: text_pref(&dia.oleaje),
        uv_index: number_in(&dia.uv_max.valor1),
        icon: number_in(&dia.estado_cielo.f2)
            .or_else(|| number_in(&dia.estado_cielo.f1))
            .filter(|n| (1.0..=999.0).contains(n))
            .map(|n| n as u16),
    }
}

/// The afternoon description is the more representative one when present.
fn text_pref(block: &DiaBlock) -> Option<String> {
    block
        .descripcion2
        .clone()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| block.descripcion1.clone().filter(|s| !s.trim().is_empty()))
}

fn number_in(value: &Option<serde_json::Value>) -> Option<f64> {
    match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

/// AEMET timestamps come without an offset ("2026-08-25T12:00:00"); a few
/// endpoints use full RFC 3339. Both are UTC.
fn parse_aemet_time(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

fn transport_error(e: reqwest::Error) -> ProviderError {
    let kind = if e.is_timeout() {
        ProviderErrorKind::Timeout
    } else {
        ProviderErrorKind::Network
    };
    ProviderError::new(PROVIDER, kind, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_beach_response() -> &'static str {
        r#"[
            {
                "origen": {"productor": "AEMET"},
                "elaborado": "2026-08-24T11:38:12",
                "nombre": "La Concha (Suances)",
                "localidad": 39085,
                "prediccion": {
                    "dia": [
                        {
                            "estadoCielo": {"value": "", "f1": 110, "descripcion1": "poco nuboso", "f2": 100, "descripcion2": "despejado"},
                            "viento": {"value": "", "f1": 2, "descripcion1": "flojo", "f2": 2, "descripcion2": "flojo"},
                            "oleaje": {"value": "", "f1": 4, "descripcion1": "débil", "f2": 4, "descripcion2": "débil"},
                            "tmaxima": {"value": "", "valor1": 26},
                            "stermica": {"value": "", "valor1": 1, "descripcion1": "calor"},
                            "tagua": {"value": "", "valor1": 18},
                            "uvMax": {"value": "", "valor1": 8},
                            "fecha": 20260824
                        },
                        {
                            "estadoCielo": {"value": "", "f1": 120, "descripcion1": "muy nuboso"},
                            "viento": {"value": "", "f1": 3, "descripcion1": "moderado"},
                            "oleaje": {"value": "", "f1": 5, "descripcion1": "fuerte"},
                            "tmaxima": {"value": "", "valor1": "22"},
                            "stermica": {"value": "", "valor1": 0, "descripcion1": "fresco"},
                            "tagua": {"value": "", "valor1": 17},
                            "uvMax": {"value": "", "valor1": 6},
                            "fecha": 20260825
                        }
                    ]
                },
                "id": 3908503,
                "version": 1
            }
        ]"#
    }

    fn sample_observations_response() -> &'static str {
        r#"[
            {"idema": "1111X", "lat": 43.46, "lon": -3.82, "fint": "2026-08-25T09:00:00", "ta": 21.4, "vv": 3.1, "dv": 270.0, "hr": 78.0, "pres": 1015.2, "ubi": "SANTANDER"},
            {"idema": "1111X", "lat": 43.46, "lon": -3.82, "fint": "2026-08-25T10:00:00", "ta": 22.8, "vv": 4.0, "dv": 280.0, "hr": 72.0, "pres": 1014.8, "ubi": "SANTANDER"},
            {"idema": "1249X", "lat": 43.35, "lon": -4.05, "fint": "2026-08-25T10:00:00", "ta": 25.0, "vv": 1.2, "dv": 90.0, "hr": 60.0, "pres": 1013.0, "ubi": "TORRELAVEGA"},
            {"idema": "9999Y", "fint": "2026-08-25T10:00:00", "ta": 30.0}
        ]"#
    }

    #[test]
    fn test_parse_beach_payload() {
        let parsed: Vec<BeachPayload> =
            serde_json::from_str(sample_beach_response()).expect("payload should deserialize");

        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].nombre.as_deref(), Some("La Concha (Suances)"));
        assert_eq!(parsed[0].prediccion.dia.len(), 2);
    }

    #[test]
    fn test_beach_forecast_prefers_afternoon_values() {
        let parsed: Vec<BeachPayload> =
            serde_json::from_str(sample_beach_response()).expect("payload should deserialize");
        let forecast =
            beach_forecast_from_payload(&parsed[0], "3908503").expect("mapping should succeed");

        assert_eq!(forecast.source, "aemet");
        assert_eq!(forecast.today.summary.as_deref(), Some("despejado"));
        assert_eq!(forecast.today.icon, Some(100));
        assert_eq!(forecast.today.temperature_c, Some(26.0));
        assert_eq!(forecast.today.water_temperature_c, Some(18.0));
        assert_eq!(forecast.today.sensation.as_deref(), Some("calor"));
        assert_eq!(forecast.today.uv_index, Some(8.0));
        assert_eq!(
            forecast.last_updated,
            parse_aemet_time("2026-08-24T11:38:12").unwrap()
        );
    }

    #[test]
    fn test_beach_forecast_tomorrow_and_string_values() {
        let parsed: Vec<BeachPayload> =
            serde_json::from_str(sample_beach_response()).expect("payload should deserialize");
        let forecast =
            beach_forecast_from_payload(&parsed[0], "3908503").expect("mapping should succeed");

        // Day 2 only carries morning descriptions and a stringly temperature.
        assert_eq!(forecast.tomorrow.summary.as_deref(), Some("muy nuboso"));
        assert_eq!(forecast.tomorrow.icon, Some(120));
        assert_eq!(forecast.tomorrow.temperature_c, Some(22.0));
        assert_eq!(forecast.tomorrow.waves.as_deref(), Some("fuerte"));
    }

    #[test]
    fn test_out_of_range_sky_codes_are_dropped() {
        let mut parsed: Vec<BeachPayload> =
            serde_json::from_str(sample_beach_response()).expect("payload should deserialize");
        parsed[0].prediccion.dia[0].estado_cielo.f2 = Some(serde_json::json!(99999));
        parsed[0].prediccion.dia[0].estado_cielo.f1 = Some(serde_json::json!(-3));

        let daily = daily_from_dia(&parsed[0].prediccion.dia[0]);
        assert_eq!(daily.icon, None);
        // A nonsense code loses only the icon, not the rest of the day.
        assert_eq!(daily.summary.as_deref(), Some("despejado"));
    }

    #[test]
    fn test_tomorrow_falls_back_to_today_when_single_day() {
        let mut parsed: Vec<BeachPayload> =
            serde_json::from_str(sample_beach_response()).expect("payload should deserialize");
        parsed[0].prediccion.dia.truncate(1);

        let forecast =
            beach_forecast_from_payload(&parsed[0], "3908503").expect("mapping should succeed");

        assert_eq!(forecast.tomorrow.summary, forecast.today.summary);
        assert_eq!(forecast.tomorrow.temperature_c, forecast.today.temperature_c);
    }

    #[test]
    fn test_empty_day_list_is_bad_payload() {
        let mut parsed: Vec<BeachPayload> =
            serde_json::from_str(sample_beach_response()).expect("payload should deserialize");
        parsed[0].prediccion.dia.clear();

        let err = beach_forecast_from_payload(&parsed[0], "3908503").unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::BadPayload);
    }

    #[test]
    fn test_nearest_observation_picks_latest_row_of_closest_station() {
        let rows: Vec<ObservationRow> =
            serde_json::from_str(sample_observations_response()).expect("rows should deserialize");

        // Near Santander; the station has two hourly rows, latest must win.
        let row = nearest_observation(43.47, -3.80, &rows).expect("a station should match");
        assert_eq!(row.idema, "1111X");
        assert_eq!(row.fint, "2026-08-25T10:00:00");

        let weather = weather_from_observation(row);
        assert_eq!(weather.source, "aemet");
        assert_eq!(weather.temperature_c, Some(22.8));
        assert_eq!(weather.wind_speed_ms, Some(4.0));
        assert_eq!(weather.humidity_pct, Some(72.0));
        assert_eq!(
            weather.timestamp,
            parse_aemet_time("2026-08-25T10:00:00").unwrap()
        );
    }

    #[test]
    fn test_nearest_observation_skips_rows_without_coords() {
        let rows: Vec<ObservationRow> =
            serde_json::from_str(sample_observations_response()).expect("rows should deserialize");

        // Closest by distance to Torrelavega; the coordinate-less row is ignored.
        let row = nearest_observation(43.35, -4.00, &rows).expect("a station should match");
        assert_eq!(row.idema, "1249X");
    }

    #[test]
    fn test_parse_aemet_time_formats() {
        assert!(parse_aemet_time("2026-08-25T10:00:00").is_some());
        assert!(parse_aemet_time("2026-08-25T10:00:00Z").is_some());
        assert!(parse_aemet_time("2026-08-25T10:00:00+02:00").is_some());
        assert!(parse_aemet_time("").is_none());
        assert!(parse_aemet_time("not a date").is_none());
    }
}
