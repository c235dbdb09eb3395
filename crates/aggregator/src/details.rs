//! Live beach snapshot orchestration.
//!
//! One lookup fans out to current weather (hedged), the surveillance
//! flag, and tides, all in parallel. The branches are isolated: a
//! failure in any of them leaves that section empty without disturbing
//! the others. The only hard error is an id the directory does not know.

use std::sync::Arc;

use common::ports::{FlagProvider, TidesProvider};
use common::{BeachDetails, Error, FlagStatus, Result, Tides};
use tracing::{debug, warn};

use crate::beaches::BeachDirectory;
use crate::hedge::HedgedWeather;

pub struct DetailsService {
    beaches: Arc<BeachDirectory>,
    weather: HedgedWeather,
    flags: Arc<dyn FlagProvider>,
    /// No production adapter ships yet; wired in tests and ready for one.
    tides: Option<Arc<dyn TidesProvider>>,
}

impl DetailsService {
    pub fn new(
        beaches: Arc<BeachDirectory>,
        weather: HedgedWeather,
        flags: Arc<dyn FlagProvider>,
        tides: Option<Arc<dyn TidesProvider>>,
    ) -> Self {
        Self {
            beaches,
            weather,
            flags,
            tides,
        }
    }

    pub fn beaches(&self) -> &BeachDirectory {
        &self.beaches
    }

    /// Current conditions for one beach. Sections the upstreams cannot
    /// answer come back as `None`.
    pub async fn beach_details(&self, id: &str) -> Result<BeachDetails> {
        let beach = self
            .beaches
            .by_id(id)
            .cloned()
            .ok_or_else(|| Error::BeachNotFound(id.to_string()))?;

        debug!("assembling details for beach {} ({})", beach.id, beach.name);

        let (weather, flag, tides) = tokio::join!(
            self.weather.current_by_coords(beach.latitude, beach.longitude),
            self.flag_safe(beach.red_cross_id),
            self.tides_safe(beach.latitude, beach.longitude),
        );

        Ok(BeachDetails {
            beach,
            weather,
            flag,
            tides,
        })
    }

    /// Flag lookup that swallows failures. Beaches without a
    /// surveillance id skip the upstream entirely.
    async fn flag_safe(&self, red_cross_id: Option<u32>) -> Option<FlagStatus> {
        let id = red_cross_id?;
        match self.flags.flag_by_red_cross_id(id).await {
            Ok(flag) => flag,
            Err(e) => {
                warn!("flag lookup for id {} failed: {}", id, e);
                None
            }
        }
    }

    async fn tides_safe(&self, lat: f64, lon: f64) -> Option<Tides> {
        let provider = self.tides.as_ref()?;
        match provider.tides_by_coords(lat, lon).await {
            Ok(tides) => tides,
            Err(e) => {
                warn!("tide lookup failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use common::ports::WeatherProvider;
    use common::{Beach, FlagColor, ProviderError, ProviderErrorKind, Weather};

    use super::*;

    fn make_beach(id: &str, red_cross_id: Option<u32>) -> Beach {
        Beach {
            id: id.to_string(),
            name: "Playa de Prueba".to_string(),
            municipality: "Santander".to_string(),
            forecast_code: id.to_string(),
            latitude: 43.4628,
            longitude: -3.8044,
            red_cross_id,
        }
    }

    struct StaticWeather {
        fail: bool,
    }

    #[async_trait]
    impl WeatherProvider for StaticWeather {
        fn name(&self) -> &'static str {
            "static"
        }

        async fn current_by_coords(&self, _lat: f64, _lon: f64) -> std::result::Result<Weather, ProviderError> {
            if self.fail {
                return Err(ProviderError::new(
                    "static",
                    ProviderErrorKind::Network,
                    "down",
                ));
            }
            Ok(Weather {
                source: "static".to_string(),
                timestamp: Utc::now(),
                temperature_c: Some(19.0),
                description: None,
                icon: None,
                wind_speed_ms: None,
                wind_direction_deg: None,
                humidity_pct: None,
                pressure_hpa: None,
                clouds_pct: None,
            })
        }
    }

    struct CountingFlags {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingFlags {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl FlagProvider for CountingFlags {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn flag_by_red_cross_id(
            &self,
            _id: u32,
        ) -> std::result::Result<Option<FlagStatus>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ProviderError::new(
                    "counting",
                    ProviderErrorKind::Status(500),
                    "boom",
                ));
            }
            Ok(Some(FlagStatus {
                color: FlagColor::Yellow,
                message: None,
                timestamp: Utc::now(),
                coverage_from: None,
                coverage_to: None,
                schedule: None,
            }))
        }
    }

    struct FailingTides;

    #[async_trait]
    impl TidesProvider for FailingTides {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn tides_by_coords(
            &self,
            _lat: f64,
            _lon: f64,
        ) -> std::result::Result<Option<Tides>, ProviderError> {
            Err(ProviderError::new(
                "failing",
                ProviderErrorKind::Timeout,
                "no answer",
            ))
        }
    }

    fn make_service(
        beach: Beach,
        weather_fail: bool,
        flags: Arc<CountingFlags>,
        tides: Option<Arc<dyn TidesProvider>>,
    ) -> DetailsService {
        let weather = HedgedWeather::new(
            Arc::new(StaticWeather { fail: weather_fail }),
            Arc::new(StaticWeather { fail: true }),
            Duration::from_millis(10),
            Duration::from_secs(1),
        );
        DetailsService::new(
            Arc::new(BeachDirectory::from_beaches(vec![beach])),
            weather,
            flags,
            tides,
        )
    }

    #[tokio::test]
    async fn unknown_beach_is_an_error() {
        let flags = CountingFlags::new(false);
        let service = make_service(make_beach("3907601", None), false, flags, None);

        let err = service.beach_details("nope").await.unwrap_err();

        assert!(matches!(err, Error::BeachNotFound(id) if id == "nope"));
    }

    #[tokio::test]
    async fn all_sections_present_on_the_happy_path() {
        let flags = CountingFlags::new(false);
        let service = make_service(make_beach("3907601", Some(77)), false, flags.clone(), None);

        let details = service.beach_details("3907601").await.unwrap();

        assert_eq!(details.beach.id, "3907601");
        assert_eq!(details.weather.unwrap().source, "static");
        assert_eq!(details.flag.unwrap().color, FlagColor::Yellow);
        assert_eq!(flags.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_surveillance_id_skips_the_flag_provider() {
        let flags = CountingFlags::new(false);
        let service = make_service(make_beach("3907601", None), false, flags.clone(), None);

        let details = service.beach_details("3907601").await.unwrap();

        assert!(details.flag.is_none());
        assert_eq!(flags.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn flag_failure_leaves_other_sections_intact() {
        let flags = CountingFlags::new(true);
        let service = make_service(make_beach("3907601", Some(77)), false, flags, None);

        let details = service.beach_details("3907601").await.unwrap();

        assert!(details.flag.is_none());
        assert!(details.weather.is_some());
    }

    #[tokio::test]
    async fn weather_outage_still_returns_details() {
        let flags = CountingFlags::new(false);
        let service = make_service(make_beach("3907601", Some(77)), true, flags, None);

        let details = service.beach_details("3907601").await.unwrap();

        assert!(details.weather.is_none());
        assert!(details.flag.is_some());
    }

    #[tokio::test]
    async fn tide_failure_is_swallowed() {
        let flags = CountingFlags::new(false);
        let service = make_service(
            make_beach("3907601", Some(77)),
            false,
            flags,
            Some(Arc::new(FailingTides)),
        );

        let details = service.beach_details("3907601").await.unwrap();

        assert!(details.tides.is_none());
        assert!(details.weather.is_some());
    }

    #[tokio::test]
    async fn no_tide_provider_means_no_tides_section() {
        let flags = CountingFlags::new(false);
        let service = make_service(make_beach("3907601", None), false, flags, None);

        let details = service.beach_details("3907601").await.unwrap();

        assert!(details.tides.is_none());
    }
}
