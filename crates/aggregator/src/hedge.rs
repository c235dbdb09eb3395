//! Hedged fetch of current weather across two providers.
//!
//! The primary provider gets a head start. The secondary launches once
//! the hedge delay elapses, or immediately when the primary fails fast.
//! The first successful response wins; a losing fetch is left to finish
//! on its own and its result is dropped. Exhausting both providers is
//! an absence, not an error: callers render a sparser answer instead of
//! failing the whole lookup.

use std::sync::Arc;
use std::time::Duration;

use common::ports::WeatherProvider;
use common::{ProviderError, Weather};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, warn};

pub struct HedgedWeather {
    primary: Arc<dyn WeatherProvider>,
    secondary: Arc<dyn WeatherProvider>,
    hedge_delay: Duration,
    call_timeout: Duration,
}

impl HedgedWeather {
    pub fn new(
        primary: Arc<dyn WeatherProvider>,
        secondary: Arc<dyn WeatherProvider>,
        hedge_delay: Duration,
        call_timeout: Duration,
    ) -> Self {
        Self {
            primary,
            secondary,
            hedge_delay,
            call_timeout,
        }
    }

    /// Upper bound on the whole hedged fetch: both calls back to back
    /// plus the hedge delay. Provider clients time out on their own
    /// well before this; the ceiling only catches a stuck task.
    fn ceiling(&self) -> Duration {
        self.call_timeout * 2 + self.hedge_delay
    }

    /// First successful current-conditions fetch, or `None` when both
    /// providers fail or the ceiling is hit.
    pub async fn current_by_coords(&self, lat: f64, lon: f64) -> Option<Weather> {
        match tokio::time::timeout(self.ceiling(), self.race(lat, lon)).await {
            Ok(weather) => weather,
            Err(_) => {
                warn!(
                    "hedged weather fetch for ({:.4},{:.4}) hit the {:?} ceiling",
                    lat,
                    lon,
                    self.ceiling()
                );
                None
            }
        }
    }

    async fn race(&self, lat: f64, lon: f64) -> Option<Weather> {
        let mut primary_task = spawn_fetch(&self.primary, lat, lon);
        let mut primary_done = false;

        let hedge_timer = tokio::time::sleep(self.hedge_delay);
        tokio::pin!(hedge_timer);

        // Give the primary the hedge window to itself.
        tokio::select! {
            joined = &mut primary_task => {
                primary_done = true;
                if let Some(weather) = settle(self.primary.name(), joined) {
                    debug!("weather from {} inside the hedge window", self.primary.name());
                    return Some(weather);
                }
                // Fast failure: no point waiting out the timer.
            }
            _ = &mut hedge_timer => {}
        }

        let mut secondary_task = spawn_fetch(&self.secondary, lat, lon);
        let mut secondary_done = false;

        loop {
            tokio::select! {
                joined = &mut primary_task, if !primary_done => {
                    primary_done = true;
                    if let Some(weather) = settle(self.primary.name(), joined) {
                        return Some(weather);
                    }
                }
                joined = &mut secondary_task, if !secondary_done => {
                    secondary_done = true;
                    if let Some(weather) = settle(self.secondary.name(), joined) {
                        return Some(weather);
                    }
                }
                else => return None,
            }
        }
    }
}

fn spawn_fetch(
    provider: &Arc<dyn WeatherProvider>,
    lat: f64,
    lon: f64,
) -> JoinHandle<Result<Weather, ProviderError>> {
    let provider = Arc::clone(provider);
    tokio::spawn(async move { provider.current_by_coords(lat, lon).await })
}

fn settle(
    provider: &'static str,
    joined: Result<Result<Weather, ProviderError>, JoinError>,
) -> Option<Weather> {
    match joined {
        Ok(Ok(weather)) => Some(weather),
        Ok(Err(e)) => {
            warn!("weather fetch from {} failed: {}", provider, e);
            None
        }
        Err(e) => {
            warn!("weather fetch task for {} aborted: {}", provider, e);
            None
        }
    }
}
