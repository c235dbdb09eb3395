//! Beachcast: beach-condition aggregation service.
//!
//! Single-binary Tokio application that:
//! 1. Loads the static beach directory
//! 2. Fetches current weather with a hedged AEMET/OpenWeather race
//! 3. Scrapes the Cruz Roja surveillance flag
//! 4. Merges a two-day forecast from the layered sources
//! 5. Serves it all through a small CLI (list / details / forecast /
//!    check-providers / watch)

mod config;

use std::{sync::Arc, time::Duration};

use clap::Parser;
use tracing::{error, info, warn};

use aemet_client::AemetClient;
use aggregator::{
    BeachDirectory, CachedBeachForecast, CachedFlag, CachedSlotForecast, CachedUv, CachedWeather,
    DetailsService, EnrichService, HedgedWeather,
};
use common::ports::{
    BeachForecastProvider, FlagProvider, SlotForecastProvider, UvProvider, WeatherProvider,
};
use openweather_client::OpenWeatherClient;
use redcross_client::RedCrossClient;

/// Beach conditions aggregation service
#[derive(Parser)]
#[command(name = "beachcast", about = "Beach conditions aggregation service")]
struct Cli {
    /// List the beaches in the directory and exit.
    #[arg(long)]
    list: bool,

    /// Print the aggregated snapshot for one beach id as JSON and exit.
    #[arg(long, value_name = "BEACH_ID")]
    details: Option<String>,

    /// Print the merged two-day forecast for one beach id as JSON and exit.
    #[arg(long, value_name = "BEACH_ID")]
    forecast: Option<String>,

    /// Probe every configured provider once and exit.
    #[arg(long)]
    check_providers: bool,

    /// Periodically refresh forecasts for every beach (default mode).
    #[arg(long)]
    watch: bool,
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Failed to serialize output: {}", e),
    }
}

#[tokio::main]
async fn main() {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "beachcast=info,aggregator=info,aemet_client=info,openweather_client=info,redcross_client=info"
                    .into()
            }),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    info!("🏖️  Beachcast starting up...");

    // Load configuration.
    let cfg = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Cache ttl={}s, hedge delay={}ms, provider timeout={}s",
        cfg.cache.ttl_secs, cfg.hedge.delay_ms, cfg.timing.provider_timeout_secs
    );
    if cfg.aemet_api_key.trim().is_empty() {
        warn!("AEMET_API_KEY is not set; AEMET lookups will fail until it is");
    }
    if cfg.openweather_api_key.trim().is_empty() {
        warn!("OPENWEATHER_API_KEY is not set; OpenWeather lookups will fail until it is");
    }

    let directory = match BeachDirectory::load(&cfg.beaches_path) {
        Ok(d) => Arc::new(d),
        Err(e) => {
            error!("Failed to load beach directory: {}", e);
            std::process::exit(1);
        }
    };

    // ── Providers & services ─────────────────────────────────────────
    let timeout = Duration::from_secs(cfg.timing.provider_timeout_secs);
    let ttl = Duration::from_secs(cfg.cache.ttl_secs);

    let aemet = Arc::new(AemetClient::new(cfg.aemet_api_key.clone(), timeout));
    let openweather = Arc::new(OpenWeatherClient::new(cfg.openweather_api_key.clone(), timeout));
    let redcross = Arc::new(RedCrossClient::new(timeout));

    // AEMET leads the weather hedge, OpenWeather covers it; every
    // provider sits behind its cache wrapper.
    let hedged = HedgedWeather::new(
        Arc::new(CachedWeather::new(aemet.clone(), ttl)),
        Arc::new(CachedWeather::new(openweather.clone(), ttl)),
        Duration::from_millis(cfg.hedge.delay_ms),
        timeout,
    );

    let details = Arc::new(DetailsService::new(
        directory.clone(),
        hedged,
        Arc::new(CachedFlag::new(redcross.clone(), ttl)),
        None,
    ));
    let enrich = Arc::new(EnrichService::new(
        details.clone(),
        Arc::new(CachedBeachForecast::new(aemet.clone(), ttl)),
        Arc::new(CachedSlotForecast::new(openweather.clone(), ttl)),
        Arc::new(CachedUv::new(openweather.clone(), ttl)),
    ));

    // ── List mode ────────────────────────────────────────────────────
    if cli.list {
        for beach in directory.all() {
            let surveillance = beach
                .red_cross_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:<9} {:<32} {:<16} {:>8.4},{:<8.4}  cruz_roja={}",
                beach.id, beach.name, beach.municipality, beach.latitude, beach.longitude,
                surveillance
            );
        }
        return;
    }

    // ── Details mode ─────────────────────────────────────────────────
    if let Some(id) = cli.details.as_deref() {
        match details.beach_details(id).await {
            Ok(snapshot) => print_json(&snapshot),
            Err(e) => {
                error!("Details lookup failed: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    // ── Forecast mode ────────────────────────────────────────────────
    if let Some(id) = cli.forecast.as_deref() {
        match enrich.enriched_forecast(id).await {
            Ok(forecast) => print_json(&forecast),
            Err(e) => {
                error!("Forecast lookup failed: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    // ── Check-providers mode ─────────────────────────────────────────
    if cli.check_providers {
        info!("Probing providers...");
        let mut failures = 0usize;

        let Some(first) = directory.all().first() else {
            error!("Beach directory is empty");
            std::process::exit(1);
        };
        let (lat, lon) = (first.latitude, first.longitude);

        match aemet.current_by_coords(lat, lon).await {
            Ok(weather) => info!(
                "✅ aemet observations: {} (observed {})",
                weather
                    .temperature_c
                    .map(|t| format!("{:.1}°C", t))
                    .unwrap_or_else(|| "no temperature".into()),
                weather.timestamp
            ),
            Err(e) => {
                error!("❌ aemet observations: {}", e);
                failures += 1;
            }
        }

        match directory.all().iter().find(|b| !b.forecast_code.is_empty()) {
            Some(beach) => match aemet.forecast_by_beach_code(&beach.forecast_code).await {
                Ok(forecast) => info!(
                    "✅ aemet beach forecast: {} (updated {})",
                    forecast.today.summary.as_deref().unwrap_or("no summary"),
                    forecast.last_updated
                ),
                Err(e) => {
                    error!("❌ aemet beach forecast: {}", e);
                    failures += 1;
                }
            },
            None => info!("No beach has a forecast code; skipping that probe"),
        }

        match openweather.current_by_coords(lat, lon).await {
            Ok(weather) => info!(
                "✅ openweather current: {} ({})",
                weather
                    .temperature_c
                    .map(|t| format!("{:.1}°C", t))
                    .unwrap_or_else(|| "no temperature".into()),
                weather.description.as_deref().unwrap_or("no description")
            ),
            Err(e) => {
                error!("❌ openweather current: {}", e);
                failures += 1;
            }
        }

        match openweather.slots_by_coords(lat, lon).await {
            Ok(series) => info!(
                "✅ openweather forecast: {} timesteps, tz offset {}s",
                series.slots.len(),
                series.timezone_offset_secs
            ),
            Err(e) => {
                error!("❌ openweather forecast: {}", e);
                failures += 1;
            }
        }

        match openweather.uv_index_by_coords(lat, lon).await {
            Ok(value) => info!("✅ openweather uv: {:.1}", value),
            Err(e) => {
                error!("❌ openweather uv: {}", e);
                failures += 1;
            }
        }

        match directory.all().iter().find_map(|b| b.red_cross_id) {
            Some(id) => match redcross.flag_by_red_cross_id(id).await {
                Ok(Some(flag)) => info!("✅ redcross flag: {:?} for id {}", flag.color, id),
                Ok(None) => info!("✅ redcross flag: reachable, no flag posted for id {}", id),
                Err(e) => {
                    error!("❌ redcross flag: {}", e);
                    failures += 1;
                }
            },
            None => info!("No beach has a surveillance id; skipping that probe"),
        }

        if failures > 0 {
            error!("{} provider probe(s) failed", failures);
            std::process::exit(1);
        }
        info!("All provider probes passed");
        return;
    }

    // ── Watch loop ───────────────────────────────────────────────────
    if !cli.watch {
        info!("No mode selected; defaulting to watch mode");
    }
    info!(
        "🚀 Watching {} beaches every {}s. Press Ctrl+C to stop.",
        directory.len(),
        cfg.timing.watch_interval_secs
    );

    let watch_directory = directory.clone();
    let watch_enrich = enrich.clone();
    let watch_interval = Duration::from_secs(cfg.timing.watch_interval_secs);
    let watch_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(watch_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            run_refresh_cycle(&watch_directory, &watch_enrich).await;
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        r = watch_handle => {
            error!("Watch task exited: {:?}", r);
        }
    }

    info!("Beachcast shut down.");
}

// ── Task implementations ────────────────────────────────────────────

async fn run_refresh_cycle(directory: &BeachDirectory, enrich: &EnrichService) {
    info!("Refreshing beach forecasts...");
    let mut refreshed = 0usize;
    let mut failed = 0usize;

    for beach in directory.all() {
        match enrich.enriched_forecast(&beach.id).await {
            Ok(forecast) => {
                refreshed += 1;
                info!(
                    "{} ({}): {} {} uv={} [{}]",
                    beach.name,
                    beach.id,
                    forecast.today.summary.as_deref().unwrap_or("no summary"),
                    forecast
                        .today
                        .temperature_c
                        .map(|t| format!("{:.0}°C", t))
                        .unwrap_or_else(|| "-".into()),
                    forecast
                        .today
                        .uv_index
                        .map(|u| format!("{:.0}", u))
                        .unwrap_or_else(|| "-".into()),
                    forecast.source,
                );
            }
            Err(e) => {
                failed += 1;
                warn!("Refresh failed for {}: {}", beach.id, e);
            }
        }
    }

    info!("Refresh cycle complete: {} ok, {} failed", refreshed, failed);
}
