//! Configuration loader. Merges env vars, .env file, and config.toml.

use std::path::Path;

use common::config::AppConfig;
use common::Error;

fn parse_positive_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    let parsed = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer > 0")))?;
    if parsed == 0 {
        return Err(Error::Config(format!("{env_name} must be an integer > 0")));
    }
    Ok(parsed)
}

fn validate_config(config: &AppConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    if config.beaches_path.trim().is_empty() {
        issues.push("beaches_path must not be empty".into());
    }
    if config.cache.ttl_secs == 0 {
        issues.push("cache.ttl_secs must be > 0".into());
    }
    if config.hedge.delay_ms == 0 {
        issues.push("hedge.delay_ms must be > 0".into());
    }
    if config.hedge.delay_ms > 10_000 {
        issues.push("hedge.delay_ms must be <= 10000".into());
    }
    if config.timing.provider_timeout_secs == 0 {
        issues.push("timing.provider_timeout_secs must be > 0".into());
    }
    if config.timing.watch_interval_secs == 0 {
        issues.push("timing.watch_interval_secs must be > 0".into());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

/// Load service configuration from environment and optional config file.
pub fn load_config() -> Result<AppConfig, Error> {
    // 1. Load .env file from project root or parent directories.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Start with defaults.
    let mut config = AppConfig::default();

    // 3. Try loading config.toml if it exists.
    let config_path = Path::new("config.toml");
    if config_path.exists() {
        let contents = std::fs::read_to_string(config_path)
            .map_err(|e| Error::Config(format!("Failed to read config.toml: {}", e)))?;
        config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config.toml: {}", e)))?;
    }

    // 4. Override with environment variables (highest priority).
    if let Ok(key) = std::env::var("AEMET_API_KEY") {
        config.aemet_api_key = key;
    }
    if let Ok(key) = std::env::var("OPENWEATHER_API_KEY") {
        config.openweather_api_key = key;
    }
    if let Ok(path) = std::env::var("BEACHES_PATH") {
        config.beaches_path = path;
    }
    if let Ok(raw) = std::env::var("CACHE_TTL_SECONDS") {
        config.cache.ttl_secs = parse_positive_u64(&raw, "CACHE_TTL_SECONDS")?;
    }
    if let Ok(raw) = std::env::var("HEDGE_DELAY_MS") {
        config.hedge.delay_ms = parse_positive_u64(&raw, "HEDGE_DELAY_MS")?;
    }
    if let Ok(raw) = std::env::var("PROVIDER_TIMEOUT_SECS") {
        config.timing.provider_timeout_secs = parse_positive_u64(&raw, "PROVIDER_TIMEOUT_SECS")?;
    }
    if let Ok(raw) = std::env::var("WATCH_INTERVAL_SECS") {
        config.timing.watch_interval_secs = parse_positive_u64(&raw, "WATCH_INTERVAL_SECS")?;
    }

    // 5. API keys may stay empty (providers degrade per call), but the
    // structural settings have to be sane.
    validate_config(&config)?;

    Ok(config)
}
