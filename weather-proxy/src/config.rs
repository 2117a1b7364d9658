//! Configuration loader for `weather-proxy`.
//!
//! All runtime settings come from environment variables (optionally via a
//! `.env` file loaded by the caller), so handlers never call `env::var`.
use std::{env, net::SocketAddr, time::Duration};

use anyhow::{Result, anyhow};
use weather_core::provider::openweather::DEFAULT_BASE_URL;

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u64 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u64>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Strongly typed proxy configuration, immutable after loading.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// `None` makes every weather request answer 500, mirroring a missing server key.
    pub api_key: Option<String>,

    /// OpenWeather base URL (tests point this at a mock).
    pub upstream_url: String,

    pub listen_addr: SocketAddr,

    pub request_timeout: Duration,
}

/// Load configuration from environment variables with defaults.
///
/// Optional:
/// - `OPENWEATHER_API_KEY` or `WEATHER_API_KEY` – provider key
/// - `OPENWEATHER_BASE_URL` – upstream base URL (default: public API)
/// - `PROXY_ADDR` – listen address (default: 0.0.0.0:8080)
/// - `PROXY_TIMEOUT_SECS` – per-request upstream timeout (default: 10)
pub fn load_from_env() -> Result<ProxyConfig> {
    // ---
    let api_key = ["OPENWEATHER_API_KEY", "WEATHER_API_KEY"]
        .iter()
        .find_map(|name| env::var(name).ok().filter(|v| !v.trim().is_empty()));

    let upstream_url = env::var("OPENWEATHER_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

    let listen_addr = env::var("PROXY_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        .parse::<SocketAddr>()
        .map_err(|e| anyhow!("Invalid PROXY_ADDR: {}", e))?;

    let request_timeout = Duration::from_secs(parse_env_u64!("PROXY_TIMEOUT_SECS", 10));

    Ok(ProxyConfig {
        api_key,
        upstream_url,
        listen_addr,
        request_timeout,
    })
}

impl ProxyConfig {
    /// Log the loaded configuration with the API key masked.
    pub fn log_config(&self) {
        // ---
        let masked_key = match &self.api_key {
            Some(key) => {
                let tail: String = key.chars().skip(key.chars().count().saturating_sub(4)).collect();
                format!("****{tail}")
            }
            None => "<not set>".to_string(),
        };

        tracing::info!("Configuration loaded:");
        tracing::info!("  OPENWEATHER_API_KEY  : {}", masked_key);
        tracing::info!("  OPENWEATHER_BASE_URL : {}", self.upstream_url);
        tracing::info!("  PROXY_ADDR           : {}", self.listen_addr);
        tracing::info!("  PROXY_TIMEOUT_SECS   : {}", self.request_timeout.as_secs());
    }
}
