//! Entry point for `weather-proxy`.
//!
//! Startup sequence:
//! - Load `.env` (if present) and read configuration from the environment
//! - Initialize structured logging
//! - Build the upstream client and mount the routes gateway
//! - Bind and serve
//!
//! # Environment Variables
//! - `OPENWEATHER_API_KEY` / `WEATHER_API_KEY` – provider key
//! - `PROXY_ADDR` (optional) – listen address (default: `0.0.0.0:8080`)
//! - `PROXY_LOG_LEVEL` (optional) – log verbosity (default: `info`)
use std::{env, io::IsTerminal};

use anyhow::Result;
use dotenvy::dotenv;
use tracing_subscriber::filter::EnvFilter;

use weather_proxy::{ProxyState, config, router};

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let state = ProxyState::from_config(&cfg)?;
    if state.upstream.is_none() {
        tracing::warn!("No API key set; /api/weather will answer 500 until one is configured");
    }

    let app = router(state);

    tracing::info!("Listening on {}", cfg.listen_addr);
    let listener = tokio::net::TcpListener::bind(cfg.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Install the global tracing subscriber.
///
/// - Colors follow `FORCE_COLOR` (`1|true|yes` on, `0|false|no` off), else TTY detection
/// - `RUST_LOG` wins when set; otherwise `PROXY_LOG_LEVEL` picks the level
fn init_tracing() {
    // ---
    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("PROXY_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!("{level},hyper=warn,reqwest=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
