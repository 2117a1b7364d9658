use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use weather_core::OpenWeatherClient;

use crate::ProxyConfig;

mod health;
mod weather;

/// Shared by every handler.
#[derive(Debug, Clone)]
pub struct ProxyState {
    pub upstream: Option<Arc<OpenWeatherClient>>,
}

impl ProxyState {
    pub fn from_config(config: &ProxyConfig) -> Result<Self> {
        let upstream = match &config.api_key {
            Some(key) => Some(Arc::new(
                OpenWeatherClient::new(key.clone(), config.request_timeout)?
                    .with_base_url(&config.upstream_url),
            )),
            None => None,
        };
        Ok(Self { upstream })
    }
}

// ---

pub fn router(state: ProxyState) -> Router {
    // ---
    Router::new()
        .merge(weather::router())
        .merge(health::router())
        .with_state(state)
}
