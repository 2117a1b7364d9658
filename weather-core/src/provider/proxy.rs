use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::{
    error::FetchError,
    model::{NormalizedWeather, UnitSystem},
    provider::{
        openweather::{parse_current, truncate_body},
        until_cancelled,
    },
};

use super::WeatherClient;

const WEATHER_PATH: &str = "/api/weather";

/// Client for a `weather-proxy` deployment. The proxy owns the API key.
#[derive(Debug, Clone)]
pub struct ProxyClient {
    base_url: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct ProxyErrorBody {
    message: Option<String>,
}

impl ProxyClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for weather proxy")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn fetch_current(&self, city: &str, unit: UnitSystem) -> Result<NormalizedWeather, FetchError> {
        let url = format!("{}{}", self.base_url, WEATHER_PATH);

        let res = self
            .http
            .get(url)
            .query(&[("city", city), ("units", unit.as_str())])
            .send()
            .await?;

        let status = res.status().as_u16();
        let body = res.text().await?;

        if !(200..300).contains(&status) {
            let message = serde_json::from_str::<ProxyErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| truncate_body(&body));
            tracing::debug!(status, %message, "proxy returned error");
            return Err(FetchError::from_status(status));
        }

        parse_current(&body, unit)
    }
}

#[async_trait]
impl WeatherClient for ProxyClient {
    async fn fetch_current_conditions(
        &self,
        city: &str,
        unit: UnitSystem,
        cancel: CancellationToken,
    ) -> Result<NormalizedWeather, FetchError> {
        let city = city.trim();
        if city.is_empty() {
            return Err(FetchError::InvalidInput);
        }

        until_cancelled(&cancel, self.fetch_current(city, unit)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let client = ProxyClient::new("http://localhost:8080/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url, "http://localhost:8080");
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let client = ProxyClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let err = client
            .fetch_current_conditions("Paris", UnitSystem::Metric, token)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
