use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::{
    error::FetchError,
    model::{Coordinates, NormalizedWeather, UnitSystem},
    provider::until_cancelled,
};

use super::WeatherClient;

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";
const CURRENT_PATH: &str = "/data/2.5/weather";

/// Upstream reply as received, before any classification.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherClient {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for OpenWeather")?;

        Ok(Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            http,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Call the current-weather endpoint and hand back status and body untouched.
    pub async fn fetch_raw(&self, city: &str, unit: UnitSystem) -> Result<RawResponse, reqwest::Error> {
        let url = format!("{}{}", self.base_url, CURRENT_PATH);

        let res = self
            .http
            .get(url)
            .query(&[
                ("q", city),
                ("appid", self.api_key.as_str()),
                ("units", unit.as_str()),
            ])
            .send()
            .await?;

        let status = res.status().as_u16();
        let body = res.text().await?;

        Ok(RawResponse { status, body })
    }

    async fn fetch_current(&self, city: &str, unit: UnitSystem) -> Result<NormalizedWeather, FetchError> {
        let started = std::time::Instant::now();
        let raw = self.fetch_raw(city, unit).await?;

        tracing::debug!(
            city,
            units = unit.as_str(),
            status = raw.status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "openweather responded"
        );

        if !raw.is_success() {
            tracing::debug!(body = %truncate_body(&raw.body), "openweather error body");
            return Err(FetchError::from_status(raw.status));
        }

        parse_current(&raw.body, unit)
    }
}

#[async_trait]
impl WeatherClient for OpenWeatherClient {
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

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    humidity: Option<u8>,
    pressure: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    id: Option<i64>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwSys {
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwCoord {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    #[serde(default)]
    name: String,
    #[serde(default)]
    dt: i64,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
    wind: Option<OwWind>,
    sys: Option<OwSys>,
    coord: Option<OwCoord>,
}

/// Parse a current-weather body (direct or passed through the proxy) that
/// was requested with `unit`.
pub fn parse_current(body: &str, unit: UnitSystem) -> Result<NormalizedWeather, FetchError> {
    let parsed: OwCurrentResponse = serde_json::from_str(body)
        .map_err(|e| FetchError::Unknown(format!("malformed weather payload: {e}")))?;

    Ok(normalize(parsed, unit))
}

fn normalize(raw: OwCurrentResponse, unit: UnitSystem) -> NormalizedWeather {
    let first = raw.weather.into_iter().next();
    let (condition, condition_code) = match first {
        Some(w) => (w.description.unwrap_or_default(), w.id.unwrap_or(0)),
        None => (String::new(), 0),
    };

    NormalizedWeather {
        city: raw.name,
        country: raw.sys.and_then(|s| s.country).unwrap_or_default(),
        timestamp_ms: raw.dt.saturating_mul(1000),
        temperature: raw.main.temp,
        feels_like: raw.main.feels_like,
        condition,
        condition_code,
        humidity_pct: raw.main.humidity,
        wind_speed: raw.wind.and_then(|w| w.speed),
        pressure_hpa: raw.main.pressure,
        coordinates: raw.coord.map(|c| Coordinates { lat: c.lat, lon: c.lon }),
        unit,
    }
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONDON: &str = r#"{
        "coord": {"lon": -0.1257, "lat": 51.5085},
        "weather": [{"id": 800, "main": "Clear", "description": "clear sky", "icon": "01d"}],
        "main": {"temp": 20, "feels_like": 19, "humidity": 50, "pressure": 1000},
        "wind": {"speed": 3.2},
        "dt": 1700000000,
        "sys": {"country": "GB"},
        "name": "London"
    }"#;

    #[test]
    fn parse_current_maps_every_field() {
        let w = parse_current(LONDON, UnitSystem::Metric).unwrap();

        assert_eq!(w.city, "London");
        assert_eq!(w.country, "GB");
        assert_eq!(w.timestamp_ms, 1_700_000_000_000);
        assert_eq!(w.temperature, 20.0);
        assert_eq!(w.feels_like, 19.0);
        assert_eq!(w.condition, "clear sky");
        assert_eq!(w.condition_code, 800);
        assert_eq!(w.humidity_pct, Some(50));
        assert_eq!(w.wind_speed, Some(3.2));
        assert_eq!(w.pressure_hpa, Some(1000));
        assert_eq!(w.coordinates, Some(Coordinates { lat: 51.5085, lon: -0.1257 }));
        assert_eq!(w.unit, UnitSystem::Metric);
    }

    #[test]
    fn parse_current_tolerates_sparse_payload() {
        let w = parse_current(r#"{"name": "Nowhere", "main": {"temp": 1.5, "feels_like": 0.5}}"#, UnitSystem::Imperial)
            .unwrap();

        assert_eq!(w.country, "");
        assert_eq!(w.condition, "");
        assert_eq!(w.condition_code, 0);
        assert_eq!(w.humidity_pct, None);
        assert_eq!(w.wind_speed, None);
        assert!(w.coordinates.is_none());
    }

    #[test]
    fn parse_current_rejects_missing_temperatures() {
        let err = parse_current(r#"{"name": "Broken"}"#, UnitSystem::Metric).unwrap_err();
        assert!(matches!(err, FetchError::Unknown(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let long = "é".repeat(150);
        let out = truncate_body(&long);
        assert!(out.ends_with("..."));
        assert!(out.len() <= 203);
    }

    #[tokio::test]
    async fn blank_city_fails_without_network() {
        let client = OpenWeatherClient::new("KEY".into(), Duration::from_secs(1))
            .unwrap()
            .with_base_url("http://127.0.0.1:9");

        let err = client
            .fetch_current_conditions("   ", UnitSystem::Metric, CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::InvalidInput);
    }
}
