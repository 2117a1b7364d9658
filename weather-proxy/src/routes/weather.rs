//! `GET /api/weather?city=&units=`: forwards to OpenWeather.
//!
//! Errors always come back as `{"message": ...}`; successful upstream bodies
//! are returned as-is with a `Server-Timing` header.

use std::time::Instant;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderName, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info};
use weather_core::{UnitSystem, error::MSG_NETWORK, status_message};

use super::ProxyState;

const SERVER_TIMING: HeaderName = HeaderName::from_static("server-timing");

pub fn router() -> Router<ProxyState> {
    // ---
    Router::new().route("/api/weather", get(handler).fallback(method_not_allowed))
}

#[derive(Debug, Deserialize)]
pub struct WeatherQuery {
    city: Option<String>,
    units: Option<String>,
}

fn message(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

async fn method_not_allowed() -> Response {
    message(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
}

async fn handler(Query(params): Query<WeatherQuery>, State(state): State<ProxyState>) -> Response {
    // ---
    let Some(upstream) = state.upstream.as_deref() else {
        error!("GET /api/weather - no API key configured");
        return message(StatusCode::INTERNAL_SERVER_ERROR, "Server API key not configured");
    };

    let city = match params.city.as_deref().map(str::trim) {
        Some(city) if !city.is_empty() => city,
        _ => return message(StatusCode::BAD_REQUEST, "City is required"),
    };

    let unit = match params.units.as_deref() {
        Some("imperial") => UnitSystem::Imperial,
        _ => UnitSystem::Metric,
    };

    info!(city, units = unit.as_str(), "GET /api/weather");
    let start = Instant::now();

    let raw = match upstream.fetch_raw(city, unit).await {
        Ok(raw) => raw,
        Err(e) => {
            error!("Upstream request failed: {}", e);
            return message(StatusCode::BAD_GATEWAY, MSG_NETWORK);
        }
    };

    let status = StatusCode::from_u16(raw.status).unwrap_or(StatusCode::BAD_GATEWAY);

    if !status.is_success() {
        let mapped = status_message(raw.status);
        debug!(status = raw.status, body = %raw.body, mapped, "upstream error mapped");
        return message(status, mapped);
    }

    let body = if raw.body.trim().is_empty() { "{}".to_string() } else { raw.body };
    if serde_json::from_str::<serde_json::Value>(&body).is_err() {
        error!("Upstream returned a non-JSON success body");
        return message(StatusCode::BAD_GATEWAY, MSG_NETWORK);
    }

    let elapsed = start.elapsed().as_millis();
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (SERVER_TIMING, format!("ow;dur={elapsed}")),
        ],
        body,
    )
        .into_response()
}
