//! Error taxonomy for weather lookups.
//!
//! Classification happens next to the network call. The controller only looks
//! at two bits of it: whether a failure is worth retrying and whether it was a
//! cancellation that must be swallowed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MSG_INVALID_INPUT: &str = "Please enter a valid city name.";
pub const MSG_UNAUTHORIZED: &str = "API key invalid";
pub const MSG_NOT_FOUND: &str = "City not found — check spelling";
pub const MSG_RATE_LIMITED: &str = "Rate limit reached — try again later";
pub const MSG_NETWORK: &str = "Network error — check connection";
pub const MSG_GENERIC: &str = "Failed to fetch weather";

/// A classified failure from a [`WeatherClient`](crate::WeatherClient).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("invalid input: city name is empty")]
    InvalidInput,

    #[error("city not found")]
    NotFound,

    #[error("provider rejected credentials")]
    Unauthorized,

    #[error("provider rate limit reached")]
    RateLimited,

    #[error("transient network failure: {0}")]
    TransientNetwork(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("unexpected failure: {0}")]
    Unknown(String),
}

impl FetchError {
    /// Map an HTTP status from the provider (or the proxy) to a failure kind.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => FetchError::InvalidInput,
            401 => FetchError::Unauthorized,
            404 => FetchError::NotFound,
            429 => FetchError::RateLimited,
            408 | 500..=599 => FetchError::TransientNetwork(format!("upstream status {status}")),
            _ => FetchError::Unknown(format!("upstream status {status}")),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::TransientNetwork(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::InvalidInput => ErrorKind::InvalidInput,
            FetchError::NotFound => ErrorKind::NotFound,
            FetchError::Unauthorized => ErrorKind::Unauthorized,
            FetchError::RateLimited => ErrorKind::RateLimited,
            FetchError::TransientNetwork(_) => ErrorKind::TransientNetwork,
            FetchError::Cancelled => ErrorKind::Cancelled,
            FetchError::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Message suitable for showing to the person who typed the city.
    pub fn user_message(&self) -> &'static str {
        match self {
            FetchError::InvalidInput => MSG_INVALID_INPUT,
            FetchError::NotFound => MSG_NOT_FOUND,
            FetchError::Unauthorized => MSG_UNAUTHORIZED,
            FetchError::RateLimited => MSG_RATE_LIMITED,
            FetchError::TransientNetwork(_) => MSG_NETWORK,
            FetchError::Cancelled | FetchError::Unknown(_) => MSG_GENERIC,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() {
            return FetchError::TransientNetwork(e.to_string());
        }
        if let Some(status) = e.status() {
            return FetchError::from_status(status.as_u16());
        }
        FetchError::Unknown(e.to_string())
    }
}

/// Status code to message table used by the proxy endpoint.
pub fn status_message(status: u16) -> &'static str {
    match status {
        401 => MSG_UNAUTHORIZED,
        404 => MSG_NOT_FOUND,
        429 => MSG_RATE_LIMITED,
        _ => MSG_GENERIC,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Unauthorized,
    RateLimited,
    TransientNetwork,
    Cancelled,
    Unknown,
}

/// The error half of [`FetchState`](crate::FetchState).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&FetchError> for ErrorInfo {
    fn from(e: &FetchError) -> Self {
        Self {
            kind: e.kind(),
            message: e.user_message().to_string(),
        }
    }
}

/// Failures while reading or writing persisted preferences.
#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("preferences io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("preferences could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("no platform data directory available")]
    NoDataDir,
}
