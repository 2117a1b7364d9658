//! Core library for the weather dashboard.
//!
//! This crate defines:
//! - The normalized weather record and the cache keyed by city and unit
//! - Clients for OpenWeather and for the key-holding proxy
//! - The fetch controller: debounce, retry with backoff, supersession
//! - Configuration and persisted preferences
//!
//! It is used by `weather-cli` and `weather-proxy`.

pub mod cache;
pub mod config;
pub mod controller;
pub mod error;
pub mod model;
pub mod preferences;
pub mod provider;
pub mod retry;
pub mod state;

pub use cache::ResponseCache;
pub use config::{ClientConfig, Config, FetchSettings};
pub use controller::{ControllerOptions, FetchController, ResolveOutcome};
pub use error::{ErrorInfo, ErrorKind, FetchError, PreferenceError, status_message};
pub use model::{CacheKey, Coordinates, NormalizedWeather, UnitSystem};
pub use preferences::{
    FilePreferenceStore, MemoryPreferenceStore, PreferenceStore, Preferences, Theme,
};
pub use provider::{
    ClientKind, WeatherClient, client_from_config, default_client_from_config,
    openweather::OpenWeatherClient, proxy::ProxyClient,
};
pub use retry::RetryPolicy;
pub use state::FetchState;
pub use tokio_util::sync::CancellationToken;
