use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::PathBuf, time::Duration};

use crate::{provider::ClientKind, retry::RetryPolicy};

/// Environment variable that overrides the stored OpenWeather key.
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

/// Settings for a single client (e.g., API key, proxy location).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Overrides the client's built-in base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Timing knobs for the fetch controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub debounce_ms: u64,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    /// Upper bound for a single HTTP attempt.
    pub request_timeout_secs: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            max_retries: 2,
            initial_backoff_ms: 300,
            request_timeout_secs: 10,
        }
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Optional default client id, "openweather" or "proxy".
    pub default_client: Option<String>,

    /// Example TOML:
    /// [clients.openweather]
    /// api_key = "..."
    ///
    /// [clients.proxy]
    /// base_url = "http://localhost:8080"
    #[serde(default)]
    pub clients: HashMap<String, ClientConfig>,

    #[serde(default)]
    pub fetch: FetchSettings,
}

impl Config {
    /// Return the default client as a strongly-typed ClientKind.
    pub fn default_client_kind(&self) -> Result<ClientKind> {
        let s = self.default_client.as_ref().ok_or_else(|| {
            anyhow!(
                "No default client configured.\n\
                 Hint: run `weather configure <client>` (e.g. `weather configure openweather`) first."
            )
        })?;

        ClientKind::try_from(s.as_str())
    }

    pub fn client_config(&self, kind: ClientKind) -> Option<&ClientConfig> {
        self.clients.get(kind.as_str())
    }

    pub fn set_default_client(&mut self, kind: ClientKind) {
        self.default_client = Some(kind.as_str().to_string());
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-dashboard", "weather")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Insert or replace a client's settings; the first client configured becomes the default.
    pub fn upsert_client(&mut self, kind: ClientKind, client: ClientConfig) {
        self.clients.insert(kind.as_str().to_string(), client);

        if self.default_client.is_none() {
            self.default_client = Some(kind.to_string());
        }
    }

    /// API key as written in the config file.
    pub fn stored_api_key(&self, kind: ClientKind) -> Option<&str> {
        self.client_config(kind).and_then(|cfg| cfg.api_key.as_deref())
    }

    /// API key for a client. `OPENWEATHER_API_KEY` wins over the file.
    pub fn client_api_key(&self, kind: ClientKind) -> Option<String> {
        if kind == ClientKind::OpenWeather {
            if let Ok(key) = std::env::var(API_KEY_ENV) {
                if !key.trim().is_empty() {
                    return Some(key);
                }
            }
        }
        self.stored_api_key(kind).map(str::to_owned)
    }

    pub fn client_base_url(&self, kind: ClientKind) -> Option<&str> {
        self.client_config(kind).and_then(|cfg| cfg.base_url.as_deref())
    }

    pub fn is_client_configured(&self, kind: ClientKind) -> bool {
        match kind {
            ClientKind::OpenWeather => self.client_api_key(kind).is_some(),
            ClientKind::Proxy => self.client_base_url(kind).is_some(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.fetch.max_retries, self.fetch.initial_backoff_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.fetch.debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch.request_timeout_secs)
    }
}
