use crate::{
    Config, FetchError, NormalizedWeather, UnitSystem,
    provider::{openweather::OpenWeatherClient, proxy::ProxyClient},
};
use async_trait::async_trait;
use std::{convert::TryFrom, fmt::Debug, future::Future, sync::Arc};
use tokio_util::sync::CancellationToken;

pub mod openweather;
pub mod proxy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientKind {
    /// Talks to OpenWeather directly with a local API key.
    OpenWeather,
    /// Goes through a `weather-proxy` instance that holds the key.
    Proxy,
}

impl ClientKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientKind::OpenWeather => "openweather",
            ClientKind::Proxy => "proxy",
        }
    }

    pub const fn all() -> &'static [ClientKind] {
        &[ClientKind::OpenWeather, ClientKind::Proxy]
    }
}

impl std::fmt::Display for ClientKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ClientKind {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "openweather" => Ok(ClientKind::OpenWeather),
            "proxy" => Ok(ClientKind::Proxy),
            _ => {
                let supported: Vec<&str> = ClientKind::all().iter().map(ClientKind::as_str).collect();
                Err(anyhow::anyhow!(
                    "Unknown client '{value}'. Supported clients: {}.",
                    supported.join(", ")
                ))
            }
        }
    }
}

/// Source of current conditions for a city.
///
/// Implementations classify every failure into a [`FetchError`] and must
/// settle with [`FetchError::Cancelled`] promptly once `cancel` fires.
#[async_trait]
pub trait WeatherClient: Send + Sync + Debug {
    async fn fetch_current_conditions(
        &self,
        city: &str,
        unit: UnitSystem,
        cancel: CancellationToken,
    ) -> Result<NormalizedWeather, FetchError>;
}

/// Race `fut` against `cancel`; cancellation wins ties.
pub(crate) async fn until_cancelled<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, FetchError>
where
    F: Future<Output = Result<T, FetchError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(FetchError::Cancelled),
        res = fut => res,
    }
}

/// Construct a client from config and explicit ClientKind.
pub fn client_from_config(kind: ClientKind, config: &Config) -> anyhow::Result<Arc<dyn WeatherClient>> {
    let timeout = config.request_timeout();

    let client: Arc<dyn WeatherClient> = match kind {
        ClientKind::OpenWeather => {
            let api_key = config.client_api_key(kind).ok_or_else(|| {
                anyhow::anyhow!(
                    "No API key configured for client '{kind}'.\n\
                     Hint: run `weather configure {kind}` or set OPENWEATHER_API_KEY."
                )
            })?;
            let mut client = OpenWeatherClient::new(api_key, timeout)?;
            if let Some(url) = config.client_base_url(kind) {
                client = client.with_base_url(url);
            }
            Arc::new(client)
        }
        ClientKind::Proxy => {
            let base_url = config.client_base_url(kind).ok_or_else(|| {
                anyhow::anyhow!(
                    "No proxy URL configured.\n\
                     Hint: run `weather configure proxy` and enter the proxy address."
                )
            })?;
            Arc::new(ProxyClient::new(base_url, timeout)?)
        }
    };

    Ok(client)
}

/// Construct the default client from config, using the `default_client` field.
pub fn default_client_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherClient>> {
    let kind = config.default_client_kind()?;
    client_from_config(kind, config)
}
