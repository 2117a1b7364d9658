//! Mediates between search input and the weather client.
//!
//! The controller owns the debounce timer, the in-flight fetch, the retry
//! loop and every write to [`FetchState`]. Two rules hold throughout:
//!
//! - at most one fetch is in flight; starting a new one cancels the old one
//! - a fetch only commits state if it is still the newest resolve, checked
//!   under the session lock right before writing
//!
//! The second rule still holds when a client ignores its cancellation token
//! and delivers a response anyway.

use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use tokio::sync::watch;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, info, warn};

use crate::{
    cache::ResponseCache,
    config::Config,
    error::{ErrorInfo, FetchError, PreferenceError},
    model::{CacheKey, NormalizedWeather, UnitSystem},
    preferences::{PreferenceStore, Preferences, Theme},
    provider::WeatherClient,
    retry::RetryPolicy,
    state::{FetchState, STATUS_CACHED, STATUS_ERROR, STATUS_LOADED},
};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerOptions {
    /// Quiet period before a `search` turns into a lookup.
    pub debounce: Duration,
    pub retry: RetryPolicy,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            retry: RetryPolicy::default(),
        }
    }
}

impl From<&Config> for ControllerOptions {
    fn from(config: &Config) -> Self {
        Self {
            debounce: config.debounce(),
            retry: config.retry_policy(),
        }
    }
}

/// How a single `resolve` ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveOutcome {
    CacheHit,
    Fetched,
    Failed(FetchError),
    /// A newer resolve took over; nothing was written.
    Superseded,
    /// Nothing to look up (no city known).
    Skipped,
}

#[derive(Debug, Default)]
struct Session {
    unit: UnitSystem,
    debounce: Option<CancellationToken>,
    in_flight: Option<CancellationToken>,
    /// Bumped by every resolve; a commit needs its ticket to still match.
    generation: u64,
}

#[derive(Debug)]
struct Inner {
    client: Arc<dyn WeatherClient>,
    cache: ResponseCache,
    prefs: Arc<dyn PreferenceStore>,
    options: ControllerOptions,
    state: watch::Sender<FetchState>,
    session: Mutex<Session>,
    /// Debounced searches, waiting or resolving.
    searches: TaskTracker,
}

/// Cheap to clone; clones drive the same session.
#[derive(Debug, Clone)]
pub struct FetchController {
    inner: Arc<Inner>,
}

impl FetchController {
    /// Build a controller, rehydrating unit and last query from `prefs`.
    pub fn new(
        client: Arc<dyn WeatherClient>,
        cache: ResponseCache,
        prefs: Arc<dyn PreferenceStore>,
        options: ControllerOptions,
    ) -> Self {
        let stored = prefs.get();
        let (state, _rx) = watch::channel(FetchState {
            last_query: stored.last_searched.clone(),
            ..FetchState::default()
        });

        Self {
            inner: Arc::new(Inner {
                client,
                cache,
                prefs,
                options,
                state,
                session: Mutex::new(Session {
                    unit: stored.unit,
                    ..Session::default()
                }),
                searches: TaskTracker::new(),
            }),
        }
    }

    pub fn state(&self) -> FetchState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchState> {
        self.inner.state.subscribe()
    }

    pub fn unit(&self) -> UnitSystem {
        self.inner.session.lock().unit
    }

    pub fn theme(&self) -> Theme {
        self.inner.prefs.get().theme
    }

    pub fn favorites(&self) -> Vec<String> {
        self.inner.prefs.get().favorites
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.inner.cache
    }

    /// Whether the city currently on display is a favorite.
    pub fn is_favorite(&self) -> bool {
        let state = self.inner.state.borrow();
        match &state.data {
            Some(data) => self.inner.prefs.get().is_favorite(&data.city),
            None => false,
        }
    }

    /// Schedule a debounced lookup. Blank input is ignored.
    ///
    /// Only the last call inside the debounce window survives. Must be called
    /// from within a Tokio runtime.
    pub fn search(&self, city_input: &str) {
        let city = city_input.trim();
        if city.is_empty() {
            return;
        }

        let token = CancellationToken::new();
        {
            let mut session = self.inner.session.lock();
            if let Some(pending) = session.debounce.replace(token.clone()) {
                pending.cancel();
            }
        }

        let this = self.clone();
        let city = city.to_string();
        let delay = self.inner.options.debounce;

        self.inner.searches.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(%city, "debounced search replaced");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }
            let unit = this.unit();
            this.resolve(&city, unit).await;
        });
    }

    /// Wait until every scheduled search has resolved and nothing is loading.
    ///
    /// Lookups started directly through `resolve`, `retry` or `toggle_unit`
    /// are covered by the loading flag once they have begun.
    pub async fn settled(&self) {
        let searches = &self.inner.searches;
        searches.close();
        searches.wait().await;
        searches.reopen();

        let mut rx = self.subscribe();
        // The sender lives in `inner`, so this only ends once loading clears.
        let _ = rx.wait_for(|s| !s.loading).await;
    }

    /// Look `city` up under `unit`, from the cache when possible.
    ///
    /// A blank city fails with [`FetchError::InvalidInput`] and leaves the
    /// state and any fetch in flight untouched.
    pub async fn resolve(&self, city: &str, unit: UnitSystem) -> ResolveOutcome {
        let city = city.trim();
        if city.is_empty() {
            debug!("ignoring blank lookup");
            return ResolveOutcome::Failed(FetchError::InvalidInput);
        }
        let key = CacheKey::new(city, unit);

        if let Some(hit) = self.inner.cache.get(&key) {
            info!(%key, "cache hit");
            {
                let mut session = self.inner.session.lock();
                // Older fetches may finish later; they no longer own the state.
                session.generation += 1;
                self.inner.state.send_modify(|s| {
                    s.data = Some(hit);
                    s.error = None;
                    s.loading = false;
                    s.served_from_cache = true;
                    s.last_query = city.to_string();
                    s.status_message = STATUS_CACHED.to_string();
                });
            }
            self.persist(|p| p.last_searched = city.to_string());
            return ResolveOutcome::CacheHit;
        }

        let (token, ticket) = {
            let mut session = self.inner.session.lock();
            if let Some(previous) = session.in_flight.take() {
                debug!("cancelling superseded fetch");
                previous.cancel();
            }
            let token = CancellationToken::new();
            session.in_flight = Some(token.clone());
            session.generation += 1;

            self.inner.state.send_modify(|s| {
                s.loading = true;
                s.error = None;
            });
            (token, session.generation)
        };

        let result = self.fetch_with_retry(city, unit, &token).await;
        self.commit(city, key, ticket, &token, result)
    }

    /// Flip metric/imperial and refetch the displayed (or last) city right away.
    pub async fn toggle_unit(&self) -> ResolveOutcome {
        let next = {
            let mut session = self.inner.session.lock();
            let next = session.unit.toggled();
            session.unit = next;
            next
        };
        self.persist(|p| p.unit = next);
        info!(unit = %next, "unit toggled");

        let city = {
            let state = self.inner.state.borrow();
            state
                .data
                .as_ref()
                .map(|d| d.city.clone())
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| state.last_query.clone())
        };

        if city.trim().is_empty() {
            return ResolveOutcome::Skipped;
        }
        self.resolve(&city, next).await
    }

    /// Search the last successful query again, without debounce.
    pub async fn retry(&self) -> ResolveOutcome {
        let last = self.inner.state.borrow().last_query.clone();
        if last.trim().is_empty() {
            return ResolveOutcome::Skipped;
        }
        let unit = self.unit();
        self.resolve(&last, unit).await
    }

    /// Toggle `city` (or the displayed city) in favorites; returns the new list.
    pub fn toggle_favorite(&self, city: Option<&str>) -> Result<Vec<String>, PreferenceError> {
        let name = match city.map(str::trim).filter(|c| !c.is_empty()) {
            Some(name) => name.to_string(),
            None => match &self.inner.state.borrow().data {
                Some(data) if !data.city.is_empty() => data.city.clone(),
                _ => return Ok(self.favorites()),
            },
        };

        let mut added = false;
        let prefs = self.inner.prefs.update(&mut |p| added = p.toggle_favorite(&name))?;

        debug!(%name, added, "favorite toggled");
        Ok(prefs.favorites)
    }

    pub fn toggle_theme(&self) -> Result<Theme, PreferenceError> {
        let prefs = self.inner.prefs.update(&mut |p| p.theme = p.theme.toggled())?;
        Ok(prefs.theme)
    }

    /// Drop displayed data and error. The cache is left alone.
    pub fn clear(&self) {
        self.inner.state.send_modify(|s| {
            s.data = None;
            s.error = None;
            s.status_message.clear();
        });
    }

    async fn fetch_with_retry(
        &self,
        city: &str,
        unit: UnitSystem,
        token: &CancellationToken,
    ) -> Result<NormalizedWeather, FetchError> {
        let policy = self.inner.options.retry;
        let mut retries = 0;

        loop {
            let started = tokio::time::Instant::now();
            let result = self
                .inner
                .client
                .fetch_current_conditions(city, unit, token.clone())
                .await;
            debug!(
                city,
                attempt = retries + 1,
                elapsed_ms = started.elapsed().as_millis() as u64,
                ok = result.is_ok(),
                "weather fetch attempt"
            );

            match result {
                Err(e) if e.is_transient() && retries < policy.max_retries => {
                    let delay = policy.delay_for_attempt(retries);
                    retries += 1;
                    warn!(
                        city,
                        error = %e,
                        "transient failure, attempt {} of {} in {:?}",
                        retries + 1,
                        policy.max_attempts(),
                        delay
                    );
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => return Err(FetchError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                other => return other,
            }
        }
    }

    fn commit(
        &self,
        city: &str,
        key: CacheKey,
        ticket: u64,
        token: &CancellationToken,
        result: Result<NormalizedWeather, FetchError>,
    ) -> ResolveOutcome {
        let mut session = self.inner.session.lock();

        if token.is_cancelled() {
            debug!(%key, "discarding cancelled fetch");
            return ResolveOutcome::Superseded;
        }

        // Nobody cancelled this fetch, so the client settled on its own.
        let result = match result {
            Err(FetchError::Cancelled) => {
                warn!(%key, "client reported cancellation without a cancel request");
                Err(FetchError::Unknown("fetch cancelled by client".into()))
            }
            other => other,
        };

        if let Ok(weather) = &result {
            self.inner.cache.set(key.clone(), weather.clone());
        }

        if session.generation != ticket {
            debug!(%key, "discarding fetch overtaken by a newer resolve");
            return ResolveOutcome::Superseded;
        }
        session.in_flight = None;

        match result {
            Ok(weather) => {
                info!(%key, "weather loaded");
                self.inner.state.send_modify(|s| {
                    s.data = Some(weather);
                    s.error = None;
                    s.loading = false;
                    s.served_from_cache = false;
                    s.last_query = city.to_string();
                    s.status_message = STATUS_LOADED.to_string();
                });
                drop(session);
                self.persist(|p| p.last_searched = city.to_string());
                ResolveOutcome::Fetched
            }
            Err(e) => {
                warn!(%key, error = %e, "weather lookup failed");
                self.inner.state.send_modify(|s| {
                    s.data = None;
                    s.error = Some(ErrorInfo::from(&e));
                    s.loading = false;
                    s.served_from_cache = false;
                    s.status_message = STATUS_ERROR.to_string();
                });
                ResolveOutcome::Failed(e)
            }
        }
    }

    /// Write through to the preference store. Never called with the session lock held.
    fn persist(&self, mut apply: impl FnMut(&mut Preferences)) {
        if let Err(e) = self.inner.prefs.update(&mut apply) {
            warn!(error = %e, "failed to persist preferences");
        }
    }
}
