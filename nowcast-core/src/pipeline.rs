//! Query-to-weather pipeline.
//!
//! Edits to the query re-arm a debounce timer. When it expires the current
//! query is geocoded and the weather for the first match is fetched. Every
//! triggered sequence carries a token; only the completion holding the most
//! recently issued token may touch the state, so a slow response for an old
//! query can never overwrite a newer one.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::sync::watch;

use crate::{
    WeatherError,
    debounce::Debouncer,
    model::{Coordinates, TemperatureUnit, WeatherSnapshot},
    provider::{WeatherProvider, resolve_weather},
};

pub const DEFAULT_QUERY: &str = "London, GB";
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub debounce: Duration,
    pub default_query: String,
    pub unit: TemperatureUnit,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            default_query: DEFAULT_QUERY.to_string(),
            unit: TemperatureUnit::default(),
        }
    }
}

/// Where the latest fetch sequence stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FetchStatus {
    #[default]
    Idle,
    /// Waiting for the debounce timer.
    Pending,
    Loading,
    Ready,
    NotFound { query: String },
    Unauthorized,
    Failed { message: String },
}

impl From<&WeatherError> for FetchStatus {
    fn from(err: &WeatherError) -> Self {
        match err {
            WeatherError::NotFound { query } => FetchStatus::NotFound { query: query.clone() },
            WeatherError::Unauthorized | WeatherError::MissingApiKey => FetchStatus::Unauthorized,
            other => FetchStatus::Failed { message: other.to_string() },
        }
    }
}

/// Everything needed to render the widget.
///
/// A failed fetch only changes `status`; the previous snapshot stays.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetState {
    pub query: String,
    pub unit: TemperatureUnit,
    pub snapshot: Option<Arc<WeatherSnapshot>>,
    pub status: FetchStatus,
}

#[derive(Debug)]
struct Shared {
    provider: Arc<dyn WeatherProvider>,
    state: watch::Sender<WidgetState>,
    latest: AtomicU64,
}

impl Shared {
    /// Issue a new sequence token and mark the state as loading. Every token
    /// issued earlier becomes stale.
    fn begin(&self) -> u64 {
        let mut token = 0;
        self.state.send_modify(|state| {
            token = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
            state.status = FetchStatus::Loading;
        });
        token
    }

    fn invalidate(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
    }

    /// Apply a finished sequence if `token` is still current. Returns whether
    /// the state was updated.
    fn complete(
        &self,
        token: u64,
        result: &Result<Arc<WeatherSnapshot>, WeatherError>,
        relabel: bool,
    ) -> bool {
        self.state.send_if_modified(|state| {
            if self.latest.load(Ordering::SeqCst) != token {
                tracing::debug!(token, "discarding stale weather response");
                return false;
            }

            match result {
                Ok(snapshot) => {
                    tracing::info!(location = %snapshot.location_label(), "weather updated");
                    if relabel {
                        state.query = snapshot.location_label();
                    }
                    state.snapshot = Some(Arc::clone(snapshot));
                    state.status = FetchStatus::Ready;
                }
                Err(err) => {
                    tracing::warn!(query = %state.query, error = %err, "weather fetch failed");
                    state.status = FetchStatus::from(err);
                }
            }
            true
        })
    }

    /// Timer expiry: start one sequence for whatever the query is now.
    fn fire(self: Arc<Self>) {
        let query = self.state.borrow().query.clone();
        if query.trim().is_empty() {
            return;
        }

        let token = self.begin();
        tracing::debug!(token, %query, "debounce elapsed, fetching");

        tokio::spawn(async move {
            let result = resolve_weather(self.provider.as_ref(), &query).await.map(Arc::new);
            self.complete(token, &result, false);
        });
    }
}

/// Owns the query, the display unit and the latest snapshot.
///
/// Dropping the pipeline (or calling [`WeatherPipeline::teardown`]) cancels a
/// pending timer and makes every in-flight request stale.
#[derive(Debug)]
pub struct WeatherPipeline {
    shared: Arc<Shared>,
    debouncer: Debouncer,
}

impl WeatherPipeline {
    pub fn new(provider: Arc<dyn WeatherProvider>, options: PipelineOptions) -> Self {
        let (state, _) = watch::channel(WidgetState {
            query: options.default_query,
            unit: options.unit,
            snapshot: None,
            status: FetchStatus::Idle,
        });

        Self {
            shared: Arc::new(Shared { provider, state, latest: AtomicU64::new(0) }),
            debouncer: Debouncer::new(options.debounce),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<WidgetState> {
        self.shared.state.subscribe()
    }

    pub fn state(&self) -> WidgetState {
        self.shared.state.borrow().clone()
    }

    /// Arm the timer for the initial query.
    pub fn mount(&mut self) {
        if self.shared.state.borrow().query.trim().is_empty() {
            return;
        }
        self.arm();
    }

    /// Record an edit of the query and restart the debounce delay.
    ///
    /// Any sequence still in flight answers the old query and becomes stale.
    /// A blank query is stored but never fetched. Setting the same text again
    /// is a no-op.
    pub fn set_query(&mut self, text: impl Into<String>) {
        let text = text.into();
        let blank = text.trim().is_empty();

        let changed = self.shared.state.send_if_modified(|state| {
            if state.query == text {
                return false;
            }
            self.shared.invalidate();
            state.query = text;
            if !blank {
                state.status = FetchStatus::Pending;
            }
            true
        });

        if !changed {
            return;
        }
        if blank {
            self.debouncer.cancel();
        } else {
            self.arm();
        }
    }

    pub fn set_unit(&self, unit: TemperatureUnit) {
        self.shared.state.send_if_modified(|state| {
            if state.unit == unit {
                return false;
            }
            state.unit = unit;
            true
        });
    }

    pub fn toggle_unit(&self) -> TemperatureUnit {
        let mut unit = TemperatureUnit::default();
        self.shared.state.send_modify(|state| {
            state.unit = state.unit.toggled();
            unit = state.unit;
        });
        unit
    }

    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// Fetch immediately for the current query, skipping the debounce.
    pub async fn refresh_now(&mut self) -> Result<Arc<WeatherSnapshot>, WeatherError> {
        self.debouncer.cancel();

        let query = self.shared.state.borrow().query.clone();
        let token = self.shared.begin();
        let result = resolve_weather(self.shared.provider.as_ref(), &query).await.map(Arc::new);
        self.shared.complete(token, &result, false);
        result
    }

    /// Seed the widget from a known position: fetch weather there and take the
    /// resolved "City, CC" as the query. No debounced re-fetch follows.
    ///
    /// Returns the new query label, or `None` if a newer sequence won.
    pub async fn seed_from_coordinates(
        &mut self,
        at: Coordinates,
    ) -> Result<Option<String>, WeatherError> {
        self.debouncer.cancel();

        let token = self.shared.begin();
        let result = self.shared.provider.current_weather(at).await.map(Arc::new);
        let applied = self.shared.complete(token, &result, true);

        let snapshot = result?;
        Ok(applied.then(|| snapshot.location_label()))
    }

    /// Tear the widget down. Equivalent to dropping it.
    pub fn teardown(self) {
        tracing::debug!("tearing down weather pipeline");
    }

    fn arm(&mut self) {
        let shared = Arc::clone(&self.shared);
        self.debouncer.schedule(move || shared.fire());
    }
}

impl Drop for WeatherPipeline {
    fn drop(&mut self) {
        self.debouncer.cancel();
        self.shared.invalidate();
    }
}
