//! Display strings derived from a [`WidgetState`].

use std::fmt;

use crate::pipeline::{FetchStatus, WidgetState};

pub const PLACEHOLDER: &str = "...";

/// Rendered widget. Every temperature comes from the same snapshot and the
/// same unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherView {
    pub headline: String,
    pub temperature: String,
    pub temp_min: String,
    pub temp_max: String,
    pub feels_like: String,
    pub humidity: String,
    pub icon_url: Option<String>,
    pub status: String,
}

impl WeatherView {
    pub fn from_state(state: &WidgetState) -> Self {
        let snapshot = state.snapshot.as_deref();
        let unit = state.unit;
        let temp = |pick: fn(&crate::WeatherSnapshot) -> f64| {
            snapshot
                .map(|s| format!("{}{}", unit.convert(pick(s)), unit.symbol()))
                .unwrap_or_else(|| PLACEHOLDER.to_string())
        };

        let description = snapshot.map(|s| s.description.as_str()).unwrap_or(PLACEHOLDER);

        Self {
            headline: format!("Right now in {}, {}.", state.query, description),
            temperature: temp(|s| s.temp),
            temp_min: temp(|s| s.temp_min),
            temp_max: temp(|s| s.temp_max),
            feels_like: temp(|s| s.feels_like),
            humidity: snapshot
                .map(|s| format!("{}%", s.humidity))
                .unwrap_or_else(|| format!("{PLACEHOLDER}%")),
            icon_url: snapshot.filter(|s| !s.icon.is_empty()).map(|s| s.icon_url()),
            status: status_line(state),
        }
    }
}

fn status_line(state: &WidgetState) -> String {
    match &state.status {
        FetchStatus::Idle => String::new(),
        FetchStatus::Pending => "waiting for typing to settle".to_string(),
        FetchStatus::Loading => "loading".to_string(),
        FetchStatus::Ready => state
            .snapshot
            .as_ref()
            .map(|s| format!("observed {}", s.observed_at.format("%Y-%m-%d %H:%M UTC")))
            .unwrap_or_default(),
        FetchStatus::NotFound { query } => format!("no location found for '{query}'"),
        FetchStatus::Unauthorized => {
            "OpenWeather rejected the API key; run `nowcast configure`".to_string()
        }
        FetchStatus::Failed { message } => format!("fetch failed: {message}"),
    }
}

impl fmt::Display for WeatherView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.headline)?;
        writeln!(f, "  {}  (min {} / max {})", self.temperature, self.temp_min, self.temp_max)?;
        writeln!(f, "  feels like {}  humidity {}", self.feels_like, self.humidity)?;
        if let Some(url) = &self.icon_url {
            writeln!(f, "  icon {url}")?;
        }
        if !self.status.is_empty() {
            writeln!(f, "  [{}]", self.status)?;
        }
        Ok(())
    }
}
