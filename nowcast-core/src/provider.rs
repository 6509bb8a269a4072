use crate::{
    WeatherError,
    model::{Coordinates, GeoMatch, WeatherSnapshot},
};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openweather;

pub use openweather::{OpenWeatherConfig, OpenWeatherProvider};

/// Source of geocoding and current-conditions data.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    /// Forward geocode a free-text place name. An empty list means no match.
    async fn geocode(&self, query: &str) -> Result<Vec<GeoMatch>, WeatherError>;

    async fn current_weather(&self, at: Coordinates) -> Result<WeatherSnapshot, WeatherError>;
}

/// Geocode `query`, then fetch current weather for the first match.
///
/// The weather request is only sent once geocoding has succeeded. A blank
/// query or an empty geocoding result yields [`WeatherError::NotFound`].
pub async fn resolve_weather(
    provider: &dyn WeatherProvider,
    query: &str,
) -> Result<WeatherSnapshot, WeatherError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(WeatherError::NotFound { query: String::new() });
    }

    let matches = provider.geocode(query).await?;
    let first = matches
        .first()
        .ok_or_else(|| WeatherError::NotFound { query: query.to_string() })?;

    tracing::debug!(query, name = %first.name, at = %first.coordinates(), "geocoded");

    provider.current_weather(first.coordinates()).await
}
