//! Core library for the `nowcast` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The OpenWeather geocoding and current-weather client
//! - A debounced query-to-weather pipeline with stale-response protection
//! - Display models for rendering the result
//!
//! It is used by `nowcast-cli`, but can also be reused by other front-ends.

pub mod config;
pub mod debounce;
pub mod error;
pub mod input;
pub mod model;
pub mod pipeline;
pub mod provider;
pub mod view;

pub use config::Config;
pub use error::WeatherError;
pub use input::QueryInput;
pub use model::{Coordinates, GeoMatch, TemperatureUnit, WeatherSnapshot};
pub use pipeline::{FetchStatus, PipelineOptions, WeatherPipeline, WidgetState};
pub use provider::{OpenWeatherConfig, OpenWeatherProvider, WeatherProvider, resolve_weather};
pub use view::WeatherView;
