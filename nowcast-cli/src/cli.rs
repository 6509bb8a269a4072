use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode, Select, Text};
use nowcast_core::{
    Config, Coordinates, OpenWeatherProvider, TemperatureUnit, WeatherError, WeatherPipeline,
    WeatherProvider, WeatherView,
};

use crate::session;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "nowcast", version, about = "Current weather for a place, right now")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeather API key and display defaults.
    Configure,

    /// Fetch and print the weather for a place once.
    Show {
        /// Place name, e.g. "London, GB".
        query: String,

        /// Temperature unit: c or f.
        #[arg(long, short)]
        unit: Option<TemperatureUnit>,
    },

    /// Interactive session: each line typed on stdin edits the place name.
    Watch {
        /// Initial place name; defaults to the configured one.
        #[arg(long)]
        query: Option<String>,

        /// Start from coordinates instead of a name.
        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,

        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,

        /// Temperature unit: c or f.
        #[arg(long, short)]
        unit: Option<TemperatureUnit>,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { query, unit } => show(query, unit).await,
            Command::Watch { query, lat, lon, unit } => {
                let seed = lat.zip(lon).map(|(lat, lon)| Coordinates { lat, lon });
                watch(query, seed, unit).await
            }
        }
    }
}

fn load_config() -> anyhow::Result<Config> {
    let mut config = Config::load()?;
    config.apply_env_overrides(|name| std::env::var(name).ok());
    Ok(config)
}

fn build_provider(config: &Config) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let provider = OpenWeatherProvider::new(config.openweather()?)
        .context("Failed to set up the OpenWeather client")?;
    Ok(Arc::new(provider))
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let api_key = Password::new("OpenWeather API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    if api_key.trim().is_empty() {
        bail!("API key must not be empty");
    }
    config.set_api_key(api_key.trim().to_string());

    config.default_query = Text::new("Default place:")
        .with_default(&config.default_query)
        .prompt()
        .context("Failed to read default place")?;

    let units = vec![TemperatureUnit::Celsius, TemperatureUnit::Fahrenheit];
    let start = units.iter().position(|u| *u == config.unit).unwrap_or(0);
    config.unit = Select::new("Temperature unit:", units)
        .with_starting_cursor(start)
        .prompt()
        .context("Failed to read temperature unit")?;

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn show(query: String, unit: Option<TemperatureUnit>) -> anyhow::Result<()> {
    let config = load_config()?;
    let provider = build_provider(&config)?;

    let mut options = config.pipeline_options();
    options.default_query = query.clone();
    if let Some(unit) = unit {
        options.unit = unit;
    }

    let mut pipeline = WeatherPipeline::new(provider, options);
    match pipeline.refresh_now().await {
        Ok(_) => {
            print!("{}", WeatherView::from_state(&pipeline.state()));
            Ok(())
        }
        Err(err @ WeatherError::NotFound { .. }) => bail!("{err}"),
        Err(err) if err.is_unauthorized() => {
            bail!("{err}.\nHint: run `nowcast configure` with a valid key.")
        }
        Err(err) => Err(err).with_context(|| format!("Could not fetch weather for '{query}'")),
    }
}

async fn watch(
    query: Option<String>,
    seed: Option<Coordinates>,
    unit: Option<TemperatureUnit>,
) -> anyhow::Result<()> {
    let config = load_config()?;
    let provider = build_provider(&config)?;

    let mut options = config.pipeline_options();
    if let Some(query) = query {
        options.default_query = query;
    }
    if let Some(unit) = unit {
        options.unit = unit;
    }

    session::run(WeatherPipeline::new(provider, options), seed).await
}
