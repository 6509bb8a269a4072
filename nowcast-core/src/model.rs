use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

const KELVIN_OFFSET: f64 = 273.15;
const ICON_BASE_URL: &str = "https://openweathermap.org/img/wn";

/// A latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4},{:.4}", self.lat, self.lon)
    }
}

/// One entry of a forward geocoding result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoMatch {
    #[serde(default)]
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

impl GeoMatch {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates { lat: self.lat, lon: self.lon }
    }
}

/// Current conditions for one place. Temperatures are in Kelvin.
///
/// A snapshot is never patched: every successful fetch replaces the previous
/// one as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub description: String,
    pub icon: String,
    pub temp: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub feels_like: f64,
    pub humidity: u8,
    pub city_name: String,
    pub country_code: String,
    pub observed_at: DateTime<Utc>,
}

impl WeatherSnapshot {
    /// "City, CC", or just the city when the country is unknown.
    pub fn location_label(&self) -> String {
        if self.country_code.is_empty() {
            self.city_name.clone()
        } else {
            format!("{}, {}", self.city_name, self.country_code)
        }
    }

    pub fn icon_url(&self) -> String {
        icon_url(&self.icon)
    }
}

pub fn icon_url(icon: &str) -> String {
    format!("{ICON_BASE_URL}/{icon}@4x.png")
}

/// Display unit for temperatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            TemperatureUnit::Celsius => "°C",
            TemperatureUnit::Fahrenheit => "°F",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            TemperatureUnit::Celsius => TemperatureUnit::Fahrenheit,
            TemperatureUnit::Fahrenheit => TemperatureUnit::Celsius,
        }
    }

    /// Convert a Kelvin reading into a whole number in this unit.
    pub fn convert(&self, kelvin: f64) -> i64 {
        match self {
            TemperatureUnit::Celsius => kelvin_to_celsius(kelvin),
            TemperatureUnit::Fahrenheit => kelvin_to_fahrenheit(kelvin),
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TemperatureUnit::Celsius => "celsius",
            TemperatureUnit::Fahrenheit => "fahrenheit",
        })
    }
}

impl FromStr for TemperatureUnit {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "c" | "celsius" => Ok(TemperatureUnit::Celsius),
            "f" | "fahrenheit" => Ok(TemperatureUnit::Fahrenheit),
            _ => Err(anyhow::anyhow!(
                "Unknown temperature unit '{value}'. Use 'c' (celsius) or 'f' (fahrenheit)."
            )),
        }
    }
}

pub fn kelvin_to_celsius(kelvin: f64) -> i64 {
    round_half_up(kelvin - KELVIN_OFFSET)
}

/// Goes through the already rounded Celsius value.
pub fn kelvin_to_fahrenheit(kelvin: f64) -> i64 {
    round_half_up(kelvin_to_celsius(kelvin) as f64 * 1.8 + 32.0)
}

// Halves round toward +inf: -0.5 -> 0, 0.5 -> 1.
fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}
