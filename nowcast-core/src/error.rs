use thiserror::Error;

/// Failure of a geocode or weather request.
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("No API key configured for OpenWeather")]
    MissingApiKey,

    #[error("Failed to reach OpenWeather ({endpoint}): {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("OpenWeather rejected the API key (HTTP 401)")]
    Unauthorized,

    #[error("OpenWeather {endpoint} request failed with status {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: u16,
        body: String,
    },

    #[error("Failed to parse OpenWeather {endpoint} JSON: {source}")]
    Parse {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("No location found for '{query}'")]
    NotFound { query: String },
}

impl WeatherError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, WeatherError::NotFound { .. })
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, WeatherError::Unauthorized | WeatherError::MissingApiKey)
    }
}
