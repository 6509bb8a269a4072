use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::instrument;

use crate::{
    WeatherError,
    model::{Coordinates, GeoMatch, WeatherSnapshot},
};

use super::WeatherProvider;

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

/// Credential and endpoint for OpenWeather, injected at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenWeatherConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Option<Duration>,
}

impl OpenWeatherConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(config: OpenWeatherConfig) -> Result<Self, WeatherError> {
        if config.api_key.trim().is_empty() {
            return Err(WeatherError::MissingApiKey);
        }

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|source| WeatherError::Transport { endpoint: "client", source })?;

        Ok(Self {
            api_key: config.api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, WeatherError> {
        let url = format!("{}{}", self.base_url, path);

        let res = self
            .http
            .get(&url)
            .query(params)
            .query(&[("appid", self.api_key.as_str())])
            .send()
            .await
            .map_err(|source| WeatherError::Transport { endpoint, source })?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|source| WeatherError::Transport { endpoint, source })?;

        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(endpoint, "OpenWeather rejected the API key");
            return Err(WeatherError::Unauthorized);
        }

        if !status.is_success() {
            tracing::warn!(endpoint, %status, "OpenWeather request failed");
            return Err(WeatherError::Status {
                endpoint,
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        serde_json::from_str(&body).map_err(|source| WeatherError::Parse { endpoint, source })
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    temp_min: f64,
    temp_max: f64,
    feels_like: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
    icon: String,
}

#[derive(Debug, Default, Deserialize)]
struct OwSys {
    #[serde(default)]
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    #[serde(default)]
    name: String,
    #[serde(default)]
    dt: Option<i64>,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
    #[serde(default)]
    sys: OwSys,
}

impl From<OwCurrentResponse> for WeatherSnapshot {
    fn from(parsed: OwCurrentResponse) -> Self {
        let (description, icon) = parsed
            .weather
            .into_iter()
            .next()
            .map(|w| (w.description, w.icon))
            .unwrap_or_else(|| ("Unknown".to_string(), String::new()));

        WeatherSnapshot {
            description,
            icon,
            temp: parsed.main.temp,
            temp_min: parsed.main.temp_min,
            temp_max: parsed.main.temp_max,
            feels_like: parsed.main.feels_like,
            humidity: parsed.main.humidity,
            city_name: parsed.name,
            country_code: parsed.sys.country.unwrap_or_default(),
            observed_at: parsed.dt.and_then(unix_to_utc).unwrap_or_else(Utc::now),
        }
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    #[instrument(skip(self), level = "debug")]
    async fn geocode(&self, query: &str) -> Result<Vec<GeoMatch>, WeatherError> {
        self.get_json(
            "geocoding",
            "/geo/1.0/direct",
            &[("q", query.to_string()), ("limit", "1".to_string())],
        )
        .await
    }

    #[instrument(skip(self), level = "debug")]
    async fn current_weather(&self, at: Coordinates) -> Result<WeatherSnapshot, WeatherError> {
        let parsed: OwCurrentResponse = self
            .get_json(
                "current weather",
                "/data/2.5/weather",
                &[("lat", at.lat.to_string()), ("lon", at.lon.to_string())],
            )
            .await?;

        Ok(parsed.into())
    }
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(ts, 0)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        TemperatureUnit, WeatherView,
        pipeline::{FetchStatus, WidgetState},
        provider::resolve_weather,
    };
    use std::sync::Arc;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> OpenWeatherProvider {
        OpenWeatherProvider::new(OpenWeatherConfig {
            api_key: "test_key".into(),
            base_url: server.uri(),
            timeout: Some(Duration::from_secs(5)),
        })
        .unwrap()
    }

    fn london_weather() -> serde_json::Value {
        json!({
            "weather": [{ "description": "broken clouds", "icon": "04d" }],
            "main": {
                "temp": 283.15,
                "temp_min": 281,
                "temp_max": 285,
                "feels_like": 282,
                "humidity": 70
            },
            "name": "London",
            "sys": { "country": "GB" }
        })
    }

    #[tokio::test]
    async fn geocode_sends_query_limit_and_key() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/geo/1.0/direct"))
            .and(query_param("q", "London, GB"))
            .and(query_param("limit", "1"))
            .and(query_param("appid", "test_key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "name": "London", "lat": 51.5, "lon": -0.12, "country": "GB", "state": "England" }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let matches = provider_for(&server).geocode("London, GB").await.unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].coordinates(), Coordinates { lat: 51.5, lon: -0.12 });
        assert_eq!(matches[0].country.as_deref(), Some("GB"));
    }

    #[tokio::test]
    async fn current_weather_keeps_kelvin_and_maps_fields() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("lat", "51.5"))
            .and(query_param("lon", "-0.12"))
            .and(query_param("appid", "test_key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(london_weather()))
            .mount(&server)
            .await;

        let snapshot = provider_for(&server)
            .current_weather(Coordinates { lat: 51.5, lon: -0.12 })
            .await
            .unwrap();

        assert_eq!(snapshot.description, "broken clouds");
        assert_eq!(snapshot.icon, "04d");
        assert_eq!(snapshot.temp, 283.15);
        assert_eq!(snapshot.humidity, 70);
        assert_eq!(snapshot.location_label(), "London, GB");
    }

    #[tokio::test]
    async fn resolve_chains_geocode_into_weather() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/geo/1.0/direct"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{ "name": "London", "lat": 51.5, "lon": -0.12 }])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(london_weather()))
            .expect(1)
            .mount(&server)
            .await;

        let snapshot = resolve_weather(&provider_for(&server), "London, GB").await.unwrap();
        assert_eq!(snapshot.city_name, "London");
    }

    #[tokio::test]
    async fn coordinate_only_geocode_renders_london_view() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/geo/1.0/direct"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "lat": 51.5, "lon": -0.12 }])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("lat", "51.5"))
            .and(query_param("lon", "-0.12"))
            .respond_with(ResponseTemplate::new(200).set_body_json(london_weather()))
            .expect(1)
            .mount(&server)
            .await;

        let snapshot = resolve_weather(&provider_for(&server), "London, GB").await.unwrap();
        let view = WeatherView::from_state(&WidgetState {
            query: "London, GB".into(),
            unit: TemperatureUnit::Celsius,
            snapshot: Some(Arc::new(snapshot)),
            status: FetchStatus::Ready,
        });

        assert_eq!(view.headline, "Right now in London, GB, broken clouds.");
        assert_eq!(view.temperature, "10°C");
        assert_eq!(view.temp_min, "8°C");
        assert_eq!(view.temp_max, "12°C");
        assert_eq!(view.humidity, "70%");
    }

    #[test]
    fn geocode_match_without_name_deserializes() {
        let matches: Vec<GeoMatch> =
            serde_json::from_value(json!([{ "lat": 51.5, "lon": -0.12 }])).unwrap();

        assert_eq!(matches[0].coordinates(), Coordinates { lat: 51.5, lon: -0.12 });
        assert!(matches[0].name.is_empty());
        assert!(matches[0].country.is_none());
    }

    #[tokio::test]
    async fn empty_geocode_array_never_requests_weather() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/geo/1.0/direct"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(london_weather()))
            .expect(0)
            .mount(&server)
            .await;

        let err = resolve_weather(&provider_for(&server), "Xyzzy").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn unauthorized_is_reported_distinctly() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "cod": 401,
                "message": "Invalid API key."
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server).geocode("London").await.unwrap_err();
        assert!(matches!(err, WeatherError::Unauthorized));
    }

    #[tokio::test]
    async fn server_error_carries_truncated_body() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("x".repeat(500)))
            .mount(&server)
            .await;

        let err = provider_for(&server).geocode("London").await.unwrap_err();
        match err {
            WeatherError::Status { status, body, .. } => {
                assert_eq!(status, 502);
                assert_eq!(body.len(), 203);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn malformed_json_is_a_parse_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .current_weather(Coordinates { lat: 0.0, lon: 0.0 })
            .await
            .unwrap_err();
        assert!(matches!(err, WeatherError::Parse { .. }));
    }

    #[test]
    fn empty_api_key_is_rejected_up_front() {
        let err = OpenWeatherProvider::new(OpenWeatherConfig::new("  ")).unwrap_err();
        assert!(matches!(err, WeatherError::MissingApiKey));
    }

    #[test]
    fn missing_weather_array_falls_back_to_unknown() {
        let parsed: OwCurrentResponse = serde_json::from_value(json!({
            "main": { "temp": 273.15, "temp_min": 273.15, "temp_max": 273.15, "feels_like": 273.15, "humidity": 10 },
            "name": "Nowhere",
            "dt": 1_700_000_000
        }))
        .unwrap();

        let snapshot = WeatherSnapshot::from(parsed);
        assert_eq!(snapshot.description, "Unknown");
        assert_eq!(snapshot.country_code, "");
        assert_eq!(snapshot.observed_at.timestamp(), 1_700_000_000);
    }
}
