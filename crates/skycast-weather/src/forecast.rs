//! Forecast request builders.
//!
//! Each function maps a location and timezone onto the `/forecast` endpoint
//! and returns the body unchanged.

use tracing::instrument;

use crate::client::{HttpClient, QueryParams};
use crate::error::WeatherError;
use crate::types::{CoordinateQuery, Metric};

const FORECAST_PATH: &str = "/forecast";

#[derive(Debug, Clone)]
pub struct ForecastClient {
    http: HttpClient,
}

impl ForecastClient {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Current temperature; the body carries `current.temperature_2m` in °C.
    #[instrument(skip(self), level = "info")]
    pub async fn current_temperature(
        &self,
        latitude: f64,
        longitude: f64,
        timezone: &str,
    ) -> Result<serde_json::Value, WeatherError> {
        self.request(Metric::Current, latitude, longitude, timezone)
            .await
    }

    /// Hourly temperature series.
    #[instrument(skip(self), level = "info")]
    pub async fn hourly_forecast(
        &self,
        latitude: f64,
        longitude: f64,
        timezone: &str,
    ) -> Result<serde_json::Value, WeatherError> {
        self.request(Metric::Hourly, latitude, longitude, timezone)
            .await
    }

    /// Daily max/min temperature series.
    #[instrument(skip(self), level = "info")]
    pub async fn daily_forecast(
        &self,
        latitude: f64,
        longitude: f64,
        timezone: &str,
    ) -> Result<serde_json::Value, WeatherError> {
        self.request(Metric::Daily, latitude, longitude, timezone)
            .await
    }

    pub async fn fetch(
        &self,
        metric: Metric,
        query: &CoordinateQuery,
    ) -> Result<serde_json::Value, WeatherError> {
        match metric {
            Metric::Current => {
                self.current_temperature(query.latitude, query.longitude, &query.timezone)
                    .await
            }
            Metric::Hourly => {
                self.hourly_forecast(query.latitude, query.longitude, &query.timezone)
                    .await
            }
            Metric::Daily => {
                self.daily_forecast(query.latitude, query.longitude, &query.timezone)
                    .await
            }
        }
    }

    async fn request(
        &self,
        metric: Metric,
        latitude: f64,
        longitude: f64,
        timezone: &str,
    ) -> Result<serde_json::Value, WeatherError> {
        let query = CoordinateQuery::new(latitude, longitude, timezone);
        query.validate()?;

        self.http
            .get(FORECAST_PATH, &forecast_params(metric, &query))
            .await
    }
}

fn forecast_params(metric: Metric, query: &CoordinateQuery) -> QueryParams {
    let (name, value) = metric.param();
    vec![
        ("latitude", query.latitude.to_string()),
        ("longitude", query.longitude.to_string()),
        ("timezone", query.timezone.clone()),
        (name, value.to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ForecastClient {
        ForecastClient::new(HttpClient::with_base_url(&server.uri()).unwrap())
    }

    #[test]
    fn test_forecast_params() {
        let params = forecast_params(Metric::Daily, &CoordinateQuery::default());
        assert_eq!(
            params,
            vec![
                ("latitude", "49.282".to_string()),
                ("longitude", "-123.1207".to_string()),
                ("timezone", "America/Los_Angeles".to_string()),
                ("daily", "temperature_2m_max,temperature_2m_min".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_current_temperature() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/forecast"))
            .and(query_param("latitude", "49.282"))
            .and(query_param("longitude", "-123.1207"))
            .and(query_param("timezone", "America/Los_Angeles"))
            .and(query_param("current", "temperature_2m"))
            .and(query_param_is_missing("hourly"))
            .and(query_param_is_missing("daily"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "latitude": 49.28,
                "longitude": -123.12,
                "current": {"time": "2026-10-19T10:00", "temperature_2m": 18.4}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let body = client_for(&mock_server)
            .current_temperature(49.282, -123.1207, "America/Los_Angeles")
            .await
            .unwrap();

        assert_eq!(body["current"]["temperature_2m"].as_f64(), Some(18.4));
    }

    #[tokio::test]
    async fn test_hourly_forecast() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/forecast"))
            .and(query_param("hourly", "temperature_2m"))
            .and(query_param("timezone", "Europe/Berlin"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "hourly": {
                    "time": ["2026-10-19T00:00", "2026-10-19T01:00"],
                    "temperature_2m": [7.1, 6.8]
                }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let body = client_for(&mock_server)
            .hourly_forecast(52.52, 13.41, "Europe/Berlin")
            .await
            .unwrap();

        assert_eq!(body["hourly"]["temperature_2m"][1].as_f64(), Some(6.8));
    }

    #[tokio::test]
    async fn test_daily_forecast() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/forecast"))
            .and(query_param("daily", "temperature_2m_max,temperature_2m_min"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "daily": {
                    "time": ["2026-10-19"],
                    "temperature_2m_max": [15.2],
                    "temperature_2m_min": [8.1]
                }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let body = client_for(&mock_server)
            .fetch(Metric::Daily, &CoordinateQuery::default())
            .await
            .unwrap();

        assert_eq!(body["daily"]["temperature_2m_min"][0].as_f64(), Some(8.1));
    }

    #[tokio::test]
    async fn test_invalid_query_makes_no_request() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let err = client_for(&mock_server)
            .current_temperature(120.0, 0.0, "UTC")
            .await
            .unwrap_err();

        assert!(matches!(err, WeatherError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let err = client_for(&mock_server)
            .current_temperature(49.282, -123.1207, "America/Los_Angeles")
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(500));
    }
}
