//! HTTP adapter for the Open-Meteo API.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use crate::error::WeatherError;

pub const OPEN_METEO_BASE_URL: &str = "https://api.open-meteo.com/v1";
const USER_AGENT: &str = concat!("skycast/", env!("CARGO_PKG_VERSION"));

/// Query parameters as (name, value) pairs.
pub type QueryParams = Vec<(&'static str, String)>;

/// Error body returned by Open-Meteo on 4xx.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
    base_url: String,
}

impl HttpClient {
    /// Client against the public Open-Meteo endpoint with no request timeout.
    pub fn new() -> Result<Self, WeatherError> {
        Self::with_options(OPEN_METEO_BASE_URL, None)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, WeatherError> {
        Self::with_options(base_url, None)
    }

    pub fn with_options(base_url: &str, timeout: Option<Duration>) -> Result<Self, WeatherError> {
        let mut builder = Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| WeatherError::Client(e.to_string()))?;

        Ok(Self {
            client: Arc::new(client),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `base_url + path` with `params` and decode the JSON body.
    ///
    /// Non-2xx responses and network failures become [`WeatherError::Transport`].
    /// No retries happen here.
    #[instrument(skip(self), level = "debug")]
    pub async fn get(
        &self,
        path: &str,
        params: &[(&'static str, String)],
    ) -> Result<serde_json::Value, WeatherError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self.client.get(&url).query(params).send().await?;
        let status = response.status();

        if status.is_success() {
            let text = response.text().await?;
            return serde_json::from_str(&text)
                .map_err(|e| WeatherError::Decode(format!("JSON parse error: {}", e)));
        }

        let text = response.text().await.unwrap_or_default();
        let reason = serde_json::from_str::<ApiErrorBody>(&text)
            .ok()
            .and_then(|b| b.reason);
        let message = match reason {
            Some(reason) => reason,
            None if text.is_empty() => status.to_string(),
            None => text,
        };

        tracing::debug!("GET {} returned status {}: {}", path, status, message);
        Err(WeatherError::Transport {
            status: Some(status.as_u16()),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_get_serializes_params() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/forecast"))
            .and(query_param("latitude", "49.282"))
            .and(query_param("timezone", "America/Los_Angeles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = HttpClient::with_base_url(&mock_server.uri()).unwrap();
        let body = client
            .get(
                "/forecast",
                &[
                    ("latitude", "49.282".to_string()),
                    ("timezone", "America/Los_Angeles".to_string()),
                ],
            )
            .await
            .unwrap();

        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn test_get_non_2xx_uses_api_reason() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": true,
                "reason": "Latitude must be in range of -90 to 90°."
            })))
            .mount(&mock_server)
            .await;

        let client = HttpClient::with_base_url(&mock_server.uri()).unwrap();
        let err = client.get("/forecast", &[]).await.unwrap_err();

        assert_eq!(
            err,
            WeatherError::Transport {
                status: Some(400),
                message: "Latitude must be in range of -90 to 90°.".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_get_server_error_plain_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&mock_server)
            .await;

        let client = HttpClient::with_base_url(&mock_server.uri()).unwrap();
        let err = client.get("/forecast", &[]).await.unwrap_err();

        assert_eq!(err.status(), Some(503));
        assert!(err.to_string().contains("upstream down"));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_get_invalid_json_is_decode_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&mock_server)
            .await;

        let client = HttpClient::with_base_url(&mock_server.uri()).unwrap();
        let err = client.get("/forecast", &[]).await.unwrap_err();

        assert!(matches!(err, WeatherError::Decode(_)));
    }

    #[tokio::test]
    async fn test_get_connection_refused_is_transport_error() {
        // Bind then release a port so nothing is listening on it.
        let uri = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            format!("http://{}", listener.local_addr().unwrap())
        };
        let client = HttpClient::with_base_url(&uri).unwrap();
        let err = client.get("/forecast", &[]).await.unwrap_err();

        assert!(matches!(err, WeatherError::Transport { status: None, .. }));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = HttpClient::with_base_url("http://localhost:8080/v1/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080/v1");
    }
}
