//! Weather-specific error types.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WeatherError {
    /// Network failure or non-2xx response.
    #[error("Transport error{}: {message}", status_suffix(.status))]
    Transport { status: Option<u16>, message: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Request failed after {attempts} attempts: {last}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        last: Box<WeatherError>,
    },

    #[error("HTTP client error: {0}")]
    Client(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({})", s)).unwrap_or_default()
}

impl WeatherError {
    /// User-friendly error message for UI display.
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport { status: None, .. } => {
                "Unable to reach the weather service. Check your connection.".to_string()
            }
            Self::Transport {
                status: Some(s), ..
            } if *s >= 500 => {
                "The weather service is having trouble. Please try again later.".to_string()
            }
            Self::Transport { message, .. } => format!("Weather request rejected: {}", message),
            Self::Decode(_) => "Received unexpected weather data.".to_string(),
            Self::InvalidQuery(msg) => format!("Invalid location: {}", msg),
            Self::RetryExhausted { last, .. } => last.user_message(),
            Self::Client(_) => "Weather service is unavailable.".to_string(),
        }
    }

    /// Whether a retry may succeed where this attempt failed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// HTTP status of the underlying failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => *status,
            Self::RetryExhausted { last, .. } => last.status(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for WeatherError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return Self::Decode(e.to_string());
        }
        Self::Transport {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_display_includes_status() {
        let err = WeatherError::Transport {
            status: Some(503),
            message: "Service Unavailable".into(),
        };
        assert_eq!(err.to_string(), "Transport error (503): Service Unavailable");

        let err = WeatherError::Transport {
            status: None,
            message: "connection refused".into(),
        };
        assert_eq!(err.to_string(), "Transport error: connection refused");
    }

    #[test]
    fn test_error_user_messages() {
        let err = WeatherError::Transport {
            status: None,
            message: "dns".into(),
        };
        assert!(err.user_message().contains("connection"));

        let err = WeatherError::Transport {
            status: Some(502),
            message: "bad gateway".into(),
        };
        assert!(err.user_message().contains("try again later"));

        let err = WeatherError::InvalidQuery("latitude out of range".into());
        assert!(err.user_message().contains("latitude"));
    }

    #[test]
    fn test_retry_exhausted_delegates_to_last() {
        let last = WeatherError::Transport {
            status: Some(500),
            message: "boom".into(),
        };
        let err = WeatherError::RetryExhausted {
            attempts: 2,
            last: Box::new(last.clone()),
        };
        assert_eq!(err.user_message(), last.user_message());
        assert_eq!(err.status(), Some(500));
        assert!(err.to_string().contains("2 attempts"));
    }

    #[test]
    fn test_is_retryable() {
        assert!(WeatherError::Transport {
            status: Some(500),
            message: String::new()
        }
        .is_retryable());
        assert!(!WeatherError::Decode("x".into()).is_retryable());
        assert!(!WeatherError::InvalidQuery("x".into()).is_retryable());
    }
}
