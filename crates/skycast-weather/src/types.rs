use std::fmt;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::error::WeatherError;

/// Default location: Vancouver, BC.
pub const DEFAULT_LATITUDE: f64 = 49.282;
pub const DEFAULT_LONGITUDE: f64 = -123.1207;
pub const DEFAULT_TIMEZONE: &str = "America/Los_Angeles";

/// Location and timezone a forecast is requested for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
}

impl Default for CoordinateQuery {
    fn default() -> Self {
        Self {
            latitude: DEFAULT_LATITUDE,
            longitude: DEFAULT_LONGITUDE,
            timezone: DEFAULT_TIMEZONE.to_string(),
        }
    }
}

impl CoordinateQuery {
    pub fn new(latitude: f64, longitude: f64, timezone: impl Into<String>) -> Self {
        Self {
            latitude,
            longitude,
            timezone: timezone.into(),
        }
    }

    /// Check coordinate ranges and timezone presence.
    pub fn validate(&self) -> Result<(), WeatherError> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(WeatherError::InvalidQuery(format!(
                "latitude {} is outside [-90, 90]",
                self.latitude
            )));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(WeatherError::InvalidQuery(format!(
                "longitude {} is outside [-180, 180]",
                self.longitude
            )));
        }
        if self.timezone.trim().is_empty() {
            return Err(WeatherError::InvalidQuery("timezone is empty".to_string()));
        }
        Ok(())
    }
}

/// Which forecast series a request asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Current,
    Hourly,
    Daily,
}

impl Metric {
    /// Query parameter (name, value) selecting this series.
    pub fn param(&self) -> (&'static str, &'static str) {
        match self {
            Self::Current => ("current", "temperature_2m"),
            Self::Hourly => ("hourly", "temperature_2m"),
            Self::Daily => ("daily", "temperature_2m_max,temperature_2m_min"),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Current => "temperature",
            Self::Hourly => "hourly",
            Self::Daily => "daily",
        }
    }

    /// Derive the display string for a response body of this metric.
    pub fn display(&self, body: &serde_json::Value) -> Result<String, WeatherError> {
        let response: ForecastResponse = serde_json::from_value(body.clone())
            .map_err(|e| WeatherError::Decode(e.to_string()))?;

        match self {
            Self::Current => {
                let current = response
                    .current
                    .ok_or_else(|| missing("current.temperature_2m"))?;
                Ok(format!("{}°C", format_temperature(current.temperature_2m)))
            }
            Self::Hourly => {
                let hourly = response.hourly.ok_or_else(|| missing("hourly.temperature_2m"))?;
                let (min, max) = hourly
                    .temperature_range()
                    .ok_or_else(|| missing("hourly.temperature_2m"))?;
                Ok(format!(
                    "{}°C – {}°C",
                    format_temperature(min),
                    format_temperature(max)
                ))
            }
            Self::Daily => {
                let daily = response.daily.ok_or_else(|| missing("daily"))?;
                let high = daily
                    .temperature_2m_max
                    .first()
                    .copied()
                    .flatten()
                    .ok_or_else(|| missing("daily.temperature_2m_max"))?;
                let low = daily
                    .temperature_2m_min
                    .first()
                    .copied()
                    .flatten()
                    .ok_or_else(|| missing("daily.temperature_2m_min"))?;
                Ok(format!(
                    "{}°C / {}°C",
                    format_temperature(high),
                    format_temperature(low)
                ))
            }
        }
    }
}

fn missing(field: &str) -> WeatherError {
    WeatherError::Decode(format!("missing field {}", field))
}

/// Format like a plain number: `18.4` stays `18.4`, `18.0` becomes `18`.
pub fn format_temperature(value: f64) -> String {
    if value == 0.0 {
        // Avoid "-0"
        return "0".to_string();
    }
    format!("{}", value)
}

/// Identity of a cached fetch
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub metric: Metric,
    pub latitude: OrderedFloat<f64>,
    pub longitude: OrderedFloat<f64>,
    pub timezone: String,
}

impl CacheKey {
    pub fn new(metric: Metric, query: &CoordinateQuery) -> Self {
        Self {
            metric,
            latitude: OrderedFloat(query.latitude),
            longitude: OrderedFloat(query.longitude),
            timezone: query.timezone.clone(),
        }
    }

    pub fn query(&self) -> CoordinateQuery {
        CoordinateQuery::new(
            self.latitude.into_inner(),
            self.longitude.into_inner(),
            self.timezone.clone(),
        )
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.metric.name(),
            self.latitude,
            self.longitude,
            self.timezone
        )
    }
}

/// Typed view over an Open-Meteo forecast body.
/// Only the sections this crate requests are modelled.
#[derive(Debug, Clone, Deserialize)]
pub struct ForecastResponse {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: Option<String>,
    pub current: Option<CurrentBlock>,
    pub hourly: Option<HourlySeries>,
    pub daily: Option<DailySeries>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurrentBlock {
    pub time: Option<String>,
    pub temperature_2m: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HourlySeries {
    #[serde(default)]
    pub time: Vec<String>,
    pub temperature_2m: Vec<Option<f64>>,
}

impl HourlySeries {
    /// Lowest and highest non-null temperature in the series.
    pub fn temperature_range(&self) -> Option<(f64, f64)> {
        self.temperature_2m
            .iter()
            .flatten()
            .fold(None, |acc, &t| match acc {
                None => Some((t, t)),
                Some((lo, hi)) => Some((lo.min(t), hi.max(t))),
            })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DailySeries {
    #[serde(default)]
    pub time: Vec<String>,
    pub temperature_2m_max: Vec<Option<f64>>,
    pub temperature_2m_min: Vec<Option<f64>>,
}
