use std::sync::Arc;

use skycast_weather::{
    CoordinateQuery, ForecastClient, HttpClient, Metric, QueryCache, QueryObserver,
};

use crate::{AppError, Config, ConfigError};

/// Main application state and lifecycle manager
pub struct App {
    config: Arc<Config>,
    cache: Arc<QueryCache>,
}

impl App {
    /// Create a new application instance from the on-disk configuration
    pub fn new() -> Result<Self, AppError> {
        let config = Config::load()?;
        Self::with_config(config)
    }

    /// Create an application from an explicit configuration
    pub fn with_config(config: Config) -> Result<Self, AppError> {
        let validation = config.validate();
        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }
        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        let weather = &config.weather;
        let http = HttpClient::with_options(&weather.base_url, weather.request_timeout())?;
        let cache = Arc::new(QueryCache::new(
            ForecastClient::new(http),
            weather.cache.policy(),
        ));

        tracing::info!("Application initialized with API at {}", weather.base_url);
        Ok(Self {
            config: Arc::new(config),
            cache,
        })
    }

    /// Observer for the current temperature at the configured location
    pub fn temperature_query(&self) -> QueryObserver {
        self.observe(Metric::Current, self.config.weather.location.clone())
    }

    pub fn observe(&self, metric: Metric, query: CoordinateQuery) -> QueryObserver {
        QueryObserver::new(Arc::clone(&self.cache), metric, query)
    }

    /// Shutdown the application, dropping unobserved cache entries
    pub fn shutdown(&self) {
        let evicted = self.cache.collect_garbage();
        tracing::info!("Shutting down application ({} cache entries released)", evicted);
    }

    /// Get reference to application config
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_default_config() {
        let app = App::with_config(Config::default()).unwrap();
        let observer = app.temperature_query();

        assert_eq!(observer.metric(), Metric::Current);
        assert_eq!(observer.query(), CoordinateQuery::default());
        assert!(app.cache().is_empty());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = Config::default();
        config.weather.base_url = "not-a-url".to_string();

        let result = App::with_config(config);
        assert!(matches!(
            result,
            Err(AppError::Config(ConfigError::Invalid(_)))
        ));
    }
}
