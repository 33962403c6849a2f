//! Weather data layer for Skycast
//!
//! Fetches forecasts from the Open-Meteo API and keeps a cached, observable
//! display value per location.

pub mod cache;
pub mod client;
pub mod error;
pub mod forecast;
pub mod observer;
pub mod retry;
pub mod types;

pub use cache::{CachePolicy, EntrySnapshot, FetchStatus, QueryCache};
pub use client::{HttpClient, OPEN_METEO_BASE_URL};
pub use error::WeatherError;
pub use forecast::ForecastClient;
pub use observer::{QueryObserver, QueryView, Subscription};
pub use retry::RetryConfig;
pub use types::*;
