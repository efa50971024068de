//! Core library for the `skydeck` weather dashboard.
//!
//! This crate defines:
//! - Configuration handling
//! - The weather provider abstraction and the OpenWeather client
//! - Forecast normalization (daily relabeling, hourly resampling)
//! - Preference & snapshot persistence
//! - The dashboard controller that owns application state
//!
//! It is used by `skydeck-cli`, but has no terminal dependencies of its own.

pub mod config;
pub mod dashboard;
pub mod error;
pub mod location;
pub mod meteo;
pub mod model;
pub mod normalize;
pub mod notify;
pub mod provider;
pub mod store;

pub use config::Config;
pub use dashboard::{AppState, Connectivity, ConnectivityFlag, Dashboard, FetchSource};
pub use error::{LocationError, WeatherError};
pub use location::{FixedPosition, Geolocator, IpGeolocator};
pub use model::{
    Coordinates, CurrentConditions, DailyForecast, HourlySample, LocationQuery, Preferences,
    SampleTime, SavedLocation, Theme, Units, ViewMode, WeatherSnapshot,
};
pub use normalize::{HourlyCutoff, HourlyPoint};
pub use notify::{FallbackNotifier, Notice, Notifier, NotifyError};
pub use provider::{WeatherProvider, provider_from_config};
pub use store::{FileStore, KeyValueStore, MemoryStore, PreferenceStore};
