//! The page-level controller.
//!
//! [`Dashboard`] is the only writer of [`AppState`]. Every user intent is a
//! method taking `&mut self`; readers get a shared reference to the state.

use chrono::{DateTime, FixedOffset, Utc, Weekday};
use std::{
    fmt::Debug,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use crate::{
    error::WeatherError,
    location::{Geolocator, resolve_current_position},
    meteo,
    model::{
        DailyForecast, LocationQuery, Preferences, SavedLocation, Theme, Units, ViewMode,
        WeatherSnapshot,
    },
    normalize::{self, HourlyCutoff, HourlyPoint},
    notify::{FallbackNotifier, Notice},
    provider::WeatherProvider,
    store::{KeyValueStore, PreferenceStore},
};

/// Platform connectivity flag.
pub trait Connectivity: Send + Sync + Debug {
    fn is_online(&self) -> bool;
}

/// Shared, settable online/offline flag.
#[derive(Debug, Clone)]
pub struct ConnectivityFlag {
    online: Arc<AtomicBool>,
}

impl ConnectivityFlag {
    pub fn new(online: bool) -> Self {
        Self { online: Arc::new(AtomicBool::new(online)) }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Relaxed);
    }
}

impl Connectivity for ConnectivityFlag {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }
}

/// Where the displayed snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    Network,
    Cache,
}

#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub current: Option<WeatherSnapshot>,
    /// Cache key of `current`.
    pub current_key: Option<String>,
    pub source: Option<FetchSource>,
    pub preferences: Preferences,
    pub saved_locations: Vec<SavedLocation>,
    pub loading: bool,
    /// Message from the last failed action, cleared by the next fetch.
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct Dashboard<S> {
    state: AppState,
    store: PreferenceStore<S>,
    provider: Box<dyn WeatherProvider>,
    notifier: FallbackNotifier,
    connectivity: Box<dyn Connectivity>,
    hourly_cutoff: HourlyCutoff,
}

impl<S: KeyValueStore> Dashboard<S> {
    /// Restore preferences, saved locations and the last viewed snapshot.
    /// Corrupt stored values are skipped.
    pub fn load(
        store: S,
        provider: Box<dyn WeatherProvider>,
        notifier: FallbackNotifier,
        connectivity: Box<dyn Connectivity>,
        hourly_cutoff: HourlyCutoff,
    ) -> Self {
        let store = PreferenceStore::new(store);
        let preferences = store.load_preferences();
        let saved_locations = store.load_locations();

        let mut state = AppState { preferences, saved_locations, ..AppState::default() };

        let restored = store
            .last_location()
            .and_then(|key| store.cached_snapshot(&key).map(|snapshot| (key, snapshot)));
        if let Some((key, mut snapshot)) = restored {
            snapshot.convert_units(preferences.units);
            state.current = Some(snapshot);
            state.current_key = Some(key);
            state.source = Some(FetchSource::Cache);
        }

        tracing::debug!(
            saved = state.saved_locations.len(),
            restored = state.current.is_some(),
            "Dashboard loaded"
        );

        Self { state, store, provider, notifier, connectivity, hourly_cutoff }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn notifier(&self) -> &FallbackNotifier {
        &self.notifier
    }

    pub fn store(&self) -> &PreferenceStore<S> {
        &self.store
    }

    /// Search by free text. Blank input is ignored and returns `Ok(None)`.
    pub async fn search(&mut self, text: &str) -> Result<Option<FetchSource>, WeatherError> {
        let query = match LocationQuery::from_text(text) {
            Ok(query) => query,
            Err(WeatherError::InputRejected) => return Ok(None),
            Err(err) => return Err(err),
        };
        self.fetch(&query).await.map(Some)
    }

    pub async fn use_current_location(
        &mut self,
        geolocator: &dyn Geolocator,
    ) -> Result<FetchSource, WeatherError> {
        let query = match resolve_current_position(geolocator).await {
            Ok(query) => query,
            Err(err) => {
                self.state.error = Some(err.user_message());
                return Err(err);
            }
        };
        self.fetch(&query).await
    }

    /// Fetch weather for `query`, from the network when online and from the
    /// cache otherwise. On failure the displayed snapshot is left alone.
    pub async fn fetch(&mut self, query: &LocationQuery) -> Result<FetchSource, WeatherError> {
        self.state.loading = true;
        self.state.error = None;

        let result = self.fetch_inner(query).await;

        self.state.loading = false;
        if let Err(err) = &result {
            tracing::warn!(%query, error = %err, "Fetch failed");
            if !err.is_silent() {
                self.state.error = Some(err.user_message());
            }
        }
        result
    }

    async fn fetch_inner(&mut self, query: &LocationQuery) -> Result<FetchSource, WeatherError> {
        let key = query.cache_key();
        let units = self.state.preferences.units;

        if !self.connectivity.is_online() {
            let Some(mut snapshot) = self.store.cached_snapshot(&key) else {
                return Err(WeatherError::OfflineNoCache(key));
            };
            snapshot.convert_units(units);
            self.notifier.notify(&Notice::new(format!("Showing cached data for {key}")));
            self.show(snapshot, key, FetchSource::Cache);
            return Ok(FetchSource::Cache);
        }

        let snapshot = self.provider.fetch(query, units).await?;
        tracing::info!(location = %snapshot.location, "Fetched weather");

        self.persist_snapshot(&key, &snapshot);

        if !snapshot.current.alerts.is_empty() {
            self.notifier.notify(
                &Notice::new(format!("Weather alert for {}", snapshot.location))
                    .with_body(snapshot.current.alerts.join("\n")),
            );
        }

        self.refresh_saved(&key, &snapshot);
        self.show(snapshot, key, FetchSource::Network);
        Ok(FetchSource::Network)
    }

    fn show(&mut self, snapshot: WeatherSnapshot, key: String, source: FetchSource) {
        self.state.current = Some(snapshot);
        self.state.current_key = Some(key);
        self.state.source = Some(source);
    }

    /// Cache under the query key and, when it differs, the resolved name so
    /// saved locations can be found offline. Failures only cost the cache.
    fn persist_snapshot(&mut self, key: &str, snapshot: &WeatherSnapshot) {
        let mut keys = vec![key];
        if snapshot.location != key {
            keys.push(&snapshot.location);
        }

        for k in keys {
            if let Err(err) = self.store.cache_snapshot(k, snapshot) {
                tracing::warn!(key = k, error = %err, "Failed to cache snapshot");
            }
        }
        if let Err(err) = self.store.set_last_location(key) {
            tracing::warn!(key, error = %err, "Failed to store last location");
        }
    }

    fn refresh_saved(&mut self, key: &str, snapshot: &WeatherSnapshot) {
        let mut changed = false;
        for saved in &mut self.state.saved_locations {
            if saved.name == key || saved.name == snapshot.location {
                saved.last_temperature = Some(snapshot.current.temperature);
                saved.last_condition = Some(snapshot.current.condition.clone());
                changed = true;
            }
        }

        if !changed {
            return;
        }
        if let Err(err) = self.store.save_locations(&self.state.saved_locations) {
            tracing::warn!(error = %err, "Failed to refresh saved locations");
        }
    }

    /// Save the displayed location. Returns `false` when nothing is shown or
    /// it is already saved.
    pub fn save_current_location(&mut self) -> Result<bool, WeatherError> {
        let Some(snapshot) = &self.state.current else {
            return Ok(false);
        };
        let name = snapshot.location.clone();
        let temperature = Some(snapshot.current.temperature);
        let condition = Some(snapshot.current.condition.clone());
        self.save_location(&name, temperature, condition)
    }

    /// Add `name` to the saved list. Names are unique (exact match); saving
    /// a duplicate only notifies the user.
    pub fn save_location(
        &mut self,
        name: &str,
        last_temperature: Option<f64>,
        last_condition: Option<String>,
    ) -> Result<bool, WeatherError> {
        if self.state.saved_locations.iter().any(|s| s.name == name) {
            self.notifier.notify(&Notice::new(format!("{name} already saved")));
            return Ok(false);
        }

        let id = next_location_id(&self.state.saved_locations, Utc::now());
        let mut locations = self.state.saved_locations.clone();
        locations.push(SavedLocation {
            id,
            name: name.to_string(),
            last_temperature,
            last_condition,
        });
        self.store.save_locations(&locations)?;
        self.state.saved_locations = locations;

        tracing::info!(id, name, "Saved location");
        Ok(true)
    }

    /// Returns `false` if no location has that id.
    pub fn remove_location(&mut self, id: i64) -> Result<bool, WeatherError> {
        if !self.state.saved_locations.iter().any(|s| s.id == id) {
            return Ok(false);
        }

        let locations: Vec<_> =
            self.state.saved_locations.iter().filter(|s| s.id != id).cloned().collect();
        self.store.save_locations(&locations)?;
        self.state.saved_locations = locations;
        Ok(true)
    }

    pub fn toggle_theme(&mut self) -> Result<Theme, WeatherError> {
        let theme = self.state.preferences.theme.toggled();
        self.store.save_theme(theme)?;
        self.state.preferences.theme = theme;
        Ok(theme)
    }

    /// Switch unit systems, converting the displayed snapshot and the saved
    /// locations' last-known temperatures. Nothing changes if either write
    /// fails.
    pub fn toggle_units(&mut self) -> Result<Units, WeatherError> {
        let from = self.state.preferences.units;
        let units = from.toggled();

        let previous = self.state.saved_locations.clone();
        let converted: Vec<_> = previous
            .iter()
            .map(|saved| SavedLocation {
                last_temperature: saved
                    .last_temperature
                    .map(|t| meteo::convert_temperature(t, from, units)),
                ..saved.clone()
            })
            .collect();

        self.store.save_locations(&converted)?;
        if let Err(err) = self.store.save_units(units) {
            if let Err(restore) = self.store.save_locations(&previous) {
                tracing::warn!(error = %restore, "Failed to restore saved locations");
            }
            return Err(err);
        }

        self.state.preferences.units = units;
        self.state.saved_locations = converted;
        if let Some(snapshot) = &mut self.state.current {
            snapshot.convert_units(units);
        }
        Ok(units)
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) -> Result<(), WeatherError> {
        self.store.save_view_mode(mode)?;
        self.state.preferences.view_mode = mode;
        Ok(())
    }

    pub fn daily_view(&self, today: Weekday) -> Vec<DailyForecast> {
        self.state
            .current
            .as_ref()
            .map(|s| normalize::daily_view(&s.daily, today))
            .unwrap_or_default()
    }

    pub fn hourly_view(&self, now: DateTime<FixedOffset>) -> Vec<HourlyPoint> {
        self.state
            .current
            .as_ref()
            .map(|s| normalize::resample_hourly(&s.hourly, now, self.hourly_cutoff))
            .unwrap_or_default()
    }
}

/// Creation-time id, bumped past any existing id to stay unique.
fn next_location_id(existing: &[SavedLocation], now: DateTime<Utc>) -> i64 {
    let candidate = now.timestamp_millis();
    match existing.iter().map(|s| s.id).max() {
        Some(max) if max >= candidate => max + 1,
        _ => candidate,
    }
}
