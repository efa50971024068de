//! Preference & cache persistence.
//!
//! A flat string key/value store sits underneath; [`PreferenceStore`] layers
//! typed access on top. Scalars are stored as plain strings, structured
//! values as JSON. Values that fail to parse are treated as absent.

use serde::{Serialize, de::DeserializeOwned};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use crate::{
    error::WeatherError,
    model::{Preferences, SavedLocation, Theme, Units, ViewMode, WeatherSnapshot},
};

pub const THEME_KEY: &str = "wea_theme";
pub const UNITS_KEY: &str = "wea_units";
pub const VIEW_MODE_KEY: &str = "wea_view_mode";
pub const LOCATIONS_KEY: &str = "wea_locations";
pub const CACHE_PREFIX: &str = "wea_cache_";
pub const LAST_LOCATION_KEY: &str = "wea_last_location";

/// Synchronous string key/value store. No transactions across keys.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, WeatherError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), WeatherError>;
    fn remove(&mut self, key: &str) -> Result<(), WeatherError>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, WeatherError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), WeatherError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), WeatherError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// All entries kept in one JSON object file, rewritten on every change.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Open the store at `path`. A missing file is an empty store; an
    /// unreadable or corrupt one is logged and also starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(entries) => entries,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "Store file is corrupt, starting empty");
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Failed to read store file, starting empty");
                BTreeMap::new()
            }
        };

        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), WeatherError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                WeatherError::Storage(format!("create {}: {e}", parent.display()))
            })?;
        }

        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| WeatherError::Storage(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .map_err(|e| WeatherError::Storage(format!("write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| WeatherError::Storage(format!("replace {}: {e}", self.path.display())))?;

        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, WeatherError> {
        Ok(self.entries.get(key).cloned())
    }

    /// On a failed flush the in-memory entry is restored, so memory and disk
    /// stay in agreement.
    fn set(&mut self, key: &str, value: &str) -> Result<(), WeatherError> {
        let previous = self.entries.insert(key.to_string(), value.to_string());
        self.flush().inspect_err(|_| self.restore(key, previous))
    }

    fn remove(&mut self, key: &str) -> Result<(), WeatherError> {
        let Some(previous) = self.entries.remove(key) else {
            return Ok(());
        };
        self.flush().inspect_err(|_| self.restore(key, Some(previous)))
    }
}

impl FileStore {
    fn restore(&mut self, key: &str, previous: Option<String>) {
        match previous {
            Some(value) => self.entries.insert(key.to_string(), value),
            None => self.entries.remove(key),
        };
    }
}

/// Typed view over a [`KeyValueStore`].
#[derive(Debug)]
pub struct PreferenceStore<S> {
    inner: S,
}

impl<S: KeyValueStore> PreferenceStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn load_preferences(&self) -> Preferences {
        Preferences {
            theme: self.scalar(THEME_KEY, Theme::parse).unwrap_or_default(),
            units: self.scalar(UNITS_KEY, Units::parse).unwrap_or_default(),
            view_mode: self.scalar(VIEW_MODE_KEY, ViewMode::parse).unwrap_or_default(),
        }
    }

    pub fn save_theme(&mut self, theme: Theme) -> Result<(), WeatherError> {
        self.inner.set(THEME_KEY, theme.as_str())
    }

    pub fn save_units(&mut self, units: Units) -> Result<(), WeatherError> {
        self.inner.set(UNITS_KEY, units.as_str())
    }

    pub fn save_view_mode(&mut self, mode: ViewMode) -> Result<(), WeatherError> {
        self.inner.set(VIEW_MODE_KEY, mode.as_str())
    }

    /// Saved locations; a corrupt list reads as empty.
    pub fn load_locations(&self) -> Vec<SavedLocation> {
        self.json(LOCATIONS_KEY).unwrap_or_default()
    }

    pub fn save_locations(&mut self, locations: &[SavedLocation]) -> Result<(), WeatherError> {
        self.set_json(LOCATIONS_KEY, locations)
    }

    pub fn cached_snapshot(&self, cache_key: &str) -> Option<WeatherSnapshot> {
        self.json(&format!("{CACHE_PREFIX}{cache_key}"))
    }

    pub fn cache_snapshot(
        &mut self,
        cache_key: &str,
        snapshot: &WeatherSnapshot,
    ) -> Result<(), WeatherError> {
        self.set_json(&format!("{CACHE_PREFIX}{cache_key}"), snapshot)
    }

    pub fn set_last_location(&mut self, cache_key: &str) -> Result<(), WeatherError> {
        self.inner.set(LAST_LOCATION_KEY, cache_key)
    }

    pub fn last_location(&self) -> Option<String> {
        self.raw(LAST_LOCATION_KEY).filter(|s| !s.is_empty())
    }

    fn raw(&self, key: &str) -> Option<String> {
        match self.inner.get(key) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(key, error = %err, "Failed to read stored value");
                None
            }
        }
    }

    fn scalar<T>(&self, key: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
        let raw = self.raw(key)?;
        let parsed = parse(&raw);
        if parsed.is_none() {
            let err = WeatherError::PersistenceCorrupt {
                key: key.to_string(),
                message: format!("unrecognised value '{raw}'"),
            };
            tracing::debug!(error = %err, "Ignoring stored value");
        }
        parsed
    }

    fn json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.raw(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                let err = WeatherError::PersistenceCorrupt {
                    key: key.to_string(),
                    message: e.to_string(),
                };
                tracing::debug!(error = %err, "Ignoring stored value");
                None
            }
        }
    }

    fn set_json<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<(), WeatherError> {
        let json = serde_json::to_string(value).map_err(|e| WeatherError::Storage(e.to_string()))?;
        self.inner.set(key, &json)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures;

    fn store_with(key: &str, value: &str) -> PreferenceStore<MemoryStore> {
        let mut raw = MemoryStore::new();
        raw.set(key, value).unwrap();
        PreferenceStore::new(raw)
    }

    #[test]
    fn empty_store_yields_defaults() {
        let store = PreferenceStore::new(MemoryStore::new());
        assert_eq!(store.load_preferences(), Preferences::default());
        assert!(store.load_locations().is_empty());
        assert!(store.last_location().is_none());
    }

    #[test]
    fn malformed_location_list_reads_as_empty() {
        let store = store_with(LOCATIONS_KEY, "[{\"id\": 1, \"name\":");
        assert!(store.load_locations().is_empty());
    }

    #[test]
    fn malformed_snapshot_reads_as_absent() {
        let store = store_with("wea_cache_Oslo", "{not json");
        assert!(store.cached_snapshot("Oslo").is_none());
    }

    #[test]
    fn unknown_scalar_falls_back_to_default() {
        let store = store_with(UNITS_KEY, "kelvin");
        assert_eq!(store.load_preferences().units, Units::Metric);
    }

    #[test]
    fn preferences_persist_as_plain_strings() {
        let mut store = PreferenceStore::new(MemoryStore::new());
        store.save_theme(Theme::Dark).unwrap();
        store.save_units(Units::Imperial).unwrap();
        store.save_view_mode(ViewMode::Hourly).unwrap();

        assert_eq!(store.inner().get(THEME_KEY).unwrap().as_deref(), Some("dark"));
        assert_eq!(store.inner().get(UNITS_KEY).unwrap().as_deref(), Some("imperial"));
        assert_eq!(
            store.load_preferences(),
            Preferences { theme: Theme::Dark, units: Units::Imperial, view_mode: ViewMode::Hourly }
        );
    }

    #[test]
    fn cached_snapshot_and_last_location_round_trip() {
        let mut store = PreferenceStore::new(MemoryStore::new());
        let snap = fixtures::snapshot("Oslo");

        store.cache_snapshot("Oslo", &snap).unwrap();
        assert!(store.last_location().is_none());
        store.set_last_location("Oslo").unwrap();

        assert_eq!(store.last_location().as_deref(), Some("Oslo"));
        assert_eq!(store.cached_snapshot("Oslo"), Some(snap));
        assert!(store.inner().get("wea_cache_Oslo").unwrap().is_some());
    }

    #[test]
    fn file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let mut store = FileStore::open(&path);
        store.set(THEME_KEY, "dark").unwrap();
        store.set(LAST_LOCATION_KEY, "Oslo").unwrap();
        store.remove(LAST_LOCATION_KEY).unwrap();

        let reopened = FileStore::open(&path);
        assert_eq!(reopened.get(THEME_KEY).unwrap().as_deref(), Some("dark"));
        assert_eq!(reopened.get(LAST_LOCATION_KEY).unwrap(), None);
    }

    #[test]
    fn failed_flush_leaves_no_trace() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("data");
        fs::write(&blocker, "not a directory").unwrap();
        let path = blocker.join("store.json");

        let mut store = FileStore::open(&path);
        assert!(matches!(store.set(THEME_KEY, "dark"), Err(WeatherError::Storage(_))));
        assert_eq!(store.get(THEME_KEY).unwrap(), None);

        fs::remove_file(&blocker).unwrap();
        store.set(UNITS_KEY, "imperial").unwrap();

        let reopened = FileStore::open(&path);
        assert_eq!(reopened.get(UNITS_KEY).unwrap().as_deref(), Some("imperial"));
        assert_eq!(reopened.get(THEME_KEY).unwrap(), None);
    }

    #[test]
    fn failed_remove_keeps_the_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("store.json");

        let mut store = FileStore::open(&path);
        store.set(THEME_KEY, "dark").unwrap();
        fs::remove_dir_all(dir.path().join("data")).unwrap();
        fs::write(dir.path().join("data"), "blocker").unwrap();

        assert!(store.remove(THEME_KEY).is_err());
        assert_eq!(store.get(THEME_KEY).unwrap().as_deref(), Some("dark"));
    }

    #[test]
    fn corrupt_file_store_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "]]] definitely not json").unwrap();

        let mut store = FileStore::open(&path);
        assert_eq!(store.get(THEME_KEY).unwrap(), None);

        store.set(THEME_KEY, "light").unwrap();
        let reopened = FileStore::open(&path);
        assert_eq!(reopened.get(THEME_KEY).unwrap().as_deref(), Some("light"));
    }
}
