use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::meteo;

/// Unit system a snapshot's numeric fields are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Units::Metric => Units::Imperial,
            Units::Imperial => Units::Metric,
        }
    }

    pub fn temperature_suffix(&self) -> &'static str {
        match self {
            Units::Metric => "°C",
            Units::Imperial => "°F",
        }
    }

    pub fn speed_suffix(&self) -> &'static str {
        match self {
            Units::Metric => "m/s",
            Units::Imperial => "mph",
        }
    }

    pub fn distance_suffix(&self) -> &'static str {
        match self {
            Units::Metric => "km",
            Units::Imperial => "mi",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "metric" => Some(Units::Metric),
            "imperial" => Some(Units::Imperial),
            _ => None,
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Daily,
    Hourly,
}

impl ViewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::Daily => "daily",
            ViewMode::Hourly => "hourly",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "daily" => Some(ViewMode::Daily),
            "hourly" => Some(ViewMode::Hourly),
            _ => None,
        }
    }
}

/// Persisted display settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Preferences {
    pub theme: Theme,
    pub units: Units,
    pub view_mode: ViewMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2},{:.2}", self.lat, self.lon)
    }
}

/// What the fetcher is asked to look up.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationQuery {
    City(String),
    Coordinates(Coordinates),
}

impl LocationQuery {
    /// Key under which snapshots for this query are cached.
    pub fn cache_key(&self) -> String {
        match self {
            LocationQuery::City(name) => name.trim().to_string(),
            LocationQuery::Coordinates(coords) => coords.to_string(),
        }
    }
}

impl fmt::Display for LocationQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationQuery::City(name) => f.write_str(name),
            LocationQuery::Coordinates(coords) => write!(f, "{coords}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temperature: f64,
    pub feels_like: f64,
    pub condition: String,
    #[serde(default)]
    pub description: String,
    pub humidity: u8,
    pub wind_speed: f64,
    #[serde(default)]
    pub wind_direction: Option<String>,
    pub visibility: f64,
    pub uv_index: f64,
    #[serde(default)]
    pub pressure: Option<f64>,
    #[serde(default)]
    pub dew_point: Option<f64>,
    #[serde(default)]
    pub sunrise: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sunset: Option<DateTime<Utc>>,
    #[serde(default)]
    pub alerts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub day: String,
    pub high: f64,
    pub low: f64,
    pub condition: String,
    /// Chance of precipitation, percent.
    pub precipitation: u8,
}

/// Timestamp of a raw forecast sample, as the source delivered it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleTime {
    EpochMillis(i64),
    Iso(String),
}

impl SampleTime {
    /// Normalize to epoch milliseconds. Accepts RFC 3339 strings and the
    /// `YYYY-MM-DD HH:MM:SS` form, the latter read as UTC.
    pub fn epoch_millis(&self) -> Option<i64> {
        match self {
            SampleTime::EpochMillis(ms) => Some(*ms),
            SampleTime::Iso(text) => {
                let text = text.trim();
                if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
                    return Some(dt.timestamp_millis());
                }
                ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"]
                    .iter()
                    .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                    .map(|ndt| ndt.and_utc().timestamp_millis())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlySample {
    pub time: SampleTime,
    pub temperature: f64,
    pub condition: String,
    /// Chance of precipitation, percent.
    pub precipitation: f64,
}

/// One fetched-and-mapped weather result for a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub location: String,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    #[serde(default)]
    pub units: Units,
    pub current: CurrentConditions,
    #[serde(default)]
    pub daily: Vec<DailyForecast>,
    #[serde(default)]
    pub hourly: Vec<HourlySample>,
    pub fetched_at: DateTime<Utc>,
}

impl WeatherSnapshot {
    /// Convert every unit-bearing field to `target` in place.
    ///
    /// Values are kept unrounded so toggling back and forth does not drift.
    pub fn convert_units(&mut self, target: Units) {
        if self.units == target {
            return;
        }

        let from = self.units;
        let temp = |v: f64| meteo::convert_temperature(v, from, target);
        let speed = meteo::convert_speed(self.current.wind_speed, from, target);
        let distance = meteo::convert_distance(self.current.visibility, from, target);

        let current = &mut self.current;
        current.temperature = temp(current.temperature);
        current.feels_like = temp(current.feels_like);
        current.dew_point = current.dew_point.map(temp);
        current.wind_speed = speed;
        current.visibility = distance;

        for day in &mut self.daily {
            day.high = temp(day.high);
            day.low = temp(day.low);
        }
        for sample in &mut self.hourly {
            sample.temperature = temp(sample.temperature);
        }

        self.units = target;
    }
}

/// A favourite location kept by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedLocation {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub last_temperature: Option<f64>,
    #[serde(default)]
    pub last_condition: Option<String>,
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_time_accepts_epoch_and_iso_forms() {
        assert_eq!(SampleTime::EpochMillis(1_000).epoch_millis(), Some(1_000));

        let rfc = SampleTime::Iso("1970-01-01T00:00:01Z".to_string());
        assert_eq!(rfc.epoch_millis(), Some(1_000));

        let dt_txt = SampleTime::Iso("1970-01-01 00:01:00".to_string());
        assert_eq!(dt_txt.epoch_millis(), Some(60_000));

        let bad = SampleTime::Iso("3:00 PM".to_string());
        assert_eq!(bad.epoch_millis(), None);
    }

    #[test]
    fn sample_time_is_untagged_in_json() {
        let numeric: SampleTime = serde_json::from_str("1700000000000").unwrap();
        assert_eq!(numeric, SampleTime::EpochMillis(1_700_000_000_000));

        let text: SampleTime = serde_json::from_str("\"2024-01-01T00:00:00Z\"").unwrap();
        assert!(matches!(text, SampleTime::Iso(_)));
    }

    #[test]
    fn convert_units_converts_temperatures_wind_and_visibility() {
        let mut snap = fixtures::snapshot("London");
        snap.convert_units(Units::Imperial);

        assert_eq!(snap.units, Units::Imperial);
        assert!((snap.current.temperature - 68.0).abs() < 1e-9);
        assert!((snap.current.feels_like - 64.4).abs() < 1e-9);
        assert!((snap.current.dew_point.unwrap() - 48.2).abs() < 1e-9);
        assert!((snap.daily[0].high - 77.0).abs() < 1e-9);
        assert!((snap.daily[0].low - 50.0).abs() < 1e-9);
        assert!((snap.hourly[0].temperature - 32.0).abs() < 1e-9);
        assert!((snap.current.wind_speed - 22.369_362_920_544_02).abs() < 1e-6);
        assert!((snap.current.visibility - 6.213_711_922_373_34).abs() < 1e-6);

        // untouched
        assert_eq!(snap.current.humidity, 50);
        assert_eq!(snap.current.pressure, Some(1012.0));
        assert_eq!(snap.daily[0].precipitation, 20);
    }

    #[test]
    fn convert_units_round_trip_does_not_drift() {
        let original = fixtures::snapshot("London");
        let mut snap = original.clone();
        for _ in 0..10 {
            snap.convert_units(Units::Imperial);
            snap.convert_units(Units::Metric);
        }
        assert!((snap.current.temperature - original.current.temperature).abs() < 1e-9);
        assert!((snap.current.wind_speed - original.current.wind_speed).abs() < 1e-9);
    }

    #[test]
    fn convert_units_to_same_system_is_noop() {
        let original = fixtures::snapshot("London");
        let mut snap = original.clone();
        snap.convert_units(Units::Metric);
        assert_eq!(snap, original);
    }

    #[test]
    fn cache_key_trims_names_and_formats_coordinates() {
        assert_eq!(LocationQuery::City("  Paris ".into()).cache_key(), "Paris");
        let coords = Coordinates { lat: 48.8566, lon: 2.3522 };
        assert_eq!(LocationQuery::Coordinates(coords).cache_key(), "48.86,2.35");
    }

    #[test]
    fn preference_scalars_parse_their_own_output() {
        for units in [Units::Metric, Units::Imperial] {
            assert_eq!(Units::parse(units.as_str()), Some(units));
        }
        for theme in [Theme::Light, Theme::Dark] {
            assert_eq!(Theme::parse(theme.as_str()), Some(theme));
        }
        assert_eq!(ViewMode::parse("hourly"), Some(ViewMode::Hourly));
        assert_eq!(ViewMode::parse("weekly"), None);
    }
}
