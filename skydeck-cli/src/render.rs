//! Text rendering of dashboard state, colored by the saved theme.

use std::fmt::Write;

use chrono::Local;
use crossterm::style::{Color, Stylize};
use skydeck_core::{
    DailyForecast, FetchSource, HourlyPoint, SavedLocation, Theme, Units, WeatherSnapshot, meteo,
};

/// Heading, secondary text and warning colors. `None` means unstyled.
#[derive(Debug, Clone, Copy, Default)]
pub struct Palette {
    accent: Option<Color>,
    muted: Option<Color>,
    warning: Option<Color>,
}

impl Palette {
    /// Colors for `theme`, or a plain palette when `styled` is false
    /// (output is not a terminal).
    pub fn new(theme: Theme, styled: bool) -> Self {
        if !styled {
            return Self::plain();
        }
        match theme {
            Theme::Light => Self {
                accent: Some(Color::DarkBlue),
                muted: Some(Color::DarkGrey),
                warning: Some(Color::DarkRed),
            },
            Theme::Dark => Self {
                accent: Some(Color::Cyan),
                muted: Some(Color::Grey),
                warning: Some(Color::Yellow),
            },
        }
    }

    pub fn plain() -> Self {
        Self::default()
    }

    fn accent(&self, text: &str) -> String {
        paint(text, self.accent)
    }

    fn muted(&self, text: &str) -> String {
        paint(text, self.muted)
    }

    fn warning(&self, text: &str) -> String {
        paint(text, self.warning)
    }
}

fn paint(text: &str, color: Option<Color>) -> String {
    match color {
        Some(color) => text.with(color).to_string(),
        None => text.to_string(),
    }
}

pub fn current(snapshot: &WeatherSnapshot, source: Option<FetchSource>, palette: &Palette) -> String {
    let units = snapshot.units;
    let c = &snapshot.current;
    let deg = units.temperature_suffix();
    let mut out = String::new();

    let _ = write!(out, "{}", palette.accent(&snapshot.location));
    if source == Some(FetchSource::Cache) {
        let stamp = snapshot.fetched_at.with_timezone(&Local).format("%Y-%m-%d %H:%M");
        let _ = write!(out, "  {}", palette.muted(&format!("(cached {stamp})")));
    }
    out.push('\n');

    let _ = writeln!(
        out,
        "  {:.0}{deg}  {}  (feels like {:.0}{deg})",
        c.temperature,
        if c.description.is_empty() { &c.condition } else { &c.description },
        c.feels_like,
    );
    let _ = writeln!(out, "  Humidity    {}%", c.humidity);

    let _ = write!(out, "  Wind        {:.1} {}", c.wind_speed, units.speed_suffix());
    if let Some(dir) = &c.wind_direction {
        let _ = write!(out, " {dir}");
    }
    out.push('\n');

    let _ = writeln!(out, "  Visibility  {:.1} {}", c.visibility, units.distance_suffix());
    let _ = writeln!(
        out,
        "  UV index    {} ({})",
        c.uv_index,
        meteo::uv_index_description(c.uv_index)
    );
    if let Some(pressure) = c.pressure {
        let _ = writeln!(out, "  Pressure    {pressure:.0} hPa");
    }
    if let Some(dew) = c.dew_point {
        let _ = writeln!(out, "  Dew point   {dew:.0}{deg}");
    }
    if let (Some(rise), Some(set)) = (c.sunrise, c.sunset) {
        let _ = writeln!(
            out,
            "  Sun         {} / {}",
            rise.with_timezone(&Local).format("%H:%M"),
            set.with_timezone(&Local).format("%H:%M"),
        );
    }
    for alert in &c.alerts {
        let _ = writeln!(out, "  {}", palette.warning(&format!("! {alert}")));
    }

    out
}

pub fn daily(days: &[DailyForecast], units: Units, palette: &Palette) -> String {
    if days.is_empty() {
        return "No daily forecast available\n".to_string();
    }

    let deg = units.temperature_suffix();
    let mut out = format!("{}\n", palette.accent("Forecast (daily)"));
    for day in days {
        let _ = writeln!(
            out,
            "  {:<4} {:>4.0}{deg} / {:>4.0}{deg}  {:>3}%  {}",
            day.day, day.high, day.low, day.precipitation, day.condition
        );
    }
    out
}

pub fn hourly(points: &[HourlyPoint], units: Units, palette: &Palette) -> String {
    if points.is_empty() {
        return "No hourly forecast available\n".to_string();
    }

    let deg = units.temperature_suffix();
    let mut out = format!("{}\n", palette.accent("Forecast (hourly)"));
    for point in points {
        let _ = writeln!(
            out,
            "  {} {:>4.0}{deg}  {:>3.0}%  {}",
            point.time.format("%a %H:%M"),
            point.temperature,
            point.precipitation_percent,
            point.condition
        );
    }
    out
}

pub fn saved(locations: &[SavedLocation], units: Units, palette: &Palette) -> String {
    if locations.is_empty() {
        return "No saved locations\n".to_string();
    }

    let mut out = format!("{}\n", palette.accent("Saved locations"));
    for loc in locations {
        let _ = write!(out, "  {} {}", palette.muted(&format!("[{}]", loc.id)), loc.name);
        if let Some(temp) = loc.last_temperature {
            let _ = write!(out, "  {temp:.0}{}", units.temperature_suffix());
        }
        if let Some(condition) = &loc.last_condition {
            let _ = write!(out, "  {condition}");
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone, Utc};
    use skydeck_core::CurrentConditions;

    fn snapshot() -> WeatherSnapshot {
        WeatherSnapshot {
            location: "Oslo".into(),
            coordinates: None,
            units: Units::Metric,
            current: CurrentConditions {
                temperature: 4.4,
                feels_like: 1.2,
                condition: "Snow".into(),
                description: "light snow".into(),
                humidity: 90,
                wind_speed: 3.0,
                wind_direction: Some("NW".into()),
                visibility: 6.0,
                uv_index: 0.0,
                pressure: Some(1001.0),
                dew_point: Some(3.0),
                sunrise: None,
                sunset: None,
                alerts: vec!["Severe weather alert: blizzard".into()],
            },
            daily: Vec::new(),
            hourly: Vec::new(),
            fetched_at: Utc.with_ymd_and_hms(2024, 3, 6, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn current_card_lists_details() {
        let text = current(&snapshot(), Some(FetchSource::Network), &Palette::plain());

        assert!(text.starts_with("Oslo\n"));
        assert!(text.contains("4°C  light snow  (feels like 1°C)"));
        assert!(text.contains("Wind        3.0 m/s NW"));
        assert!(text.contains("UV index    0 (Low)"));
        assert!(text.contains("Dew point   3°C"));
        assert!(text.contains("! Severe weather alert: blizzard"));
        assert!(!text.contains("cached"));
    }

    #[test]
    fn cached_snapshot_is_marked() {
        let text = current(&snapshot(), Some(FetchSource::Cache), &Palette::plain());
        assert!(text.lines().next().unwrap().contains("(cached "));
    }

    #[test]
    fn daily_rows() {
        let days = vec![DailyForecast {
            day: "Wed".into(),
            high: 12.0,
            low: 3.0,
            condition: "Rain".into(),
            precipitation: 80,
        }];

        let text = daily(&days, Units::Imperial, &Palette::plain());
        assert!(text.contains("Wed"));
        assert!(text.contains("12°F"));
        assert!(text.contains("80%"));
        assert_eq!(daily(&[], Units::Metric, &Palette::plain()), "No daily forecast available\n");
    }

    #[test]
    fn hourly_rows() {
        let time = FixedOffset::east_opt(0).unwrap().with_ymd_and_hms(2024, 3, 6, 14, 0, 0).unwrap();
        let points = vec![HourlyPoint {
            time,
            temperature: 7.0,
            condition: "Clouds".into(),
            precipitation_percent: 15.0,
        }];

        let text = hourly(&points, Units::Metric, &Palette::plain());
        assert!(text.contains("Wed 14:00"));
        assert!(text.contains("7°C"));
        assert!(text.contains("Clouds"));
    }

    #[test]
    fn saved_list() {
        let locations = vec![SavedLocation {
            id: 17,
            name: "Paris".into(),
            last_temperature: Some(21.4),
            last_condition: Some("Clear".into()),
        }];

        assert_eq!(saved(&locations, Units::Metric, &Palette::plain()), "Saved locations\n  [17] Paris  21°C  Clear\n");
        assert_eq!(saved(&[], Units::Metric, &Palette::plain()), "No saved locations\n");
    }

    #[test]
    fn theme_changes_styling() {
        let snap = snapshot();
        let light = current(&snap, None, &Palette::new(Theme::Light, true));
        let dark = current(&snap, None, &Palette::new(Theme::Dark, true));

        assert!(light.contains("\u{1b}["));
        assert!(dark.contains("\u{1b}["));
        assert_ne!(light, dark);
        assert!(light.contains("Oslo") && dark.contains("Oslo"));
    }

    #[test]
    fn unstyled_output_has_no_escapes() {
        let text = current(&snapshot(), None, &Palette::new(Theme::Dark, false));
        assert!(!text.contains('\u{1b}'));
    }
}
