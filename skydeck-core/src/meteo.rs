//! Small meteorological derivations and unit conversions.

use crate::model::Units;

const COMPASS_POINTS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

const MAGNUS_A: f64 = 17.27;
const MAGNUS_B: f64 = 237.7;

const METRES_PER_SECOND_IN_MPH: f64 = 0.447_04;
const KM_PER_MILE: f64 = 1.609_344;

/// 16-point compass label for a wind bearing in degrees.
pub fn wind_direction(degrees: f64) -> &'static str {
    let index = (degrees / 22.5).round() as i64;
    COMPASS_POINTS[index.rem_euclid(16) as usize]
}

/// Dew point in °C from air temperature (°C) and relative humidity (percent),
/// using the Magnus approximation. Rounded to the nearest degree.
///
/// Returns `None` for non-positive humidity where the logarithm is undefined.
pub fn dew_point_celsius(temperature_c: f64, humidity_pct: f64) -> Option<f64> {
    if humidity_pct <= 0.0 {
        return None;
    }
    let alpha = (MAGNUS_A * temperature_c) / (MAGNUS_B + temperature_c) + (humidity_pct / 100.0).ln();
    Some((MAGNUS_B * alpha / (MAGNUS_A - alpha)).round())
}

pub fn uv_index_description(uv_index: f64) -> &'static str {
    match uv_index {
        v if v <= 2.0 => "Low",
        v if v <= 5.0 => "Moderate",
        v if v <= 7.0 => "High",
        v if v <= 10.0 => "Very High",
        _ => "Extreme",
    }
}

pub fn convert_temperature(value: f64, from: Units, to: Units) -> f64 {
    match (from, to) {
        (Units::Metric, Units::Imperial) => value * 9.0 / 5.0 + 32.0,
        (Units::Imperial, Units::Metric) => (value - 32.0) * 5.0 / 9.0,
        _ => value,
    }
}

/// Wind speed: m/s (metric) or mph (imperial).
pub fn convert_speed(value: f64, from: Units, to: Units) -> f64 {
    match (from, to) {
        (Units::Metric, Units::Imperial) => value / METRES_PER_SECOND_IN_MPH,
        (Units::Imperial, Units::Metric) => value * METRES_PER_SECOND_IN_MPH,
        _ => value,
    }
}

/// Visibility: km (metric) or miles (imperial).
pub fn convert_distance(value: f64, from: Units, to: Units) -> f64 {
    match (from, to) {
        (Units::Metric, Units::Imperial) => value / KM_PER_MILE,
        (Units::Imperial, Units::Metric) => value * KM_PER_MILE,
        _ => value,
    }
}

/// Provider visibility is always metres.
pub fn visibility_from_metres(metres: f64, units: Units) -> f64 {
    convert_distance(metres / 1000.0, Units::Metric, units)
}
