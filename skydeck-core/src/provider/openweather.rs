use async_trait::async_trait;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Offset, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};

use crate::{
    error::WeatherError,
    meteo,
    model::{
        Coordinates, CurrentConditions, DailyForecast, HourlySample, LocationQuery, SampleTime, Units,
        WeatherSnapshot,
    },
    normalize::{DAILY_VIEW_LEN, WEEKDAY_NAMES},
};

use super::WeatherProvider;

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

/// OpenWeather caps reported visibility at 10 km and omits it at times.
const MAX_VISIBILITY_M: f64 = 10_000.0;

const SEVERE_CONDITIONS: [&str; 3] = ["Thunderstorm", "Tornado", "Squall"];

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn with_base_url(api_key: impl Into<String>, base_url: &str) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &LocationQuery,
        units: Units,
    ) -> Result<T, WeatherError> {
        let url = format!("{}/{endpoint}", self.base_url);

        let mut params: Vec<(&str, String)> = match query {
            LocationQuery::City(name) => vec![("q", name.clone())],
            LocationQuery::Coordinates(c) => {
                vec![("lat", c.lat.to_string()), ("lon", c.lon.to_string())]
            }
        };
        params.push(("units", units.as_str().to_string()));
        params.push(("appid", self.api_key.clone()));

        tracing::debug!(%url, %query, %units, "Requesting OpenWeather data");

        let res = self.http.get(&url).query(&params).send().await.map_err(|e| {
            WeatherError::ProviderUnavailable(format!("OpenWeather {endpoint} request failed: {e}"))
        })?;

        let status = res.status();
        let body = res.text().await.map_err(|e| {
            WeatherError::ProviderUnavailable(format!(
                "Failed to read OpenWeather {endpoint} response body: {e}"
            ))
        })?;

        if !status.is_success() {
            return Err(classify_failure(endpoint, status, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            WeatherError::MalformedProviderResponse(format!(
                "Failed to parse OpenWeather {endpoint} JSON: {e}"
            ))
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn fetch(
        &self,
        query: &LocationQuery,
        units: Units,
    ) -> Result<WeatherSnapshot, WeatherError> {
        let (current, forecast) = tokio::try_join!(
            self.get::<OwCurrentResponse>("weather", query, units),
            self.get::<OwForecastResponse>("forecast", query, units),
        )?;

        map_snapshot(current, forecast, units, Utc::now())
    }
}

#[derive(Debug, Deserialize)]
struct OwErrorBody {
    message: Option<String>,
}

fn classify_failure(endpoint: &str, status: StatusCode, body: &str) -> WeatherError {
    let message = serde_json::from_str::<OwErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| truncate_body(body));

    if status.is_client_error() {
        WeatherError::NotFound(message)
    } else {
        WeatherError::ProviderUnavailable(format!(
            "OpenWeather {endpoint} request failed with status {status}: {message}"
        ))
    }
}

#[derive(Debug, Deserialize)]
struct OwCoord {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    humidity: u8,
    #[serde(default)]
    pressure: Option<f64>,
    #[serde(default)]
    temp_min: Option<f64>,
    #[serde(default)]
    temp_max: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    main: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
    #[serde(default)]
    deg: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct OwSys {
    #[serde(default)]
    sunrise: Option<i64>,
    #[serde(default)]
    sunset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    #[serde(default)]
    coord: Option<OwCoord>,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
    wind: OwWind,
    #[serde(default)]
    visibility: Option<f64>,
    #[serde(default)]
    sys: OwSys,
    #[serde(default)]
    timezone: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
    #[serde(default)]
    pop: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwCity {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    timezone: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    #[serde(default)]
    city: Option<OwCity>,
    list: Vec<OwForecastEntry>,
}

fn map_snapshot(
    current: OwCurrentResponse,
    forecast: OwForecastResponse,
    units: Units,
    fetched_at: DateTime<Utc>,
) -> Result<WeatherSnapshot, WeatherError> {
    if forecast.list.is_empty() {
        return Err(WeatherError::NotFound("forecast contained no samples".to_string()));
    }

    let utc_offset = forecast
        .city
        .as_ref()
        .and_then(|c| c.timezone)
        .or(current.timezone)
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| Utc.fix());

    let location = if current.name.trim().is_empty() {
        forecast
            .city
            .as_ref()
            .and_then(|c| c.name.clone())
            .filter(|n| !n.trim().is_empty())
            .or_else(|| current.coord.as_ref().map(|c| format!("{:.2},{:.2}", c.lat, c.lon)))
            .ok_or_else(|| {
                WeatherError::MalformedProviderResponse("response carried no location name".into())
            })?
    } else {
        current.name.clone()
    };

    let hourly = forecast
        .list
        .iter()
        .map(|entry| {
            let time_ms = entry.dt.checked_mul(1000).ok_or_else(|| {
                WeatherError::MalformedProviderResponse(format!("invalid timestamp {}", entry.dt))
            })?;
            Ok(HourlySample {
                time: SampleTime::EpochMillis(time_ms),
                temperature: entry.main.temp,
                condition: primary_weather(&entry.weather, "forecast entry")?.main.clone(),
                precipitation: pop_percent(entry.pop),
            })
        })
        .collect::<Result<Vec<_>, WeatherError>>()?;

    let daily = daily_buckets(&forecast.list, utc_offset)?;
    let current_conditions = map_current(&current, units)?;

    Ok(WeatherSnapshot {
        location,
        coordinates: current.coord.map(|c| Coordinates { lat: c.lat, lon: c.lon }),
        units,
        current: current_conditions,
        daily,
        hourly,
        fetched_at,
    })
}

fn map_current(current: &OwCurrentResponse, units: Units) -> Result<CurrentConditions, WeatherError> {
    let weather = primary_weather(&current.weather, "current conditions")?;

    let alerts = current
        .weather
        .iter()
        .filter(|w| SEVERE_CONDITIONS.contains(&w.main.as_str()))
        .map(|w| {
            let detail = if w.description.is_empty() { &w.main } else { &w.description };
            format!("Severe weather alert: {detail}")
        })
        .collect();

    let temp_c = meteo::convert_temperature(current.main.temp, units, Units::Metric);
    let dew_point = meteo::dew_point_celsius(temp_c, f64::from(current.main.humidity))
        .map(|dew_c| meteo::convert_temperature(dew_c, Units::Metric, units).round());

    Ok(CurrentConditions {
        temperature: current.main.temp,
        feels_like: current.main.feels_like,
        condition: weather.main.clone(),
        description: weather.description.clone(),
        humidity: current.main.humidity,
        wind_speed: current.wind.speed,
        wind_direction: current.wind.deg.map(|d| meteo::wind_direction(d).to_string()),
        visibility: meteo::visibility_from_metres(
            current.visibility.unwrap_or(MAX_VISIBILITY_M),
            units,
        ),
        // not reported by the 2.5 endpoints
        uv_index: 0.0,
        pressure: current.main.pressure,
        dew_point,
        sunrise: current.sys.sunrise.and_then(|s| DateTime::from_timestamp(s, 0)),
        sunset: current.sys.sunset.and_then(|s| DateTime::from_timestamp(s, 0)),
        alerts,
    })
}

struct DayBucket<'a> {
    date: NaiveDate,
    high: f64,
    low: f64,
    precipitation: f64,
    conditions: Vec<(&'a str, usize)>,
}

impl DayBucket<'_> {
    /// Most frequent condition; ties go to the one seen first.
    fn dominant_condition(&self) -> &str {
        let mut best: Option<(&str, usize)> = None;
        for &(condition, count) in &self.conditions {
            if best.is_none_or(|(_, n)| count > n) {
                best = Some((condition, count));
            }
        }
        best.map(|(c, _)| c).unwrap_or(crate::normalize::UNKNOWN_CONDITION)
    }
}

/// Group the flat sample list by local calendar date.
fn daily_buckets(
    entries: &[OwForecastEntry],
    offset: FixedOffset,
) -> Result<Vec<DailyForecast>, WeatherError> {
    let mut sorted: Vec<&OwForecastEntry> = entries.iter().collect();
    sorted.sort_by_key(|e| e.dt);

    let mut buckets: Vec<DayBucket<'_>> = Vec::new();

    for entry in sorted {
        let date = DateTime::from_timestamp(entry.dt, 0)
            .ok_or_else(|| {
                WeatherError::MalformedProviderResponse(format!("invalid timestamp {}", entry.dt))
            })?
            .with_timezone(&offset)
            .date_naive();

        let high = entry.main.temp_max.unwrap_or(entry.main.temp);
        let low = entry.main.temp_min.unwrap_or(entry.main.temp);
        let condition = primary_weather(&entry.weather, "forecast entry")?.main.as_str();
        let pop = pop_percent(entry.pop);

        match buckets.last_mut() {
            Some(bucket) if bucket.date == date => {
                bucket.high = bucket.high.max(high);
                bucket.low = bucket.low.min(low);
                bucket.precipitation = bucket.precipitation.max(pop);
                match bucket.conditions.iter_mut().find(|(c, _)| *c == condition) {
                    Some((_, count)) => *count += 1,
                    None => bucket.conditions.push((condition, 1)),
                }
            }
            _ => buckets.push(DayBucket {
                date,
                high,
                low,
                precipitation: pop,
                conditions: vec![(condition, 1)],
            }),
        }
    }

    Ok(buckets
        .iter()
        .take(DAILY_VIEW_LEN)
        .map(|b| DailyForecast {
            day: WEEKDAY_NAMES[b.date.weekday().num_days_from_sunday() as usize].to_string(),
            high: b.high,
            low: b.low,
            condition: b.dominant_condition().to_string(),
            precipitation: b.precipitation.clamp(0.0, 100.0) as u8,
        })
        .collect())
}

fn primary_weather<'a>(weather: &'a [OwWeather], what: &str) -> Result<&'a OwWeather, WeatherError> {
    weather.first().ok_or_else(|| {
        WeatherError::MalformedProviderResponse(format!("{what} has no weather description"))
    })
}

fn pop_percent(pop: Option<f64>) -> f64 {
    (pop.unwrap_or(0.0) * 100.0).round()
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
