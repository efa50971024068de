//! Derived forecast views: the positional daily summary and the dense hourly
//! series resampled from irregular provider samples.
//!
//! Everything here is pure; the caller supplies "now".

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::model::{DailyForecast, HourlySample};

pub const WEEKDAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

pub const DAILY_VIEW_LEN: usize = 7;

pub const UNKNOWN_CONDITION: &str = "Unknown";

/// Last hour of the hourly series, on the calendar day after "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HourlyCutoff {
    /// 12:00 the next day.
    #[default]
    Noon,
    /// 23:00 the next day.
    EndOfDay,
}

impl HourlyCutoff {
    pub fn hour(&self) -> u32 {
        match self {
            HourlyCutoff::Noon => 12,
            HourlyCutoff::EndOfDay => 23,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyPoint {
    pub time: DateTime<FixedOffset>,
    pub temperature: f64,
    pub condition: String,
    pub precipitation_percent: f64,
}

/// A raw sample with its time already normalized to epoch milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedSample {
    pub time_ms: i64,
    pub temperature: f64,
    pub condition: String,
    pub precipitation: f64,
}

/// Values of the series at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleValue {
    pub temperature: f64,
    pub condition: String,
    pub precipitation: f64,
}

/// The first seven days, relabeled by position starting from `today`.
///
/// Labels already present on the entries are ignored.
pub fn daily_view(daily: &[DailyForecast], today: Weekday) -> Vec<DailyForecast> {
    let today_index = today.num_days_from_sunday() as usize;

    daily
        .iter()
        .take(DAILY_VIEW_LEN)
        .enumerate()
        .map(|(i, day)| DailyForecast {
            day: WEEKDAY_NAMES[(today_index + i) % 7].to_string(),
            ..day.clone()
        })
        .collect()
}

/// Normalize sample times and sort ascending. Samples whose time cannot be
/// parsed are dropped.
pub fn timed_samples(samples: &[HourlySample]) -> Vec<TimedSample> {
    let mut timed: Vec<TimedSample> = samples
        .iter()
        .filter_map(|s| match s.time.epoch_millis() {
            Some(time_ms) => Some(TimedSample {
                time_ms,
                temperature: s.temperature,
                condition: s.condition.clone(),
                precipitation: s.precipitation,
            }),
            None => {
                tracing::debug!(time = ?s.time, "Skipping hourly sample with unparsable time");
                None
            }
        })
        .collect();

    timed.sort_by_key(|s| s.time_ms);
    timed
}

/// Value of the series at `t_ms`. `samples` must be sorted by time.
pub fn sample_at(samples: &[TimedSample], t_ms: i64) -> SampleValue {
    let split = samples.partition_point(|s| s.time_ms <= t_ms);
    let before = split.checked_sub(1).map(|i| &samples[i]);
    let after = samples.get(split);

    match (before, after) {
        (Some(b), Some(a)) => {
            let span = a.time_ms as f64 - b.time_ms as f64;
            let ratio = (t_ms as f64 - b.time_ms as f64) / span;
            SampleValue {
                temperature: lerp(b.temperature, a.temperature, ratio).round(),
                condition: b.condition.clone(),
                precipitation: lerp(b.precipitation, a.precipitation, ratio).round(),
            }
        }
        (Some(only), None) | (None, Some(only)) => SampleValue {
            temperature: only.temperature,
            condition: only.condition.clone(),
            precipitation: only.precipitation,
        },
        (None, None) => SampleValue {
            temperature: 0.0,
            condition: UNKNOWN_CONDITION.to_string(),
            precipitation: 0.0,
        },
    }
}

/// One point per clock hour from `now` (floored) through the cutoff hour of
/// the following calendar day, both ends inclusive.
pub fn resample_hourly(
    samples: &[HourlySample],
    now: DateTime<FixedOffset>,
    cutoff: HourlyCutoff,
) -> Vec<HourlyPoint> {
    let timed = timed_samples(samples);

    let Some(start) = floor_to_hour(now) else {
        return Vec::new();
    };
    let Some(end) = cutoff_time(now, cutoff) else {
        return Vec::new();
    };

    let mut points = Vec::new();
    let mut t = start;
    while t <= end {
        let value = sample_at(&timed, t.timestamp_millis());
        points.push(HourlyPoint {
            time: t,
            temperature: value.temperature,
            condition: value.condition,
            precipitation_percent: value.precipitation,
        });
        t += Duration::hours(1);
    }
    points
}

fn lerp(from: f64, to: f64, ratio: f64) -> f64 {
    from + (to - from) * ratio
}

fn floor_to_hour(now: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
    now.with_minute(0)?.with_second(0)?.with_nanosecond(0)
}

fn cutoff_time(now: DateTime<FixedOffset>, cutoff: HourlyCutoff) -> Option<DateTime<FixedOffset>> {
    let tomorrow = now.date_naive().succ_opt()?;
    let time = NaiveTime::from_hms_opt(cutoff.hour(), 0, 0)?;
    tomorrow.and_time(time).and_local_timezone(*now.offset()).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SampleTime;
    use chrono::TimeZone;

    fn timed(time_ms: i64, temperature: f64, condition: &str, precipitation: f64) -> TimedSample {
        TimedSample { time_ms, temperature, condition: condition.to_string(), precipitation }
    }

    fn raw(time: SampleTime, temperature: f64, condition: &str, precipitation: f64) -> HourlySample {
        HourlySample { time, temperature, condition: condition.to_string(), precipitation }
    }

    fn at(h: u32, m: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0).unwrap().with_ymd_and_hms(2024, 3, 6, h, m, 0).unwrap()
    }

    fn day(label: &str) -> DailyForecast {
        DailyForecast {
            day: label.to_string(),
            high: 10.0,
            low: 2.0,
            condition: "Clear".to_string(),
            precipitation: 0,
        }
    }

    #[test]
    fn interpolates_midpoint_exactly() {
        let samples = vec![timed(0, 10.0, "Clear", 20.0), timed(100, 20.0, "Rain", 60.0)];
        let value = sample_at(&samples, 50);

        assert_eq!(value.temperature, 15.0);
        assert_eq!(value.precipitation, 40.0);
        assert_eq!(value.condition, "Clear");
    }

    #[test]
    fn interpolation_rounds_to_nearest() {
        let samples = vec![timed(0, 10.0, "Clear", 0.0), timed(300, 11.0, "Clear", 10.0)];
        let value = sample_at(&samples, 100);

        assert_eq!(value.temperature, 10.0);
        assert_eq!(value.precipitation, 3.0);
    }

    #[test]
    fn before_all_samples_uses_first_sample_unmodified() {
        let samples = vec![timed(1_000, 10.4, "Clouds", 33.3), timed(2_000, 20.0, "Rain", 60.0)];
        let value = sample_at(&samples, 0);

        assert_eq!(value.temperature, 10.4);
        assert_eq!(value.precipitation, 33.3);
        assert_eq!(value.condition, "Clouds");
    }

    #[test]
    fn after_all_samples_uses_last_sample_unmodified() {
        let samples = vec![timed(1_000, 10.0, "Clouds", 30.0), timed(2_000, 20.7, "Rain", 61.5)];
        let value = sample_at(&samples, 5_000);

        assert_eq!(value.temperature, 20.7);
        assert_eq!(value.precipitation, 61.5);
        assert_eq!(value.condition, "Rain");
    }

    #[test]
    fn exact_sample_time_takes_that_sample() {
        let samples = vec![timed(0, 10.0, "Clear", 0.0), timed(100, 20.0, "Rain", 50.0)];
        let value = sample_at(&samples, 100);

        assert_eq!(value.temperature, 20.0);
        assert_eq!(value.condition, "Rain");
    }

    #[test]
    fn extreme_sample_times_do_not_overflow() {
        let samples = vec![timed(i64::MIN, 0.0, "Clear", 0.0), timed(i64::MAX, 10.0, "Rain", 100.0)];
        let value = sample_at(&samples, 0);
        assert_eq!(value.temperature, 5.0);
        assert_eq!(value.precipitation, 50.0);
        assert_eq!(value.condition, "Clear");
    }

    #[test]
    fn no_samples_yields_unknown_defaults() {
        let value = sample_at(&[], 0);
        assert_eq!(value.temperature, 0.0);
        assert_eq!(value.precipitation, 0.0);
        assert_eq!(value.condition, UNKNOWN_CONDITION);
    }

    #[test]
    fn resampled_series_is_dense_hourly_through_noon_tomorrow() {
        let now = at(9, 37);
        let samples = vec![
            raw(SampleTime::EpochMillis(at(9, 0).timestamp_millis()), 8.0, "Clear", 0.0),
            raw(SampleTime::Iso("2024-03-07 09:00:00".into()), 14.0, "Rain", 90.0),
        ];

        let points = resample_hourly(&samples, now, HourlyCutoff::Noon);

        // 09:00 today through 12:00 tomorrow
        assert_eq!(points.len(), 15 + 13);
        assert_eq!(points.first().unwrap().time, at(9, 0));
        assert_eq!(points.last().unwrap().time, at(12, 0) + Duration::days(1));
        for pair in points.windows(2) {
            assert_eq!(pair[1].time - pair[0].time, Duration::hours(1));
        }
    }

    #[test]
    fn end_of_day_cutoff_extends_to_23h_tomorrow() {
        let points = resample_hourly(&[], at(23, 5), HourlyCutoff::EndOfDay);

        assert_eq!(points.len(), 25);
        assert_eq!(points.last().unwrap().time, at(23, 0) + Duration::days(1));
        assert!(points.iter().all(|p| p.condition == UNKNOWN_CONDITION));
    }

    #[test]
    fn resampling_interpolates_between_three_hourly_samples() {
        let base = at(0, 0);
        let samples = vec![
            raw(SampleTime::EpochMillis(base.timestamp_millis()), 0.0, "Clear", 0.0),
            raw(
                SampleTime::EpochMillis((base + Duration::hours(3)).timestamp_millis()),
                3.0,
                "Clouds",
                30.0,
            ),
        ];

        let points = resample_hourly(&samples, base, HourlyCutoff::Noon);

        assert_eq!(points[1].temperature, 1.0);
        assert_eq!(points[2].temperature, 2.0);
        assert_eq!(points[2].precipitation_percent, 20.0);
        assert_eq!(points[2].condition, "Clear");
        assert_eq!(points[3].condition, "Clouds");
        // beyond the last sample values are carried unmodified
        assert_eq!(points[10].temperature, 3.0);
    }

    #[test]
    fn unsorted_and_unparsable_samples_are_handled() {
        let base = at(0, 0);
        let samples = vec![
            raw(SampleTime::Iso("not a time".into()), 99.0, "Bogus", 99.0),
            raw(
                SampleTime::EpochMillis((base + Duration::hours(2)).timestamp_millis()),
                20.0,
                "Rain",
                0.0,
            ),
            raw(SampleTime::Iso("2024-03-06T00:00:00+00:00".into()), 10.0, "Clear", 0.0),
        ];

        let points = resample_hourly(&samples, base, HourlyCutoff::Noon);

        assert_eq!(points[0].temperature, 10.0);
        assert_eq!(points[1].temperature, 15.0);
        assert_eq!(points[2].temperature, 20.0);
        assert!(points.iter().all(|p| p.condition != "Bogus"));
    }

    #[test]
    fn resampling_is_deterministic() {
        let samples = vec![raw(SampleTime::EpochMillis(0), 1.0, "Clear", 0.0)];
        let now = at(14, 20);
        assert_eq!(
            resample_hourly(&samples, now, HourlyCutoff::Noon),
            resample_hourly(&samples, now, HourlyCutoff::Noon)
        );
    }

    #[test]
    fn daily_view_relabels_by_position_from_today() {
        let daily: Vec<_> = ["x", "x", "x", "x", "x", "x", "x", "x"].iter().map(|l| day(l)).collect();

        let view = daily_view(&daily, Weekday::Wed);
        let labels: Vec<_> = view.iter().map(|d| d.day.as_str()).collect();

        assert_eq!(labels, vec!["Wed", "Thu", "Fri", "Sat", "Sun", "Mon", "Tue"]);
    }

    #[test]
    fn daily_view_keeps_shorter_lists_and_values() {
        let mut first = day("Fri");
        first.high = 31.0;
        let view = daily_view(&[first, day("Sat")], Weekday::Sun);

        assert_eq!(view.len(), 2);
        assert_eq!(view[0].day, "Sun");
        assert_eq!(view[0].high, 31.0);
        assert_eq!(view[1].day, "Mon");
        assert!(daily_view(&[], Weekday::Mon).is_empty());
    }
}
