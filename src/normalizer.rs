//! Weather normalization
//!
//! This module turns an irregular weather series into a complete hourly grid:
//! - Duplicate timestamps collapse to their first occurrence
//! - Samples are aligned onto hourly slots by exact timestamp match
//! - Gaps are linearly interpolated per variable
//!
//! Slots before the first or after the last known value of a variable cannot
//! be interpolated and stay empty.

use crate::types::WeatherSample;
use chrono::{Duration, NaiveDateTime};
use std::collections::HashMap;
use tracing::debug;

const SECONDS_PER_HOUR: i64 = 3600;

/// Complete hourly weather table anchored at the earliest sample
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HourlyWeather {
    start: Option<NaiveDateTime>,
    samples: Vec<WeatherSample>,
}

impl HourlyWeather {
    /// Hourly samples in time order
    pub fn samples(&self) -> &[WeatherSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// First slot of the grid
    pub fn start(&self) -> Option<NaiveDateTime> {
        self.start
    }

    /// Last slot of the grid
    pub fn end(&self) -> Option<NaiveDateTime> {
        self.samples.last().map(|s| s.date)
    }

    /// Look up the slot for an exact timestamp.
    ///
    /// Timestamps outside the span or not on the hourly grid have no slot.
    pub fn get(&self, ts: NaiveDateTime) -> Option<&WeatherSample> {
        let start = self.start?;
        let offset = ts.signed_duration_since(start).num_seconds();
        if offset < 0 || offset % SECONDS_PER_HOUR != 0 {
            return None;
        }
        self.samples.get((offset / SECONDS_PER_HOUR) as usize)
    }

    /// Number of slots still missing (precipitation, temperature)
    pub fn missing_counts(&self) -> (usize, usize) {
        let precipitation = self
            .samples
            .iter()
            .filter(|s| s.precipitation.is_none())
            .count();
        let temperature = self
            .samples
            .iter()
            .filter(|s| s.temperature.is_none())
            .count();
        (precipitation, temperature)
    }
}

/// Normalizer for raw weather series
pub struct WeatherNormalizer;

impl WeatherNormalizer {
    /// Deduplicate, resample onto an hourly grid, and interpolate gaps
    pub fn normalize(raw: &[WeatherSample]) -> HourlyWeather {
        let mut by_date: HashMap<NaiveDateTime, &WeatherSample> = HashMap::with_capacity(raw.len());
        for sample in raw {
            by_date.entry(sample.date).or_insert(sample);
        }

        let (start, end) = match (by_date.keys().min(), by_date.keys().max()) {
            (Some(&start), Some(&end)) => (start, end),
            _ => return HourlyWeather::default(),
        };

        let slots = end.signed_duration_since(start).num_seconds() / SECONDS_PER_HOUR + 1;
        let mut dates = Vec::with_capacity(slots as usize);
        let mut precipitation = Vec::with_capacity(slots as usize);
        let mut temperature = Vec::with_capacity(slots as usize);

        for hour in 0..slots {
            let date = start + Duration::hours(hour);
            let matched = by_date.get(&date);
            dates.push(date);
            precipitation.push(matched.and_then(|s| finite(s.precipitation)));
            temperature.push(matched.and_then(|s| finite(s.temperature)));
        }

        let aligned = precipitation.iter().filter(|v| v.is_some()).count();
        interpolate_linear(&mut precipitation);
        interpolate_linear(&mut temperature);

        debug!(
            raw_samples = raw.len(),
            duplicates = raw.len() - by_date.len(),
            hourly_slots = slots,
            aligned_precipitation = aligned,
            "Weather normalized"
        );

        let samples = dates
            .into_iter()
            .zip(precipitation)
            .zip(temperature)
            .map(|((date, precipitation), temperature)| WeatherSample {
                date,
                precipitation,
                temperature,
            })
            .collect();

        HourlyWeather {
            start: Some(start),
            samples,
        }
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Fill interior gaps by linear interpolation between the nearest known
/// neighbours. Leading and trailing gaps are left untouched.
pub fn interpolate_linear(values: &mut [Option<f64>]) {
    let mut last_known: Option<(usize, f64)> = None;

    for idx in 0..values.len() {
        let Some(current) = values[idx] else {
            continue;
        };

        if let Some((prev_idx, prev)) = last_known {
            let span = (idx - prev_idx) as f64;
            for gap in (prev_idx + 1)..idx {
                let fraction = (gap - prev_idx) as f64 / span;
                values[gap] = Some(prev + (current - prev) * fraction);
            }
        }

        last_known = Some((idx, current));
    }
}
