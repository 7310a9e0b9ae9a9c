//! Core types for the bikeflow pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: counter records and weather samples on the way in, feature rows in
//! the middle, and prediction rows on the way out.

use crate::error::PipelineError;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp formats accepted in input tables and interval definitions
const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Parse a naive local timestamp.
///
/// Accepts `YYYY-MM-DD HH:MM:SS`, the ISO `T` separator, minute precision,
/// and bare dates (`YYYY-MM-DD`, interpreted as midnight).
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, PipelineError> {
    let trimmed = raw.trim();

    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(ts);
        }
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| PipelineError::DateParseError(format!("unrecognised timestamp '{}'", raw)))
}

/// Identifier of a physical counting sensor
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CounterId(pub String);

impl CounterId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CounterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a counting site.
///
/// Sites are categories, not quantities: the id is kept as an opaque label
/// even when the source encodes it as a number, so nothing downstream can
/// treat two sites as "close" because their ids are.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(pub String);

impl SiteId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One hourly observation of a counter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterRecord {
    pub counter_id: CounterId,
    pub site_id: SiteId,
    /// Observation hour (naive local time)
    pub date: NaiveDateTime,
    /// Log bike count, present only in training data
    pub target: Option<f64>,
}

/// One weather observation.
///
/// Raw samples may lack either variable; normalized samples only lack a value
/// outside the interpolation range of that variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSample {
    pub date: NaiveDateTime,
    /// Precipitation over the last three hours (mm)
    pub precipitation: Option<f64>,
    /// Air temperature
    pub temperature: Option<f64>,
}

/// Category of a named date interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalCategory {
    Holiday,
    Lockdown,
    Curfew,
}

impl IntervalCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntervalCategory::Holiday => "holiday",
            IntervalCategory::Lockdown => "lockdown",
            IntervalCategory::Curfew => "curfew",
        }
    }
}

/// Closed date interval; `end == None` means open-ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateInterval {
    pub start: NaiveDateTime,
    pub end: Option<NaiveDateTime>,
}

impl DateInterval {
    pub fn closed(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    pub fn open_ended(start: NaiveDateTime) -> Self {
        Self { start, end: None }
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        ts >= self.start && self.end.map_or(true, |end| ts <= end)
    }
}

/// Policy period of a timestamp, ordered by priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodCode {
    Normal = 0,
    Curfew = 1,
    Lockdown = 2,
}

impl PeriodCode {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl Default for PeriodCode {
    fn default() -> Self {
        PeriodCode::Normal
    }
}

/// Calendar components of a timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalFields {
    pub year: i32,
    /// 1-12
    pub month: u32,
    /// 1-31
    pub day: u32,
    /// 0-6, Monday = 0
    pub weekday: u32,
    /// 0-23
    pub hour: u32,
}

/// One row of the feature table, in schema order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub counter_id: CounterId,
    pub site_id: SiteId,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub weekday: u32,
    pub hour: u32,
    pub holiday_flag: u8,
    pub period_code: PeriodCode,
    /// Missing when the hour has no weather coverage
    pub precipitation_flag: Option<u8>,
    /// Missing when the hour has no weather coverage
    pub temperature_flag: Option<u8>,
}

/// One output row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionRow {
    /// 0-based position in the test table
    pub id: usize,
    pub value: f64,
}
