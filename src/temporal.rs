//! Temporal feature extraction
//!
//! Timestamps are naive local time; no timezone conversion happens anywhere in
//! the pipeline. Weekdays follow the Monday = 0 convention.

use crate::types::TemporalFields;
use chrono::{Datelike, NaiveDateTime, Timelike};

/// Split a timestamp into its calendar components
pub fn extract(ts: NaiveDateTime) -> TemporalFields {
    TemporalFields {
        year: ts.year(),
        month: ts.month(),
        day: ts.day(),
        weekday: ts.weekday().num_days_from_monday(),
        hour: ts.hour(),
    }
}
