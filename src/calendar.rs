//! Calendar interval tagging
//!
//! Each record timestamp is tested against three interval categories:
//! school holidays, lockdowns and curfews. Holidays produce an independent
//! flag; lockdowns and curfews collapse into a single period code where a
//! lockdown always wins over a curfew.
//!
//! Interval lists are sorted once at load time. Membership is a binary search
//! over interval starts plus a running maximum of interval ends, so tagging a
//! timestamp never rescans the whole list and never produces more than one
//! result per timestamp.

use crate::error::PipelineError;
use crate::types::{parse_timestamp, DateInterval, IntervalCategory, PeriodCode};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Paris-area school holidays (zone C)
const SCHOOL_HOLIDAYS: &[(&str, &str)] = &[
    ("2020-10-17", "2020-11-02"),
    ("2020-12-19", "2021-01-04"),
    ("2021-02-20", "2021-03-08"),
    ("2021-04-10", "2021-04-26"),
    ("2021-07-10", "2021-09-01"),
    ("2021-10-23", "2021-11-08"),
    ("2021-12-18", "2022-01-03"),
];

/// National lockdowns
const LOCKDOWNS: &[(&str, &str)] = &[
    ("2020-03-17", "2020-05-11"),
    ("2020-10-30", "2020-12-15"),
    ("2021-04-03", "2021-05-03"),
];

/// Evening curfews
const CURFEWS: &[(&str, &str)] = &[("2020-10-17", "2020-12-15"), ("2020-12-15", "2021-06-01")];

/// Textual interval definition, parsed when the tagger is built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalBounds {
    pub start: String,
    /// Inclusive end; omitted means "until further notice"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

impl IntervalBounds {
    fn from_pair((start, end): &(&str, &str)) -> Self {
        Self {
            start: start.to_string(),
            end: Some(end.to_string()),
        }
    }
}

/// Interval definitions for every category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    pub holidays: Vec<IntervalBounds>,
    pub lockdowns: Vec<IntervalBounds>,
    pub curfews: Vec<IntervalBounds>,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            holidays: SCHOOL_HOLIDAYS.iter().map(IntervalBounds::from_pair).collect(),
            lockdowns: LOCKDOWNS.iter().map(IntervalBounds::from_pair).collect(),
            curfews: CURFEWS.iter().map(IntervalBounds::from_pair).collect(),
        }
    }
}

/// Sorted intervals of one category
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntervalSet {
    starts: Vec<NaiveDateTime>,
    /// Furthest end among intervals `0..=i`; `None` once an open interval is seen
    reach: Vec<Option<NaiveDateTime>>,
}

impl IntervalSet {
    pub fn new(mut intervals: Vec<DateInterval>) -> Self {
        intervals.sort_by_key(|interval| interval.start);

        let mut starts = Vec::with_capacity(intervals.len());
        let mut reach = Vec::with_capacity(intervals.len());
        let mut furthest: Option<Option<NaiveDateTime>> = None;

        for interval in &intervals {
            let next = match (furthest, interval.end) {
                (None, end) => end,
                (Some(None), _) | (Some(Some(_)), None) => None,
                (Some(Some(a)), Some(b)) => Some(a.max(b)),
            };
            furthest = Some(next);
            starts.push(interval.start);
            reach.push(next);
        }

        Self { starts, reach }
    }

    pub fn len(&self) -> usize {
        self.starts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    /// True when any interval contains `ts` (bounds inclusive)
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        let started = self.starts.partition_point(|start| *start <= ts);
        if started == 0 {
            return false;
        }
        match self.reach[started - 1] {
            None => true,
            Some(end) => ts <= end,
        }
    }
}

/// Calendar tags of one timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarTags {
    pub holiday_flag: u8,
    pub period_code: PeriodCode,
}

/// Tagger over the three interval categories
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalendarTagger {
    holidays: IntervalSet,
    lockdowns: IntervalSet,
    curfews: IntervalSet,
}

impl CalendarTagger {
    pub fn new(holidays: IntervalSet, lockdowns: IntervalSet, curfews: IntervalSet) -> Self {
        Self {
            holidays,
            lockdowns,
            curfews,
        }
    }

    /// Parse a calendar configuration.
    ///
    /// Only curfews may be open-ended; a holiday or lockdown without an end,
    /// or any interval ending before it starts, is rejected.
    pub fn from_config(config: &CalendarConfig) -> Result<Self, PipelineError> {
        Ok(Self {
            holidays: parse_category(&config.holidays, IntervalCategory::Holiday)?,
            lockdowns: parse_category(&config.lockdowns, IntervalCategory::Lockdown)?,
            curfews: parse_category(&config.curfews, IntervalCategory::Curfew)?,
        })
    }

    /// Number of intervals per category (holidays, lockdowns, curfews)
    pub fn interval_counts(&self) -> (usize, usize, usize) {
        (self.holidays.len(), self.lockdowns.len(), self.curfews.len())
    }

    pub fn holiday_flag(&self, ts: NaiveDateTime) -> u8 {
        u8::from(self.holidays.contains(ts))
    }

    pub fn period_code(&self, ts: NaiveDateTime) -> PeriodCode {
        if self.lockdowns.contains(ts) {
            PeriodCode::Lockdown
        } else if self.curfews.contains(ts) {
            PeriodCode::Curfew
        } else {
            PeriodCode::Normal
        }
    }

    pub fn tag(&self, ts: NaiveDateTime) -> CalendarTags {
        CalendarTags {
            holiday_flag: self.holiday_flag(ts),
            period_code: self.period_code(ts),
        }
    }
}

fn parse_category(
    bounds: &[IntervalBounds],
    category: IntervalCategory,
) -> Result<IntervalSet, PipelineError> {
    let mut intervals = Vec::with_capacity(bounds.len());

    for entry in bounds {
        let start = parse_timestamp(&entry.start)?;
        let interval = match &entry.end {
            Some(end) => {
                let end = parse_timestamp(end)?;
                if end < start {
                    return Err(PipelineError::ConfigError(format!(
                        "{} interval ends before it starts ({} > {})",
                        category.as_str(),
                        entry.start,
                        entry.end.as_deref().unwrap_or_default()
                    )));
                }
                DateInterval::closed(start, end)
            }
            None if category == IntervalCategory::Curfew => DateInterval::open_ended(start),
            None => {
                return Err(PipelineError::ConfigError(format!(
                    "{} interval starting {} has no end",
                    category.as_str(),
                    entry.start
                )));
            }
        };
        intervals.push(interval);
    }

    Ok(IntervalSet::new(intervals))
}
