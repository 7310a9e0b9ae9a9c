//! Input column names and header resolution

use crate::error::PipelineError;
use csv::StringRecord;
use std::collections::HashMap;

pub const COUNTER_ID: &str = "counter_id";
pub const SITE_ID: &str = "site_id";
pub const DATE: &str = "date";

/// Default name of the log-count target column
pub const DEFAULT_TARGET: &str = "log_bike_count";

/// Weather source columns
pub const PRECIPITATION: &str = "rr3";
pub const TEMPERATURE: &str = "t";

/// Counter columns known to carry no predictive structure.
///
/// Listed for reporting only: readers resolve columns by name, so these are
/// never read whether or not they are present.
pub const IGNORED_COLUMNS: [&str; 6] = [
    "counter_name",
    "site_name",
    "counter_technical_id",
    "coordinates",
    "counter_installation_date",
    "bike_count",
];

/// Marker values that stand for a missing numeric cell
const MISSING_MARKERS: [&str; 4] = ["", "nan", "na", "mq"];

/// Column positions of a CSV header, looked up by name
#[derive(Debug, Clone)]
pub struct HeaderIndex {
    positions: HashMap<String, usize>,
}

impl HeaderIndex {
    pub fn from_headers(headers: &StringRecord) -> Self {
        let mut positions = HashMap::with_capacity(headers.len());
        for (idx, name) in headers.iter().enumerate() {
            positions.entry(name.trim().to_string()).or_insert(idx);
        }
        Self { positions }
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    /// Position of a required column, or a "missing required column" error
    pub fn require(&self, name: &str) -> Result<usize, PipelineError> {
        self.position(name)
            .ok_or_else(|| PipelineError::MissingColumn(name.to_string()))
    }

    /// Header names that the pipeline never reads
    pub fn ignored<'a>(&'a self, used: &'a [&'a str]) -> impl Iterator<Item = &'a str> + 'a {
        self.positions
            .keys()
            .map(String::as_str)
            .filter(move |name| !used.iter().any(|u| u == name))
    }
}

/// Parse an optional numeric cell
pub fn parse_optional_f64(raw: &str) -> Result<Option<f64>, String> {
    let trimmed = raw.trim();
    if MISSING_MARKERS
        .iter()
        .any(|marker| trimmed.eq_ignore_ascii_case(marker))
    {
        return Ok(None);
    }
    trimmed
        .parse::<f64>()
        .map(|v| Some(v).filter(|v| v.is_finite()))
        .map_err(|e| format!("'{}' is not a number ({})", raw, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_present_and_missing() {
        let index = HeaderIndex::from_headers(&StringRecord::from(vec!["date", " site_id ", "x"]));
        assert_eq!(index.require("site_id").unwrap(), 1);

        let err = index.require("counter_id").unwrap_err();
        assert_eq!(err.to_string(), "missing required column: counter_id");
    }

    #[test]
    fn test_ignored_columns() {
        let index = HeaderIndex::from_headers(&StringRecord::from(vec!["date", "coordinates"]));
        let ignored: Vec<&str> = index.ignored(&[DATE]).collect();
        assert_eq!(ignored, vec!["coordinates"]);
    }

    #[test]
    fn test_parse_optional_f64() {
        assert_eq!(parse_optional_f64("2.5").unwrap(), Some(2.5));
        assert_eq!(parse_optional_f64(" -0.4 ").unwrap(), Some(-0.4));
        assert_eq!(parse_optional_f64("").unwrap(), None);
        assert_eq!(parse_optional_f64("NaN").unwrap(), None);
        assert_eq!(parse_optional_f64("mq").unwrap(), None);
        assert!(parse_optional_f64("rain").is_err());
    }
}
