//! CSV readers for counter tables and the weather source
//!
//! Columns are resolved by header name, so input column order does not
//! matter. A missing required column fails before any row is read.

use crate::error::PipelineError;
use crate::schema::columns::{
    parse_optional_f64, HeaderIndex, COUNTER_ID, DATE, PRECIPITATION, SITE_ID, TEMPERATURE,
};
use crate::types::{parse_timestamp, CounterId, CounterRecord, SiteId, WeatherSample};
use csv::{ReaderBuilder, StringRecord};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Which counter table is being read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterTable<'a> {
    /// Training table with the named target column
    Train { target_column: &'a str },
    /// Test table; a target column, if present, is not read
    Test,
}

impl CounterTable<'_> {
    fn label(&self) -> &'static str {
        match self {
            CounterTable::Train { .. } => "train",
            CounterTable::Test => "test",
        }
    }
}

struct CounterColumns {
    counter_id: usize,
    site_id: usize,
    date: usize,
    target: Option<usize>,
}

/// Read counter records from any CSV source
pub fn read_counter_records<R: Read>(
    source: R,
    table: CounterTable<'_>,
) -> Result<Vec<CounterRecord>, PipelineError> {
    let mut reader = ReaderBuilder::new().trim(csv::Trim::All).from_reader(source);
    let headers = HeaderIndex::from_headers(reader.headers()?);

    let columns = CounterColumns {
        counter_id: headers.require(COUNTER_ID)?,
        site_id: headers.require(SITE_ID)?,
        date: headers.require(DATE)?,
        target: match table {
            CounterTable::Train { target_column } => Some(headers.require(target_column)?),
            CounterTable::Test => None,
        },
    };

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        records.push(parse_counter_row(&row, &columns)?);
    }

    debug!(table = table.label(), rows = records.len(), "Counter table read");
    Ok(records)
}

/// Read a counter table from a CSV file
pub fn read_counter_file(
    path: &Path,
    table: CounterTable<'_>,
) -> Result<Vec<CounterRecord>, PipelineError> {
    let records = read_counter_records(File::open(path)?, table)?;
    info!(
        path = %path.display(),
        table = table.label(),
        rows = records.len(),
        "Loaded counter table"
    );
    Ok(records)
}

fn parse_counter_row(
    row: &StringRecord,
    columns: &CounterColumns,
) -> Result<CounterRecord, PipelineError> {
    let line = line_of(row);
    let date = parse_timestamp(cell(row, columns.date))
        .map_err(|e| PipelineError::DateParseError(format!("line {}: {}", line, e)))?;

    let target = match columns.target {
        Some(idx) => parse_optional_f64(cell(row, idx))
            .map_err(|e| PipelineError::ParseError(format!("line {}: {}", line, e)))?,
        None => None,
    };

    Ok(CounterRecord {
        counter_id: CounterId(cell(row, columns.counter_id).to_string()),
        site_id: SiteId(cell(row, columns.site_id).to_string()),
        date,
        target,
    })
}

/// Read weather samples from any CSV source.
///
/// Only `date`, `rr3` and `t` are read; every other column is ignored.
pub fn read_weather<R: Read>(source: R) -> Result<Vec<WeatherSample>, PipelineError> {
    let mut reader = ReaderBuilder::new().trim(csv::Trim::All).from_reader(source);
    let headers = HeaderIndex::from_headers(reader.headers()?);

    let date_idx = headers.require(DATE)?;
    let precipitation_idx = headers.require(PRECIPITATION)?;
    let temperature_idx = headers.require(TEMPERATURE)?;

    let mut samples = Vec::new();
    for row in reader.records() {
        let row = row?;
        let line = line_of(&row);
        let parse = |idx: usize| {
            parse_optional_f64(cell(&row, idx))
                .map_err(|e| PipelineError::ParseError(format!("line {}: {}", line, e)))
        };

        samples.push(WeatherSample {
            date: parse_timestamp(cell(&row, date_idx))
                .map_err(|e| PipelineError::DateParseError(format!("line {}: {}", line, e)))?,
            precipitation: parse(precipitation_idx)?,
            temperature: parse(temperature_idx)?,
        });
    }

    Ok(samples)
}

/// Read the weather source from a CSV file
pub fn read_weather_file(path: &Path) -> Result<Vec<WeatherSample>, PipelineError> {
    let samples = read_weather(File::open(path)?)?;
    info!(path = %path.display(), samples = samples.len(), "Loaded weather source");
    Ok(samples)
}

fn cell(row: &StringRecord, idx: usize) -> &str {
    row.get(idx).unwrap_or_default()
}

fn line_of(row: &StringRecord) -> u64 {
    row.position().map_or(0, |p| p.line())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::columns::DEFAULT_TARGET;
    use pretty_assertions::assert_eq;

    const TRAIN_CSV: &str = "\
counter_id,counter_name,site_id,site_name,bike_count,date,counter_installation_date,coordinates,counter_technical_id,log_bike_count
100007049-102007049,28 boulevard Diderot E-O,100007049,28 boulevard Diderot,0.0,2020-09-01 02:00:00,2013-01-18,\"48.846,2.375\",Y2H15027244,0.0
100007049-102007049,28 boulevard Diderot E-O,100007049,28 boulevard Diderot,1.0,2020-09-01 03:00:00,2013-01-18,\"48.846,2.375\",Y2H15027244,0.6931471805599453
";

    #[test]
    fn test_read_train_table() {
        let records = read_counter_records(
            TRAIN_CSV.as_bytes(),
            CounterTable::Train {
                target_column: DEFAULT_TARGET,
            },
        )
        .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].counter_id.as_str(), "100007049-102007049");
        assert_eq!(records[0].site_id.as_str(), "100007049");
        assert_eq!(records[0].target, Some(0.0));
        assert_eq!(
            records[1].date,
            parse_timestamp("2020-09-01 03:00:00").unwrap()
        );
    }

    #[test]
    fn test_column_order_does_not_matter() {
        let shuffled = "date,site_id,counter_id\n2021-01-01 05:00:00,42,c-1\n";
        let records = read_counter_records(shuffled.as_bytes(), CounterTable::Test).unwrap();

        assert_eq!(records[0].counter_id.as_str(), "c-1");
        assert_eq!(records[0].site_id.as_str(), "42");
        assert_eq!(records[0].target, None);
    }

    #[test]
    fn test_test_table_ignores_target() {
        let records = read_counter_records(TRAIN_CSV.as_bytes(), CounterTable::Test).unwrap();
        assert!(records.iter().all(|r| r.target.is_none()));
    }

    #[test]
    fn test_missing_column_fails_fast() {
        let csv = "counter_id,date\nc-1,2021-01-01 05:00:00\n";
        let err = read_counter_records(csv.as_bytes(), CounterTable::Test).unwrap_err();
        assert_eq!(err.to_string(), "missing required column: site_id");

        let err = read_counter_records(
            "counter_id,site_id,date\n".as_bytes(),
            CounterTable::Train {
                target_column: DEFAULT_TARGET,
            },
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn(c) if c == DEFAULT_TARGET));
    }

    #[test]
    fn test_bad_timestamp_reports_line() {
        let csv = "counter_id,site_id,date\nc-1,1,2021-01-01 05:00:00\nc-1,1,yesterday\n";
        let err = read_counter_records(csv.as_bytes(), CounterTable::Test).unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_read_weather() {
        let csv = "\
numer_sta,date,pmer,t,rr3
7149,2021-01-01 00:00:00,100720,275.15,0.2
7149,2021-01-01 03:00:00,100700,,mq
";
        let samples = read_weather(csv.as_bytes()).unwrap();

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].precipitation, Some(0.2));
        assert_eq!(samples[0].temperature, Some(275.15));
        assert_eq!(samples[1].precipitation, None);
        assert_eq!(samples[1].temperature, None);
    }

    #[test]
    fn test_weather_requires_columns() {
        let err = read_weather("date,t\n2021-01-01 00:00:00,3.0\n".as_bytes()).unwrap_err();
        assert_eq!(err.to_string(), "missing required column: rr3");
    }
}
