//! Feature table assembly
//!
//! This module joins counter records with the hourly weather table and the
//! calendar tagger, then projects everything onto the fixed feature schema:
//! - Weather left-join on the exact hour (records without weather are kept)
//! - Precipitation and temperature discretization
//! - Holiday flag and policy period code
//! - Calendar components of the timestamp
//!
//! Anything else carried by the input (counter and site names, technical ids,
//! coordinates, installation dates, raw counts) never reaches the table.

use crate::calendar::CalendarTagger;
use crate::discretizer::Discretizer;
use crate::normalizer::HourlyWeather;
use crate::temporal;
use crate::types::{CounterRecord, FeatureRow};
use tracing::{debug, warn};

/// Ordered feature columns consumed by the regressor
pub const FEATURE_SCHEMA: [&str; 11] = [
    "counter_id",
    "site_id",
    "year",
    "month",
    "day",
    "weekday",
    "hour",
    "holiday_flag",
    "period_code",
    "precipitation_flag",
    "temperature_flag",
];

/// Columns holding category labels rather than quantities
pub const CATEGORICAL_COLUMNS: [&str; 2] = ["counter_id", "site_id"];

/// A single cell of the feature table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureValue<'a> {
    Category(&'a str),
    Integer(i64),
    Missing,
}

impl FeatureRow {
    /// Cell at `column` (index into [`FEATURE_SCHEMA`])
    pub fn value(&self, column: usize) -> Option<FeatureValue<'_>> {
        let value = match column {
            0 => FeatureValue::Category(self.counter_id.as_str()),
            1 => FeatureValue::Category(self.site_id.as_str()),
            2 => FeatureValue::Integer(i64::from(self.year)),
            3 => FeatureValue::Integer(i64::from(self.month)),
            4 => FeatureValue::Integer(i64::from(self.day)),
            5 => FeatureValue::Integer(i64::from(self.weekday)),
            6 => FeatureValue::Integer(i64::from(self.hour)),
            7 => FeatureValue::Integer(i64::from(self.holiday_flag)),
            8 => FeatureValue::Integer(i64::from(self.period_code.code())),
            9 => flag_value(self.precipitation_flag),
            10 => flag_value(self.temperature_flag),
            _ => return None,
        };
        Some(value)
    }

    /// True when either weather flag is missing
    pub fn has_missing_weather(&self) -> bool {
        self.precipitation_flag.is_none() || self.temperature_flag.is_none()
    }
}

fn flag_value(flag: Option<u8>) -> FeatureValue<'static> {
    flag.map_or(FeatureValue::Missing, |f| FeatureValue::Integer(i64::from(f)))
}

/// Feature table with its categorical column metadata
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn new(rows: Vec<FeatureRow>) -> Self {
        Self { rows }
    }

    /// Column names in order
    pub fn columns(&self) -> &'static [&'static str] {
        &FEATURE_SCHEMA
    }

    /// Columns that must be handled as categories by the regressor
    pub fn categorical_columns(&self) -> &'static [&'static str] {
        &CATEGORICAL_COLUMNS
    }

    pub fn is_categorical(&self, column: usize) -> bool {
        self.columns()
            .get(column)
            .is_some_and(|name| self.categorical_columns().contains(name))
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn value(&self, row: usize, column: usize) -> Option<FeatureValue<'_>> {
        self.rows.get(row).and_then(|r| r.value(column))
    }

    /// Rows without full weather coverage
    pub fn missing_weather_rows(&self) -> usize {
        self.rows.iter().filter(|r| r.has_missing_weather()).count()
    }
}

/// Assembler for one dataset's feature table
pub struct FeatureAssembler<'a> {
    weather: &'a HourlyWeather,
    calendar: &'a CalendarTagger,
    discretizer: Discretizer,
}

impl<'a> FeatureAssembler<'a> {
    pub fn new(
        weather: &'a HourlyWeather,
        calendar: &'a CalendarTagger,
        discretizer: Discretizer,
    ) -> Self {
        Self {
            weather,
            calendar,
            discretizer,
        }
    }

    /// Build one feature row
    pub fn assemble_record(&self, record: &CounterRecord) -> FeatureRow {
        let sample = self.weather.get(record.date);
        let precipitation = sample.and_then(|s| s.precipitation);
        let temperature = sample.and_then(|s| s.temperature);
        let tags = self.calendar.tag(record.date);
        let time = temporal::extract(record.date);

        FeatureRow {
            counter_id: record.counter_id.clone(),
            site_id: record.site_id.clone(),
            year: time.year,
            month: time.month,
            day: time.day,
            weekday: time.weekday,
            hour: time.hour,
            holiday_flag: tags.holiday_flag,
            period_code: tags.period_code,
            precipitation_flag: self.discretizer.precipitation_flag(precipitation),
            temperature_flag: self.discretizer.temperature_flag(temperature),
        }
    }

    /// Build the feature table, one row per record, in record order
    pub fn assemble(&self, records: &[CounterRecord]) -> FeatureTable {
        let table = FeatureTable::new(records.iter().map(|r| self.assemble_record(r)).collect());

        let missing = table.missing_weather_rows();
        if missing > 0 {
            warn!(
                rows = table.len(),
                missing_weather = missing,
                "Records without weather coverage"
            );
        }
        debug!(rows = table.len(), "Feature table assembled");

        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::CalendarConfig;
    use crate::normalizer::WeatherNormalizer;
    use crate::types::{parse_timestamp, CounterId, PeriodCode, SiteId, WeatherSample};
    use pretty_assertions::assert_eq;

    fn record(date: &str) -> CounterRecord {
        CounterRecord {
            counter_id: CounterId("100007049-102007049".to_string()),
            site_id: SiteId("100007049".to_string()),
            date: parse_timestamp(date).unwrap(),
            target: None,
        }
    }

    fn weather() -> HourlyWeather {
        WeatherNormalizer::normalize(&[
            WeatherSample {
                date: parse_timestamp("2021-03-08 12:00:00").unwrap(),
                precipitation: Some(0.0),
                temperature: Some(2.0),
            },
            WeatherSample {
                date: parse_timestamp("2021-03-08 15:00:00").unwrap(),
                precipitation: Some(6.0),
                temperature: Some(11.0),
            },
        ])
    }

    #[test]
    fn test_schema_order() {
        let table = FeatureTable::default();
        assert_eq!(
            table.columns().to_vec(),
            vec![
                "counter_id",
                "site_id",
                "year",
                "month",
                "day",
                "weekday",
                "hour",
                "holiday_flag",
                "period_code",
                "precipitation_flag",
                "temperature_flag",
            ]
        );
        assert_eq!(table.categorical_columns().to_vec(), vec!["counter_id", "site_id"]);
        assert!(table.is_categorical(1));
        assert!(table.is_categorical(0));
        assert!(!table.is_categorical(2));
        assert!(!table.is_categorical(99));
    }

    #[test]
    fn test_assemble_record() {
        let weather = weather();
        let calendar = CalendarTagger::from_config(&CalendarConfig::default()).unwrap();
        let assembler = FeatureAssembler::new(&weather, &calendar, Discretizer::default());

        // 14:00 interpolates to precipitation 4.0 and temperature 8.0
        let row = assembler.assemble_record(&record("2021-03-08 14:00:00"));

        assert_eq!(row.year, 2021);
        assert_eq!(row.month, 3);
        assert_eq!(row.day, 8);
        assert_eq!(row.weekday, 0);
        assert_eq!(row.hour, 14);
        // Last day of the winter holidays is midnight only
        assert_eq!(row.holiday_flag, 0);
        assert_eq!(row.period_code, PeriodCode::Curfew);
        assert_eq!(row.precipitation_flag, Some(1));
        assert_eq!(row.temperature_flag, Some(1));
        assert_eq!(row.value(1), Some(FeatureValue::Category("100007049")));
        assert_eq!(row.value(8), Some(FeatureValue::Integer(1)));
        assert_eq!(row.value(11), None);
    }

    #[test]
    fn test_left_join_keeps_uncovered_records() {
        let weather = weather();
        let calendar = CalendarTagger::default();
        let assembler = FeatureAssembler::new(&weather, &calendar, Discretizer::default());

        let records = vec![
            record("2021-03-08 13:00:00"),
            record("2021-03-09 08:00:00"),
        ];
        let table = assembler.assemble(&records);

        assert_eq!(table.len(), 2);
        assert_eq!(table.missing_weather_rows(), 1);
        assert_eq!(table.value(0, 9), Some(FeatureValue::Integer(0)));
        assert_eq!(table.value(1, 9), Some(FeatureValue::Missing));
        assert_eq!(table.value(1, 10), Some(FeatureValue::Missing));
        assert_eq!(table.rows()[1].hour, 8);
    }
}
