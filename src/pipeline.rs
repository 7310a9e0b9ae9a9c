//! Pipeline orchestration
//!
//! This module provides the public API for bikeflow. It normalizes the weather
//! source once, builds train and test feature tables through the same chain,
//! fits the regressor, and numbers the test predictions.

use crate::calendar::CalendarTagger;
use crate::config::PipelineConfig;
use crate::discretizer::Discretizer;
use crate::error::PipelineError;
use crate::features::{FeatureAssembler, FeatureTable};
use crate::model::{GradientBoostedTrees, Regressor};
use crate::normalizer::{HourlyWeather, WeatherNormalizer};
use crate::output::{number_predictions, write_predictions_file};
use crate::schema::{read_counter_file, read_weather_file, CounterTable};
use crate::types::{CounterRecord, PredictionRow, WeatherSample};
use std::path::Path;
use tracing::{info, info_span};
use uuid::Uuid;

/// Predict the test table from files and write the output file.
///
/// # Arguments
/// * `train` - Training CSV with counter_id, site_id, date and the target column
/// * `test` - Test CSV with counter_id, site_id and date
/// * `weather` - Weather CSV with date, rr3 and t
/// * `output` - Destination of the `Id,<target>` CSV
/// * `config` - Model, threshold and calendar configuration
///
/// # Returns
/// Number of prediction rows written
///
/// Nothing is written unless every stage succeeds.
pub fn predict_files(
    train: &Path,
    test: &Path,
    weather: &Path,
    output: &Path,
    config: &PipelineConfig,
) -> Result<usize, PipelineError> {
    config.validate()?;

    let train_records = read_counter_file(
        train,
        CounterTable::Train {
            target_column: &config.target_column,
        },
    )?;
    let test_records = read_counter_file(test, CounterTable::Test)?;
    let raw_weather = read_weather_file(weather)?;

    let pipeline = PredictionPipeline::from_config(&raw_weather, config)?;
    let mut regressor = GradientBoostedTrees::new(config.model.clone());
    let rows = pipeline.run(&train_records, &test_records, &mut regressor)?;

    write_predictions_file(output, &config.target_column, &rows)?;
    Ok(rows.len())
}

/// Collect the target of every training record
pub fn training_targets(records: &[CounterRecord]) -> Result<Vec<f64>, PipelineError> {
    records
        .iter()
        .enumerate()
        .map(|(idx, record)| record.target.ok_or(PipelineError::MissingTarget(idx)))
        .collect()
}

/// Feature and prediction pipeline over one weather source.
///
/// The normalized weather table is computed once at construction and shared
/// by every dataset and every run on this value.
pub struct PredictionPipeline {
    weather: HourlyWeather,
    calendar: CalendarTagger,
    discretizer: Discretizer,
}

impl PredictionPipeline {
    pub fn new(raw_weather: &[WeatherSample], calendar: CalendarTagger, discretizer: Discretizer) -> Self {
        let weather = WeatherNormalizer::normalize(raw_weather);
        let (missing_precipitation, missing_temperature) = weather.missing_counts();

        info!(
            raw_samples = raw_weather.len(),
            hourly_slots = weather.len(),
            start = ?weather.start(),
            end = ?weather.end(),
            missing_precipitation,
            missing_temperature,
            "Hourly weather table ready"
        );

        Self {
            weather,
            calendar,
            discretizer,
        }
    }

    pub fn from_config(
        raw_weather: &[WeatherSample],
        config: &PipelineConfig,
    ) -> Result<Self, PipelineError> {
        let calendar = CalendarTagger::from_config(&config.calendar)?;
        Ok(Self::new(raw_weather, calendar, config.thresholds))
    }

    pub fn weather(&self) -> &HourlyWeather {
        &self.weather
    }

    pub fn calendar(&self) -> &CalendarTagger {
        &self.calendar
    }

    /// Build the feature table of one dataset
    pub fn build_features(&self, records: &[CounterRecord]) -> FeatureTable {
        FeatureAssembler::new(&self.weather, &self.calendar, self.discretizer).assemble(records)
    }

    /// Fit on the training records and predict the test records.
    ///
    /// Train and test are assembled separately and never mixed. Any fit or
    /// predict failure aborts the run.
    pub fn run<R: Regressor + ?Sized>(
        &self,
        train: &[CounterRecord],
        test: &[CounterRecord],
        regressor: &mut R,
    ) -> Result<Vec<PredictionRow>, PipelineError> {
        let span = info_span!("prediction_run", run_id = %Uuid::new_v4());
        let _guard = span.enter();

        let target = training_targets(train)?;
        let train_features = self.build_features(train);
        let test_features = self.build_features(test);

        info!(
            train_rows = train_features.len(),
            test_rows = test_features.len(),
            "Feature tables assembled"
        );

        regressor.fit(&train_features, &target)?;
        let predictions = regressor.predict(&test_features)?;

        if predictions.len() != test_features.len() {
            return Err(PipelineError::ModelError(format!(
                "regressor returned {} predictions for {} rows",
                predictions.len(),
                test_features.len()
            )));
        }

        info!(predictions = predictions.len(), "Prediction run complete");
        Ok(number_predictions(predictions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::CalendarConfig;
    use crate::model::BoostingParams;
    use crate::types::{parse_timestamp, CounterId, PeriodCode, SiteId};
    use pretty_assertions::assert_eq;
    use std::fs;

    fn record(site: &str, date: &str, target: Option<f64>) -> CounterRecord {
        CounterRecord {
            counter_id: CounterId(format!("{}-c", site)),
            site_id: SiteId(site.to_string()),
            date: parse_timestamp(date).unwrap(),
            target,
        }
    }

    fn weather_at(dates: &[&str]) -> Vec<WeatherSample> {
        dates
            .iter()
            .map(|d| WeatherSample {
                date: parse_timestamp(d).unwrap(),
                precipitation: Some(0.0),
                temperature: Some(12.0),
            })
            .collect()
    }

    fn default_pipeline(weather: &[WeatherSample]) -> PredictionPipeline {
        PredictionPipeline::from_config(weather, &PipelineConfig::default()).unwrap()
    }

    /// Predicts the mean target for every row
    #[derive(Default)]
    struct MeanRegressor {
        mean: Option<f64>,
    }

    impl Regressor for MeanRegressor {
        fn fit(&mut self, features: &FeatureTable, target: &[f64]) -> Result<(), PipelineError> {
            assert_eq!(features.len(), target.len());
            self.mean = Some(target.iter().sum::<f64>() / target.len() as f64);
            Ok(())
        }

        fn predict(&self, features: &FeatureTable) -> Result<Vec<f64>, PipelineError> {
            let mean = self
                .mean
                .ok_or_else(|| PipelineError::ModelError("not fitted".to_string()))?;
            Ok(vec![mean; features.len()])
        }
    }

    struct FailingRegressor;

    impl Regressor for FailingRegressor {
        fn fit(&mut self, _: &FeatureTable, _: &[f64]) -> Result<(), PipelineError> {
            Err(PipelineError::ModelError("boom".to_string()))
        }

        fn predict(&self, _: &FeatureTable) -> Result<Vec<f64>, PipelineError> {
            unreachable!("fit always fails")
        }
    }

    #[test]
    fn test_lockdown_and_normal_records() {
        let train = vec![
            record("1", "2020-04-01 08:00:00", Some(2.0)),
            record("1", "2020-04-01 09:00:00", Some(2.5)),
            record("1", "2021-09-20 08:00:00", Some(5.0)),
        ];
        let weather = weather_at(&[
            "2020-04-01 08:00:00",
            "2020-04-01 09:00:00",
            "2021-09-20 08:00:00",
        ]);
        let pipeline = default_pipeline(&weather);

        let first = pipeline.build_features(&train);
        let codes: Vec<PeriodCode> = first.rows().iter().map(|r| r.period_code).collect();
        assert_eq!(
            codes,
            vec![PeriodCode::Lockdown, PeriodCode::Lockdown, PeriodCode::Normal]
        );
        assert_eq!(first.missing_weather_rows(), 0);

        // Same input, same table
        let second = default_pipeline(&weather).build_features(&train);
        assert_eq!(first, second);
    }

    #[test]
    fn test_run_numbers_predictions_in_test_order() {
        let train = vec![
            record("1", "2021-09-20 08:00:00", Some(1.0)),
            record("2", "2021-09-20 08:00:00", Some(3.0)),
        ];
        let test = vec![
            record("2", "2021-09-21 08:00:00", None),
            record("1", "2021-09-21 07:00:00", None),
            record("1", "2021-09-21 06:00:00", None),
        ];
        let pipeline = default_pipeline(&weather_at(&["2021-09-20 00:00:00", "2021-09-22 00:00:00"]));

        let rows = pipeline
            .run(&train, &test, &mut MeanRegressor::default())
            .unwrap();

        assert_eq!(
            rows,
            vec![
                PredictionRow { id: 0, value: 2.0 },
                PredictionRow { id: 1, value: 2.0 },
                PredictionRow { id: 2, value: 2.0 },
            ]
        );
    }

    #[test]
    fn test_missing_training_target() {
        let train = vec![record("1", "2021-09-20 08:00:00", None)];
        let pipeline = default_pipeline(&weather_at(&["2021-09-20 08:00:00"]));

        let err = pipeline
            .run(&train, &[], &mut MeanRegressor::default())
            .unwrap_err();
        assert!(matches!(err, PipelineError::MissingTarget(0)));
    }

    #[test]
    fn test_fit_failure_propagates() {
        let train = vec![record("1", "2021-09-20 08:00:00", Some(1.0))];
        let pipeline = default_pipeline(&weather_at(&["2021-09-20 08:00:00"]));

        assert!(pipeline.run(&train, &train, &mut FailingRegressor).is_err());
    }

    #[test]
    fn test_boosted_run_is_repeatable() {
        let mut train = Vec::new();
        for hour in 0..24 {
            let date = format!("2021-09-20 {:02}:00:00", hour);
            let busy = (7..20).contains(&hour);
            train.push(record("1", &date, Some(if busy { 4.0 } else { 1.0 })));
        }
        let test = vec![
            record("1", "2021-09-20 03:00:00", None),
            record("1", "2021-09-20 12:00:00", None),
        ];
        let pipeline = PredictionPipeline::new(
            &weather_at(&["2021-09-20 00:00:00", "2021-09-20 23:00:00"]),
            CalendarTagger::from_config(&CalendarConfig::default()).unwrap(),
            Discretizer::default(),
        );
        let params = BoostingParams {
            learning_rate: 0.5,
            n_estimators: 20,
            max_depth: 3,
            ..Default::default()
        };

        let first = pipeline
            .run(&train, &test, &mut GradientBoostedTrees::new(params.clone()))
            .unwrap();
        let second = pipeline
            .run(&train, &test, &mut GradientBoostedTrees::new(params))
            .unwrap();

        assert_eq!(first, second);
        assert!(first[0].value < first[1].value);
    }

    #[test]
    fn test_predict_files_writes_nothing_on_failure() {
        let dir = std::env::temp_dir().join(format!("bikeflow-pipeline-{}", Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();

        let train = dir.join("train.csv");
        let test = dir.join("test.csv");
        let weather = dir.join("weather.csv");
        let output = dir.join("submission.csv");

        // A header without rows leaves nothing to fit
        fs::write(&train, "counter_id,site_id,date,log_bike_count\n").unwrap();
        fs::write(&test, "counter_id,site_id,date\nc,1,2021-09-21 08:00:00\n").unwrap();
        fs::write(&weather, "date,rr3,t\n2021-09-20 08:00:00,0.0,280.0\n").unwrap();

        let mut config = PipelineConfig::default();
        config.model.n_estimators = 2;

        let err = predict_files(&train, &test, &weather, &output, &config).unwrap_err();
        assert!(matches!(err, PipelineError::ModelError(_)));
        assert!(!output.exists());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_predict_files_tolerates_uncovered_hours() {
        let dir = std::env::temp_dir().join(format!("bikeflow-pipeline-{}", Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();

        let train = dir.join("train.csv");
        let test = dir.join("test.csv");
        let weather = dir.join("weather.csv");
        let output = dir.join("submission.csv");

        fs::write(
            &train,
            "counter_id,site_id,date,log_bike_count\nc,1,2021-09-20 08:00:00,1.0\nc,1,2021-09-20 09:00:00,2.0\n",
        )
        .unwrap();
        // The test hour lies a day past the end of the weather series
        fs::write(&test, "counter_id,site_id,date\nc,1,2021-09-21 08:00:00\n").unwrap();
        fs::write(
            &weather,
            "date,rr3,t\n2021-09-20 08:00:00,0.0,280.0\n2021-09-20 09:00:00,3.0,281.0\n",
        )
        .unwrap();

        let mut config = PipelineConfig::default();
        config.model.n_estimators = 2;

        let written = predict_files(&train, &test, &weather, &output, &config).unwrap();
        assert_eq!(written, 1);
        let content = fs::read_to_string(&output).unwrap();
        assert!(content.starts_with("Id,log_bike_count\n0,"));

        fs::remove_dir_all(&dir).unwrap();
    }
}
