//! bikeflow CLI - command-line interface for the bikeflow pipeline
//!
//! Commands:
//! - predict: Fit on the training table and write test predictions
//! - validate: Check input schemas and report feature coverage
//! - schema: Print the feature schema

use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bikeflow::pipeline::PredictionPipeline;
use bikeflow::schema::{
    read_counter_file, read_weather_file, CounterTable, HeaderIndex, COUNTER_ID, DATE,
    IGNORED_COLUMNS, SITE_ID,
};
use bikeflow::{
    predict_files, FeatureTable, PipelineConfig, PipelineError, BIKEFLOW_VERSION,
    CATEGORICAL_COLUMNS, FEATURE_SCHEMA,
};

/// bikeflow - hourly bicycle counter forecasting
#[derive(Parser)]
#[command(name = "bikeflow")]
#[command(version = BIKEFLOW_VERSION)]
#[command(about = "Predict hourly bicycle counts from counters, calendar and weather", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit on the training table and write predictions for the test table
    Predict {
        /// Training CSV (counter_id, site_id, date, target)
        #[arg(long)]
        train: PathBuf,

        /// Test CSV (counter_id, site_id, date)
        #[arg(long)]
        test: PathBuf,

        /// Weather CSV (date, rr3, t)
        #[arg(long)]
        weather: PathBuf,

        /// Output CSV path
        #[arg(short, long, default_value = "submission.csv")]
        output: PathBuf,

        /// JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the boosting learning rate
        #[arg(long)]
        learning_rate: Option<f64>,

        /// Override the number of boosting rounds
        #[arg(long)]
        n_estimators: Option<usize>,

        /// Override the target column name
        #[arg(long)]
        target_column: Option<String>,
    },

    /// Check input schemas and report feature coverage without fitting
    Validate {
        #[arg(long)]
        train: PathBuf,

        #[arg(long)]
        test: PathBuf,

        #[arg(long)]
        weather: PathBuf,

        /// JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the feature schema
    Schema {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr);

    if json {
        builder.json().with_current_span(true).init();
    } else {
        builder.init();
    }
}

fn run(command: Commands) -> Result<(), BikeflowCliError> {
    match command {
        Commands::Predict {
            train,
            test,
            weather,
            output,
            config,
            learning_rate,
            n_estimators,
            target_column,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(rate) = learning_rate {
                config.model.learning_rate = rate;
            }
            if let Some(rounds) = n_estimators {
                config.model.n_estimators = rounds;
            }
            if let Some(column) = target_column {
                config.target_column = column;
            }

            let rows = predict_files(&train, &test, &weather, &output, &config)?;
            info!(rows, output = %output.display(), "Done");
            Ok(())
        }

        Commands::Validate {
            train,
            test,
            weather,
            config,
            json,
        } => cmd_validate(&train, &test, &weather, config.as_deref(), json),

        Commands::Schema { json } => cmd_schema(json),
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig, BikeflowCliError> {
    match path {
        Some(path) => Ok(PipelineConfig::from_file(path)?),
        None => Ok(PipelineConfig::default()),
    }
}

fn cmd_validate(
    train: &Path,
    test: &Path,
    weather: &Path,
    config: Option<&Path>,
    json: bool,
) -> Result<(), BikeflowCliError> {
    let config = load_config(config)?;

    let train_records = read_counter_file(
        train,
        CounterTable::Train {
            target_column: &config.target_column,
        },
    )?;
    let test_records = read_counter_file(test, CounterTable::Test)?;
    let raw_weather = read_weather_file(weather)?;

    let pipeline = PredictionPipeline::from_config(&raw_weather, &config)?;
    let (holidays, lockdowns, curfews) = pipeline.calendar().interval_counts();

    let train_used = [COUNTER_ID, SITE_ID, DATE, config.target_column.as_str()];
    let report = ValidationReport {
        weather_slots: pipeline.weather().len(),
        weather_start: pipeline.weather().start().map(|t| t.to_string()),
        weather_end: pipeline.weather().end().map(|t| t.to_string()),
        intervals: IntervalReport {
            holidays,
            lockdowns,
            curfews,
        },
        train: DatasetReport::new(
            &pipeline.build_features(&train_records),
            ignored_columns(train, &train_used)?,
        ),
        test: DatasetReport::new(
            &pipeline.build_features(&test_records),
            ignored_columns(test, &[COUNTER_ID, SITE_ID, DATE])?,
        ),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!(
            "Weather: {} hourly slots ({} .. {})",
            report.weather_slots,
            report.weather_start.as_deref().unwrap_or("-"),
            report.weather_end.as_deref().unwrap_or("-")
        );
        println!(
            "Intervals: {} holidays, {} lockdowns, {} curfews",
            holidays, lockdowns, curfews
        );
        for (name, dataset) in [("train", &report.train), ("test", &report.test)] {
            println!("\n{}:", name);
            println!("  Rows:             {}", dataset.rows);
            println!("  Missing weather:  {}", dataset.missing_weather);
            println!("  Holiday rows:     {}", dataset.holiday_rows);
            println!("  Period codes:     {:?}", dataset.period_codes);
            println!("  Ignored columns:  {}", dataset.ignored_columns.join(", "));
        }
    }

    let missing = report.train.missing_weather + report.test.missing_weather;
    if missing > 0 {
        warn!(
            rows = missing,
            "Rows outside the weather coverage will follow the learned missing-value branches"
        );
    }
    Ok(())
}

fn ignored_columns(path: &Path, used: &[&str]) -> Result<Vec<String>, BikeflowCliError> {
    let mut reader = csv::Reader::from_reader(File::open(path)?);
    let headers = HeaderIndex::from_headers(reader.headers().map_err(PipelineError::from)?);
    let mut ignored: Vec<String> = headers.ignored(used).map(str::to_string).collect();
    ignored.sort();
    Ok(ignored)
}

fn cmd_schema(json: bool) -> Result<(), BikeflowCliError> {
    if json {
        let schema = serde_json::json!({
            "columns": FEATURE_SCHEMA,
            "categorical": CATEGORICAL_COLUMNS,
            "weekday": "0-6, Monday = 0",
            "period_code": { "0": "normal", "1": "curfew", "2": "lockdown" },
            "dropped_input_columns": IGNORED_COLUMNS,
        });
        println!("{}", serde_json::to_string_pretty(&schema)?);
    } else {
        println!("Feature schema");
        println!();
        for (idx, column) in FEATURE_SCHEMA.iter().enumerate() {
            let kind = if CATEGORICAL_COLUMNS.contains(column) {
                "categorical"
            } else {
                "integer"
            };
            println!("  {:>2}. {:<20} {}", idx, column, kind);
        }
        println!();
        println!("weekday: 0-6, Monday = 0");
        println!("period_code: 0 = normal, 1 = curfew, 2 = lockdown");
        println!("precipitation_flag / temperature_flag: empty when the hour has no weather");
        println!("dropped input columns: {}", IGNORED_COLUMNS.join(", "));
    }
    Ok(())
}

// Error types

#[derive(Debug)]
enum BikeflowCliError {
    Io(io::Error),
    Pipeline(PipelineError),
    Json(serde_json::Error),
}

impl From<io::Error> for BikeflowCliError {
    fn from(e: io::Error) -> Self {
        BikeflowCliError::Io(e)
    }
}

impl From<PipelineError> for BikeflowCliError {
    fn from(e: PipelineError) -> Self {
        BikeflowCliError::Pipeline(e)
    }
}

impl From<serde_json::Error> for BikeflowCliError {
    fn from(e: serde_json::Error) -> Self {
        BikeflowCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<BikeflowCliError> for CliError {
    fn from(e: BikeflowCliError) -> Self {
        match e {
            BikeflowCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            BikeflowCliError::Pipeline(e) => {
                let (code, hint) = match &e {
                    PipelineError::MissingColumn(_) => (
                        "MISSING_COLUMN",
                        "Check the input headers with 'bikeflow validate'",
                    ),
                    PipelineError::ModelError(_) => (
                        "MODEL_ERROR",
                        "Check the training targets and the model section of the configuration",
                    ),
                    PipelineError::ConfigError(_) | PipelineError::JsonError(_) => {
                        ("CONFIG_ERROR", "Check the configuration file")
                    }
                    _ => ("PIPELINE_ERROR", "Check input format"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            BikeflowCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    weather_slots: usize,
    weather_start: Option<String>,
    weather_end: Option<String>,
    intervals: IntervalReport,
    train: DatasetReport,
    test: DatasetReport,
}

#[derive(serde::Serialize)]
struct IntervalReport {
    holidays: usize,
    lockdowns: usize,
    curfews: usize,
}

#[derive(serde::Serialize)]
struct DatasetReport {
    rows: usize,
    missing_weather: usize,
    holiday_rows: usize,
    period_codes: BTreeMap<u8, usize>,
    ignored_columns: Vec<String>,
}

impl DatasetReport {
    fn new(table: &FeatureTable, ignored_columns: Vec<String>) -> Self {
        let mut period_codes = BTreeMap::new();
        for row in table.rows() {
            *period_codes.entry(row.period_code.code()).or_insert(0) += 1;
        }

        Self {
            rows: table.len(),
            missing_weather: table.missing_weather_rows(),
            holiday_rows: table.rows().iter().filter(|r| r.holiday_flag == 1).count(),
            period_codes,
            ignored_columns,
        }
    }
}
