//! bikeflow - hourly bicycle counter forecasting
//!
//! bikeflow turns raw counter observations and an irregular weather series
//! into a fixed feature table and fits a boosted-trees regressor on it:
//! weather normalization → discretization → calendar tagging → temporal
//! extraction → feature assembly → fit/predict → output.
//!
//! ## Modules
//!
//! - **Features**: [`normalizer`], [`discretizer`], [`calendar`], [`temporal`], [`features`]
//! - **Model**: [`model`] defines the regressor contract and the boosted trees
//! - **I/O**: [`schema`] reads the input tables, [`output`] writes predictions

pub mod calendar;
pub mod config;
pub mod discretizer;
pub mod error;
pub mod features;
pub mod model;
pub mod normalizer;
pub mod output;
pub mod pipeline;
pub mod schema;
pub mod temporal;
pub mod types;

pub use config::PipelineConfig;
pub use error::PipelineError;
pub use features::{FeatureTable, CATEGORICAL_COLUMNS, FEATURE_SCHEMA};
pub use model::{BoostingParams, GradientBoostedTrees, Regressor};
pub use pipeline::{predict_files, PredictionPipeline};

/// bikeflow version
pub const BIKEFLOW_VERSION: &str = env!("CARGO_PKG_VERSION");
