//! Run configuration
//!
//! Every section has defaults, so an empty JSON object is a valid
//! configuration and reproduces the reference setup.

use crate::calendar::CalendarConfig;
use crate::discretizer::Discretizer;
use crate::error::PipelineError;
use crate::model::BoostingParams;
use crate::schema::DEFAULT_TARGET;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Name of the target column in the training table and in the output
    pub target_column: String,
    pub model: BoostingParams,
    pub thresholds: Discretizer,
    pub calendar: CalendarConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_column: DEFAULT_TARGET.to_string(),
            model: BoostingParams::default(),
            thresholds: Discretizer::default(),
            calendar: CalendarConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, PipelineError> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// Save configuration to JSON
    pub fn to_json(&self) -> Result<String, PipelineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.target_column.trim().is_empty() {
            return Err(PipelineError::ConfigError(
                "target_column must not be empty".to_string(),
            ));
        }
        self.model.validate()
    }
}
