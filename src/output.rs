//! Prediction output
//!
//! The output table has two columns: `Id`, the 0-based position of the row in
//! the test table, and the predicted target. Files are written to a temporary
//! sibling first and renamed into place, so a failed run never leaves a
//! partial file behind.

use crate::error::PipelineError;
use crate::types::PredictionRow;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

/// Name of the row id column
pub const ID_COLUMN: &str = "Id";

/// Number predictions by test-table position
pub fn number_predictions(predictions: Vec<f64>) -> Vec<PredictionRow> {
    predictions
        .into_iter()
        .enumerate()
        .map(|(id, value)| PredictionRow { id, value })
        .collect()
}

/// Write prediction rows as CSV
pub fn write_predictions<W: Write>(
    writer: W,
    target_column: &str,
    rows: &[PredictionRow],
) -> Result<(), PipelineError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record([ID_COLUMN, target_column])?;
    for row in rows {
        csv.write_record([row.id.to_string(), row.value.to_string()])?;
    }
    csv.flush()?;
    Ok(())
}

/// Write prediction rows to `path`, atomically replacing any existing file
pub fn write_predictions_file(
    path: &Path,
    target_column: &str,
    rows: &[PredictionRow],
) -> Result<(), PipelineError> {
    let staging = staging_path(path);

    let written = fs::File::create(&staging)
        .map_err(PipelineError::from)
        .and_then(|file| write_predictions(file, target_column, rows))
        .and_then(|()| fs::rename(&staging, path).map_err(PipelineError::from));

    if written.is_err() {
        let _ = fs::remove_file(&staging);
    } else {
        info!(path = %path.display(), rows = rows.len(), "Predictions written");
    }
    written
}

fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "predictions".to_string());
    path.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4()))
}
