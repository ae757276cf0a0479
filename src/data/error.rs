use thiserror::Error;

use super::registry::TableId;

/// Failures raised by the spectral table engine.
///
/// The first four variants are the error kinds the UI reports to the user;
/// the rest name a missing table or column, or a failed external transform.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Wrong column count or shape, e.g. a multi-column proximity reference.
    #[error("shape error: {0}")]
    Shape(String),
    /// A non-numeric value where a number was expected.
    #[error("type error: {0}")]
    Type(String),
    /// Rejected parameters or malformed expressions.
    #[error("validation error: {0}")]
    Validation(String),
    /// The data itself cannot support the operation (e.g. too few samples).
    #[error("data error: {0}")]
    Data(String),
    #[error("unknown column '{column}' in table '{table}'")]
    UnknownColumn { table: String, column: String },
    #[error("no open table with id {0}")]
    UnknownTable(TableId),
    #[error("external transform failed: {0:#}")]
    External(anyhow::Error),
}

impl EngineError {
    pub(crate) fn unknown_column(table: &str, column: &str) -> Self {
        EngineError::UnknownColumn {
            table: table.to_string(),
            column: column.to_string(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Reject thresholds that are negative, NaN or infinite.
pub(crate) fn validate_threshold(threshold_khz: f64) -> EngineResult<()> {
    if !threshold_khz.is_finite() || threshold_khz < 0.0 {
        return Err(EngineError::Validation(format!(
            "threshold must be a finite, non-negative number of kHz, got {threshold_khz}"
        )));
    }
    Ok(())
}

/// kHz -> MHz, the native frequency unit of every table.
pub(crate) fn khz_to_mhz(threshold_khz: f64) -> f64 {
    threshold_khz / 1000.0
}
