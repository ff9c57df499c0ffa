// crates/aidstation-core/src/error.rs

use polars::error::PolarsError;
use serde::Serialize;
use thiserror::Error;

/// Failures that stop a normalization run before any row is processed.
#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("column \"{column}\" not found in dataframe")]
    MissingColumn { column: String },

    #[error("no check-in or check-out timing columns found (expected one of: {expected:?})")]
    NoTimingColumns { expected: Vec<String> },

    #[error("invalid normalizer configuration: {0}")]
    InvalidConfig(String),

    #[error("polars operation failed: {0}")]
    Polars(#[from] PolarsError),
}

pub type Result<T> = std::result::Result<T, NormalizeError>;

/// A single field that could not be interpreted. Recorded, never raised past the batch.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldParseError {
    #[error("time of day {value:?} does not match HH:MM:SS")]
    TimeOfDay { value: String },

    #[error("elapsed duration {value:?} is invalid: {reason}")]
    Elapsed { value: String, reason: String },

    #[error("elapsed minutes {value:?} is not numeric")]
    ElapsedMinutes { value: String },

    #[error("resolved timestamp for {value:?} is out of range")]
    OutOfRange { value: String },
}
