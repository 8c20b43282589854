//! Error types for `stockroom-etl`.

use stockroom_core::ValidationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("csv error: {0}")]
  Csv(#[from] csv::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("missing required column {0:?}")]
  MissingColumn(&'static str),

  /// A single row could not be turned into a record. `line` is 1-based and
  /// counts the header.
  #[error("line {line}: {source}")]
  Row { line: u64, source: RowError },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RowError {
  #[error("missing value for {column:?} with no earlier row to fill from")]
  MissingValue { column: &'static str },

  #[error("{column:?} is not a number: {value:?}")]
  BadNumber { column: &'static str, value: String },

  #[error("unrecognized date {0:?}")]
  BadDate(String),

  #[error(transparent)]
  Invalid(#[from] ValidationError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
