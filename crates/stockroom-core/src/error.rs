//! Error types for `stockroom-core`.

use chrono::NaiveDate;
use thiserror::Error;

/// Input that violates a data-integrity rule. Always aborts the whole batch.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
  #[error("duplicate forecast for week {period_start} and sku {sku:?}")]
  DuplicateForecastKey { period_start: NaiveDate, sku: String },

  #[error("{field} must be non-negative, got {value}")]
  NegativeQuantity { field: &'static str, value: f64 },

  #[error("{field} must be a finite number, got {value}")]
  NonFiniteQuantity { field: &'static str, value: f64 },

  #[error("sku must not be empty")]
  EmptySku,

  #[error("forecast period {0} is not a Monday (weeks start on Monday)")]
  MisalignedPeriodStart(NaiveDate),

  #[error("malformed timestamp: {0:?}")]
  MalformedTimestamp(String),
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("validation failed: {0}")]
  Validation(#[from] ValidationError),

  #[error("{source_name} data unavailable: {reason}")]
  DataUnavailable { source_name: String, reason: String },

  #[error("no forecast for week {period_start} and sku {sku:?}")]
  ForecastNotFound { period_start: NaiveDate, sku: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
