//! Input records: weekly forecasts and raw transactional events.

use std::collections::{BTreeMap, HashSet};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{calendar, error::ValidationError};

// ─── Keys ────────────────────────────────────────────────────────────────────

/// Identity of a forecast row: one per (week, SKU).
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ForecastKey {
  pub period_start: NaiveDate,
  pub sku:          String,
}

impl ForecastKey {
  pub fn new(period_start: NaiveDate, sku: impl Into<String>) -> Self {
    Self { period_start, sku: sku.into() }
  }
}

// ─── Forecast ────────────────────────────────────────────────────────────────

/// A stored prediction for one SKU over one ISO week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
  /// Monday of the forecast week.
  pub period_start:          NaiveDate,
  pub sku:                   String,
  pub predicted_units_sold:  f64,
  /// The only field that changes after creation; refills add to it.
  pub predicted_stock_level: f64,
  pub predicted_unit_cost:   f64,
}

impl ForecastRecord {
  pub fn key(&self) -> ForecastKey {
    ForecastKey::new(self.period_start, self.sku.clone())
  }

  /// Check the field-level invariants of a single row.
  pub fn validate(&self) -> Result<(), ValidationError> {
    if self.sku.trim().is_empty() {
      return Err(ValidationError::EmptySku);
    }
    if !calendar::is_week_start(self.period_start) {
      return Err(ValidationError::MisalignedPeriodStart(self.period_start));
    }
    check_quantity("predicted_units_sold", self.predicted_units_sold)?;
    check_quantity("predicted_stock_level", self.predicted_stock_level)?;
    check_quantity("predicted_unit_cost", self.predicted_unit_cost)?;
    Ok(())
  }
}

// ─── Event ───────────────────────────────────────────────────────────────────

/// One raw observation from the live transactional feed.
///
/// Never mutated after ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
  pub event_time:         NaiveDateTime,
  pub sku:                String,
  /// Usually a whole count, but fractional values are accepted: outlier
  /// capping clamps to `mean ± z·std`.
  pub actual_units_sold:  f64,
  /// Instantaneous gauge reading, not cumulative.
  pub actual_stock_level: f64,
  pub unit_price:         f64,
  pub unit_cost:          f64,
  /// Descriptive columns carried through for display only.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub attributes:         BTreeMap<String, String>,
}

impl EventRecord {
  pub fn validate(&self) -> Result<(), ValidationError> {
    if self.sku.trim().is_empty() {
      return Err(ValidationError::EmptySku);
    }
    check_quantity("actual_units_sold", self.actual_units_sold)?;
    check_quantity("actual_stock_level", self.actual_stock_level)?;
    check_quantity("unit_price", self.unit_price)?;
    check_quantity("unit_cost", self.unit_cost)?;
    Ok(())
  }

  pub fn revenue(&self) -> f64 { self.unit_price * self.actual_units_sold }
}

// ─── Validation helpers ──────────────────────────────────────────────────────

/// Reject NaN, infinities, and negative values.
pub fn check_quantity(
  field: &'static str,
  value: f64,
) -> Result<(), ValidationError> {
  if !value.is_finite() {
    return Err(ValidationError::NonFiniteQuantity { field, value });
  }
  if value < 0.0 {
    return Err(ValidationError::NegativeQuantity { field, value });
  }
  Ok(())
}

/// Validate every event; the first failure aborts.
pub fn validate_events(events: &[EventRecord]) -> Result<(), ValidationError> {
  events.iter().try_for_each(EventRecord::validate)
}

/// Validate every forecast and reject duplicate `(period_start, sku)` keys.
pub fn validate_forecasts(
  forecasts: &[ForecastRecord],
) -> Result<(), ValidationError> {
  let mut seen = HashSet::with_capacity(forecasts.len());
  for f in forecasts {
    f.validate()?;
    if !seen.insert((f.period_start, f.sku.as_str())) {
      return Err(ValidationError::DuplicateForecastKey {
        period_start: f.period_start,
        sku:          f.sku.clone(),
      });
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn forecast(date: NaiveDate) -> ForecastRecord {
    ForecastRecord {
      period_start:          date,
      sku:                   "SKU1".into(),
      predicted_units_sold:  10.0,
      predicted_stock_level: 5.0,
      predicted_unit_cost:   2.0,
    }
  }

  #[test]
  fn monday_forecast_is_valid() {
    let f = forecast(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    assert!(f.validate().is_ok());
  }

  #[test]
  fn sunday_forecast_is_rejected() {
    let sunday = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
    assert_eq!(
      forecast(sunday).validate(),
      Err(ValidationError::MisalignedPeriodStart(sunday))
    );
  }

  #[test]
  fn fractional_units_sold_is_accepted() {
    let e = EventRecord {
      event_time:         NaiveDate::from_ymd_opt(2024, 1, 3)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap(),
      sku:                "SKU1".into(),
      actual_units_sold:  1.5,
      actual_stock_level: 3.0,
      unit_price:         2.0,
      unit_cost:          1.0,
      attributes:         Default::default(),
    };
    assert!(e.validate().is_ok());
  }

  #[test]
  fn negative_and_nan_quantities_are_rejected() {
    let mut f = forecast(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    f.predicted_stock_level = -1.0;
    assert!(matches!(
      f.validate(),
      Err(ValidationError::NegativeQuantity { field: "predicted_stock_level", .. })
    ));

    f.predicted_stock_level = f64::NAN;
    assert!(matches!(
      f.validate(),
      Err(ValidationError::NonFiniteQuantity { field: "predicted_stock_level", .. })
    ));
  }

  #[test]
  fn duplicate_keys_are_rejected() {
    let monday = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let rows = vec![forecast(monday), forecast(monday)];
    assert_eq!(
      validate_forecasts(&rows),
      Err(ValidationError::DuplicateForecastKey {
        period_start: monday,
        sku:          "SKU1".into(),
      })
    );
  }

  #[test]
  fn blank_sku_is_rejected() {
    let mut f = forecast(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    f.sku = "  ".into();
    assert_eq!(f.validate(), Err(ValidationError::EmptySku));
  }
}
