//! [`ForecastTable`]: the live, key-indexed forecast table of one session.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::{
  Error, Result,
  error::ValidationError,
  record::{ForecastKey, ForecastRecord},
  refill::RefillRequest,
};

/// Forecast rows in insertion order with a unique `(period_start, sku)` index.
///
/// Owned by whoever runs reconciliations (a store, a request, a CLI
/// invocation); there is no global table.
#[derive(Debug, Clone, Default)]
pub struct ForecastTable {
  rows:  Vec<ForecastRecord>,
  index: HashMap<ForecastKey, usize>,
}

impl ForecastTable {
  pub fn new() -> Self { Self::default() }

  /// Build a table, rejecting invalid rows and duplicate keys.
  pub fn from_records(
    records: impl IntoIterator<Item = ForecastRecord>,
  ) -> Result<Self, ValidationError> {
    let mut table = Self::new();
    for r in records {
      table.insert(r)?;
    }
    Ok(table)
  }

  pub fn insert(&mut self, record: ForecastRecord) -> Result<(), ValidationError> {
    record.validate()?;
    let key = record.key();
    if self.index.contains_key(&key) {
      return Err(ValidationError::DuplicateForecastKey {
        period_start: key.period_start,
        sku:          key.sku,
      });
    }
    self.index.insert(key, self.rows.len());
    self.rows.push(record);
    Ok(())
  }

  pub fn get(&self, period_start: NaiveDate, sku: &str) -> Option<&ForecastRecord> {
    self
      .index
      .get(&ForecastKey::new(period_start, sku))
      .map(|&i| &self.rows[i])
  }

  pub fn records(&self) -> &[ForecastRecord] { &self.rows }

  pub fn len(&self) -> usize { self.rows.len() }

  pub fn is_empty(&self) -> bool { self.rows.is_empty() }

  /// Add `req.quantity` to the matching row's predicted stock level.
  ///
  /// Increments stack: two refills of 10 and 5 add 15.
  pub fn apply_refill(&mut self, req: &RefillRequest) -> Result<&ForecastRecord> {
    req.validate()?;
    let i = *self.index.get(&req.key()).ok_or_else(|| Error::ForecastNotFound {
      period_start: req.period_start,
      sku:          req.sku.clone(),
    })?;
    let row = &mut self.rows[i];
    row.predicted_stock_level += req.quantity;
    Ok(row)
  }
}
