//! Refill decisions and the append-only ledger that records them.
//!
//! A refill adds stock to a forecast row. The forecast mutation is cumulative:
//! every submission adds its quantity. The ledger keeps every submission; the
//! latest entry per `(period_start, sku)` is the decision currently in force.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  error::ValidationError,
  record::{ForecastKey, check_quantity},
};

// ─── Request ─────────────────────────────────────────────────────────────────

/// Input to [`crate::store::InventoryStore::submit_refill`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefillRequest {
  pub period_start: NaiveDate,
  pub sku:          String,
  pub quantity:     f64,
}

impl RefillRequest {
  pub fn new(period_start: NaiveDate, sku: impl Into<String>, quantity: f64) -> Self {
    Self { period_start, sku: sku.into(), quantity }
  }

  pub fn validate(&self) -> Result<(), ValidationError> {
    if self.sku.trim().is_empty() {
      return Err(ValidationError::EmptySku);
    }
    check_quantity("quantity", self.quantity)
  }

  pub fn key(&self) -> ForecastKey {
    ForecastKey::new(self.period_start, self.sku.clone())
  }
}

// ─── Decision ────────────────────────────────────────────────────────────────

/// One recorded refill submission. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefillDecision {
  pub decision_id:  Uuid,
  pub period_start: NaiveDate,
  pub sku:          String,
  pub quantity:     f64,
  /// Server-assigned.
  pub recorded_at:  DateTime<Utc>,
}

impl RefillDecision {
  /// Stamp a request with a fresh id and the current time.
  pub fn from_request(req: &RefillRequest) -> Self {
    Self {
      decision_id:  Uuid::new_v4(),
      period_start: req.period_start,
      sku:          req.sku.clone(),
      quantity:     req.quantity,
      recorded_at:  Utc::now(),
    }
  }

  pub fn key(&self) -> ForecastKey {
    ForecastKey::new(self.period_start, self.sku.clone())
  }
}

/// The ledger view of a refill plus the forecast row it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefillOutcome {
  pub decision: RefillDecision,
  pub forecast: crate::record::ForecastRecord,
}

// ─── Ledger ──────────────────────────────────────────────────────────────────

/// Append-only log of refill decisions, in submission order.
#[derive(Debug, Clone, Default)]
pub struct RefillLedger {
  entries: Vec<RefillDecision>,
}

impl RefillLedger {
  pub fn new() -> Self { Self::default() }

  pub fn append(&mut self, decision: RefillDecision) { self.entries.push(decision); }

  pub fn entries(&self) -> &[RefillDecision] { &self.entries }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }

  /// The most recent decision for a key.
  pub fn latest(&self, period_start: NaiveDate, sku: &str) -> Option<&RefillDecision> {
    self
      .entries
      .iter()
      .rev()
      .find(|d| d.period_start == period_start && d.sku == sku)
  }

  /// The most recent decision for every key, ordered by key.
  pub fn latest_per_key(&self) -> Vec<RefillDecision> {
    latest_per_key(&self.entries)
  }
}

/// Collapse a submission-ordered log to its last entry per key.
pub fn latest_per_key(entries: &[RefillDecision]) -> Vec<RefillDecision> {
  let mut latest: BTreeMap<ForecastKey, &RefillDecision> = BTreeMap::new();
  for d in entries {
    latest.insert(d.key(), d);
  }
  latest.into_values().cloned().collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn monday() -> NaiveDate { NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() }

  #[test]
  fn negative_quantity_is_rejected() {
    let req = RefillRequest::new(monday(), "A", -3.0);
    assert!(matches!(
      req.validate(),
      Err(ValidationError::NegativeQuantity { field: "quantity", .. })
    ));
  }

  #[test]
  fn latest_decision_wins() {
    let mut ledger = RefillLedger::new();
    ledger.append(RefillDecision::from_request(&RefillRequest::new(monday(), "A", 10.0)));
    ledger.append(RefillDecision::from_request(&RefillRequest::new(monday(), "B", 1.0)));
    ledger.append(RefillDecision::from_request(&RefillRequest::new(monday(), "A", 5.0)));

    assert_eq!(ledger.len(), 3);
    assert_eq!(ledger.latest(monday(), "A").unwrap().quantity, 5.0);
    assert!(ledger.latest(monday(), "C").is_none());

    let latest = ledger.latest_per_key();
    assert_eq!(latest.len(), 2);
    assert_eq!(latest[0].sku, "A");
    assert_eq!(latest[0].quantity, 5.0);
    assert_eq!(latest[1].sku, "B");
  }
}
