//! [`MemoryStore`]: an in-process [`InventoryStore`].
//!
//! Holds one [`ForecastTable`], one [`RefillLedger`] and the ingested events
//! behind a single mutex. Each refill runs entirely inside that critical
//! section, so concurrent submissions for the same key are applied one after
//! the other and none is lost.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;

use crate::{
  Error, Result,
  record::{EventRecord, ForecastRecord, validate_events},
  refill::{RefillDecision, RefillLedger, RefillOutcome, RefillRequest},
  store::{EventQuery, InventoryStore},
  table::ForecastTable,
};

#[derive(Default)]
struct Inner {
  forecasts: ForecastTable,
  ledger:    RefillLedger,
  events:    Vec<EventRecord>,
}

/// An inventory store that lives for the duration of a session.
///
/// Cloning is cheap and every clone shares the same state.
#[derive(Clone, Default)]
pub struct MemoryStore {
  inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  /// Seed a store with an existing forecast table.
  pub fn with_forecasts(forecasts: ForecastTable) -> Self {
    Self {
      inner: Arc::new(Mutex::new(Inner { forecasts, ..Inner::default() })),
    }
  }

  fn lock(&self) -> MutexGuard<'_, Inner> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl InventoryStore for MemoryStore {
  type Error = Error;

  async fn insert_forecasts(&self, records: Vec<ForecastRecord>) -> Result<usize> {
    let mut inner = self.lock();
    // Stage into a copy so a rejected batch leaves the table untouched.
    let mut staged = inner.forecasts.clone();
    let n = records.len();
    for r in records {
      staged.insert(r)?;
    }
    inner.forecasts = staged;
    Ok(n)
  }

  async fn list_forecasts(&self) -> Result<Vec<ForecastRecord>> {
    Ok(self.lock().forecasts.records().to_vec())
  }

  async fn get_forecast(
    &self,
    period_start: NaiveDate,
    sku: String,
  ) -> Result<Option<ForecastRecord>> {
    Ok(self.lock().forecasts.get(period_start, &sku).cloned())
  }

  async fn insert_events(&self, events: Vec<EventRecord>) -> Result<usize> {
    validate_events(&events)?;
    let n = events.len();
    self.lock().events.extend(events);
    Ok(n)
  }

  async fn list_events(&self, query: &EventQuery) -> Result<Vec<EventRecord>> {
    Ok(
      self
        .lock()
        .events
        .iter()
        .filter(|e| query.contains(e.event_time))
        .cloned()
        .collect(),
    )
  }

  async fn submit_refill(&self, req: RefillRequest) -> Result<RefillOutcome> {
    let mut inner = self.lock();
    let forecast = inner.forecasts.apply_refill(&req)?.clone();
    let decision = RefillDecision::from_request(&req);
    inner.ledger.append(decision.clone());
    tracing::info!(
      period_start = %req.period_start,
      sku = %req.sku,
      quantity = req.quantity,
      stock_level = forecast.predicted_stock_level,
      "refill recorded"
    );
    Ok(RefillOutcome { decision, forecast })
  }

  async fn refill_ledger(&self) -> Result<Vec<RefillDecision>> {
    Ok(self.lock().ledger.entries().to_vec())
  }
}
