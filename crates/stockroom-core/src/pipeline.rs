//! Store-backed reconciliation: fetch inputs with retries, then run the
//! engine on a complete snapshot.

use crate::{
  Result,
  reconcile::{Reconciliation, WeeklyActuals, aggregate_weekly, reconcile},
  record::{EventRecord, ForecastRecord, validate_events},
  retry::{RetryPolicy, fetch_with_retry},
  store::{EventQuery, InventoryStore},
};

/// A consistent snapshot of both reconciliation inputs.
#[derive(Debug, Clone)]
pub struct Inputs {
  pub forecasts: Vec<ForecastRecord>,
  pub events:    Vec<EventRecord>,
}

/// Fetch forecasts and events from `store`.
///
/// Either source failing after retries, or coming back empty, is a
/// `DataUnavailable` error.
pub async fn load_inputs<S: InventoryStore>(
  store: &S,
  query: &EventQuery,
  policy: &RetryPolicy,
) -> Result<Inputs> {
  let forecasts =
    fetch_with_retry(policy, "forecasts", || store.list_forecasts()).await?;
  let events =
    fetch_with_retry(policy, "events", || store.list_events(query)).await?;
  Ok(Inputs { forecasts, events })
}

/// Fetch inputs from `store` and reconcile them.
///
/// Refills submitted earlier through the same store are visible here because
/// forecasts are re-read on every run.
pub async fn reconcile_store<S: InventoryStore>(
  store: &S,
  query: &EventQuery,
  policy: &RetryPolicy,
) -> Result<Reconciliation> {
  let inputs = load_inputs(store, query, policy).await?;
  reconcile(&inputs.forecasts, &inputs.events)
}

/// Fetch events from `store` and aggregate them by ISO week and SKU.
pub async fn weekly_actuals<S: InventoryStore>(
  store: &S,
  query: &EventQuery,
  policy: &RetryPolicy,
) -> Result<Vec<WeeklyActuals>> {
  let events =
    fetch_with_retry(policy, "events", || store.list_events(query)).await?;
  validate_events(&events)?;
  Ok(aggregate_weekly(&events))
}
