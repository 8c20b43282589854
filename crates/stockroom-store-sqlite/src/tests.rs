//! Integration tests for `SqliteStore` against an in-memory database.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use stockroom_core::{
  ValidationError,
  pipeline::reconcile_store,
  reconcile::RowStatus,
  record::{EventRecord, ForecastRecord},
  refill::{RefillRequest, latest_per_key},
  retry::RetryPolicy,
  store::{Classify, ErrorKind, EventQuery, InventoryStore},
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn monday() -> NaiveDate { NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() }

fn ts(s: &str) -> NaiveDateTime {
  NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
}

fn forecast(sku: &str, stock: f64) -> ForecastRecord {
  ForecastRecord {
    period_start:          monday(),
    sku:                   sku.into(),
    predicted_units_sold:  100.0,
    predicted_stock_level: stock,
    predicted_unit_cost:   10.0,
  }
}

fn event(at: &str, sku: &str, units: f64, stock: f64, cost: f64) -> EventRecord {
  EventRecord {
    event_time:         ts(at),
    sku:                sku.into(),
    actual_units_sold:  units,
    actual_stock_level: stock,
    unit_price:         20.0,
    unit_cost:          cost,
    attributes:         BTreeMap::new(),
  }
}

// ─── Forecasts ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn forecasts_keep_insertion_order() {
  let s = store().await;
  s.insert_forecasts(vec![forecast("B", 1.0), forecast("A", 2.0)])
    .await
    .unwrap();

  let all = s.list_forecasts().await.unwrap();
  let skus: Vec<_> = all.iter().map(|f| f.sku.as_str()).collect();
  assert_eq!(skus, ["B", "A"]);
  assert_eq!(all[1], forecast("A", 2.0));
}

#[tokio::test]
async fn get_forecast_missing_returns_none() {
  let s = store().await;
  assert!(s.get_forecast(monday(), "nope".into()).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_against_stored_rows_rolls_back_batch() {
  let s = store().await;
  s.insert_forecasts(vec![forecast("A", 1.0)]).await.unwrap();

  let err = s
    .insert_forecasts(vec![forecast("B", 1.0), forecast("A", 9.0)])
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(stockroom_core::Error::Validation(
      ValidationError::DuplicateForecastKey { .. }
    ))
  ));
  assert_eq!(err.kind(), ErrorKind::Validation);

  // "B" was inserted before the duplicate was found and must be gone.
  assert_eq!(s.list_forecasts().await.unwrap().len(), 1);
  assert!(s.get_forecast(monday(), "B".into()).await.unwrap().is_none());
}

#[tokio::test]
async fn sunday_forecast_is_rejected() {
  let s = store().await;
  let mut f = forecast("A", 1.0);
  f.period_start = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
  let err = s.insert_forecasts(vec![f]).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);
}

// ─── Events ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn events_round_trip_with_attributes() {
  let s = store().await;
  let mut e = event("2024-01-03 10:00", "A", 1.0, 2.0, 3.0);
  e.attributes.insert("category".into(), "tools".into());
  s.insert_events(vec![e.clone()]).await.unwrap();

  let back = s.list_events(&EventQuery::default()).await.unwrap();
  assert_eq!(back, vec![e]);
}

#[tokio::test]
async fn event_window_is_half_open() {
  let s = store().await;
  s.insert_events(vec![
    event("2023-12-31 23:59", "A", 1.0, 1.0, 1.0),
    event("2024-01-01 00:00", "A", 2.0, 1.0, 1.0),
    event("2024-01-07 23:59", "A", 3.0, 1.0, 1.0),
    event("2024-01-08 00:00", "A", 4.0, 1.0, 1.0),
  ])
  .await
  .unwrap();

  let q = EventQuery {
    since: Some(ts("2024-01-01 00:00")),
    until: Some(ts("2024-01-08 00:00")),
  };
  let units: Vec<f64> = s
    .list_events(&q)
    .await
    .unwrap()
    .iter()
    .map(|e| e.actual_units_sold)
    .collect();
  assert_eq!(units, [2.0, 3.0]);
}

#[tokio::test]
async fn negative_event_rejects_whole_batch() {
  let s = store().await;
  let err = s
    .insert_events(vec![
      event("2024-01-03 10:00", "A", 1.0, 1.0, 1.0),
      event("2024-01-03 11:00", "A", -1.0, 1.0, 1.0),
    ])
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);
  assert!(s.list_events(&EventQuery::default()).await.unwrap().is_empty());
}

// ─── Refills ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn refills_stack_and_ledger_keeps_all() {
  let s = store().await;
  s.insert_forecasts(vec![forecast("S", 50.0)]).await.unwrap();

  s.submit_refill(RefillRequest::new(monday(), "S", 10.0)).await.unwrap();
  let out = s
    .submit_refill(RefillRequest::new(monday(), "S", 5.0))
    .await
    .unwrap();
  assert_eq!(out.forecast.predicted_stock_level, 65.0);
  assert_eq!(out.decision.quantity, 5.0);

  let ledger = s.refill_ledger().await.unwrap();
  assert_eq!(ledger.len(), 2);
  assert_eq!(ledger[0].quantity, 10.0);

  let latest = latest_per_key(&ledger);
  assert_eq!(latest.len(), 1);
  assert_eq!(latest[0].quantity, 5.0);
  assert_eq!(latest[0].decision_id, out.decision.decision_id);
}

#[tokio::test]
async fn refill_unknown_key_is_not_found_and_not_recorded() {
  let s = store().await;
  s.insert_forecasts(vec![forecast("S", 50.0)]).await.unwrap();

  let err = s
    .submit_refill(RefillRequest::new(monday(), "X", 1.0))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
  assert!(s.refill_ledger().await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_refills_are_serialized() {
  let s = store().await;
  s.insert_forecasts(vec![forecast("S", 0.0)]).await.unwrap();

  let mut handles = Vec::new();
  for _ in 0..16 {
    let s = s.clone();
    handles.push(tokio::spawn(async move {
      s.submit_refill(RefillRequest::new(monday(), "S", 2.0)).await
    }));
  }
  for h in handles {
    h.await.unwrap().unwrap();
  }

  let f = s.get_forecast(monday(), "S".into()).await.unwrap().unwrap();
  assert_eq!(f.predicted_stock_level, 32.0);
  assert_eq!(s.refill_ledger().await.unwrap().len(), 16);
}

// ─── End to end ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn reconcile_from_sqlite() {
  let s = store().await;
  s.insert_forecasts(vec![forecast("A", 50.0), forecast("Z", 5.0)])
    .await
    .unwrap();
  s.insert_events(vec![
    event("2024-01-03 10:00", "A", 40.0, 60.0, 12.0),
    event("2024-01-05 10:00", "A", 60.0, 55.0, 8.0),
  ])
  .await
  .unwrap();

  let rec = reconcile_store(&s, &EventQuery::default(), &RetryPolicy::none())
    .await
    .unwrap();
  assert_eq!(rec.rows.len(), 2);

  let a = &rec.rows[0];
  assert_eq!(a.status, RowStatus::Matched);
  let m = a.metrics.unwrap();
  assert_eq!(m.abs_pct_error_sales, 0.0);
  assert_eq!(m.actual_profit, 1000.0);
  assert_eq!(m.stock_diff, 7.5);

  assert_eq!(rec.rows[1].status, RowStatus::NoActuals);
  assert!(rec.rows[1].metrics.is_none());
}
