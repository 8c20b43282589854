//! Dashboard views over events, forecasts and reconciled rows.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{
  reconcile::ReconciledRecord,
  record::{EventRecord, ForecastRecord},
};

/// Headline totals for a window of events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyMetrics {
  pub total_units_sold: f64,
  /// Σ `unit_price × actual_units_sold`.
  pub total_revenue:    f64,
  pub distinct_skus:    usize,
  pub event_count:      usize,
  pub first_event:      Option<NaiveDateTime>,
  pub last_event:       Option<NaiveDateTime>,
}

/// Units sold for one SKU across a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkuSales {
  pub sku:        String,
  pub units_sold: f64,
}

pub fn summarize(events: &[EventRecord]) -> KeyMetrics {
  let skus: BTreeSet<&str> = events.iter().map(|e| e.sku.as_str()).collect();
  KeyMetrics {
    total_units_sold: events.iter().map(|e| e.actual_units_sold).sum(),
    total_revenue:    events.iter().map(EventRecord::revenue).sum(),
    distinct_skus:    skus.len(),
    event_count:      events.len(),
    first_event:      events.iter().map(|e| e.event_time).min(),
    last_event:       events.iter().map(|e| e.event_time).max(),
  }
}

/// The `n` best-selling SKUs, most units first. Ties sort by SKU.
pub fn top_skus_by_sales(events: &[EventRecord], n: usize) -> Vec<SkuSales> {
  let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
  for e in events {
    *totals.entry(e.sku.as_str()).or_default() += e.actual_units_sold;
  }
  let mut ranked: Vec<SkuSales> = totals
    .into_iter()
    .map(|(sku, units_sold)| SkuSales { sku: sku.to_owned(), units_sold })
    .collect();
  // stable sort keeps the BTreeMap's SKU order among ties
  ranked.sort_by(|a, b| b.units_sold.total_cmp(&a.units_sold));
  ranked.truncate(n);
  ranked
}

/// Forecasts that predict any sales at all.
pub fn active_forecasts(forecasts: &[ForecastRecord]) -> Vec<ForecastRecord> {
  forecasts
    .iter()
    .filter(|f| f.predicted_units_sold > 0.0)
    .cloned()
    .collect()
}

/// Distinct forecast weeks, newest first.
pub fn forecast_weeks(forecasts: &[ForecastRecord]) -> Vec<NaiveDate> {
  let weeks: BTreeSet<NaiveDate> =
    forecasts.iter().map(|f| f.period_start).collect();
  weeks.into_iter().rev().collect()
}

/// Reconciled rows for one SKU, oldest week first.
pub fn sku_history(rows: &[ReconciledRecord], sku: &str) -> Vec<ReconciledRecord> {
  let mut history: Vec<ReconciledRecord> =
    rows.iter().filter(|r| r.forecast.sku == sku).cloned().collect();
  history.sort_by_key(|r| r.forecast.period_start);
  history
}
