//! The reconciliation engine: weekly aggregation of events, left join against
//! forecasts, and metric derivation.
//!
//! Pipeline:
//!   events
//!     └─ aggregate_weekly()   → Vec<WeeklyActuals>  (one per ISO week × SKU)
//!          └─ left join on (period_start == week_start, sku)
//!               └─ derive_metrics() → Vec<ReconciledRecord>
//!
//! Forecasts drive the join: every forecast row appears exactly once, in input
//! order. Event groups without a forecast are not emitted; use
//! [`unmatched_actuals`] to see them.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use crate::{
  Result,
  calendar::{IsoWeek, week_start},
  metrics::{Metrics, derive_metrics},
  record::{EventRecord, ForecastKey, ForecastRecord, validate_events, validate_forecasts},
};

// ─── Weekly actuals ──────────────────────────────────────────────────────────

/// Events for one SKU aggregated over one ISO week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyActuals {
  pub iso_year:                i32,
  pub iso_week:                u32,
  /// Monday of the ISO week; the join key against `period_start`.
  pub week_start:              NaiveDate,
  pub sku:                     String,
  pub actual_units_sold_sum:   f64,
  pub actual_stock_level_mean: f64,
  pub unit_price_mean:         f64,
  pub unit_cost_mean:          f64,
  /// Number of events folded into this bucket.
  pub event_count:             usize,
}

#[derive(Default)]
struct Accumulator {
  units_sold:  f64,
  stock_level: f64,
  unit_price:  f64,
  unit_cost:   f64,
  count:       usize,
}

impl Accumulator {
  fn add(&mut self, e: &EventRecord) {
    self.units_sold += e.actual_units_sold;
    self.stock_level += e.actual_stock_level;
    self.unit_price += e.unit_price;
    self.unit_cost += e.unit_cost;
    self.count += 1;
  }
}

/// Group events by ISO week and SKU.
///
/// Units sold are summed; stock level, price and cost are averaged. Events
/// are folded in input order so floating-point results are reproducible.
/// Output is sorted by week, then SKU.
pub fn aggregate_weekly(events: &[EventRecord]) -> Vec<WeeklyActuals> {
  let mut groups: BTreeMap<(IsoWeek, String), (NaiveDate, Accumulator)> =
    BTreeMap::new();

  for e in events {
    let date = e.event_time.date();
    let (_, acc) = groups
      .entry((IsoWeek::of_date(date), e.sku.clone()))
      .or_insert_with(|| (week_start(date), Accumulator::default()));
    acc.add(e);
  }

  groups
    .into_iter()
    .map(|((week, sku), (monday, acc))| {
      let n = acc.count as f64;
      WeeklyActuals {
        iso_year: week.year,
        iso_week: week.week,
        week_start: monday,
        sku,
        actual_units_sold_sum: acc.units_sold,
        actual_stock_level_mean: acc.stock_level / n,
        unit_price_mean: acc.unit_price / n,
        unit_cost_mean: acc.unit_cost / n,
        event_count: acc.count,
      }
    })
    .collect()
}

/// Weekly groups that no forecast row joins against.
pub fn unmatched_actuals(
  forecasts: &[ForecastRecord],
  actuals: &[WeeklyActuals],
) -> Vec<WeeklyActuals> {
  let keys: HashSet<(NaiveDate, &str)> = forecasts
    .iter()
    .map(|f| (f.period_start, f.sku.as_str()))
    .collect();
  actuals
    .iter()
    .filter(|a| !keys.contains(&(a.week_start, a.sku.as_str())))
    .cloned()
    .collect()
}

// ─── Reconciled rows ─────────────────────────────────────────────────────────

/// Whether a row's metrics can be trusted.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RowStatus {
  /// Actuals found and every metric is finite.
  Matched,
  /// No events for this week and SKU; actuals and metrics are null.
  NoActuals,
  /// Actuals found but at least one metric is NaN or infinite.
  UndefinedMetric,
}

/// A forecast row joined with its weekly actuals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledRecord {
  pub forecast: ForecastRecord,
  pub actuals:  Option<WeeklyActuals>,
  /// `None` exactly when `actuals` is `None`.
  pub metrics:  Option<Metrics>,
  pub status:   RowStatus,
}

impl ReconciledRecord {
  pub fn key(&self) -> ForecastKey { self.forecast.key() }
}

/// A non-fatal problem with one row. Recorded and logged; never aborts a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputationWarning {
  pub period_start: NaiveDate,
  pub sku:          String,
  pub kind:         WarningKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WarningKind {
  /// The forecast has no matching weekly actuals.
  NoActuals,
  /// These metrics evaluated to NaN or infinity.
  NonFiniteMetric { metrics: Vec<String> },
}

/// Output of one reconciliation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reconciliation {
  /// One row per input forecast, in forecast input order.
  pub rows:     Vec<ReconciledRecord>,
  pub warnings: Vec<ComputationWarning>,
}

impl Reconciliation {
  pub fn matched_count(&self) -> usize {
    self.rows.iter().filter(|r| r.actuals.is_some()).count()
  }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Reconcile forecasts against raw events.
///
/// Fails fast with a validation error on duplicate forecast keys or invalid
/// field values; no partial output is produced. Unmatched rows and
/// non-finite metrics degrade to warnings.
pub fn reconcile(
  forecasts: &[ForecastRecord],
  events: &[EventRecord],
) -> Result<Reconciliation> {
  validate_forecasts(forecasts)?;
  validate_events(events)?;

  let weekly = aggregate_weekly(events);
  let rec = join(forecasts, &weekly);

  tracing::info!(
    forecasts = forecasts.len(),
    events = events.len(),
    weekly_groups = weekly.len(),
    matched = rec.matched_count(),
    "reconciliation complete"
  );
  if !rec.warnings.is_empty() {
    tracing::warn!(
      count = rec.warnings.len(),
      "reconciliation produced computation warnings"
    );
  }

  Ok(rec)
}

/// Left-join forecasts to pre-aggregated actuals and derive metrics.
///
/// Performs no validation; callers must pass forecasts with unique keys.
pub fn join(
  forecasts: &[ForecastRecord],
  weekly: &[WeeklyActuals],
) -> Reconciliation {
  let index: HashMap<(NaiveDate, &str), &WeeklyActuals> = weekly
    .iter()
    .map(|a| ((a.week_start, a.sku.as_str()), a))
    .collect();

  let mut rows = Vec::with_capacity(forecasts.len());
  let mut warnings = Vec::new();

  for f in forecasts {
    let actuals = index.get(&(f.period_start, f.sku.as_str())).copied();
    let row = match actuals {
      None => {
        tracing::debug!(period_start = %f.period_start, sku = %f.sku, "no actuals");
        warnings.push(ComputationWarning {
          period_start: f.period_start,
          sku:          f.sku.clone(),
          kind:         WarningKind::NoActuals,
        });
        ReconciledRecord {
          forecast: f.clone(),
          actuals:  None,
          metrics:  None,
          status:   RowStatus::NoActuals,
        }
      }
      Some(a) => {
        let metrics = derive_metrics(f, a);
        let bad = metrics.non_finite();
        let status = if bad.is_empty() {
          RowStatus::Matched
        } else {
          tracing::debug!(
            period_start = %f.period_start,
            sku = %f.sku,
            metrics = ?bad,
            "non-finite metric"
          );
          warnings.push(ComputationWarning {
            period_start: f.period_start,
            sku:          f.sku.clone(),
            kind:         WarningKind::NonFiniteMetric {
              metrics: bad.into_iter().map(str::to_owned).collect(),
            },
          });
          RowStatus::UndefinedMetric
        };
        ReconciledRecord {
          forecast: f.clone(),
          actuals: Some(a.clone()),
          metrics: Some(metrics),
          status,
        }
      }
    };
    rows.push(row);
  }

  Reconciliation { rows, warnings }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDateTime;

  use super::*;
  use crate::{Error, error::ValidationError};

  fn date(s: &str) -> NaiveDate { s.parse().unwrap() }

  fn ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M").unwrap()
  }

  fn forecast(week: &str, sku: &str, units: f64, stock: f64) -> ForecastRecord {
    ForecastRecord {
      period_start:          date(week),
      sku:                   sku.into(),
      predicted_units_sold:  units,
      predicted_stock_level: stock,
      predicted_unit_cost:   10.0,
    }
  }

  fn event(at: &str, sku: &str, sold: f64, stock: f64, price: f64, cost: f64) -> EventRecord {
    EventRecord {
      event_time:         ts(at),
      sku:                sku.into(),
      actual_units_sold:  sold,
      actual_stock_level: stock,
      unit_price:         price,
      unit_cost:          cost,
      attributes:         Default::default(),
    }
  }

  fn scenario_events() -> Vec<EventRecord> {
    vec![
      event("2024-01-03T10:00", "A", 40.0, 60.0, 20.0, 12.0),
      event("2024-01-05T10:00", "A", 60.0, 55.0, 20.0, 8.0),
    ]
  }

  #[test]
  fn scenario_end_to_end() {
    let forecasts = vec![forecast("2024-01-01", "A", 100.0, 50.0)];
    let rec = reconcile(&forecasts, &scenario_events()).unwrap();

    assert_eq!(rec.rows.len(), 1);
    assert!(rec.warnings.is_empty());
    let row = &rec.rows[0];
    assert_eq!(row.status, RowStatus::Matched);

    let a = row.actuals.as_ref().unwrap();
    assert_eq!(a.week_start, date("2024-01-01"));
    assert_eq!(a.actual_units_sold_sum, 100.0);
    assert_eq!(a.actual_stock_level_mean, 57.5);
    assert_eq!(a.unit_price_mean, 20.0);
    assert_eq!(a.unit_cost_mean, 10.0);
    assert_eq!(a.event_count, 2);

    let m = row.metrics.unwrap();
    assert!(m.abs_pct_error_sales.abs() < 1e-9);
    assert!((m.inventory_turnover - 1.739).abs() < 1e-3);
    assert!((m.actual_profit - 1000.0).abs() < 1e-9);
    assert!((m.stock_diff - 7.5).abs() < 1e-9);
  }

  #[test]
  fn monday_and_sunday_events_share_a_bucket() {
    let events = vec![
      event("2024-01-01T00:00", "A", 1.0, 1.0, 1.0, 1.0),
      event("2024-01-07T23:59", "A", 2.0, 3.0, 1.0, 1.0),
    ];
    let weekly = aggregate_weekly(&events);
    assert_eq!(weekly.len(), 1);
    assert_eq!(weekly[0].week_start, date("2024-01-01"));
    assert_eq!(weekly[0].actual_units_sold_sum, 3.0);
  }

  #[test]
  fn aggregation_is_sorted_by_week_then_sku() {
    let events = vec![
      event("2024-01-10T09:00", "B", 1.0, 1.0, 1.0, 1.0),
      event("2024-01-02T09:00", "B", 1.0, 1.0, 1.0, 1.0),
      event("2024-01-02T09:00", "A", 1.0, 1.0, 1.0, 1.0),
    ];
    let keys: Vec<_> = aggregate_weekly(&events)
      .into_iter()
      .map(|a| (a.week_start, a.sku))
      .collect();
    assert_eq!(keys, vec![
      (date("2024-01-01"), "A".to_string()),
      (date("2024-01-01"), "B".to_string()),
      (date("2024-01-08"), "B".to_string()),
    ]);
  }

  #[test]
  fn every_forecast_appears_once_in_input_order() {
    let forecasts = vec![
      forecast("2024-01-08", "A", 1.0, 1.0),
      forecast("2024-01-01", "B", 1.0, 1.0),
      forecast("2024-01-01", "A", 100.0, 50.0),
    ];
    let rec = reconcile(&forecasts, &scenario_events()).unwrap();

    let keys: Vec<_> = rec.rows.iter().map(ReconciledRecord::key).collect();
    let expected: Vec<_> = forecasts.iter().map(ForecastRecord::key).collect();
    assert_eq!(keys, expected);

    assert_eq!(rec.rows[0].status, RowStatus::NoActuals);
    assert_eq!(rec.rows[1].status, RowStatus::NoActuals);
    assert_eq!(rec.rows[2].status, RowStatus::Matched);
    assert_eq!(rec.warnings.len(), 2);
    assert_eq!(rec.matched_count(), 1);
  }

  #[test]
  fn unmatched_rows_have_null_metrics_not_zeros() {
    let forecasts = vec![forecast("2024-02-05", "A", 10.0, 5.0)];
    let rec = reconcile(&forecasts, &scenario_events()).unwrap();
    let row = &rec.rows[0];
    assert!(row.actuals.is_none());
    assert!(row.metrics.is_none());
    assert_eq!(rec.warnings[0].kind, WarningKind::NoActuals);
  }

  #[test]
  fn event_only_groups_are_dropped_but_reported() {
    let forecasts = vec![forecast("2024-01-01", "A", 100.0, 50.0)];
    let mut events = scenario_events();
    events.push(event("2024-01-02T08:00", "Z", 5.0, 5.0, 1.0, 1.0));

    let rec = reconcile(&forecasts, &events).unwrap();
    assert_eq!(rec.rows.len(), 1);

    let orphans = unmatched_actuals(&forecasts, &aggregate_weekly(&events));
    assert_eq!(orphans.len(), 1);
    assert_eq!(orphans[0].sku, "Z");
  }

  #[test]
  fn zero_actuals_produce_finite_metrics() {
    let forecasts = vec![forecast("2024-01-01", "A", 7.0, 3.0)];
    let events = vec![event("2024-01-02T08:00", "A", 0.0, 0.0, 2.0, 1.0)];
    let rec = reconcile(&forecasts, &events).unwrap();
    let m = rec.rows[0].metrics.unwrap();
    assert!(m.abs_pct_error_sales.is_finite());
    assert!(m.inventory_turnover.is_finite());
    assert_eq!(rec.rows[0].status, RowStatus::Matched);
  }

  #[test]
  fn duplicate_forecast_fails_whole_run() {
    let forecasts = vec![
      forecast("2024-01-01", "A", 1.0, 1.0),
      forecast("2024-01-01", "A", 2.0, 2.0),
    ];
    let err = reconcile(&forecasts, &scenario_events()).unwrap_err();
    assert!(matches!(
      err,
      Error::Validation(ValidationError::DuplicateForecastKey { .. })
    ));
  }

  #[test]
  fn negative_event_quantity_fails_whole_run() {
    let forecasts = vec![forecast("2024-01-01", "A", 1.0, 1.0)];
    let events = vec![event("2024-01-02T08:00", "A", -1.0, 0.0, 2.0, 1.0)];
    assert!(matches!(
      reconcile(&forecasts, &events).unwrap_err(),
      Error::Validation(ValidationError::NegativeQuantity { .. })
    ));
  }

  #[test]
  fn non_finite_metrics_are_flagged() {
    let forecasts = vec![forecast("2024-01-01", "A", 1.0, 1.0)];
    let weekly = vec![WeeklyActuals {
      iso_year:                2024,
      iso_week:                1,
      week_start:              date("2024-01-01"),
      sku:                     "A".into(),
      actual_units_sold_sum:   f64::NAN,
      actual_stock_level_mean: 1.0,
      unit_price_mean:         1.0,
      unit_cost_mean:          1.0,
      event_count:             1,
    }];
    let rec = join(&forecasts, &weekly);
    assert_eq!(rec.rows[0].status, RowStatus::UndefinedMetric);
    assert!(rec.rows[0].metrics.unwrap().abs_pct_error_sales.is_nan());
    assert!(matches!(
      &rec.warnings[0].kind,
      WarningKind::NonFiniteMetric { metrics } if metrics.len() == 3
    ));
  }

  #[test]
  fn rerunning_is_byte_identical() {
    let forecasts = vec![
      forecast("2024-01-01", "A", 100.0, 50.0),
      forecast("2024-01-08", "A", 3.0, 1.0),
    ];
    let events = scenario_events();
    let first = serde_json::to_vec(&reconcile(&forecasts, &events).unwrap()).unwrap();
    let second = serde_json::to_vec(&reconcile(&forecasts, &events).unwrap()).unwrap();
    assert_eq!(first, second);
  }

  #[test]
  fn status_renders_snake_case() {
    assert_eq!(RowStatus::NoActuals.to_string(), "no_actuals");
    assert_eq!(RowStatus::UndefinedMetric.as_ref(), "undefined_metric");
  }
}
