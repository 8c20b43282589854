//! Business metrics derived from a forecast row and its weekly actuals.

use serde::{Deserialize, Serialize};

use crate::{reconcile::WeeklyActuals, record::ForecastRecord};

/// Additive guard on ratio denominators so zero actuals never divide by zero.
pub const EPSILON: f64 = 1e-9;

/// The four derived metrics of a matched row.
///
/// NaN inputs propagate into the affected metric unchanged; nothing is
/// coerced to zero. `serde_json` renders non-finite values as `null`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
  /// Absolute sales error as a percentage of actual sales. Unbounded above.
  pub abs_pct_error_sales: f64,
  /// Units sold per unit of average stock. Higher means faster turnover.
  pub inventory_turnover:  f64,
  /// Negative when the week ran at a loss.
  pub actual_profit:       f64,
  /// Positive when stock ran above the forecast.
  pub stock_diff:          f64,
}

impl Metrics {
  /// Names of the metrics that did not evaluate to a finite number.
  pub fn non_finite(&self) -> Vec<&'static str> {
    [
      ("abs_pct_error_sales", self.abs_pct_error_sales),
      ("inventory_turnover", self.inventory_turnover),
      ("actual_profit", self.actual_profit),
      ("stock_diff", self.stock_diff),
    ]
    .into_iter()
    .filter(|(_, v)| !v.is_finite())
    .map(|(name, _)| name)
    .collect()
  }

  pub fn is_finite(&self) -> bool { self.non_finite().is_empty() }
}

/// Compute the metrics for one joined row. Total over its inputs.
pub fn derive_metrics(
  forecast: &ForecastRecord,
  actuals: &WeeklyActuals,
) -> Metrics {
  let sold = actuals.actual_units_sold_sum;
  let stock = actuals.actual_stock_level_mean;

  Metrics {
    abs_pct_error_sales: (sold - forecast.predicted_units_sold).abs()
      / (sold + EPSILON)
      * 100.0,
    inventory_turnover:  sold / (stock + EPSILON),
    actual_profit:       (actuals.unit_price_mean - actuals.unit_cost_mean) * sold,
    stock_diff:          stock - forecast.predicted_stock_level,
  }
}
