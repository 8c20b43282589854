//! Write a reconciled table as CSV.

use std::io::Write;

use chrono::NaiveDate;
use serde::Serialize;
use stockroom_core::reconcile::ReconciledRecord;

use crate::Result;

/// One flattened output row. `None` serializes as an empty cell.
#[derive(Debug, Serialize)]
struct CsvReconciledRow<'a> {
  period_start:            NaiveDate,
  sku:                     &'a str,
  status:                  &'a str,
  predicted_units_sold:    f64,
  predicted_stock_level:   f64,
  predicted_unit_cost:     f64,
  iso_year:                Option<i32>,
  iso_week:                Option<u32>,
  actual_units_sold_sum:   Option<f64>,
  actual_stock_level_mean: Option<f64>,
  unit_price_mean:         Option<f64>,
  unit_cost_mean:          Option<f64>,
  abs_pct_error_sales:     Option<f64>,
  inventory_turnover:      Option<f64>,
  actual_profit:           Option<f64>,
  stock_diff:              Option<f64>,
}

impl<'a> From<&'a ReconciledRecord> for CsvReconciledRow<'a> {
  fn from(r: &'a ReconciledRecord) -> Self {
    let a = r.actuals.as_ref();
    let m = r.metrics.as_ref();
    Self {
      period_start:            r.forecast.period_start,
      sku:                     &r.forecast.sku,
      status:                  r.status.as_ref(),
      predicted_units_sold:    r.forecast.predicted_units_sold,
      predicted_stock_level:   r.forecast.predicted_stock_level,
      predicted_unit_cost:     r.forecast.predicted_unit_cost,
      iso_year:                a.map(|a| a.iso_year),
      iso_week:                a.map(|a| a.iso_week),
      actual_units_sold_sum:   a.map(|a| a.actual_units_sold_sum),
      actual_stock_level_mean: a.map(|a| a.actual_stock_level_mean),
      unit_price_mean:         a.map(|a| a.unit_price_mean),
      unit_cost_mean:          a.map(|a| a.unit_cost_mean),
      abs_pct_error_sales:     m.map(|m| m.abs_pct_error_sales),
      inventory_turnover:      m.map(|m| m.inventory_turnover),
      actual_profit:           m.map(|m| m.actual_profit),
      stock_diff:              m.map(|m| m.stock_diff),
    }
  }
}

/// Write `rows` with a header line, in the order given.
pub fn write_reconciled<W: Write>(rows: &[ReconciledRecord], writer: W) -> Result<()> {
  let mut wtr = csv::Writer::from_writer(writer);
  for row in rows {
    wtr.serialize(CsvReconciledRow::from(row))?;
  }
  wtr.flush()?;
  Ok(())
}
