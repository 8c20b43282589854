//! Cleaning steps applied to raw CSV rows before they become records.

use stockroom_core::record::EventRecord;

use crate::error::RowError;

/// Round to two decimal places, as prices and costs are stored.
pub fn round2(value: f64) -> f64 { (value * 100.0).round() / 100.0 }

/// Column-wise forward fill over a file's numeric cells.
///
/// Each column remembers the last value it saw; an empty cell takes that
/// value. An empty cell before any value has been seen is an error.
#[derive(Debug, Default)]
pub struct ForwardFill {
  last: Vec<Option<f64>>,
}

impl ForwardFill {
  pub fn new(columns: usize) -> Self { Self { last: vec![None; columns] } }

  /// Resolve the cell in column `idx`, recording it for later rows.
  pub fn fill(
    &mut self,
    idx: usize,
    column: &'static str,
    cell: Option<f64>,
  ) -> Result<f64, RowError> {
    let slot = &mut self.last[idx];
    match cell {
      Some(v) => {
        *slot = Some(v);
        Ok(v)
      }
      None => slot.ok_or(RowError::MissingValue { column }),
    }
  }
}

/// How many values [`cap_outliers`] clamped, per column.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CapReport {
  pub units_sold:  usize,
  pub stock_level: usize,
}

/// Clamp `actual_units_sold` and `actual_stock_level` to
/// `mean ± z · std` of their column, using the sample standard deviation.
///
/// Fewer than two events, or a negative or non-finite `z`, leaves everything
/// untouched.
pub fn cap_outliers(events: &mut [EventRecord], z: f64) -> CapReport {
  let report = CapReport {
    units_sold:  cap_column(events, z, |e| &mut e.actual_units_sold),
    stock_level: cap_column(events, z, |e| &mut e.actual_stock_level),
  };
  tracing::debug!(
    z,
    units_sold = report.units_sold,
    stock_level = report.stock_level,
    "outliers capped"
  );
  report
}

fn cap_column(
  events: &mut [EventRecord],
  z: f64,
  field: impl Fn(&mut EventRecord) -> &mut f64,
) -> usize {
  let n = events.len();
  if n < 2 || !z.is_finite() || z < 0.0 {
    return 0;
  }
  let values: Vec<f64> = events.iter_mut().map(|e| *field(e)).collect();
  let mean = values.iter().sum::<f64>() / n as f64;
  let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
  let std = var.sqrt();
  let (lo, hi) = (mean - z * std, mean + z * std);

  let mut capped = 0;
  for e in events.iter_mut() {
    let v = field(e);
    let current = *v;
    let clamped = current.max(lo).min(hi);
    if clamped != current {
      *v = clamped;
      capped += 1;
    }
  }
  capped
}
