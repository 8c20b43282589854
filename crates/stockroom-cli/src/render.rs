//! Plain-text rendering for terminal output.

use std::fmt::Write as _;

use stockroom_core::{
  reconcile::Reconciliation,
  refill::RefillDecision,
  summary::{KeyMetrics, SkuSales},
};

/// Left-aligned columns padded to the widest cell, two spaces apart.
fn table(header: &[&str], rows: &[Vec<String>]) -> String {
  let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
  for row in rows {
    for (w, cell) in widths.iter_mut().zip(row) {
      *w = (*w).max(cell.chars().count());
    }
  }

  let mut out = String::new();
  push_line(&mut out, header.iter().copied(), &widths);
  for row in rows {
    push_line(&mut out, row.iter().map(String::as_str), &widths);
  }
  out
}

fn push_line<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>, widths: &[usize]) {
  let joined = cells
    .zip(widths)
    .map(|(c, &w)| format!("{c:<w$}"))
    .collect::<Vec<_>>()
    .join("  ");
  let _ = writeln!(out, "{}", joined.trim_end());
}

fn num(v: Option<f64>) -> String {
  match v {
    Some(v) => format!("{v:.2}"),
    None => "-".to_string(),
  }
}

pub fn reconciliation_table(rec: &Reconciliation) -> String {
  let rows: Vec<Vec<String>> = rec
    .rows
    .iter()
    .map(|r| {
      let a = r.actuals.as_ref();
      let m = r.metrics.as_ref();
      vec![
        r.forecast.period_start.to_string(),
        r.forecast.sku.clone(),
        r.status.to_string(),
        num(Some(r.forecast.predicted_units_sold)),
        num(a.map(|a| a.actual_units_sold_sum)),
        num(m.map(|m| m.abs_pct_error_sales)),
        num(m.map(|m| m.inventory_turnover)),
        num(m.map(|m| m.actual_profit)),
        num(m.map(|m| m.stock_diff)),
      ]
    })
    .collect();

  let mut out = table(
    &["WEEK", "SKU", "STATUS", "PRED", "ACTUAL", "APE", "TURNOVER", "PROFIT", "STOCK_DIFF"],
    &rows,
  );
  let _ = writeln!(
    out,
    "\n{} rows, {} matched, {} warnings",
    rec.rows.len(),
    rec.matched_count(),
    rec.warnings.len()
  );
  out
}

pub fn ledger_table(entries: &[RefillDecision]) -> String {
  if entries.is_empty() {
    return "no refills recorded\n".to_string();
  }
  let rows: Vec<Vec<String>> = entries
    .iter()
    .map(|d| {
      vec![
        d.recorded_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        d.period_start.to_string(),
        d.sku.clone(),
        num(Some(d.quantity)),
        d.decision_id.to_string(),
      ]
    })
    .collect();
  table(&["RECORDED", "WEEK", "SKU", "QUANTITY", "ID"], &rows)
}

pub fn summary(metrics: &KeyMetrics, top: &[SkuSales]) -> String {
  let span = |t: Option<chrono::NaiveDateTime>| {
    t.map(|t| t.to_string()).unwrap_or_else(|| "-".to_string())
  };
  let mut out = String::new();
  let _ = writeln!(out, "events:      {}", metrics.event_count);
  let _ = writeln!(out, "skus:        {}", metrics.distinct_skus);
  let _ = writeln!(out, "units sold:  {:.2}", metrics.total_units_sold);
  let _ = writeln!(out, "revenue:     {:.2}", metrics.total_revenue);
  let _ = writeln!(out, "first event: {}", span(metrics.first_event));
  let _ = writeln!(out, "last event:  {}", span(metrics.last_event));
  if !top.is_empty() {
    let rows: Vec<Vec<String>> =
      top.iter().map(|s| vec![s.sku.clone(), num(Some(s.units_sold))]).collect();
    out.push('\n');
    out.push_str(&table(&["SKU", "UNITS_SOLD"], &rows));
  }
  out
}
