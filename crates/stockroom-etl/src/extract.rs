//! Read event and forecast CSV files into validated records.
//!
//! Headers are matched case-insensitively, with spaces treated as
//! underscores, and the warehouse export names (`DATE_INSERT`,
//! `NUMBER_OF_PRODUCTS_SOLD`, `STOCK_LEVELS`, `PRICE`, `COSTS`) are accepted
//! as aliases. Any failure aborts the whole file and names the offending line.

use std::{collections::BTreeMap, io::Read, path::Path};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use stockroom_core::{
  ValidationError,
  record::{EventRecord, ForecastRecord, validate_forecasts},
};

use crate::{
  Error, Result,
  error::RowError,
  transform::{ForwardFill, round2},
};

// ─── Column resolution ───────────────────────────────────────────────────────

struct Column {
  name:    &'static str,
  aliases: &'static [&'static str],
}

const EVENT_TIME: Column =
  Column { name: "event_time", aliases: &["date_insert", "date", "timestamp"] };
const SKU: Column = Column { name: "sku", aliases: &[] };

/// Numeric event columns, in [`EventRecord`] field order.
const EVENT_NUMERIC: [Column; 4] = [
  Column {
    name:    "actual_units_sold",
    aliases: &["number_of_products_sold", "units_sold"],
  },
  Column { name: "actual_stock_level", aliases: &["stock_levels", "stock_level"] },
  Column { name: "unit_price", aliases: &["price"] },
  Column { name: "unit_cost", aliases: &["costs", "cost"] },
];

const PERIOD_START: Column =
  Column { name: "period_start", aliases: &["date_insert", "week_start", "week"] };

/// Numeric forecast columns, in [`ForecastRecord`] field order. The
/// warehouse prediction export reuses the event column names.
const FORECAST_NUMERIC: [Column; 3] = [
  Column {
    name:    "predicted_units_sold",
    aliases: &["number_of_products_sold", "units_sold"],
  },
  Column { name: "predicted_stock_level", aliases: &["stock_levels", "stock_level"] },
  Column { name: "predicted_unit_cost", aliases: &["costs", "cost"] },
];

fn normalize(header: &str) -> String {
  header.trim().to_lowercase().replace([' ', '-'], "_")
}

fn find(headers: &[String], col: &Column) -> Option<usize> {
  headers
    .iter()
    .position(|h| h == col.name || col.aliases.iter().any(|a| *a == h.as_str()))
}

fn require(headers: &[String], col: &Column) -> Result<usize> {
  find(headers, col).ok_or(Error::MissingColumn(col.name))
}

// ─── Cell parsing ────────────────────────────────────────────────────────────

fn cell<'r>(record: &'r csv::StringRecord, idx: usize) -> Option<&'r str> {
  record.get(idx).map(str::trim).filter(|s| !s.is_empty())
}

fn number(
  record: &csv::StringRecord,
  idx: usize,
  column: &'static str,
) -> Result<Option<f64>, RowError> {
  cell(record, idx)
    .map(|s| {
      s.parse::<f64>()
        .map_err(|_| RowError::BadNumber { column, value: s.to_owned() })
    })
    .transpose()
}

/// Parse an event timestamp.
///
/// Accepts RFC 3339 (converted to UTC), `YYYY-MM-DD HH:MM[:SS[.fff]]` with a
/// space or `T` separator, a bare date (midnight), or integer Unix seconds.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
  let s = s.trim();
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Some(dt.naive_utc());
  }
  const FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
  ];
  if let Some(ts) = FORMATS
    .iter()
    .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
  {
    return Some(ts);
  }
  if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
    return d.and_hms_opt(0, 0, 0);
  }
  s.parse::<i64>()
    .ok()
    .and_then(|secs| DateTime::from_timestamp(secs, 0))
    .map(|dt| dt.naive_utc())
}

fn line_of(record: &csv::StringRecord) -> u64 {
  record.position().map_or(0, csv::Position::line)
}

fn reader<R: Read>(input: R) -> csv::Reader<R> {
  csv::ReaderBuilder::new()
    .trim(csv::Trim::Headers)
    .flexible(true)
    .from_reader(input)
}

fn headers<R: Read>(rdr: &mut csv::Reader<R>) -> Result<Vec<String>> {
  Ok(rdr.headers()?.iter().map(normalize).collect())
}

// ─── Events ──────────────────────────────────────────────────────────────────

/// Read events from CSV.
///
/// Empty numeric cells are forward-filled from the previous row, prices and
/// costs are rounded to two decimals, and columns that are not event fields
/// are kept as attributes.
pub fn read_events<R: Read>(input: R) -> Result<Vec<EventRecord>> {
  let mut rdr = reader(input);
  let headers = headers(&mut rdr)?;

  let time_idx = require(&headers, &EVENT_TIME)?;
  let sku_idx = require(&headers, &SKU)?;
  let numeric_idx = EVENT_NUMERIC
    .iter()
    .map(|c| require(&headers, c))
    .collect::<Result<Vec<_>>>()?;

  let attribute_idx: Vec<usize> = (0..headers.len())
    .filter(|i| *i != time_idx && *i != sku_idx && !numeric_idx.contains(i))
    .collect();

  let mut ffill = ForwardFill::new(EVENT_NUMERIC.len());
  let mut events = Vec::new();

  for record in rdr.records() {
    let record = record?;
    let line = line_of(&record);
    let event = event_row(
      &record,
      time_idx,
      sku_idx,
      &numeric_idx,
      &attribute_idx,
      &headers,
      &mut ffill,
    )
    .map_err(|source| Error::Row { line, source })?;
    events.push(event);
  }

  tracing::info!(count = events.len(), "events extracted");
  Ok(events)
}

fn event_row(
  record: &csv::StringRecord,
  time_idx: usize,
  sku_idx: usize,
  numeric_idx: &[usize],
  attribute_idx: &[usize],
  headers: &[String],
  ffill: &mut ForwardFill,
) -> Result<EventRecord, RowError> {
  let raw_time = cell(record, time_idx).unwrap_or_default();
  let event_time = parse_timestamp(raw_time)
    .ok_or_else(|| ValidationError::MalformedTimestamp(raw_time.to_owned()))?;
  let sku = cell(record, sku_idx)
    .ok_or(RowError::MissingValue { column: SKU.name })?
    .to_owned();

  let mut values = [0.0; 4];
  for (slot, (col, &idx)) in EVENT_NUMERIC.iter().zip(numeric_idx).enumerate() {
    let parsed = number(record, idx, col.name)?;
    values[slot] = ffill.fill(slot, col.name, parsed)?;
  }
  let [units, stock, price, cost] = values;

  let attributes: BTreeMap<String, String> = attribute_idx
    .iter()
    .filter_map(|&i| cell(record, i).map(|v| (headers[i].clone(), v.to_owned())))
    .collect();

  let event = EventRecord {
    event_time,
    sku,
    actual_units_sold: units,
    actual_stock_level: stock,
    unit_price: round2(price),
    unit_cost: round2(cost),
    attributes,
  };
  event.validate()?;
  Ok(event)
}

pub fn read_events_path(path: impl AsRef<Path>) -> Result<Vec<EventRecord>> {
  read_events(std::fs::File::open(path)?)
}

// ─── Forecasts ───────────────────────────────────────────────────────────────

/// Read forecast rows from CSV.
///
/// Every row must name a Monday `period_start`, and keys must be unique
/// within the file.
pub fn read_forecasts<R: Read>(input: R) -> Result<Vec<ForecastRecord>> {
  let mut rdr = reader(input);
  let headers = headers(&mut rdr)?;

  let period_idx = require(&headers, &PERIOD_START)?;
  let sku_idx = require(&headers, &SKU)?;
  let numeric_idx = FORECAST_NUMERIC
    .iter()
    .map(|c| require(&headers, c))
    .collect::<Result<Vec<_>>>()?;

  let mut ffill = ForwardFill::new(FORECAST_NUMERIC.len());
  let mut forecasts = Vec::new();
  let mut lines = Vec::new();

  for record in rdr.records() {
    let record = record?;
    let line = line_of(&record);
    let forecast = forecast_row(&record, period_idx, sku_idx, &numeric_idx, &mut ffill)
      .map_err(|source| Error::Row { line, source })?;
    forecasts.push(forecast);
    lines.push(line);
  }

  // Duplicate keys only show up across rows; report the second occurrence.
  if let Err(e) = validate_forecasts(&forecasts) {
    let line = duplicate_line(&forecasts, &lines).unwrap_or(0);
    return Err(Error::Row { line, source: e.into() });
  }

  tracing::info!(count = forecasts.len(), "forecasts extracted");
  Ok(forecasts)
}

fn duplicate_line(forecasts: &[ForecastRecord], lines: &[u64]) -> Option<u64> {
  let mut seen = std::collections::HashSet::new();
  forecasts
    .iter()
    .zip(lines)
    .find(|(f, _)| !seen.insert(f.key()))
    .map(|(_, &line)| line)
}

fn forecast_row(
  record: &csv::StringRecord,
  period_idx: usize,
  sku_idx: usize,
  numeric_idx: &[usize],
  ffill: &mut ForwardFill,
) -> Result<ForecastRecord, RowError> {
  let raw_period = cell(record, period_idx).unwrap_or_default();
  let period_start = NaiveDate::parse_from_str(raw_period, "%Y-%m-%d")
    .map_err(|_| RowError::BadDate(raw_period.to_owned()))?;
  let sku = cell(record, sku_idx)
    .ok_or(RowError::MissingValue { column: SKU.name })?
    .to_owned();

  let mut values = [0.0; 3];
  for (slot, (col, &idx)) in FORECAST_NUMERIC.iter().zip(numeric_idx).enumerate() {
    let parsed = number(record, idx, col.name)?;
    values[slot] = ffill.fill(slot, col.name, parsed)?;
  }
  let [units, stock, cost] = values;

  let forecast = ForecastRecord {
    period_start,
    sku,
    predicted_units_sold: units,
    predicted_stock_level: stock,
    predicted_unit_cost: round2(cost),
  };
  forecast.validate()?;
  Ok(forecast)
}

pub fn read_forecasts_path(path: impl AsRef<Path>) -> Result<Vec<ForecastRecord>> {
  read_forecasts(std::fs::File::open(path)?)
}
