//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Dates are `YYYY-MM-DD`. Event times use a fixed-width ISO 8601 form so that
//! text comparison in SQL matches chronological order. Ledger timestamps are
//! RFC 3339. Event attributes are compact JSON.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use stockroom_core::{
  record::{EventRecord, ForecastRecord},
  refill::RefillDecision,
};
use uuid::Uuid;

use crate::{Error, Result};

const DATE_FMT: &str = "%Y-%m-%d";
const EVENT_TIME_ENCODE: &str = "%Y-%m-%dT%H:%M:%S%.9f";
const EVENT_TIME_DECODE: &str = "%Y-%m-%dT%H:%M:%S%.f";

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── Dates and times ─────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format(DATE_FMT).to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, DATE_FMT)
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

pub fn encode_event_time(ts: NaiveDateTime) -> String {
  ts.format(EVENT_TIME_ENCODE).to_string()
}

pub fn decode_event_time(s: &str) -> Result<NaiveDateTime> {
  NaiveDateTime::parse_from_str(s, EVENT_TIME_DECODE)
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Attributes ──────────────────────────────────────────────────────────────

pub fn encode_attributes(attrs: &BTreeMap<String, String>) -> Result<String> {
  Ok(serde_json::to_string(attrs)?)
}

pub fn decode_attributes(s: &str) -> Result<BTreeMap<String, String>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Raw row types ───────────────────────────────────────────────────────────

/// A `forecasts` row as read from SQLite.
pub struct RawForecast {
  pub period_start:          String,
  pub sku:                   String,
  pub predicted_units_sold:  f64,
  pub predicted_stock_level: f64,
  pub predicted_unit_cost:   f64,
}

impl RawForecast {
  pub const COLUMNS: &'static str = "period_start, sku, predicted_units_sold, \
                                     predicted_stock_level, predicted_unit_cost";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      period_start:          row.get(0)?,
      sku:                   row.get(1)?,
      predicted_units_sold:  row.get(2)?,
      predicted_stock_level: row.get(3)?,
      predicted_unit_cost:   row.get(4)?,
    })
  }

  pub fn into_forecast(self) -> Result<ForecastRecord> {
    Ok(ForecastRecord {
      period_start:          decode_date(&self.period_start)?,
      sku:                   self.sku,
      predicted_units_sold:  self.predicted_units_sold,
      predicted_stock_level: self.predicted_stock_level,
      predicted_unit_cost:   self.predicted_unit_cost,
    })
  }
}

/// An `events` row as read from SQLite.
pub struct RawEvent {
  pub event_time:         String,
  pub sku:                String,
  pub actual_units_sold:  f64,
  pub actual_stock_level: f64,
  pub unit_price:         f64,
  pub unit_cost:          f64,
  pub attributes:         String,
}

impl RawEvent {
  pub fn into_event(self) -> Result<EventRecord> {
    Ok(EventRecord {
      event_time:         decode_event_time(&self.event_time)?,
      sku:                self.sku,
      actual_units_sold:  self.actual_units_sold,
      actual_stock_level: self.actual_stock_level,
      unit_price:         self.unit_price,
      unit_cost:          self.unit_cost,
      attributes:         decode_attributes(&self.attributes)?,
    })
  }
}

/// A `refill_ledger` row as read from SQLite.
pub struct RawRefill {
  pub decision_id:  String,
  pub period_start: String,
  pub sku:          String,
  pub quantity:     f64,
  pub recorded_at:  String,
}

impl RawRefill {
  pub fn into_decision(self) -> Result<RefillDecision> {
    Ok(RefillDecision {
      decision_id:  decode_uuid(&self.decision_id)?,
      period_start: decode_date(&self.period_start)?,
      sku:          self.sku,
      quantity:     self.quantity,
      recorded_at:  decode_dt(&self.recorded_at)?,
    })
  }
}
