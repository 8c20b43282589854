//! The `InventoryStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `stockroom-store-sqlite`
//! and [`crate::memory::MemoryStore`]). Higher layers (`stockroom-api`,
//! `stockroom-cli`) depend on this abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{Days, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{
  Error,
  record::{EventRecord, ForecastRecord},
  refill::{RefillDecision, RefillOutcome, RefillRequest},
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Time window for [`InventoryStore::list_events`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventQuery {
  /// Inclusive lower bound on `event_time`.
  pub since: Option<NaiveDateTime>,
  /// Exclusive upper bound on `event_time`.
  pub until: Option<NaiveDateTime>,
}

impl EventQuery {
  /// Everything from `days` before `now` onwards. A window reaching past
  /// the earliest representable date has no lower bound.
  pub fn lookback(now: NaiveDateTime, days: u32) -> Self {
    Self { since: now.checked_sub_days(Days::new(u64::from(days))), until: None }
  }

  pub fn contains(&self, ts: NaiveDateTime) -> bool {
    self.since.is_none_or(|s| ts >= s) && self.until.is_none_or(|u| ts < u)
  }
}

// ─── Error classification ────────────────────────────────────────────────────

/// Coarse category of a store or engine failure, used by outer layers to pick
/// a response (HTTP status, exit message).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  Validation,
  NotFound,
  Unavailable,
  Internal,
}

pub trait Classify {
  fn kind(&self) -> ErrorKind;
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Error::Validation(_) => ErrorKind::Validation,
      Error::ForecastNotFound { .. } => ErrorKind::NotFound,
      Error::DataUnavailable { .. } => ErrorKind::Unavailable,
    }
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a forecast/event/refill store backend.
///
/// Events are append-only. The only mutation of forecasts is
/// [`submit_refill`](InventoryStore::submit_refill), which must increment the
/// stock level and append to the ledger as one atomic step: concurrent
/// refills are serialized, never lost.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait InventoryStore: Send + Sync {
  type Error: std::error::Error + Classify + Send + Sync + 'static;

  // ── Forecasts ─────────────────────────────────────────────────────────

  /// Insert forecast rows. All-or-nothing: a duplicate key, either within
  /// `records` or against stored rows, rejects the whole batch.
  fn insert_forecasts(
    &self,
    records: Vec<ForecastRecord>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// All forecast rows in insertion order.
  fn list_forecasts(
    &self,
  ) -> impl Future<Output = Result<Vec<ForecastRecord>, Self::Error>> + Send + '_;

  /// A single forecast row. Returns `None` if not found.
  fn get_forecast(
    &self,
    period_start: NaiveDate,
    sku: String,
  ) -> impl Future<Output = Result<Option<ForecastRecord>, Self::Error>> + Send + '_;

  // ── Events ────────────────────────────────────────────────────────────

  /// Append events. All-or-nothing on validation failure.
  fn insert_events(
    &self,
    events: Vec<EventRecord>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Events inside `query`'s window, in insertion order.
  fn list_events<'a>(
    &'a self,
    query: &'a EventQuery,
  ) -> impl Future<Output = Result<Vec<EventRecord>, Self::Error>> + Send + 'a;

  // ── Refills ───────────────────────────────────────────────────────────

  /// Add `req.quantity` to the forecast's stock level and record the
  /// decision. Returns the decision and the updated forecast row.
  fn submit_refill(
    &self,
    req: RefillRequest,
  ) -> impl Future<Output = Result<RefillOutcome, Self::Error>> + Send + '_;

  /// Every recorded decision in submission order.
  fn refill_ledger(
    &self,
  ) -> impl Future<Output = Result<Vec<RefillDecision>, Self::Error>> + Send + '_;
}
