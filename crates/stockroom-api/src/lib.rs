//! JSON REST API for Stockroom.
//!
//! Exposes an axum [`Router`] backed by any
//! [`stockroom_core::store::InventoryStore`]. Auth, TLS, and transport
//! concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", stockroom_api::api_router(ApiState::new(store.clone())))
//! ```

pub mod actuals;
pub mod error;
pub mod forecasts;
pub mod reconciliation;
pub mod refills;
pub mod summary;

use std::sync::Arc;

use axum::{Router, routing::get};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use stockroom_core::{retry::RetryPolicy, store::{EventQuery, InventoryStore}};

pub use error::ApiError;

/// Shared state handed to every handler.
pub struct ApiState<S> {
  pub store:         Arc<S>,
  /// Applied to every source fetch that feeds a reconciliation.
  pub retry:         RetryPolicy,
  /// Event window used when a request gives neither `since` nor `until`.
  /// `None` means all events.
  pub lookback_days: Option<u32>,
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self {
      store:         Arc::clone(&self.store),
      retry:         self.retry,
      lookback_days: self.lookback_days,
    }
  }
}

impl<S> ApiState<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { store, retry: RetryPolicy::default(), lookback_days: None }
  }

  pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
    self.retry = retry;
    self
  }

  pub fn with_lookback_days(mut self, days: u32) -> Self {
    self.lookback_days = Some(days);
    self
  }

  /// Resolve a request's `since`/`until` into an event window.
  pub(crate) fn window(
    &self,
    since: Option<&str>,
    until: Option<&str>,
  ) -> Result<EventQuery, ApiError> {
    if since.is_none() && until.is_none() {
      return Ok(match self.lookback_days {
        Some(days) => EventQuery::lookback(Utc::now().naive_utc(), days),
        None => EventQuery::default(),
      });
    }
    Ok(EventQuery {
      since: since.map(parse_bound).transpose()?,
      until: until.map(parse_bound).transpose()?,
    })
  }
}

/// Parse a window bound: a date (midnight) or a date-time.
fn parse_bound(s: &str) -> Result<NaiveDateTime, ApiError> {
  if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
    return d
      .and_hms_opt(0, 0, 0)
      .ok_or_else(|| ApiError::BadRequest(format!("invalid date {s:?}")));
  }
  ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"]
    .iter()
    .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
    .ok_or_else(|| ApiError::BadRequest(format!("invalid timestamp {s:?}")))
}

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: ApiState<S>) -> Router<()>
where
  S: InventoryStore + 'static,
{
  Router::new()
    // Forecasts
    .route("/forecasts", get(forecasts::list::<S>))
    .route("/forecasts/weeks", get(forecasts::weeks::<S>))
    // Actuals and reconciliation
    .route("/actuals", get(actuals::list::<S>))
    .route("/reconciliation", get(reconciliation::handler::<S>))
    .route("/summary", get(summary::handler::<S>))
    // Refills
    .route("/refills", get(refills::list::<S>).post(refills::create::<S>))
    .with_state(state)
}
