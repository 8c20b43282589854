//! Handlers for `/forecasts` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/forecasts` | Optional `?week=YYYY-MM-DD&active_only=true` |
//! | `GET`  | `/forecasts/weeks` | Distinct weeks, newest first |

use axum::{
  Json,
  extract::{Query, State},
};
use chrono::NaiveDate;
use serde::Deserialize;
use stockroom_core::{
  record::ForecastRecord,
  store::InventoryStore,
  summary::{active_forecasts, forecast_weeks},
};

use crate::{ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub week:        Option<NaiveDate>,
  #[serde(default)]
  pub active_only: bool,
}

/// `GET /forecasts[?week=<date>&active_only=<bool>]`
pub async fn list<S: InventoryStore>(
  State(state): State<ApiState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<ForecastRecord>>, ApiError> {
  let mut forecasts = state.store.list_forecasts().await.map_err(ApiError::store)?;
  if let Some(week) = params.week {
    forecasts.retain(|f| f.period_start == week);
  }
  if params.active_only {
    forecasts = active_forecasts(&forecasts);
  }
  Ok(Json(forecasts))
}

/// `GET /forecasts/weeks`
pub async fn weeks<S: InventoryStore>(
  State(state): State<ApiState<S>>,
) -> Result<Json<Vec<NaiveDate>>, ApiError> {
  let forecasts = state.store.list_forecasts().await.map_err(ApiError::store)?;
  Ok(Json(forecast_weeks(&forecasts)))
}
