//! Handlers for `/refills` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/refills` | Body: `{"period_start":"2024-01-01","sku":"A","quantity":10}` |
//! | `GET`  | `/refills` | Optional `?latest=true` for one entry per key |

use axum::{
  Json,
  extract::{Query, State},
};
use serde::Deserialize;
use stockroom_core::{
  record::ForecastRecord,
  refill::{RefillDecision, RefillRequest, latest_per_key},
  store::InventoryStore,
};

use crate::{ApiState, error::ApiError};

/// `POST /refills`: returns the updated forecast row.
pub async fn create<S: InventoryStore>(
  State(state): State<ApiState<S>>,
  Json(req): Json<RefillRequest>,
) -> Result<Json<ForecastRecord>, ApiError> {
  let outcome = state.store.submit_refill(req).await.map_err(ApiError::store)?;
  Ok(Json(outcome.forecast))
}

#[derive(Debug, Deserialize)]
pub struct LedgerParams {
  #[serde(default)]
  pub latest: bool,
}

/// `GET /refills[?latest=<bool>]`
pub async fn list<S: InventoryStore>(
  State(state): State<ApiState<S>>,
  Query(params): Query<LedgerParams>,
) -> Result<Json<Vec<RefillDecision>>, ApiError> {
  let ledger = state.store.refill_ledger().await.map_err(ApiError::store)?;
  Ok(Json(if params.latest { latest_per_key(&ledger) } else { ledger }))
}
