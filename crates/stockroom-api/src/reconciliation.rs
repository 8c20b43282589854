//! `GET /reconciliation[?sku=<sku>&since=<ts>&until=<ts>]`
//!
//! Re-reads forecasts and events on every request, so refills submitted
//! earlier are reflected. With `sku`, only that SKU's rows and warnings are
//! returned, oldest week first.

use axum::{
  Json,
  extract::{Query, State},
};
use serde::Deserialize;
use stockroom_core::{
  pipeline, reconcile::Reconciliation, store::InventoryStore, summary::sku_history,
};

use crate::{ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ReconcileParams {
  pub sku:   Option<String>,
  pub since: Option<String>,
  pub until: Option<String>,
}

pub async fn handler<S: InventoryStore>(
  State(state): State<ApiState<S>>,
  Query(params): Query<ReconcileParams>,
) -> Result<Json<Reconciliation>, ApiError> {
  let query = state.window(params.since.as_deref(), params.until.as_deref())?;
  let mut rec = pipeline::reconcile_store(&*state.store, &query, &state.retry).await?;
  if let Some(sku) = &params.sku {
    rec.rows = sku_history(&rec.rows, sku);
    rec.warnings.retain(|w| &w.sku == sku);
  }
  Ok(Json(rec))
}
