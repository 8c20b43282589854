//! `GET /summary[?top=N&since=<ts>&until=<ts>]`: headline totals and the
//! best-selling SKUs for the event window.

use axum::{
  Json,
  extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use stockroom_core::{
  retry::fetch_with_retry,
  store::InventoryStore,
  summary::{KeyMetrics, SkuSales, summarize, top_skus_by_sales},
};

use crate::{ApiState, error::ApiError};

const DEFAULT_TOP: usize = 5;

#[derive(Debug, Deserialize)]
pub struct SummaryParams {
  pub top:   Option<usize>,
  pub since: Option<String>,
  pub until: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
  pub metrics:  KeyMetrics,
  pub top_skus: Vec<SkuSales>,
}

pub async fn handler<S: InventoryStore>(
  State(state): State<ApiState<S>>,
  Query(params): Query<SummaryParams>,
) -> Result<Json<SummaryResponse>, ApiError> {
  let query = state.window(params.since.as_deref(), params.until.as_deref())?;
  let events =
    fetch_with_retry(&state.retry, "events", || state.store.list_events(&query)).await?;
  Ok(Json(SummaryResponse {
    metrics:  summarize(&events),
    top_skus: top_skus_by_sales(&events, params.top.unwrap_or(DEFAULT_TOP)),
  }))
}
