//! `GET /actuals[?since=<ts>&until=<ts>]`: events aggregated per ISO week and
//! SKU.

use axum::{
  Json,
  extract::{Query, State},
};
use serde::Deserialize;
use stockroom_core::{pipeline, reconcile::WeeklyActuals, store::InventoryStore};

use crate::{ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ActualsParams {
  pub since: Option<String>,
  pub until: Option<String>,
}

pub async fn list<S: InventoryStore>(
  State(state): State<ApiState<S>>,
  Query(params): Query<ActualsParams>,
) -> Result<Json<Vec<WeeklyActuals>>, ApiError> {
  let query = state.window(params.since.as_deref(), params.until.as_deref())?;
  let weekly = pipeline::weekly_actuals(&*state.store, &query, &state.retry).await?;
  Ok(Json(weekly))
}
