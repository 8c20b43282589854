//! HTTP server for Stockroom.
//!
//! Mounts the JSON API from `stockroom-api` under `/api`, behind HTTP Basic
//! auth, with strong ETags on `GET` responses and request tracing.

pub mod auth;
pub mod error;
pub mod etag;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{Router, middleware};
use serde::Deserialize;
use stockroom_api::{ApiState, api_router};
use stockroom_core::{retry::RetryPolicy, store::InventoryStore};
use tower_http::trace::TraceLayer;

use auth::AuthConfig;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `STOCKROOM_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:               String,
  #[serde(default = "default_port")]
  pub port:               u16,
  #[serde(default = "default_store_path")]
  pub store_path:         PathBuf,
  /// Event window, in days back from now, for requests without explicit
  /// bounds. `0` means every stored event.
  #[serde(default = "default_lookback_days")]
  pub lookback_days:      u32,
  pub auth_username:      String,
  pub auth_password_hash: String,
  #[serde(default)]
  pub retry:              RetryPolicy,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8080 }
fn default_store_path() -> PathBuf { PathBuf::from("stockroom.db") }
fn default_lookback_days() -> u32 { 30 }

// ─── Application state ────────────────────────────────────────────────────────

/// Everything the router needs, shared across requests.
pub struct AppState<S> {
  pub store:  Arc<S>,
  pub config: Arc<ServerConfig>,
  pub auth:   Arc<AuthConfig>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:  Arc::clone(&self.store),
      config: Arc::clone(&self.config),
      auth:   Arc::clone(&self.auth),
    }
  }
}

impl<S> AppState<S> {
  pub fn new(store: S, config: ServerConfig) -> Self {
    let auth = AuthConfig {
      username:      config.auth_username.clone(),
      password_hash: config.auth_password_hash.clone(),
    };
    Self {
      store:  Arc::new(store),
      config: Arc::new(config),
      auth:   Arc::new(auth),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the server's axum [`Router`].
pub fn router<S>(state: AppState<S>) -> Router
where
  S: InventoryStore + 'static,
{
  let mut api = ApiState::new(Arc::clone(&state.store)).with_retry(state.config.retry);
  if state.config.lookback_days > 0 {
    api = api.with_lookback_days(state.config.lookback_days);
  }

  Router::new()
    .nest("/api", api_router(api))
    .layer(middleware::from_fn(etag::conditional_get))
    .layer(middleware::from_fn_with_state(
      Arc::clone(&state.auth),
      auth::require_auth,
    ))
    .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
  use super::*;

  use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use base64::Engine as _;
  use base64::engine::general_purpose::STANDARD as B64;
  use chrono::{NaiveDate, NaiveDateTime};
  use rand_core::OsRng;
  use stockroom_core::record::{EventRecord, ForecastRecord};
  use stockroom_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;

  async fn make_state(password: &str) -> AppState<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    store
      .insert_forecasts(vec![ForecastRecord {
        period_start:          NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        sku:                   "A".into(),
        predicted_units_sold:  100.0,
        predicted_stock_level: 50.0,
        predicted_unit_cost:   10.0,
      }])
      .await
      .unwrap();
    store
      .insert_events(vec![EventRecord {
        event_time:         NaiveDateTime::parse_from_str("2024-01-03 10:00", "%Y-%m-%d %H:%M")
          .unwrap(),
        sku:                "A".into(),
        actual_units_sold:  100.0,
        actual_stock_level: 57.5,
        unit_price:         20.0,
        unit_cost:          10.0,
        attributes:         Default::default(),
      }])
      .await
      .unwrap();

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();

    AppState::new(store, ServerConfig {
      host:               "127.0.0.1".to_string(),
      port:               8080,
      store_path:         PathBuf::from(":memory:"),
      lookback_days:      0,
      auth_username:      "user".to_string(),
      auth_password_hash: hash,
      retry:              RetryPolicy::none(),
    })
  }

  fn auth_header(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  async fn oneshot_raw(
    state:   AppState<SqliteStore>,
    method:  &str,
    uri:     &str,
    headers: Vec<(header::HeaderName, &str)>,
    body:    &str,
  ) -> axum::response::Response {
    let mut builder = Request::builder().method(method).uri(uri);
    for (k, v) in headers {
      builder = builder.header(k, v);
    }
    let req = builder.body(Body::from(body.to_string())).unwrap();
    router(state).oneshot(req).await.unwrap()
  }

  fn etag_of(resp: &axum::response::Response) -> String {
    resp.headers().get(header::ETAG).unwrap().to_str().unwrap().to_string()
  }

  #[tokio::test]
  async fn missing_credentials_is_401() {
    let state = make_state("secret").await;
    let resp = oneshot_raw(state, "GET", "/api/reconciliation", vec![], "").await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));
  }

  #[tokio::test]
  async fn wrong_password_is_401() {
    let state = make_state("secret").await;
    let auth = auth_header("user", "nope");
    let resp = oneshot_raw(
      state,
      "GET",
      "/api/forecasts",
      vec![(header::AUTHORIZATION, auth.as_str())],
      "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn reconciliation_etag_is_stable_and_conditional() {
    let state = make_state("secret").await;
    let auth = auth_header("user", "secret");

    let first = oneshot_raw(
      state.clone(),
      "GET",
      "/api/reconciliation",
      vec![(header::AUTHORIZATION, auth.as_str())],
      "",
    )
    .await;
    assert_eq!(first.status(), StatusCode::OK);
    let etag = etag_of(&first);

    let bytes = axum::body::to_bytes(first.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["rows"][0]["status"], "matched");

    let second = oneshot_raw(
      state.clone(),
      "GET",
      "/api/reconciliation",
      vec![(header::AUTHORIZATION, auth.as_str())],
      "",
    )
    .await;
    assert_eq!(etag_of(&second), etag);

    let not_modified = oneshot_raw(
      state,
      "GET",
      "/api/reconciliation",
      vec![
        (header::AUTHORIZATION, auth.as_str()),
        (header::IF_NONE_MATCH, etag.as_str()),
      ],
      "",
    )
    .await;
    assert_eq!(not_modified.status(), StatusCode::NOT_MODIFIED);
  }

  #[tokio::test]
  async fn refill_changes_reconciliation_etag() {
    let state = make_state("secret").await;
    let auth = auth_header("user", "secret");
    let get = || {
      oneshot_raw(
        state.clone(),
        "GET",
        "/api/reconciliation",
        vec![(header::AUTHORIZATION, auth.as_str())],
        "",
      )
    };

    let before = etag_of(&get().await);

    let refill = oneshot_raw(
      state.clone(),
      "POST",
      "/api/refills",
      vec![
        (header::AUTHORIZATION, auth.as_str()),
        (header::CONTENT_TYPE, "application/json"),
      ],
      r#"{"period_start":"2024-01-01","sku":"A","quantity":10}"#,
    )
    .await;
    assert_eq!(refill.status(), StatusCode::OK);
    assert!(!refill.headers().contains_key(header::ETAG));

    let after = etag_of(&get().await);
    assert_ne!(before, after);
  }
}
