//! Error types and axum `IntoResponse` implementation for the server layer.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unauthorized")]
  Unauthorized,
  #[error("failed to buffer response body: {0}")]
  Body(String),
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    match self {
      Error::Unauthorized => {
        let mut res = (
          StatusCode::UNAUTHORIZED,
          Json(json!({ "error": "unauthorized" })),
        )
          .into_response();
        res.headers_mut().insert(
          header::WWW_AUTHENTICATE,
          HeaderValue::from_static("Basic realm=\"stockroom\""),
        );
        res
      }
      Error::Body(msg) => {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": msg })))
          .into_response()
      }
    }
  }
}
