//! Strong ETags and conditional GET for JSON responses.
//!
//! The tag is a SHA-256 over the exact response body, so identical
//! reconciliation inputs always produce the same tag.

use axum::{
  body::Body,
  extract::Request,
  http::{Method, StatusCode, header},
  middleware::Next,
  response::{IntoResponse, Response},
};
use sha2::{Digest, Sha256};

use crate::error::Error;

/// Compute a quoted ETag for `body`.
pub fn compute_etag(body: &[u8]) -> String {
  let hash = Sha256::digest(body);
  format!("\"{}\"", hex::encode(hash))
}

/// Middleware: tag successful `GET` responses and answer a matching
/// `If-None-Match` with `304 Not Modified`.
pub async fn conditional_get(req: Request, next: Next) -> Result<Response, Error> {
  if req.method() != Method::GET {
    return Ok(next.run(req).await);
  }
  let if_none_match = req
    .headers()
    .get(header::IF_NONE_MATCH)
    .and_then(|v| v.to_str().ok())
    .map(str::to_owned);

  let resp = next.run(req).await;
  if resp.status() != StatusCode::OK {
    return Ok(resp);
  }

  let (mut parts, body) = resp.into_parts();
  let bytes = axum::body::to_bytes(body, usize::MAX)
    .await
    .map_err(|e| Error::Body(e.to_string()))?;
  let etag = compute_etag(&bytes);

  if if_none_match.as_deref() == Some(etag.as_str()) {
    return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response());
  }

  parts.headers.insert(
    header::ETAG,
    etag.parse().map_err(|_| Error::Body("unencodable etag".into()))?,
  );
  Ok(Response::from_parts(parts, Body::from(bytes)))
}
