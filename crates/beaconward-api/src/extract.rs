//! Request extractors and the success envelope.
//!
//! The extractors wrap axum's own so that rejections surface as
//! [`ApiError`] (and therefore as `VALIDATION_ERROR` envelopes) instead of
//! axum's plain-text bodies.

use axum::{
  Json,
  extract::{FromRequest, FromRequestParts},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::ApiError;

/// JSON request body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

/// Path parameters.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct PathParam<T>(pub T);

/// Query string parameters.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct QueryParams<T>(pub T);

// ─── Envelope ─────────────────────────────────────────────────────────────────

/// A successful response: `{"success": true, ...payload}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
  success: bool,
  #[serde(flatten)]
  payload: T,
  #[serde(skip)]
  status:  StatusCode,
}

impl<T: Serialize> Envelope<T> {
  pub fn ok(payload: T) -> Self { Self { success: true, payload, status: StatusCode::OK } }

  pub fn created(payload: T) -> Self {
    Self { success: true, payload, status: StatusCode::CREATED }
  }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
  fn into_response(self) -> Response { (self.status, Json(&self)).into_response() }
}
