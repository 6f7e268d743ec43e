//! API error type and its JSON envelope rendering.
//!
//! Every failure leaves the server as
//! `{"success": false, "error": "<message>", "errorCode": "<CODE>"}`.

use axum::{
  Json,
  extract::rejection::{JsonRejection, PathRejection, QueryRejection},
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use beaconward_core::{DomainError, Error as CoreError};
use serde_json::json;
use thiserror::Error;
use tracing::warn;

/// An error returned by an API handler or extractor.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Domain(#[from] CoreError),

  /// Missing or invalid credentials. Carries the `WWW-Authenticate`
  /// challenge to send back.
  #[error("invalid or missing credentials")]
  Unauthorized { challenge: &'static str },

  /// Authenticated, but not allowed to touch this resource.
  #[error("{0}")]
  Forbidden(String),

  /// The request could not be parsed (bad JSON, path or query string).
  #[error("{0}")]
  BadRequest(String),

  #[error("internal error: {0}")]
  Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Lift a store error, keeping domain failures distinguishable.
  pub fn from_store<E: DomainError>(e: E) -> Self {
    match e.domain() {
      Some(core) => Self::Domain(core.clone()),
      None => Self::Internal(Box::new(e)),
    }
  }

  pub fn forbidden(message: impl Into<String>) -> Self { Self::Forbidden(message.into()) }

  pub fn status(&self) -> StatusCode {
    match self {
      Self::Domain(e) => match e {
        CoreError::Validation { .. } => StatusCode::BAD_REQUEST,
        CoreError::AccountDeleted(_) => StatusCode::FORBIDDEN,
        CoreError::DeviceAlreadyRegistered(_) => StatusCode::CONFLICT,
        CoreError::DeviceNotFound(_)
        | CoreError::BeaconNotRegistered(_)
        | CoreError::ElderNotFound(_)
        | CoreError::UserNotFound(_)
        | CoreError::GatewayNotFound(_)
        | CoreError::NotificationPointNotFound(_) => StatusCode::NOT_FOUND,
      },
      Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
      Self::Forbidden(_) => StatusCode::FORBIDDEN,
      Self::BadRequest(_) => StatusCode::BAD_REQUEST,
      Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  /// Machine-readable `errorCode`.
  pub fn code(&self) -> &'static str {
    match self {
      Self::Domain(e) => match e {
        CoreError::Validation { .. } => "VALIDATION_ERROR",
        CoreError::AccountDeleted(_) => "ACCOUNT_DELETED",
        CoreError::DeviceAlreadyRegistered(_) => "DEVICE_ALREADY_REGISTERED",
        CoreError::DeviceNotFound(_) | CoreError::BeaconNotRegistered(_) => "DEVICE_NOT_FOUND",
        CoreError::ElderNotFound(_) => "ELDER_NOT_FOUND",
        CoreError::UserNotFound(_) => "USER_NOT_FOUND",
        CoreError::GatewayNotFound(_) => "GATEWAY_NOT_FOUND",
        CoreError::NotificationPointNotFound(_) => "NOTIFICATION_POINT_NOT_FOUND",
      },
      Self::Unauthorized { .. } | Self::Forbidden(_) => "UNAUTHORIZED",
      Self::BadRequest(_) => "VALIDATION_ERROR",
      Self::Internal(_) => "INTERNAL_ERROR",
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let code = self.code();

    let message = match &self {
      Self::Internal(e) => {
        warn!(error = %e, "internal error while handling request");
        "internal server error".to_owned()
      }
      other => other.to_string(),
    };

    let mut res = (
      status,
      Json(json!({ "success": false, "error": message, "errorCode": code })),
    )
      .into_response();

    if let Self::Unauthorized { challenge } = self {
      res
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(challenge));
    }
    res
  }
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self { Self::BadRequest(rejection.body_text()) }
}

impl From<PathRejection> for ApiError {
  fn from(rejection: PathRejection) -> Self { Self::BadRequest(rejection.body_text()) }
}

impl From<QueryRejection> for ApiError {
  fn from(rejection: QueryRejection) -> Self { Self::BadRequest(rejection.body_text()) }
}

#[cfg(test)]
mod tests {
  use super::*;
  use uuid::Uuid;

  #[test]
  fn domain_errors_map_to_codes() {
    let cases = [
      (CoreError::validation("name", "is required"), 400, "VALIDATION_ERROR"),
      (CoreError::AccountDeleted(Uuid::nil()), 403, "ACCOUNT_DELETED"),
      (CoreError::UserNotFound(Uuid::nil()), 404, "USER_NOT_FOUND"),
      (CoreError::ElderNotFound(Uuid::nil()), 404, "ELDER_NOT_FOUND"),
      (CoreError::DeviceNotFound(Uuid::nil()), 404, "DEVICE_NOT_FOUND"),
      (CoreError::GatewayNotFound(Uuid::nil()), 404, "GATEWAY_NOT_FOUND"),
    ];
    for (err, status, code) in cases {
      let api = ApiError::from(err);
      assert_eq!(api.status().as_u16(), status);
      assert_eq!(api.code(), code);
    }
  }

  #[test]
  fn forbidden_uses_unauthorized_code() {
    let err = ApiError::forbidden("not yours");
    assert_eq!(err.status(), StatusCode::FORBIDDEN);
    assert_eq!(err.code(), "UNAUTHORIZED");
  }

  #[tokio::test]
  async fn internal_message_is_redacted() {
    let err = ApiError::Internal("disk on fire".into());
    let res = err.into_response();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "internal server error");
    assert_eq!(body["errorCode"], "INTERNAL_ERROR");
    assert!(!String::from_utf8_lossy(&bytes).contains("disk on fire"));
  }
}
