//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use wayfare_core::store::{ClassifyError, StoreErrorKind};
use wayfare_engine::EngineError;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// Lost a race with a concurrent writer; the request may be retried.
  #[error("conflict: {0}")]
  Conflict(String),

  /// The backing store could not be reached.
  #[error("store unavailable: {0}")]
  Unavailable(String),

  #[error("internal error: {0}")]
  Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Map an engine failure onto an HTTP-shaped error via its classification,
  /// keeping handlers free of backend-specific matching.
  pub fn from_engine<E>(e: EngineError<E>) -> Self
  where
    E: std::error::Error + ClassifyError + Send + Sync + 'static,
  {
    match e.kind() {
      StoreErrorKind::Conflict => Self::Conflict(e.to_string()),
      StoreErrorKind::Unavailable => Self::Unavailable(e.to_string()),
      StoreErrorKind::JourneyNotStarted => Self::NotFound(e.to_string()),
      StoreErrorKind::Other => Self::Internal(Box::new(e)),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, retryable, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, false, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, false, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, true, m.clone()),
      ApiError::Unavailable(m) => {
        (StatusCode::SERVICE_UNAVAILABLE, true, m.clone())
      }
      ApiError::Internal(e) => {
        (StatusCode::INTERNAL_SERVER_ERROR, false, e.to_string())
      }
    };
    (status, Json(json!({ "error": message, "retryable": retryable })))
      .into_response()
  }
}
