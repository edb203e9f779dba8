//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use placement_core::{Error, error::FieldError};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("validation failed")]
  Validation(Vec<FieldError>),

  /// The caller's version is stale.
  #[error("precondition failed: {0}")]
  PreconditionFailed(String),

  #[error("an If-Match header is required")]
  PreconditionRequired,

  #[error("{0}")]
  AlreadyActive(String),

  #[error("{0}")]
  PermissionDenied(String),

  #[error("internal error: {0}")]
  Internal(String),
}

impl From<Error> for ApiError {
  fn from(e: Error) -> Self {
    match e {
      Error::RecordNotFound(_) | Error::ArchiveEntryNotFound(_) => Self::NotFound(e.to_string()),
      Error::Validation(fields) => Self::Validation(fields),
      Error::Conflict { .. } => Self::PreconditionFailed(e.to_string()),
      Error::AlreadyActive(_) => Self::AlreadyActive(e.to_string()),
      Error::PermissionDenied(_) => Self::PermissionDenied(e.to_string()),
      Error::SyncFailure { .. } | Error::Store(_) | Error::Serialization(_) => {
        Self::Internal(e.to_string())
      }
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
      ApiError::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
      ApiError::PreconditionRequired => StatusCode::PRECONDITION_REQUIRED,
      ApiError::AlreadyActive(_) => StatusCode::CONFLICT,
      ApiError::PermissionDenied(_) => StatusCode::FORBIDDEN,
      ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = match &self {
      ApiError::Validation(fields) => json!({ "error": self.to_string(), "fields": fields }),
      _ => json!({ "error": self.to_string() }),
    };
    (status, Json(body)).into_response()
  }
}
