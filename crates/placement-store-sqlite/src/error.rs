//! Error type for `placement-store-sqlite`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] placement_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("column decode error: {0}")]
  Decode(String),

  #[error("record not found: {0}")]
  RecordNotFound(Uuid),

  #[error("record {0} already exists")]
  AlreadyActive(Uuid),

  #[error("version conflict on {id}: expected {expected}, found {actual}")]
  Conflict { id: Uuid, expected: u64, actual: u64 },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  /// SQLite refused the statement for access reasons rather than data reasons.
  fn is_permission_denied(&self) -> bool {
    use rusqlite::ErrorCode;

    let Error::Database(tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(
      failure,
      _,
    ))) = self
    else {
      return false;
    };
    matches!(
      failure.code,
      ErrorCode::ReadOnly | ErrorCode::PermissionDenied | ErrorCode::AuthorizationForStatementDenied
    )
  }
}

impl From<Error> for placement_core::Error {
  fn from(e: Error) -> Self {
    if e.is_permission_denied() {
      return Self::PermissionDenied(e.to_string());
    }
    match e {
      Error::Core(inner) => inner,
      Error::RecordNotFound(id) => Self::RecordNotFound(id),
      Error::AlreadyActive(id) => Self::AlreadyActive(id),
      Error::Conflict { id, expected, actual } => Self::Conflict { id, expected, actual },
      Error::Json(inner) => Self::Serialization(inner),
      other => Self::store(other),
    }
  }
}
