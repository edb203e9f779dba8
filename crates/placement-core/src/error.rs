//! Error types for `placement-core`.
//!
//! This is the taxonomy every layer above the stores speaks. Backends keep
//! their own error enums and convert into this one at the trait boundary.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// A single rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
  pub field:   &'static str,
  pub message: String,
}

impl std::fmt::Display for FieldError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}: {}", self.field, self.message)
  }
}

/// Coarse classification of an [`Error`], for aggregate reports and
/// transport-level status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
  NotFound,
  Validation,
  Conflict,
  AlreadyActive,
  PermissionDenied,
  SyncFailure,
  Store,
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("record not found: {0}")]
  RecordNotFound(Uuid),

  #[error("archive entry not found: {0}")]
  ArchiveEntryNotFound(Uuid),

  #[error("record {0} is already active")]
  AlreadyActive(Uuid),

  #[error("validation failed: {}", join_fields(.0))]
  Validation(Vec<FieldError>),

  #[error("version conflict on {id}: expected {expected}, found {actual}")]
  Conflict { id: Uuid, expected: u64, actual: u64 },

  #[error("permission denied: {0} (re-authenticate and retry)")]
  PermissionDenied(String),

  #[error("mirror sync failed for {id}: {reason}")]
  SyncFailure { id: Uuid, reason: String },

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// True for either flavour of missing-id error.
  pub fn is_not_found(&self) -> bool {
    matches!(self, Self::RecordNotFound(_) | Self::ArchiveEntryNotFound(_))
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::RecordNotFound(_) | Self::ArchiveEntryNotFound(_) => ErrorKind::NotFound,
      Self::AlreadyActive(_) => ErrorKind::AlreadyActive,
      Self::Validation(_) => ErrorKind::Validation,
      Self::Conflict { .. } => ErrorKind::Conflict,
      Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
      Self::SyncFailure { .. } => ErrorKind::SyncFailure,
      Self::Store(_) | Self::Serialization(_) => ErrorKind::Store,
    }
  }

  /// Wrap an arbitrary backend error.
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

fn join_fields(errors: &[FieldError]) -> String {
  errors
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<_>>()
    .join("; ")
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
