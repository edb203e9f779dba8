//! Archive entries: frozen snapshots of soft-deleted records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::record::Record;

/// A [`Record`] as it was when archived, plus who archived it and when.
///
/// Serialises flat: every record field at the top level alongside
/// `deleted_at` and `deleted_by_role`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntry {
  #[serde(flatten)]
  pub record:          Record,
  pub deleted_at:      DateTime<Utc>,
  pub deleted_by_role: String,
}

impl ArchiveEntry {
  pub fn new(record: Record, deleted_at: DateTime<Utc>, deleted_by_role: impl Into<String>) -> Self {
    Self { record, deleted_at, deleted_by_role: deleted_by_role.into() }
  }

  pub fn id(&self) -> Uuid { self.record.id }

  /// Drop the archive metadata and hand back the record shape.
  pub fn into_record(self) -> Record { self.record }
}
