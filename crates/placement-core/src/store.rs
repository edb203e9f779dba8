//! Store traits for the three collections the engine moves records between.
//!
//! Implemented by storage backends (e.g. `placement-store-sqlite`) and by the
//! in-memory fakes in `placement-engine`. The engine depends on these
//! abstractions, never on a concrete backend.
//!
//! Each trait carries its own `Error` type. The `Into<crate::Error>` bound lets
//! the engine classify backend failures (missing id, version conflict,
//! permission problem) without knowing the backend.
//!
//! All methods return `Send` futures so implementations can be driven from
//! spawned tokio tasks.

use std::future::Future;

use uuid::Uuid;

use crate::{
  archive::ArchiveEntry,
  mirror::MirrorProjection,
  record::{DerivedFields, Record},
};

// ─── Primary ─────────────────────────────────────────────────────────────────

/// The canonical record collection.
pub trait PrimaryStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static + Into<crate::Error>;

  /// Retrieve a record by id. Returns `None` if not found.
  fn get(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Record>, Self::Error>> + Send + '_;

  /// All records, in no particular order.
  fn list(&self) -> impl Future<Output = Result<Vec<Record>, Self::Error>> + Send + '_;

  /// Persist a record under its own id.
  ///
  /// Fails with an error converting to [`crate::Error::AlreadyActive`] if the
  /// id is taken.
  fn insert(&self, record: Record) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Replace a record, provided the stored version still equals
  /// `expected_version`.
  ///
  /// Fails with `RecordNotFound` or `Conflict` otherwise.
  fn update(
    &self,
    record: Record,
    expected_version: u64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Overwrite only the engine-owned fields, provided the stored version
  /// still equals `expected_version` (the version the fields were derived
  /// from). Does not touch `version` or `updated_at`.
  ///
  /// Fails with `RecordNotFound` or `Conflict` otherwise.
  fn write_derived(
    &self,
    id: Uuid,
    expected_version: u64,
    derived: DerivedFields,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Remove a record, provided the stored version equals `expected_version`.
  ///
  /// Fails with `RecordNotFound` or `Conflict` otherwise.
  fn delete(
    &self,
    id: Uuid,
    expected_version: u64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

// ─── Archive ─────────────────────────────────────────────────────────────────

/// Snapshots of soft-deleted records, keyed by the original id.
pub trait ArchiveStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static + Into<crate::Error>;

  fn get(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<ArchiveEntry>, Self::Error>> + Send + '_;

  fn list(&self) -> impl Future<Output = Result<Vec<ArchiveEntry>, Self::Error>> + Send + '_;

  /// Write an entry, replacing any existing entry for the same id.
  fn put(&self, entry: ArchiveEntry) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Remove an entry. Returns `false` if there was nothing to remove.
  fn delete(&self, id: Uuid) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}

// ─── Mirror ──────────────────────────────────────────────────────────────────

/// The projection collection read by the mobile client.
pub trait MirrorStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static + Into<crate::Error>;

  fn get(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<MirrorProjection>, Self::Error>> + Send + '_;

  fn list(
    &self,
  ) -> impl Future<Output = Result<Vec<(Uuid, MirrorProjection)>, Self::Error>> + Send + '_;

  /// Write a projection, replacing any existing one.
  fn put(
    &self,
    id: Uuid,
    projection: MirrorProjection,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Remove a projection. Returns `false` if there was nothing to remove.
  fn delete(&self, id: Uuid) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}
