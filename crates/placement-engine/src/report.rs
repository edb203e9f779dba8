//! Aggregate outcomes of bulk operations and reconciliation passes.

use placement_core::{Error, error::ErrorKind};
use serde::Serialize;
use uuid::Uuid;

/// One id that a bulk operation could not process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkFailure {
  pub id:    Uuid,
  pub kind:  ErrorKind,
  pub error: String,
}

impl BulkFailure {
  pub fn new(id: Uuid, error: &Error) -> Self {
    Self { id, kind: error.kind(), error: error.to_string() }
  }
}

/// Result of a bulk archive or restore. Each id is processed independently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkReport {
  pub succeeded: Vec<Uuid>,
  pub failed:    Vec<BulkFailure>,
}

impl BulkReport {
  pub fn record(&mut self, id: Uuid, outcome: Result<(), Error>) {
    match outcome {
      Ok(()) => self.succeeded.push(id),
      Err(e) => self.failed.push(BulkFailure::new(id, &e)),
    }
  }

  /// Some ids succeeded and some failed.
  pub fn is_partial(&self) -> bool { !self.succeeded.is_empty() && !self.failed.is_empty() }
}

/// Result of one reconciliation pass over the primary store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
  /// Records examined.
  pub examined:        usize,
  /// Records whose derived fields were written back.
  pub derived_written: usize,
  /// Projections handed to the mirror queue.
  pub mirror_pushed:   usize,
  /// Mirror entries with no active record, queued for removal.
  pub orphans_removed: usize,
  /// Records the pass could not reconcile. Retried on the next pass.
  pub failed:          Vec<BulkFailure>,
}
