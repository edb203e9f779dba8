//! Change notifications for records in the primary store.
//!
//! Every engine-side mutation publishes a [`RecordChange`]. The
//! [`crate::sync_loop::SyncLoop`] subscribes and reconciles the named ids.
//! Messages carry only the id; subscribers re-read the store, so a dropped or
//! lagged message costs a full pass, never a wrong result.

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeKind {
  Created,
  Updated,
  /// Derived MOA fields were written back by the synchronizer.
  Derived,
  Archived,
  Restored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecordChange {
  pub id:   Uuid,
  pub kind: ChangeKind,
}

#[derive(Debug, Clone)]
pub struct ChangeFeed {
  tx: broadcast::Sender<RecordChange>,
}

impl ChangeFeed {
  pub fn new(capacity: usize) -> Self {
    let (tx, _) = broadcast::channel(capacity.max(1));
    Self { tx }
  }

  pub fn publish(&self, id: Uuid, kind: ChangeKind) {
    // No subscribers is fine: nothing is waiting to reconcile.
    let _ = self.tx.send(RecordChange { id, kind });
  }

  pub fn subscribe(&self) -> broadcast::Receiver<RecordChange> { self.tx.subscribe() }
}

impl Default for ChangeFeed {
  fn default() -> Self { Self::new(256) }
}
