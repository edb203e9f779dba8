//! Soft deletion: moving records from the primary store into the archive.
//!
//! The archive write always happens before the primary delete. A crash or
//! failure between the two leaves the record in both stores, never in
//! neither.

use std::sync::Arc;

use placement_core::{
  Error, Result,
  archive::ArchiveEntry,
  clock::Clock,
  store::{ArchiveStore, PrimaryStore},
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
  feed::{ChangeFeed, ChangeKind},
  mirror_queue::{MirrorOp, MirrorQueue},
  report::BulkReport,
};

pub struct ArchiveManager<P, A> {
  primary: Arc<P>,
  archive: Arc<A>,
  queue:   MirrorQueue,
  feed:    ChangeFeed,
  clock:   Arc<dyn Clock>,
}

impl<P, A> ArchiveManager<P, A>
where
  P: PrimaryStore,
  A: ArchiveStore,
{
  pub fn new(
    primary: Arc<P>,
    archive: Arc<A>,
    queue: MirrorQueue,
    feed: ChangeFeed,
    clock: Arc<dyn Clock>,
  ) -> Self {
    Self { primary, archive, queue, feed, clock }
  }

  /// Move `id` into the archive, stamped with `actor_role` and the current
  /// time, and queue removal of its mirror entry.
  ///
  /// With `expected_version`, a record that has moved on is refused with
  /// [`Error::Conflict`]. The same happens if it moves on between the read
  /// and the delete; the snapshot written in the meantime is withdrawn.
  pub async fn archive(
    &self,
    id: Uuid,
    actor_role: &str,
    expected_version: Option<u64>,
  ) -> Result<ArchiveEntry> {
    let record = self
      .primary
      .get(id)
      .await
      .map_err(Into::into)?
      .ok_or(Error::RecordNotFound(id))?;

    if let Some(expected) = expected_version.filter(|v| *v != record.version) {
      return Err(Error::Conflict { id, expected, actual: record.version });
    }

    let version = record.version;
    let entry = ArchiveEntry::new(record, self.clock.now(), actor_role);
    self.archive.put(entry.clone()).await.map_err(Into::into)?;

    if let Err(e) = self.primary.delete(id, version).await {
      let e: Error = e.into();
      if matches!(e, Error::Conflict { .. }) {
        self.withdraw(id).await;
      } else {
        warn!(%id, actor_role, error = %e, "primary delete failed after archiving; snapshot kept");
      }
      return Err(e);
    }

    self.queue.enqueue(id, MirrorOp::Remove);
    self.feed.publish(id, ChangeKind::Archived);
    info!(%id, actor_role, version, "record archived");
    Ok(entry)
  }

  async fn withdraw(&self, id: Uuid) {
    if let Err(e) = self.archive.delete(id).await {
      let e: Error = e.into();
      error!(%id, error = %e, "could not withdraw archive snapshot; record is in both stores");
    }
  }

  /// Archive each id independently.
  pub async fn archive_many(&self, ids: &[Uuid], actor_role: &str) -> BulkReport {
    let mut report = BulkReport::default();
    for &id in ids {
      let outcome = self.archive(id, actor_role, None).await.map(|_| ());
      report.record(id, outcome);
    }
    info!(
      actor_role,
      succeeded = report.succeeded.len(),
      failed = report.failed.len(),
      "bulk archive complete"
    );
    report
  }

  /// Archived snapshots, most recently archived first.
  pub async fn list(&self) -> Result<Vec<ArchiveEntry>> {
    self.archive.list().await.map_err(Into::into)
  }

  pub async fn get(&self, id: Uuid) -> Result<ArchiveEntry> {
    self
      .archive
      .get(id)
      .await
      .map_err(Into::into)?
      .ok_or(Error::ArchiveEntryNotFound(id))
  }

  /// Permanently delete an archived snapshot.
  pub async fn purge(&self, id: Uuid, actor_role: &str) -> Result<()> {
    if self.archive.delete(id).await.map_err(Into::into)? {
      info!(%id, actor_role, "archive entry purged");
      Ok(())
    } else {
      Err(Error::ArchiveEntryNotFound(id))
    }
  }
}
