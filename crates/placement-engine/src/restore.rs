//! Bringing archived records back into the primary store.

use std::sync::Arc;

use placement_core::{
  Error, Result,
  record::Record,
  store::{ArchiveStore, MirrorStore, PrimaryStore},
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
  feed::{ChangeFeed, ChangeKind},
  report::BulkReport,
  sync::LifecycleSynchronizer,
};

pub struct RestoreCoordinator<P, A, M> {
  primary:      Arc<P>,
  archive:      Arc<A>,
  synchronizer: Arc<LifecycleSynchronizer<P, M>>,
  feed:         ChangeFeed,
}

impl<P, A, M> RestoreCoordinator<P, A, M>
where
  P: PrimaryStore,
  A: ArchiveStore,
  M: MirrorStore,
{
  pub fn new(
    primary: Arc<P>,
    archive: Arc<A>,
    synchronizer: Arc<LifecycleSynchronizer<P, M>>,
    feed: ChangeFeed,
  ) -> Self {
    Self { primary, archive, synchronizer, feed }
  }

  /// Put the archived snapshot of `id` back under the same id, remove the
  /// archive entry, then reconcile against today's date.
  ///
  /// The record keeps the status it had when archived until reconciliation
  /// runs. A reconciliation failure is logged and does not undo the restore;
  /// the next pass picks the record up.
  pub async fn restore(&self, id: Uuid, actor_role: &str) -> Result<Record> {
    let entry = self
      .archive
      .get(id)
      .await
      .map_err(Into::into)?
      .ok_or(Error::ArchiveEntryNotFound(id))?;
    let mut record = entry.into_record();

    self.primary.insert(record.clone()).await.map_err(Into::into)?;

    if let Err(e) = self.archive.delete(id).await {
      let e: Error = e.into();
      error!(%id, actor_role, error = %e, "restored record still in archive; purge the entry");
    }
    self.feed.publish(id, ChangeKind::Restored);
    info!(%id, actor_role, "record restored");

    match self.synchronizer.reconcile_one(&record).await {
      Ok(plan) => {
        if let Some(derived) = plan.derived {
          record.apply_derived(derived);
        }
      }
      Err(e) => warn!(%id, error = %e, "post-restore reconciliation failed"),
    }
    Ok(record)
  }

  /// Restore each id independently.
  pub async fn restore_many(&self, ids: &[Uuid], actor_role: &str) -> BulkReport {
    let mut report = BulkReport::default();
    for &id in ids {
      let outcome = self.restore(id, actor_role).await.map(|_| ());
      report.record(id, outcome);
    }
    info!(
      actor_role,
      succeeded = report.succeeded.len(),
      failed = report.failed.len(),
      "bulk restore complete"
    );
    report
  }
}
