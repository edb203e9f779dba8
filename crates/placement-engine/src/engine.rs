//! [`Engine`]: one handle over the stores, the synchronizer, the archive
//! manager and the restore coordinator.

use std::sync::Arc;

use placement_core::{
  Error, Result,
  archive::ArchiveEntry,
  clock::Clock,
  mirror::MirrorProjection,
  record::{Attribution, Record, RecordDraft},
  status::{MoaStatus, StatusCounts},
  store::{ArchiveStore, MirrorStore, PrimaryStore},
  validate,
};
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
  archive::ArchiveManager,
  config::EngineConfig,
  feed::{ChangeFeed, ChangeKind, RecordChange},
  mirror_queue::{DeadLetter, MirrorQueue, MirrorStats},
  report::{BulkReport, ReconcileReport},
  restore::RestoreCoordinator,
  sync::LifecycleSynchronizer,
};

/// Selects active records by status and/or mobile visibility. Empty matches
/// everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct RecordFilter {
  pub status:  Option<MoaStatus>,
  pub visible: Option<bool>,
}

impl RecordFilter {
  pub fn matches(&self, record: &Record) -> bool {
    self.status.is_none_or(|s| s == record.moa_status)
      && self.visible.is_none_or(|v| v == record.visible_to_mobile)
  }
}

pub struct Engine<P, A, M> {
  primary:      Arc<P>,
  mirror:       Arc<M>,
  clock:        Arc<dyn Clock>,
  config:       EngineConfig,
  feed:         ChangeFeed,
  queue:        MirrorQueue,
  synchronizer: Arc<LifecycleSynchronizer<P, M>>,
  archiver:     ArchiveManager<P, A>,
  restorer:     RestoreCoordinator<P, A, M>,
}

impl<P, A, M> Engine<P, A, M>
where
  P: PrimaryStore + 'static,
  A: ArchiveStore + 'static,
  M: MirrorStore + 'static,
{
  /// Assemble the engine and start its mirror worker. Must be called from
  /// within a tokio runtime.
  pub fn new(
    primary: Arc<P>,
    archive: Arc<A>,
    mirror: Arc<M>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
  ) -> Self {
    let feed = ChangeFeed::default();
    let (queue, _worker) = MirrorQueue::spawn(mirror.clone(), config.mirror_retry.clone());

    let synchronizer = Arc::new(LifecycleSynchronizer::new(
      primary.clone(),
      mirror.clone(),
      queue.clone(),
      feed.clone(),
      clock.clone(),
      config.window_days,
    ));
    let archiver = ArchiveManager::new(
      primary.clone(),
      archive.clone(),
      queue.clone(),
      feed.clone(),
      clock.clone(),
    );
    let restorer =
      RestoreCoordinator::new(primary.clone(), archive, synchronizer.clone(), feed.clone());

    Self { primary, mirror, clock, config, feed, queue, synchronizer, archiver, restorer }
  }

  pub fn config(&self) -> &EngineConfig { &self.config }

  pub fn subscribe(&self) -> broadcast::Receiver<RecordChange> { self.feed.subscribe() }

  /// Report a write made to the primary store behind the engine's back, so
  /// the sync loop picks `id` up without waiting for the next full pass.
  pub fn notify_changed(&self, id: Uuid) { self.feed.publish(id, ChangeKind::Updated); }

  pub fn synchronizer(&self) -> &LifecycleSynchronizer<P, M> { &self.synchronizer }

  // ─── Records ───────────────────────────────────────────────────────────────

  /// Validate and insert a new record, then bring its mirror entry up.
  pub async fn create(&self, draft: RecordDraft, created_by: Option<Attribution>) -> Result<Record> {
    let draft = validate::prepare(draft, self.config.moa_required)?;
    let record = Record::new(
      Uuid::new_v4(),
      draft,
      created_by,
      self.clock.now(),
      self.clock.today(),
      self.config.window_days,
    );

    self.primary.insert(record.clone()).await.map_err(Into::into)?;
    self.feed.publish(record.id, ChangeKind::Created);
    info!(id = %record.id, status = %record.moa_status, "record created");

    self.sync_after_write(&record).await;
    Ok(record)
  }

  /// Replace the caller-editable fields of `id`, provided it is still at
  /// `expected_version`.
  pub async fn update(&self, id: Uuid, expected_version: u64, draft: RecordDraft) -> Result<Record> {
    let draft = validate::prepare(draft, self.config.moa_required)?;
    let current = self.get(id).await?;
    if current.version != expected_version {
      return Err(Error::Conflict { id, expected: expected_version, actual: current.version });
    }

    let mut next = current;
    next.apply_draft(draft, self.clock.now(), self.clock.today(), self.config.window_days);
    next.version = expected_version + 1;

    self.primary.update(next.clone(), expected_version).await.map_err(Into::into)?;
    self.feed.publish(id, ChangeKind::Updated);
    info!(%id, version = next.version, status = %next.moa_status, "record updated");

    self.sync_after_write(&next).await;
    Ok(next)
  }

  async fn sync_after_write(&self, record: &Record) {
    if let Err(e) = self.synchronizer.reconcile_one(record).await {
      warn!(id = %record.id, error = %e, "reconciliation after write failed");
    }
  }

  pub async fn get(&self, id: Uuid) -> Result<Record> {
    self.primary.get(id).await.map_err(Into::into)?.ok_or(Error::RecordNotFound(id))
  }

  pub async fn list(&self, filter: &RecordFilter) -> Result<Vec<Record>> {
    let all = self.primary.list().await.map_err(Into::into)?;
    Ok(all.into_iter().filter(|r| filter.matches(r)).collect())
  }

  /// Status counts across active records, evaluated as of today rather than
  /// read from the stored fields.
  pub async fn status_summary(&self) -> Result<StatusCounts> {
    let today = self.clock.today();
    let all = self.primary.list().await.map_err(Into::into)?;
    Ok(all.iter().map(|r| r.evaluate(today, self.config.window_days).status).collect())
  }

  // ─── Archive ───────────────────────────────────────────────────────────────

  pub async fn archive(
    &self,
    id: Uuid,
    actor_role: &str,
    expected_version: Option<u64>,
  ) -> Result<ArchiveEntry> {
    self.archiver.archive(id, actor_role, expected_version).await
  }

  pub async fn archive_many(&self, ids: &[Uuid], actor_role: &str) -> BulkReport {
    self.archiver.archive_many(ids, actor_role).await
  }

  pub async fn list_archived(&self) -> Result<Vec<ArchiveEntry>> { self.archiver.list().await }

  pub async fn get_archived(&self, id: Uuid) -> Result<ArchiveEntry> { self.archiver.get(id).await }

  pub async fn purge(&self, id: Uuid, actor_role: &str) -> Result<()> {
    self.archiver.purge(id, actor_role).await
  }

  pub async fn restore(&self, id: Uuid, actor_role: &str) -> Result<Record> {
    self.restorer.restore(id, actor_role).await
  }

  pub async fn restore_many(&self, ids: &[Uuid], actor_role: &str) -> BulkReport {
    self.restorer.restore_many(ids, actor_role).await
  }

  // ─── Reconciliation ────────────────────────────────────────────────────────

  pub async fn reconcile_all(&self) -> Result<ReconcileReport> {
    self.synchronizer.reconcile_all().await
  }

  pub async fn reconcile_id(&self, id: Uuid) -> Result<()> {
    self.synchronizer.reconcile_id(id).await.map(|_| ())
  }

  // ─── Mirror ────────────────────────────────────────────────────────────────

  /// The mobile read path: what the mirror store currently holds.
  pub async fn mirror_projections(&self) -> Result<Vec<(Uuid, MirrorProjection)>> {
    self.mirror.list().await.map_err(Into::into)
  }

  /// Resolve once every queued mirror write has been applied or
  /// dead-lettered.
  pub async fn wait_mirror_idle(&self) { self.queue.wait_idle().await }

  pub fn mirror_stats(&self) -> MirrorStats { self.queue.stats() }

  pub fn dead_letters(&self) -> Vec<DeadLetter> { self.queue.dead_letters() }
}
