//! The lifecycle synchronizer.
//!
//! For each active record, compare the stored derived fields with a fresh
//! evaluation and the mirror's copy with the record's projection, and write
//! only what differs. Running it on a consistent record issues no writes,
//! which is what lets every change notification (including the ones our own
//! write-backs produce) safely trigger another pass.

use std::{collections::HashSet, sync::Arc};

use chrono::NaiveDate;
use futures::future::join_all;
use placement_core::{
  Error, Result,
  clock::Clock,
  mirror::MirrorProjection,
  record::{DerivedFields, Record},
  store::{MirrorStore, PrimaryStore},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  feed::{ChangeFeed, ChangeKind},
  mirror_queue::{MirrorOp, MirrorQueue},
  report::{BulkFailure, ReconcileReport},
};

/// What one record needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
  pub id:      Uuid,
  /// Derived fields to write back, if the stored ones had drifted.
  pub derived: Option<DerivedFields>,
  /// Projection to push, if the mirror's copy was missing or stale.
  pub mirror:  Option<MirrorProjection>,
}

impl Reconciliation {
  pub fn is_noop(&self) -> bool { self.derived.is_none() && self.mirror.is_none() }
}

/// Work out what `record` needs as of `today`, given the mirror's current
/// copy. Pure.
pub fn plan(
  record: &Record,
  mirrored: Option<&MirrorProjection>,
  today: NaiveDate,
  window_days: u32,
) -> Reconciliation {
  let derived = record.derive(today, window_days);

  let mut reconciled = record.clone();
  reconciled.apply_derived(derived);
  let projection = MirrorProjection::from(&reconciled);

  Reconciliation {
    id:      record.id,
    derived: (derived != record.derived()).then_some(derived),
    mirror:  (mirrored != Some(&projection)).then_some(projection),
  }
}

/// How many times one record may be re-read because a caller edit landed
/// mid-reconciliation before it is reported as a failure.
const STALE_REREADS: usize = 3;

/// Outcome of one planning attempt.
enum Attempt {
  Done(Reconciliation),
  /// The stored record had moved on; plan again against this copy.
  Stale(Record),
}

/// Failures writing derived fields back are reported as [`Error::SyncFailure`]
/// unless they carry a classification worth keeping.
fn write_back_failure(id: Uuid, e: Error) -> Error {
  match e {
    Error::RecordNotFound(_) | Error::PermissionDenied(_) => e,
    other => Error::SyncFailure { id, reason: other.to_string() },
  }
}

pub struct LifecycleSynchronizer<P, M> {
  primary:     Arc<P>,
  mirror:      Arc<M>,
  queue:       MirrorQueue,
  feed:        ChangeFeed,
  clock:       Arc<dyn Clock>,
  window_days: u32,
}

impl<P, M> LifecycleSynchronizer<P, M>
where
  P: PrimaryStore,
  M: MirrorStore,
{
  pub fn new(
    primary: Arc<P>,
    mirror: Arc<M>,
    queue: MirrorQueue,
    feed: ChangeFeed,
    clock: Arc<dyn Clock>,
    window_days: u32,
  ) -> Self {
    Self { primary, mirror, queue, feed, clock, window_days }
  }

  /// Bring one record's derived fields and mirror entry up to date.
  ///
  /// The write-back happens before this returns; the mirror push is queued.
  /// If the write-back fails the mirror is left alone so it keeps agreeing
  /// with the primary store. When `record` is older than what the primary
  /// store holds, the stored copy is reconciled instead.
  pub async fn reconcile_one(&self, record: &Record) -> Result<Reconciliation> {
    self.reconcile_at(record, self.clock.today()).await
  }

  /// Re-read `id` from the primary store and reconcile it. An id that is no
  /// longer active has its mirror entry removed.
  pub async fn reconcile_id(&self, id: Uuid) -> Result<Option<Reconciliation>> {
    match self.primary.get(id).await.map_err(Into::into)? {
      Some(record) => self.reconcile_one(&record).await.map(Some),
      None => {
        self.queue.enqueue(id, MirrorOp::Remove);
        Ok(None)
      }
    }
  }

  async fn reconcile_at(&self, record: &Record, today: NaiveDate) -> Result<Reconciliation> {
    let mut current = record.clone();
    for _ in 0..=STALE_REREADS {
      match self.attempt(&current, today).await? {
        Attempt::Done(plan) => return Ok(plan),
        Attempt::Stale(fresh) => {
          debug!(
            id = %fresh.id,
            planned = current.version,
            stored = fresh.version,
            "record moved during reconciliation; planning again"
          );
          current = fresh;
        }
      }
    }
    Err(Error::SyncFailure {
      id:     record.id,
      reason: format!("record changed {} times while being reconciled", STALE_REREADS + 1),
    })
  }

  /// Plan against `record` and apply the plan, unless the stored record has
  /// moved past `record.version`. Nothing derived from an out-of-date copy
  /// reaches either store.
  async fn attempt(&self, record: &Record, today: NaiveDate) -> Result<Attempt> {
    let id = record.id;

    let mirrored = match self.mirror.get(id).await {
      Ok(m) => m,
      Err(e) => {
        let e: Error = e.into();
        warn!(%id, error = %e, "mirror read failed; pushing projection unconditionally");
        None
      }
    };

    let plan = plan(record, mirrored.as_ref(), today, self.window_days);

    if let Some(derived) = plan.derived {
      let written: Result<()> =
        self.primary.write_derived(id, record.version, derived).await.map_err(Into::into);
      match written {
        Ok(()) => {}
        Err(Error::Conflict { .. }) => return self.reread(id).await.map(Attempt::Stale),
        Err(e) => return Err(write_back_failure(id, e)),
      }
      debug!(
        %id,
        status = %derived.moa_status,
        visible = derived.visible_to_mobile,
        "derived fields written back"
      );
      self.feed.publish(id, ChangeKind::Derived);
    } else if plan.mirror.is_some() {
      // No guarded write pinned the version, so check it before pushing.
      let stored = self.reread(id).await?;
      if stored.version != record.version {
        return Ok(Attempt::Stale(stored));
      }
    }

    if let Some(projection) = &plan.mirror {
      debug!(%id, moa_present = projection.moa_present, "mirror projection queued");
      self.queue.enqueue(id, MirrorOp::Upsert(projection.clone()));
    }

    Ok(Attempt::Done(plan))
  }

  async fn reread(&self, id: Uuid) -> Result<Record> {
    self.primary.get(id).await.map_err(Into::into)?.ok_or(Error::RecordNotFound(id))
  }

  /// Reconcile every active record, then queue removal of mirror entries
  /// with no active record behind them.
  ///
  /// Records are reconciled concurrently and independently: one failure is
  /// logged and reported, and the rest of the pass carries on.
  pub async fn reconcile_all(&self) -> Result<ReconcileReport> {
    let records = self.primary.list().await.map_err(Into::into)?;
    let today = self.clock.today();

    let outcomes = join_all(records.iter().map(|r| self.reconcile_at(r, today))).await;

    let mut report = ReconcileReport { examined: records.len(), ..Default::default() };
    for (record, outcome) in records.iter().zip(outcomes) {
      match outcome {
        Ok(r) => {
          report.derived_written += usize::from(r.derived.is_some());
          report.mirror_pushed += usize::from(r.mirror.is_some());
        }
        Err(e) => {
          warn!(id = %record.id, error = %e, "record not reconciled");
          report.failed.push(BulkFailure::new(record.id, &e));
        }
      }
    }

    let active: HashSet<Uuid> = records.iter().map(|r| r.id).collect();
    report.orphans_removed = self.remove_orphans(&active).await;

    info!(
      examined = report.examined,
      derived_written = report.derived_written,
      mirror_pushed = report.mirror_pushed,
      orphans_removed = report.orphans_removed,
      failed = report.failed.len(),
      "reconciliation pass complete"
    );
    Ok(report)
  }

  /// Queue removal of mirror entries whose id is not in `active`. Each
  /// candidate is re-checked against the primary store so a record created
  /// during the pass keeps its entry.
  async fn remove_orphans(&self, active: &HashSet<Uuid>) -> usize {
    let mirrored = match self.mirror.list().await {
      Ok(entries) => entries,
      Err(e) => {
        let e: Error = e.into();
        warn!(error = %e, "mirror listing failed; orphan sweep skipped");
        return 0;
      }
    };

    let mut removed = 0;
    for (id, _) in mirrored.into_iter().filter(|(id, _)| !active.contains(id)) {
      match self.primary.get(id).await {
        Ok(None) => {
          debug!(%id, "orphan mirror entry queued for removal");
          self.queue.enqueue(id, MirrorOp::Remove);
          removed += 1;
        }
        Ok(Some(_)) => {}
        Err(e) => {
          let e: Error = e.into();
          warn!(%id, error = %e, "could not confirm orphan; leaving mirror entry");
        }
      }
    }
    removed
  }
}
