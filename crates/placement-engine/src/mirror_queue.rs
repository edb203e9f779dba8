//! Background application of mirror writes.
//!
//! Primary-store mutations never wait on the mirror. They hand a
//! [`MirrorOp`] to the [`MirrorQueue`] and return. A worker applies each op
//! with exponential backoff, and after `max_attempts` failures the op is
//! dead-lettered: logged, counted, and left for the next reconciliation pass
//! to repair.
//!
//! At most one op per id is in flight at a time, and only the newest queued
//! op for an id is kept. Writes to the same id are therefore applied in the
//! order they were enqueued, and a stale projection never lands after a
//! fresh one.

use std::{
  collections::{HashMap, VecDeque},
  sync::{
    Arc, Mutex, MutexGuard,
    atomic::{AtomicU64, Ordering},
  },
};

use placement_core::{Error, mirror::MirrorProjection, store::MirrorStore};
use serde::Serialize;
use tokio::{
  sync::{mpsc, watch},
  task::JoinHandle,
};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::config::RetryPolicy;

/// Dead letters kept for inspection; older ones are only in the log.
const DEAD_LETTERS_KEPT: usize = 64;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> { m.lock().unwrap_or_else(|e| e.into_inner()) }

// ─── Ops ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorOp {
  Upsert(MirrorProjection),
  Remove,
}

impl MirrorOp {
  pub fn label(&self) -> &'static str {
    match self {
      Self::Upsert(_) => "upsert",
      Self::Remove => "remove",
    }
  }
}

/// An op that exhausted its retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeadLetter {
  pub id:       Uuid,
  pub op:       &'static str,
  pub attempts: u32,
  pub error:    String,
}

/// Counters since the queue was spawned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MirrorStats {
  /// Ops applied successfully.
  pub pushed:          u64,
  /// Failed attempts, including the final one of each dead letter.
  pub failed_attempts: u64,
  pub dead_lettered:   u64,
  /// Queued ops replaced by a newer op for the same id.
  pub superseded:      u64,
  /// Ops refused because the queue was full.
  pub dropped:         u64,
  /// Ids currently queued or in flight.
  pub pending:         usize,
}

// ─── Queue ───────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Counters {
  pushed:          AtomicU64,
  failed_attempts: AtomicU64,
  dead_lettered:   AtomicU64,
  superseded:      AtomicU64,
  dropped:         AtomicU64,
}

fn bump(counter: &AtomicU64) { counter.fetch_add(1, Ordering::Relaxed); }

struct Shared {
  /// One slot per queued or in-flight id, holding the next op to apply.
  /// A slot holding `None` is in flight with nothing newer behind it.
  slots:        Mutex<HashMap<Uuid, Option<MirrorOp>>>,
  pending:      watch::Sender<usize>,
  dead_letters: Mutex<VecDeque<DeadLetter>>,
  counters:     Counters,
  capacity:     usize,
}

impl Shared {
  fn publish_pending(&self, slots: &HashMap<Uuid, Option<MirrorOp>>) {
    self.pending.send_replace(slots.len());
  }

  /// Take the next op for `id`, or retire the slot if there is none.
  fn next_op(&self, id: Uuid) -> Option<MirrorOp> {
    let mut slots = lock(&self.slots);
    let op = slots.get_mut(&id).and_then(Option::take);
    if op.is_none() {
      slots.remove(&id);
      self.publish_pending(&slots);
    }
    op
  }

  fn has_newer(&self, id: Uuid) -> bool {
    lock(&self.slots).get(&id).is_some_and(Option::is_some)
  }

  fn dead_letter(&self, letter: DeadLetter) {
    bump(&self.counters.dead_lettered);
    let mut letters = lock(&self.dead_letters);
    if letters.len() == DEAD_LETTERS_KEPT {
      letters.pop_front();
    }
    letters.push_back(letter);
  }
}

/// Handle for enqueueing mirror writes. Cheap to clone.
#[derive(Clone)]
pub struct MirrorQueue {
  shared: Arc<Shared>,
  tx:     mpsc::Sender<Uuid>,
}

impl MirrorQueue {
  /// Start the worker for `mirror`. Must be called from within a tokio
  /// runtime. The worker exits once every handle has been dropped and the
  /// queue has drained.
  pub fn spawn<M>(mirror: Arc<M>, policy: RetryPolicy) -> (Self, JoinHandle<()>)
  where
    M: MirrorStore + 'static,
  {
    let capacity = policy.queue_capacity.max(1);
    let (tx, rx) = mpsc::channel(capacity);
    let (pending, _) = watch::channel(0);
    let shared = Arc::new(Shared {
      slots: Mutex::new(HashMap::new()),
      pending,
      dead_letters: Mutex::new(VecDeque::new()),
      counters: Counters::default(),
      capacity,
    });
    let worker = tokio::spawn(dispatch(rx, shared.clone(), mirror, policy));
    (Self { shared, tx }, worker)
  }

  /// Queue `op` for `id`, replacing any op for `id` not yet started.
  pub fn enqueue(&self, id: Uuid, op: MirrorOp) {
    let mut slots = lock(&self.shared.slots);

    if let Some(slot) = slots.get_mut(&id) {
      if slot.replace(op).is_some() {
        bump(&self.shared.counters.superseded);
      }
      return;
    }

    if slots.len() >= self.shared.capacity {
      bump(&self.shared.counters.dropped);
      warn!(%id, op = op.label(), "mirror queue full; leaving it to the next reconciliation pass");
      return;
    }

    let label = op.label();
    slots.insert(id, Some(op));
    if let Err(e) = self.tx.try_send(id) {
      slots.remove(&id);
      bump(&self.shared.counters.dropped);
      warn!(%id, op = label, error = %e, "mirror worker not accepting ops");
    }
    self.shared.publish_pending(&slots);
  }

  /// Resolve once nothing is queued or in flight.
  pub async fn wait_idle(&self) {
    let mut rx = self.shared.pending.subscribe();
    // The sender lives as long as `self`, so this cannot fail.
    let _ = rx.wait_for(|n| *n == 0).await;
  }

  pub fn stats(&self) -> MirrorStats {
    let c = &self.shared.counters;
    MirrorStats {
      pushed:          c.pushed.load(Ordering::Relaxed),
      failed_attempts: c.failed_attempts.load(Ordering::Relaxed),
      dead_lettered:   c.dead_lettered.load(Ordering::Relaxed),
      superseded:      c.superseded.load(Ordering::Relaxed),
      dropped:         c.dropped.load(Ordering::Relaxed),
      pending:         *self.shared.pending.borrow(),
    }
  }

  /// The most recent dead letters, oldest first.
  pub fn dead_letters(&self) -> Vec<DeadLetter> {
    lock(&self.shared.dead_letters).iter().cloned().collect()
  }
}

// ─── Worker ──────────────────────────────────────────────────────────────────

async fn dispatch<M>(
  mut rx: mpsc::Receiver<Uuid>,
  shared: Arc<Shared>,
  mirror: Arc<M>,
  policy: RetryPolicy,
) where
  M: MirrorStore + 'static,
{
  while let Some(id) = rx.recv().await {
    tokio::spawn(drive(id, shared.clone(), mirror.clone(), policy.clone()));
  }
  debug!("mirror queue closed");
}

/// Apply ops for `id` until its slot is empty.
async fn drive<M: MirrorStore>(id: Uuid, shared: Arc<Shared>, mirror: Arc<M>, policy: RetryPolicy) {
  while let Some(op) = shared.next_op(id) {
    apply_with_retry(id, op, &shared, mirror.as_ref(), &policy).await;
  }
}

async fn apply_with_retry<M: MirrorStore>(
  id: Uuid,
  op: MirrorOp,
  shared: &Shared,
  mirror: &M,
  policy: &RetryPolicy,
) {
  let max_attempts = policy.max_attempts.max(1);

  for attempt in 1..=max_attempts {
    let result: Result<(), Error> = match &op {
      MirrorOp::Upsert(projection) => mirror.put(id, projection.clone()).await.map_err(Into::into),
      MirrorOp::Remove => mirror.delete(id).await.map(|_| ()).map_err(Into::into),
    };

    let err = match result {
      Ok(()) => {
        bump(&shared.counters.pushed);
        debug!(%id, op = op.label(), attempt, "mirror write applied");
        return;
      }
      Err(e) => e,
    };
    bump(&shared.counters.failed_attempts);

    if attempt == max_attempts {
      error!(%id, op = op.label(), attempt, error = %err, "mirror write dead-lettered");
      shared.dead_letter(DeadLetter {
        id,
        op: op.label(),
        attempts: attempt,
        error: err.to_string(),
      });
      return;
    }

    let delay = policy.backoff(attempt);
    warn!(%id, op = op.label(), attempt, error = %err, ?delay, "mirror write failed; retrying");
    tokio::time::sleep(delay).await;

    if shared.has_newer(id) {
      debug!(%id, op = op.label(), "retry abandoned for a newer op");
      return;
    }
  }
}
