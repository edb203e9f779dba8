//! Keeps reconciliation running without a caller.
//!
//! Status depends on the date, so a record can become `expiring-soon` or
//! `expired` with no write at all. The loop runs a full pass at start-up and
//! on a fixed interval to catch those, plus anything written to the stores by
//! another process. Between passes it reconciles the ids named on the change
//! feed, draining whatever has piled up so each id is handled once.

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use placement_core::store::{ArchiveStore, MirrorStore, PrimaryStore};
use tokio::{
  sync::{
    broadcast::{self, error::TryRecvError},
    watch,
  },
  task::JoinHandle,
  time::MissedTickBehavior,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{engine::Engine, feed::RecordChange};

/// Owns the running loop. Dropping it also stops the loop, but without
/// waiting for the pass in progress.
pub struct SyncLoop {
  shutdown: watch::Sender<bool>,
  task:     JoinHandle<()>,
}

impl SyncLoop {
  /// Start the loop. Must be called from within a tokio runtime.
  pub fn spawn<P, A, M>(engine: Arc<Engine<P, A, M>>, interval: Duration) -> Self
  where
    P: PrimaryStore + 'static,
    A: ArchiveStore + 'static,
    M: MirrorStore + 'static,
  {
    let (shutdown, stop) = watch::channel(false);
    let changes = engine.subscribe();
    let task = tokio::spawn(run(engine, changes, stop, interval));
    Self { shutdown, task }
  }

  /// Ask the loop to stop and wait for the current pass to finish.
  pub async fn shutdown(self) {
    let _ = self.shutdown.send(true);
    if let Err(e) = self.task.await {
      warn!(error = %e, "sync loop task ended abnormally");
    }
  }
}

/// What the next iteration has to do.
enum Work {
  FullPass,
  Ids(BTreeSet<Uuid>),
  Stop,
}

/// Drain everything already waiting after `first`.
fn coalesce(first: RecordChange, changes: &mut broadcast::Receiver<RecordChange>) -> Work {
  let mut ids = BTreeSet::from([first.id]);
  loop {
    match changes.try_recv() {
      Ok(change) => {
        ids.insert(change.id);
      }
      Err(TryRecvError::Empty) => return Work::Ids(ids),
      Err(TryRecvError::Lagged(missed)) => {
        warn!(missed, "change feed lagged; running a full pass");
        return Work::FullPass;
      }
      Err(TryRecvError::Closed) => return Work::Ids(ids),
    }
  }
}

async fn run<P, A, M>(
  engine: Arc<Engine<P, A, M>>,
  mut changes: broadcast::Receiver<RecordChange>,
  mut stop: watch::Receiver<bool>,
  interval: Duration,
) where
  P: PrimaryStore + 'static,
  A: ArchiveStore + 'static,
  M: MirrorStore + 'static,
{
  let mut ticker = tokio::time::interval(interval);
  ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
  info!(interval_secs = interval.as_secs(), "sync loop started");

  loop {
    // The first tick completes immediately, which gives the start-up pass.
    let work = tokio::select! {
      _ = stop.changed() => Work::Stop,
      _ = ticker.tick() => Work::FullPass,
      received = changes.recv() => match received {
        Ok(change) => coalesce(change, &mut changes),
        Err(broadcast::error::RecvError::Lagged(missed)) => {
          warn!(missed, "change feed lagged; running a full pass");
          Work::FullPass
        }
        Err(broadcast::error::RecvError::Closed) => Work::Stop,
      },
    };

    match work {
      Work::Stop => break,
      Work::FullPass => {
        if let Err(e) = engine.reconcile_all().await {
          warn!(error = %e, "reconciliation pass failed");
        }
      }
      Work::Ids(ids) => {
        debug!(count = ids.len(), "reconciling changed records");
        for id in ids {
          if let Err(e) = engine.reconcile_id(id).await {
            warn!(%id, error = %e, "record not reconciled");
          }
        }
      }
    }
  }

  info!("sync loop stopped");
}
