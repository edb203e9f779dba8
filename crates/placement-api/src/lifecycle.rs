//! Handlers for reconciliation and the dashboard summary.

use std::sync::Arc;

use axum::{Json, extract::State};
use placement_core::{
  status::StatusCounts,
  store::{ArchiveStore, MirrorStore, PrimaryStore},
};
use placement_engine::{Engine, ReconcileReport, mirror_queue::MirrorStats};
use serde::Serialize;

use crate::error::ApiError;

/// `POST /reconcile`: run a full pass now.
pub async fn reconcile<P, A, M>(
  State(engine): State<Arc<Engine<P, A, M>>>,
) -> Result<Json<ReconcileReport>, ApiError>
where
  P: PrimaryStore + 'static,
  A: ArchiveStore + 'static,
  M: MirrorStore + 'static,
{
  Ok(Json(engine.reconcile_all().await?))
}

#[derive(Debug, Serialize)]
pub struct Summary {
  #[serde(flatten)]
  pub counts: StatusCounts,
  pub total:  usize,
  pub mirror: MirrorStats,
}

/// `GET /summary`: status counts plus mirror queue health.
pub async fn summary<P, A, M>(
  State(engine): State<Arc<Engine<P, A, M>>>,
) -> Result<Json<Summary>, ApiError>
where
  P: PrimaryStore + 'static,
  A: ArchiveStore + 'static,
  M: MirrorStore + 'static,
{
  let counts = engine.status_summary().await?;
  Ok(Json(Summary { counts, total: counts.total(), mirror: engine.mirror_stats() }))
}
