//! Handlers for `/archive` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`    | `/archive` | Most recently archived first |
//! | `GET`    | `/archive/{id}` | Single archive entry |
//! | `POST`   | `/archive/{id}/restore` | Body: `{"actor_role":"..."}`; returns the active record |
//! | `POST`   | `/archive/restore` | Body: `{"ids":[...],"actor_role":"..."}`; 200 or 207 |
//! | `DELETE` | `/archive/{id}?actor_role=...` | Permanent; 204 |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use placement_core::{
  archive::ArchiveEntry,
  record::Record,
  store::{ArchiveStore, MirrorStore, PrimaryStore},
};
use placement_engine::Engine;
use uuid::Uuid;

use crate::{
  companies::{ActorBody, BulkBody, bulk_response},
  error::ApiError,
};

/// `GET /archive`
pub async fn list<P, A, M>(
  State(engine): State<Arc<Engine<P, A, M>>>,
) -> Result<Json<Vec<ArchiveEntry>>, ApiError>
where
  P: PrimaryStore + 'static,
  A: ArchiveStore + 'static,
  M: MirrorStore + 'static,
{
  Ok(Json(engine.list_archived().await?))
}

/// `GET /archive/{id}`
pub async fn get_one<P, A, M>(
  State(engine): State<Arc<Engine<P, A, M>>>,
  Path(id): Path<Uuid>,
) -> Result<Json<ArchiveEntry>, ApiError>
where
  P: PrimaryStore + 'static,
  A: ArchiveStore + 'static,
  M: MirrorStore + 'static,
{
  Ok(Json(engine.get_archived(id).await?))
}

/// `POST /archive/{id}/restore`
pub async fn restore_one<P, A, M>(
  State(engine): State<Arc<Engine<P, A, M>>>,
  Path(id): Path<Uuid>,
  Json(body): Json<ActorBody>,
) -> Result<Json<Record>, ApiError>
where
  P: PrimaryStore + 'static,
  A: ArchiveStore + 'static,
  M: MirrorStore + 'static,
{
  Ok(Json(engine.restore(id, &body.actor_role).await?))
}

/// `POST /archive/restore`
pub async fn restore_bulk<P, A, M>(
  State(engine): State<Arc<Engine<P, A, M>>>,
  Json(body): Json<BulkBody>,
) -> impl IntoResponse
where
  P: PrimaryStore + 'static,
  A: ArchiveStore + 'static,
  M: MirrorStore + 'static,
{
  bulk_response(engine.restore_many(&body.ids, &body.actor_role).await)
}

/// `DELETE /archive/{id}?actor_role=...`
pub async fn purge<P, A, M>(
  State(engine): State<Arc<Engine<P, A, M>>>,
  Path(id): Path<Uuid>,
  Query(actor): Query<ActorBody>,
) -> Result<StatusCode, ApiError>
where
  P: PrimaryStore + 'static,
  A: ArchiveStore + 'static,
  M: MirrorStore + 'static,
{
  engine.purge(id, &actor.actor_role).await?;
  Ok(StatusCode::NO_CONTENT)
}
