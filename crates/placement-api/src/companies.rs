//! Handlers for `/companies` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/companies` | optional `status`, `visible` |
//! | `POST` | `/companies` | Body: [`CreateBody`]; returns 201 + record + `ETag` |
//! | `GET`  | `/companies/{id}` | Single record + `ETag` |
//! | `PUT`  | `/companies/{id}` | Body: draft; `If-Match` required |
//! | `POST` | `/companies/{id}/archive` | Body: [`ActorBody`]; `If-Match` optional |
//! | `POST` | `/companies/archive` | Body: [`BulkBody`]; 200, or 207 if any id failed |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::{HeaderMap, StatusCode, header},
  response::IntoResponse,
};
use placement_core::{
  archive::ArchiveEntry,
  record::{Attribution, Record, RecordDraft},
  store::{ArchiveStore, MirrorStore, PrimaryStore},
};
use placement_engine::{BulkReport, Engine, RecordFilter};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  error::ApiError,
  etag::{etag, if_match, require_if_match},
};

/// Who is acting, as recorded on archive entries.
#[derive(Debug, Deserialize)]
pub struct ActorBody {
  pub actor_role: String,
}

#[derive(Debug, Deserialize)]
pub struct BulkBody {
  pub ids:        Vec<Uuid>,
  pub actor_role: String,
}

pub(crate) fn bulk_response(report: BulkReport) -> impl IntoResponse {
  let status = if report.failed.is_empty() { StatusCode::OK } else { StatusCode::MULTI_STATUS };
  (status, Json(report))
}

fn with_etag(status: StatusCode, record: Record) -> impl IntoResponse {
  (status, [(header::ETAG, etag(record.version))], Json(record))
}

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /companies[?status=expiring-soon][&visible=true]`
pub async fn list<P, A, M>(
  State(engine): State<Arc<Engine<P, A, M>>>,
  Query(filter): Query<RecordFilter>,
) -> Result<Json<Vec<Record>>, ApiError>
where
  P: PrimaryStore + 'static,
  A: ArchiveStore + 'static,
  M: MirrorStore + 'static,
{
  Ok(Json(engine.list(&filter).await?))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /companies/{id}`
pub async fn get_one<P, A, M>(
  State(engine): State<Arc<Engine<P, A, M>>>,
  Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  P: PrimaryStore + 'static,
  A: ArchiveStore + 'static,
  M: MirrorStore + 'static,
{
  let record = engine.get(id).await?;
  Ok(with_etag(StatusCode::OK, record))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /companies`: the draft fields plus optional
/// attribution.
#[derive(Debug, Deserialize)]
pub struct CreateBody {
  #[serde(flatten)]
  pub draft:      RecordDraft,
  pub created_by: Option<Attribution>,
}

/// `POST /companies`: returns 201 + the stored record.
pub async fn create<P, A, M>(
  State(engine): State<Arc<Engine<P, A, M>>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  P: PrimaryStore + 'static,
  A: ArchiveStore + 'static,
  M: MirrorStore + 'static,
{
  let record = engine.create(body.draft, body.created_by).await?;
  Ok(with_etag(StatusCode::CREATED, record))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PUT /companies/{id}`: body is the full replacement draft. The caller
/// must send the version it edited as `If-Match`.
pub async fn update<P, A, M>(
  State(engine): State<Arc<Engine<P, A, M>>>,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
  Json(draft): Json<RecordDraft>,
) -> Result<impl IntoResponse, ApiError>
where
  P: PrimaryStore + 'static,
  A: ArchiveStore + 'static,
  M: MirrorStore + 'static,
{
  let expected = require_if_match(&headers)?;
  let record = engine.update(id, expected, draft).await?;
  Ok(with_etag(StatusCode::OK, record))
}

// ─── Archive ──────────────────────────────────────────────────────────────────

/// `POST /companies/{id}/archive`: returns the archive entry.
pub async fn archive_one<P, A, M>(
  State(engine): State<Arc<Engine<P, A, M>>>,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
  Json(body): Json<ActorBody>,
) -> Result<Json<ArchiveEntry>, ApiError>
where
  P: PrimaryStore + 'static,
  A: ArchiveStore + 'static,
  M: MirrorStore + 'static,
{
  let expected = if_match(&headers)?;
  Ok(Json(engine.archive(id, &body.actor_role, expected).await?))
}

/// `POST /companies/archive`
pub async fn archive_bulk<P, A, M>(
  State(engine): State<Arc<Engine<P, A, M>>>,
  Json(body): Json<BulkBody>,
) -> impl IntoResponse
where
  P: PrimaryStore + 'static,
  A: ArchiveStore + 'static,
  M: MirrorStore + 'static,
{
  bulk_response(engine.archive_many(&body.ids, &body.actor_role).await)
}
