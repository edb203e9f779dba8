//! `GET /mobile/companies`, the mobile read path.
//!
//! Served from the mirror store only. Clients show an entry when its
//! `moa_present` is true.

use std::sync::Arc;

use axum::{Json, extract::State};
use placement_core::{
  mirror::MirrorProjection,
  store::{ArchiveStore, MirrorStore, PrimaryStore},
};
use placement_engine::Engine;
use serde::Serialize;
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct MobileCompany {
  pub id:         Uuid,
  #[serde(flatten)]
  pub projection: MirrorProjection,
}

pub async fn list<P, A, M>(
  State(engine): State<Arc<Engine<P, A, M>>>,
) -> Result<Json<Vec<MobileCompany>>, ApiError>
where
  P: PrimaryStore + 'static,
  A: ArchiveStore + 'static,
  M: MirrorStore + 'static,
{
  let entries = engine.mirror_projections().await?;
  Ok(Json(
    entries
      .into_iter()
      .map(|(id, projection)| MobileCompany { id, projection })
      .collect(),
  ))
}
