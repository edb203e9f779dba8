//! [`SqliteMirror`], the SQLite implementation of [`MirrorStore`].

use std::path::Path;

use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use placement_core::{mirror::MirrorProjection, store::MirrorStore};

use crate::{
  Error, Result,
  encode::{RawProjection, encode_dt, encode_uuid},
  schema::MIRROR_SCHEMA,
};

/// The mobile projection collection, normally in its own database file so
/// the mobile read path never touches the primary store.
#[derive(Clone)]
pub struct SqliteMirror {
  conn: tokio_rusqlite::Connection,
}

impl SqliteMirror {
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let mirror = Self { conn };
    mirror.init_schema().await?;
    Ok(mirror)
  }

  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let mirror = Self { conn };
    mirror.init_schema().await?;
    Ok(mirror)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(MIRROR_SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

impl MirrorStore for SqliteMirror {
  type Error = Error;

  async fn get(&self, id: Uuid) -> Result<Option<MirrorProjection>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawProjection> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT id, name, moa_present, moa_validity_years, updated_at
               FROM mobile_companies WHERE id = ?1",
              rusqlite::params![id_str],
              RawProjection::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    Ok(raw.map(RawProjection::into_projection).transpose()?.map(|(_, p)| p))
  }

  async fn list(&self) -> Result<Vec<(Uuid, MirrorProjection)>> {
    let raws: Vec<RawProjection> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT id, name, moa_present, moa_validity_years, updated_at
           FROM mobile_companies ORDER BY name",
        )?;
        let rows = stmt
          .query_map([], RawProjection::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawProjection::into_projection).collect()
  }

  async fn put(&self, id: Uuid, projection: MirrorProjection) -> Result<()> {
    let id_str = encode_uuid(id);
    let updated_at = encode_dt(projection.updated_at);
    let MirrorProjection { name, moa_present, moa_validity_years, .. } = projection;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO mobile_companies (id, name, moa_present, moa_validity_years, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT (id) DO UPDATE SET
             name = excluded.name,
             moa_present = excluded.moa_present,
             moa_validity_years = excluded.moa_validity_years,
             updated_at = excluded.updated_at",
          rusqlite::params![id_str, name, moa_present, moa_validity_years, updated_at],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn delete(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);

    let n = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM mobile_companies WHERE id = ?1", rusqlite::params![id_str])?)
      })
      .await?;
    Ok(n > 0)
  }
}
