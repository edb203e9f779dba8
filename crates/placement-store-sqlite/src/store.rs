//! [`SqliteStore`], the SQLite implementation of [`PrimaryStore`] and
//! [`ArchiveStore`].

use std::path::Path;

use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use placement_core::{
  archive::ArchiveEntry,
  record::{DerivedFields, Record},
  store::{ArchiveStore, PrimaryStore},
};

use crate::{
  Error, Result,
  encode::{
    EncodedRecord, RECORD_COLUMNS, RawRecord, decode_dt, decode_version, encode_date, encode_dt,
    encode_uuid, encode_version, status_str,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// Outcome of a compare-and-set statement that touched no rows.
enum Missed {
  Gone,
  Moved(i64),
}

/// The primary and archive collections, backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Execute raw SQL against the underlying connection.
  #[cfg(test)]
  pub(crate) async fn execute_raw(&self, sql: &'static str) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(sql)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run a version-guarded statement; on zero changed rows, report whether
  /// the row is missing or has moved on.
  async fn guarded<F>(&self, id: Uuid, expected: u64, statement: F) -> Result<()>
  where
    F: FnOnce(&rusqlite::Connection) -> rusqlite::Result<usize> + Send + 'static,
  {
    let id_str = encode_uuid(id);

    let missed: Option<Missed> = self
      .conn
      .call(move |conn| {
        if statement(conn)? == 1 {
          return Ok(None);
        }
        let current: Option<i64> = conn
          .query_row("SELECT version FROM companies WHERE id = ?1", rusqlite::params![id_str], |r| {
            r.get(0)
          })
          .optional()?;
        Ok(Some(current.map_or(Missed::Gone, Missed::Moved)))
      })
      .await?;

    match missed {
      None => Ok(()),
      Some(Missed::Gone) => Err(Error::RecordNotFound(id)),
      Some(Missed::Moved(actual)) => Err(Error::Conflict {
        id,
        expected,
        actual: decode_version(actual)?,
      }),
    }
  }
}

// ─── PrimaryStore impl ───────────────────────────────────────────────────────

impl PrimaryStore for SqliteStore {
  type Error = Error;

  async fn get(&self, id: Uuid) -> Result<Option<Record>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawRecord> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {RECORD_COLUMNS} FROM companies WHERE id = ?1"),
              rusqlite::params![id_str],
              RawRecord::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRecord::into_record).transpose()
  }

  async fn list(&self) -> Result<Vec<Record>> {
    let raws: Vec<RawRecord> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!("SELECT {RECORD_COLUMNS} FROM companies ORDER BY name"))?;
        let rows = stmt
          .query_map([], RawRecord::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRecord::into_record).collect()
  }

  async fn insert(&self, record: Record) -> Result<()> {
    let id = record.id;
    let e = EncodedRecord::new(&record)?;

    let inserted = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          &format!(
            "INSERT OR IGNORE INTO companies ({RECORD_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                     ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)"
          ),
          rusqlite::params![
            e.id,
            e.name,
            e.description,
            e.address,
            e.contact_email,
            e.website,
            e.fields,
            e.skills_required,
            e.mode_of_work,
            e.moa_present,
            e.moa_validity_years,
            e.moa_start_date,
            e.moa_expiration_date,
            e.moa_status,
            e.visible_to_mobile,
            e.created_at,
            e.updated_at,
            e.created_by,
            e.version,
          ],
        )?;
        Ok(n == 1)
      })
      .await?;

    if inserted { Ok(()) } else { Err(Error::AlreadyActive(id)) }
  }

  async fn update(&self, record: Record, expected_version: u64) -> Result<()> {
    let id = record.id;
    let e = EncodedRecord::new(&record)?;

    let expected = encode_version(expected_version);

    // created_at / created_by are immutable after creation.
    self
      .guarded(id, expected_version, move |conn| {
        conn.execute(
          "UPDATE companies SET
             name = ?2, description = ?3, address = ?4, contact_email = ?5, website = ?6,
             fields = ?7, skills_required = ?8, mode_of_work = ?9, moa_present = ?10,
             moa_validity_years = ?11, moa_start_date = ?12, moa_expiration_date = ?13,
             moa_status = ?14, visible_to_mobile = ?15, updated_at = ?16, version = ?17
           WHERE id = ?1 AND version = ?18",
          rusqlite::params![
            e.id,
            e.name,
            e.description,
            e.address,
            e.contact_email,
            e.website,
            e.fields,
            e.skills_required,
            e.mode_of_work,
            e.moa_present,
            e.moa_validity_years,
            e.moa_start_date,
            e.moa_expiration_date,
            e.moa_status,
            e.visible_to_mobile,
            e.updated_at,
            e.version,
            expected,
          ],
        )
      })
      .await
  }

  async fn write_derived(
    &self,
    id: Uuid,
    expected_version: u64,
    derived: DerivedFields,
  ) -> Result<()> {
    let id_str = encode_uuid(id);
    let expected = encode_version(expected_version);
    let expiration = derived.moa_expiration_date.map(encode_date);
    let status = status_str(derived.moa_status);
    let visible = derived.visible_to_mobile;

    self
      .guarded(id, expected_version, move |conn| {
        conn.execute(
          "UPDATE companies
           SET moa_expiration_date = ?2, moa_status = ?3, visible_to_mobile = ?4
           WHERE id = ?1 AND version = ?5",
          rusqlite::params![id_str, expiration, status, visible, expected],
        )
      })
      .await
  }

  async fn delete(&self, id: Uuid, expected_version: u64) -> Result<()> {
    let id_str = encode_uuid(id);
    let expected = encode_version(expected_version);

    self
      .guarded(id, expected_version, move |conn| {
        conn.execute(
          "DELETE FROM companies WHERE id = ?1 AND version = ?2",
          rusqlite::params![id_str, expected],
        )
      })
      .await
  }
}

// ─── ArchiveStore impl ───────────────────────────────────────────────────────

/// Raw values read from an `archived_companies` row.
struct RawArchiveEntry {
  snapshot:        String,
  deleted_at:      String,
  deleted_by_role: String,
}

impl RawArchiveEntry {
  fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      snapshot:        row.get(0)?,
      deleted_at:      row.get(1)?,
      deleted_by_role: row.get(2)?,
    })
  }

  fn into_entry(self) -> Result<ArchiveEntry> {
    let record: Record = serde_json::from_str(&self.snapshot)?;
    Ok(ArchiveEntry::new(record, decode_dt(&self.deleted_at)?, self.deleted_by_role))
  }
}

impl ArchiveStore for SqliteStore {
  type Error = Error;

  async fn get(&self, id: Uuid) -> Result<Option<ArchiveEntry>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawArchiveEntry> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT snapshot, deleted_at, deleted_by_role
               FROM archived_companies WHERE id = ?1",
              rusqlite::params![id_str],
              RawArchiveEntry::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawArchiveEntry::into_entry).transpose()
  }

  async fn list(&self) -> Result<Vec<ArchiveEntry>> {
    let raws: Vec<RawArchiveEntry> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT snapshot, deleted_at, deleted_by_role
           FROM archived_companies ORDER BY deleted_at DESC",
        )?;
        let rows = stmt
          .query_map([], RawArchiveEntry::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawArchiveEntry::into_entry).collect()
  }

  async fn put(&self, entry: ArchiveEntry) -> Result<()> {
    let id_str = encode_uuid(entry.id());
    let snapshot = serde_json::to_string(&entry.record)?;
    let deleted_at = encode_dt(entry.deleted_at);
    let role = entry.deleted_by_role;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO archived_companies (id, snapshot, deleted_at, deleted_by_role)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, snapshot, deleted_at, role],
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
        Ok(conn.execute("DELETE FROM archived_companies WHERE id = ?1", rusqlite::params![id_str])?)
      })
      .await?;
    Ok(n > 0)
  }
}
