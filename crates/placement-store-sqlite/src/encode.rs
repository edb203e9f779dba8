//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, calendar dates are `YYYY-MM-DD`, UUIDs are
//! hyphenated lowercase strings. Ordered lists, tag sets and attribution are
//! compact JSON.

use std::{collections::BTreeSet, str::FromStr as _};

use chrono::{DateTime, NaiveDate, Utc};
use placement_core::{
  mirror::MirrorProjection,
  record::{Attribution, ModeOfWork, Record},
  status::MoaStatus,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

pub fn encode_version(v: u64) -> i64 { i64::try_from(v).unwrap_or(i64::MAX) }

pub fn decode_version(v: i64) -> Result<u64> {
  u64::try_from(v).map_err(|_| Error::Decode(format!("negative version: {v}")))
}

pub fn decode_status(s: &str) -> Result<MoaStatus> {
  MoaStatus::from_str(s).map_err(|_| Error::Decode(format!("unknown moa status: {s:?}")))
}

// ─── Rows ────────────────────────────────────────────────────────────────────

/// Column list matching [`RawRecord::from_row`].
pub const RECORD_COLUMNS: &str = "id, name, description, address, contact_email, website, \
  fields, skills_required, mode_of_work, moa_present, moa_validity_years, moa_start_date, \
  moa_expiration_date, moa_status, visible_to_mobile, created_at, updated_at, created_by, version";

/// Raw values read directly from a `companies` row.
pub struct RawRecord {
  pub id:                  String,
  pub name:                String,
  pub description:         String,
  pub address:             String,
  pub contact_email:       String,
  pub website:             String,
  pub fields:              String,
  pub skills_required:     String,
  pub mode_of_work:        String,
  pub moa_present:         Option<bool>,
  pub moa_validity_years:  Option<u32>,
  pub moa_start_date:      Option<String>,
  pub moa_expiration_date: Option<String>,
  pub moa_status:          String,
  pub visible_to_mobile:   bool,
  pub created_at:          String,
  pub updated_at:          String,
  pub created_by:          Option<String>,
  pub version:             i64,
}

impl RawRecord {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                  row.get(0)?,
      name:                row.get(1)?,
      description:         row.get(2)?,
      address:             row.get(3)?,
      contact_email:       row.get(4)?,
      website:             row.get(5)?,
      fields:              row.get(6)?,
      skills_required:     row.get(7)?,
      mode_of_work:        row.get(8)?,
      moa_present:         row.get(9)?,
      moa_validity_years:  row.get(10)?,
      moa_start_date:      row.get(11)?,
      moa_expiration_date: row.get(12)?,
      moa_status:          row.get(13)?,
      visible_to_mobile:   row.get(14)?,
      created_at:          row.get(15)?,
      updated_at:          row.get(16)?,
      created_by:          row.get(17)?,
      version:             row.get(18)?,
    })
  }

  pub fn into_record(self) -> Result<Record> {
    let moa_start_date = self.moa_start_date.as_deref().map(decode_date).transpose()?;
    // Rows written before the flag existed: an MOA is present iff its inputs are.
    let moa_present = self
      .moa_present
      .unwrap_or(moa_start_date.is_some() && self.moa_validity_years.is_some());
    let mode_of_work: BTreeSet<ModeOfWork> = serde_json::from_str(&self.mode_of_work)?;
    let created_by: Option<Attribution> =
      self.created_by.as_deref().map(serde_json::from_str).transpose()?;

    Ok(Record {
      id: decode_uuid(&self.id)?,
      name: self.name,
      description: self.description,
      address: self.address,
      contact_email: self.contact_email,
      website: self.website,
      fields: serde_json::from_str(&self.fields)?,
      skills_required: serde_json::from_str(&self.skills_required)?,
      mode_of_work,
      moa_present,
      moa_validity_years: self.moa_validity_years,
      moa_start_date,
      moa_expiration_date: self.moa_expiration_date.as_deref().map(decode_date).transpose()?,
      moa_status: decode_status(&self.moa_status)?,
      visible_to_mobile: self.visible_to_mobile,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
      created_by,
      version: decode_version(self.version)?,
    })
  }
}

/// Owned column values for an INSERT or UPDATE, ready to move into a
/// connection closure.
pub struct EncodedRecord {
  pub id:                  String,
  pub name:                String,
  pub description:         String,
  pub address:             String,
  pub contact_email:       String,
  pub website:             String,
  pub fields:              String,
  pub skills_required:     String,
  pub mode_of_work:        String,
  pub moa_present:         bool,
  pub moa_validity_years:  Option<u32>,
  pub moa_start_date:      Option<String>,
  pub moa_expiration_date: Option<String>,
  pub moa_status:          &'static str,
  pub visible_to_mobile:   bool,
  pub created_at:          String,
  pub updated_at:          String,
  pub created_by:          Option<String>,
  pub version:             i64,
}

impl EncodedRecord {
  pub fn new(r: &Record) -> Result<Self> {
    Ok(Self {
      id:                  encode_uuid(r.id),
      name:                r.name.clone(),
      description:         r.description.clone(),
      address:             r.address.clone(),
      contact_email:       r.contact_email.clone(),
      website:             r.website.clone(),
      fields:              serde_json::to_string(&r.fields)?,
      skills_required:     serde_json::to_string(&r.skills_required)?,
      mode_of_work:        serde_json::to_string(&r.mode_of_work)?,
      moa_present:         r.moa_present,
      moa_validity_years:  r.moa_validity_years,
      moa_start_date:      r.moa_start_date.map(encode_date),
      moa_expiration_date: r.moa_expiration_date.map(encode_date),
      moa_status:          status_str(r.moa_status),
      visible_to_mobile:   r.visible_to_mobile,
      created_at:          encode_dt(r.created_at),
      updated_at:          encode_dt(r.updated_at),
      created_by:          r.created_by.as_ref().map(serde_json::to_string).transpose()?,
      version:             encode_version(r.version),
    })
  }
}

/// `'static` form of [`MoaStatus::as_ref`], for moving into closures.
pub fn status_str(s: MoaStatus) -> &'static str {
  match s {
    MoaStatus::Valid => "valid",
    MoaStatus::ExpiringSoon => "expiring-soon",
    MoaStatus::Expired => "expired",
    MoaStatus::NoMoa => "no-moa",
  }
}

/// Raw values read from a `mobile_companies` row.
pub struct RawProjection {
  pub id:                 String,
  pub name:               String,
  pub moa_present:        bool,
  pub moa_validity_years: Option<u32>,
  pub updated_at:         String,
}

impl RawProjection {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                 row.get(0)?,
      name:               row.get(1)?,
      moa_present:        row.get(2)?,
      moa_validity_years: row.get(3)?,
      updated_at:         row.get(4)?,
    })
  }

  pub fn into_projection(self) -> Result<(Uuid, MirrorProjection)> {
    Ok((decode_uuid(&self.id)?, MirrorProjection {
      name:               self.name,
      moa_present:        self.moa_present,
      moa_validity_years: self.moa_validity_years,
      updated_at:         decode_dt(&self.updated_at)?,
    }))
  }
}
