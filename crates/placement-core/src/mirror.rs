//! The mobile projection: what the mirror store holds for each active record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::Record;

/// Strict subset of a [`Record`], read by the mobile client.
///
/// `moa_present` here is not a copy of [`Record::moa_present`]. It is the
/// mobile client's only gate and carries [`Record::visible_to_mobile`]: true
/// exactly when the MOA exists and has not expired. An expired MOA and a
/// missing one both read as `false`, and the record's own flag is never
/// replicated. The field keeps its name because mobile clients read it
/// under that key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorProjection {
  pub name:               String,
  pub moa_present:        bool,
  pub moa_validity_years: Option<u32>,
  pub updated_at:         DateTime<Utc>,
}

impl From<&Record> for MirrorProjection {
  fn from(r: &Record) -> Self {
    Self {
      name:               r.name.clone(),
      moa_present:        r.visible_to_mobile,
      moa_validity_years: r.moa_validity_years,
      updated_at:         r.updated_at,
    }
  }
}
