//! Company records, the canonical aggregate held in the primary store.
//!
//! Most fields belong to callers. Three are derived and owned by the engine:
//! `moa_expiration_date`, `moa_status` and `visible_to_mobile`. They are grouped
//! in [`DerivedFields`] so the synchronizer can write them back without
//! touching anything else.

use std::collections::BTreeSet;

use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::status::{Evaluation, MoaStatus, evaluate};

// ─── Work mode ───────────────────────────────────────────────────────────────

/// How interns placed at a company are expected to work.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ModeOfWork {
  Onsite,
  Remote,
  Hybrid,
}

// ─── Attribution ─────────────────────────────────────────────────────────────

/// Who created a record, captured once at creation and never re-resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution {
  pub username: String,
  pub role:     String,
}

// ─── Expiration ──────────────────────────────────────────────────────────────

/// `start + years`, or `None` if either input is missing or the result does
/// not fit in a calendar date.
///
/// Anniversaries of 29 February land on 28 February in non-leap years.
pub fn expiration_date(start: Option<NaiveDate>, years: Option<u32>) -> Option<NaiveDate> {
  let months = years?.checked_mul(12)?;
  start?.checked_add_months(Months::new(months))
}

// ─── Derived fields ──────────────────────────────────────────────────────────

/// The engine-owned slice of a [`Record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedFields {
  pub moa_expiration_date: Option<NaiveDate>,
  pub moa_status:          MoaStatus,
  pub visible_to_mobile:   bool,
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// A partner company with its Memorandum of Agreement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
  pub id:                  Uuid,
  pub name:                String,
  pub description:         String,
  pub address:             String,
  pub contact_email:       String,
  pub website:             String,
  /// Display order matters; duplicates are removed on write.
  pub fields:              Vec<String>,
  pub skills_required:     Vec<String>,
  pub mode_of_work:        BTreeSet<ModeOfWork>,
  pub moa_present:         bool,
  pub moa_validity_years:  Option<u32>,
  pub moa_start_date:      Option<NaiveDate>,
  pub moa_expiration_date: Option<NaiveDate>,
  pub moa_status:          MoaStatus,
  pub visible_to_mobile:   bool,
  pub created_at:          DateTime<Utc>,
  pub updated_at:          DateTime<Utc>,
  pub created_by:          Option<Attribution>,
  /// Bumped on every caller edit. Derived-field write-backs leave it alone.
  pub version:             u64,
}

impl Record {
  /// Build a fresh record from a validated draft.
  pub fn new(
    id: Uuid,
    draft: RecordDraft,
    created_by: Option<Attribution>,
    now: DateTime<Utc>,
    today: NaiveDate,
    window_days: u32,
  ) -> Self {
    let mut record = Self {
      id,
      name: draft.name,
      description: draft.description,
      address: draft.address,
      contact_email: draft.contact_email,
      website: draft.website,
      fields: draft.fields,
      skills_required: draft.skills_required,
      mode_of_work: draft.mode_of_work,
      moa_present: draft.moa_present,
      moa_validity_years: draft.moa_validity_years,
      moa_start_date: draft.moa_start_date,
      moa_expiration_date: None,
      moa_status: MoaStatus::NoMoa,
      visible_to_mobile: false,
      created_at: now,
      updated_at: now,
      created_by,
      version: 1,
    };
    record.apply_derived(record.derive(today, window_days));
    record
  }

  /// Apply a caller edit. Identity, creation metadata and the version are
  /// handled by the caller of this method.
  pub fn apply_draft(
    &mut self,
    draft: RecordDraft,
    now: DateTime<Utc>,
    today: NaiveDate,
    window_days: u32,
  ) {
    self.name = draft.name;
    self.description = draft.description;
    self.address = draft.address;
    self.contact_email = draft.contact_email;
    self.website = draft.website;
    self.fields = draft.fields;
    self.skills_required = draft.skills_required;
    self.mode_of_work = draft.mode_of_work;
    self.moa_present = draft.moa_present;
    self.moa_validity_years = draft.moa_validity_years;
    self.moa_start_date = draft.moa_start_date;
    self.updated_at = now;
    self.apply_derived(self.derive(today, window_days));
  }

  /// Expiration computed from the current inputs, ignoring the stored value.
  pub fn computed_expiration(&self) -> Option<NaiveDate> {
    expiration_date(self.moa_start_date, self.moa_validity_years)
  }

  pub fn evaluate(&self, today: NaiveDate, window_days: u32) -> Evaluation {
    evaluate(today, self.moa_present, self.computed_expiration(), window_days)
  }

  /// What the derived fields should be as of `today`.
  pub fn derive(&self, today: NaiveDate, window_days: u32) -> DerivedFields {
    let eval = self.evaluate(today, window_days);
    DerivedFields {
      moa_expiration_date: self.computed_expiration(),
      moa_status:          eval.status,
      visible_to_mobile:   eval.visible,
    }
  }

  /// The derived fields as currently stored.
  pub fn derived(&self) -> DerivedFields {
    DerivedFields {
      moa_expiration_date: self.moa_expiration_date,
      moa_status:          self.moa_status,
      visible_to_mobile:   self.visible_to_mobile,
    }
  }

  pub fn apply_derived(&mut self, derived: DerivedFields) {
    self.moa_expiration_date = derived.moa_expiration_date;
    self.moa_status = derived.moa_status;
    self.visible_to_mobile = derived.visible_to_mobile;
  }
}

// ─── Draft ───────────────────────────────────────────────────────────────────

fn default_moa_present() -> bool { true }

/// The caller-editable fields of a [`Record`], as submitted by a form or an
/// import. Checked by [`crate::validate`] before any store is touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDraft {
  pub name:               String,
  pub description:        String,
  pub address:            String,
  pub contact_email:      String,
  pub website:            String,
  #[serde(default)]
  pub fields:             Vec<String>,
  #[serde(default)]
  pub skills_required:    Vec<String>,
  #[serde(default)]
  pub mode_of_work:       BTreeSet<ModeOfWork>,
  #[serde(default = "default_moa_present")]
  pub moa_present:        bool,
  pub moa_validity_years: Option<u32>,
  pub moa_start_date:     Option<NaiveDate>,
}

impl From<&Record> for RecordDraft {
  fn from(r: &Record) -> Self {
    Self {
      name:               r.name.clone(),
      description:        r.description.clone(),
      address:            r.address.clone(),
      contact_email:      r.contact_email.clone(),
      website:            r.website.clone(),
      fields:             r.fields.clone(),
      skills_required:    r.skills_required.clone(),
      mode_of_work:       r.mode_of_work.clone(),
      moa_present:        r.moa_present,
      moa_validity_years: r.moa_validity_years,
      moa_start_date:     r.moa_start_date,
    }
  }
}
