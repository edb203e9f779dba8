//! Draft normalisation and validation.
//!
//! Runs before any store is touched. A rejected draft produces
//! [`Error::Validation`] carrying every failing field, not just the first.

use std::collections::HashSet;

use crate::{
  Error, Result,
  error::FieldError,
  record::{RecordDraft, expiration_date},
};

/// Upper bound on `moa_validity_years`.
pub const MAX_VALIDITY_YEARS: u32 = 100;

/// Trim, normalise, validate.
pub fn prepare(draft: RecordDraft, moa_required: bool) -> Result<RecordDraft> {
  let draft = normalize(draft);
  validate(&draft, moa_required)?;
  Ok(draft)
}

/// Trim text fields and drop blank or repeated entries from the ordered lists,
/// keeping the first occurrence.
pub fn normalize(mut draft: RecordDraft) -> RecordDraft {
  for s in [
    &mut draft.name,
    &mut draft.description,
    &mut draft.address,
    &mut draft.contact_email,
    &mut draft.website,
  ] {
    let trimmed = s.trim();
    if trimmed.len() != s.len() {
      *s = trimmed.to_owned();
    }
  }
  draft.fields = dedup_in_order(draft.fields);
  draft.skills_required = dedup_in_order(draft.skills_required);
  draft
}

fn dedup_in_order(items: Vec<String>) -> Vec<String> {
  let mut seen = HashSet::new();
  items
    .into_iter()
    .map(|s| s.trim().to_owned())
    .filter(|s| !s.is_empty() && seen.insert(s.to_lowercase()))
    .collect()
}

pub fn validate(draft: &RecordDraft, moa_required: bool) -> Result<()> {
  let mut errors = Vec::new();
  let mut reject = |field: &'static str, message: &str| {
    errors.push(FieldError { field, message: message.to_owned() });
  };

  for (field, value) in [
    ("name", &draft.name),
    ("description", &draft.description),
    ("address", &draft.address),
    ("contact_email", &draft.contact_email),
    ("website", &draft.website),
  ] {
    if value.is_empty() {
      reject(field, "must not be empty");
    }
  }

  if !draft.contact_email.is_empty() && !looks_like_email(&draft.contact_email) {
    reject("contact_email", "is not an email address");
  }

  if moa_required && !draft.moa_present {
    reject("moa_present", "an MOA is required");
  }

  if draft.moa_present {
    match draft.moa_validity_years {
      None => reject("moa_validity_years", "required when an MOA is present"),
      Some(0) => reject("moa_validity_years", "must be at least 1"),
      Some(y) if y > MAX_VALIDITY_YEARS => {
        reject("moa_validity_years", "exceeds the maximum validity period")
      }
      Some(_) => {}
    }
    if draft.moa_start_date.is_none() {
      reject("moa_start_date", "required when an MOA is present");
    } else if draft.moa_validity_years.is_some_and(|y| (1..=MAX_VALIDITY_YEARS).contains(&y))
      && expiration_date(draft.moa_start_date, draft.moa_validity_years).is_none()
    {
      reject("moa_start_date", "expiration falls outside the supported date range");
    }
  }

  if errors.is_empty() { Ok(()) } else { Err(Error::Validation(errors)) }
}

fn looks_like_email(s: &str) -> bool {
  let Some((local, domain)) = s.split_once('@') else {
    return false;
  };
  !local.is_empty()
    && !domain.is_empty()
    && !domain.contains('@')
    && !s.chars().any(char::is_whitespace)
}
