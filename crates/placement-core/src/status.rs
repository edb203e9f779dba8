//! The MOA status evaluator.
//!
//! A pure function from `(today, moa_present, expiration, window)` to a status
//! and the mobile-visibility flag that follows from it. Nothing here reads the
//! wall clock; callers pass `today` in.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Days before expiration during which an MOA counts as "expiring soon".
pub const DEFAULT_WINDOW_DAYS: u32 = 30;

/// Derived validity state of a record's MOA.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum MoaStatus {
  Valid,
  ExpiringSoon,
  Expired,
  NoMoa,
}

impl MoaStatus {
  /// Whether a record in this state is shown to the mobile client.
  pub fn is_visible(self) -> bool { matches!(self, Self::Valid | Self::ExpiringSoon) }
}

/// Output of [`evaluate`]. `visible` is always `status.is_visible()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
  pub status:  MoaStatus,
  pub visible: bool,
}

impl From<MoaStatus> for Evaluation {
  fn from(status: MoaStatus) -> Self {
    Self { status, visible: status.is_visible() }
  }
}

/// Whole days from `today` until `expiration`; negative once it has passed.
pub fn days_until(today: NaiveDate, expiration: NaiveDate) -> i64 {
  (expiration - today).num_days()
}

/// Classify an MOA.
///
/// Both window boundaries are inclusive: an MOA expiring today or exactly
/// `window_days` from today is `ExpiringSoon`. Only a negative day count is
/// `Expired`. A record that claims an MOA but has no computable expiration is
/// `NoMoa`.
pub fn evaluate(
  today: NaiveDate,
  moa_present: bool,
  expiration: Option<NaiveDate>,
  window_days: u32,
) -> Evaluation {
  let Some(expiration) = expiration.filter(|_| moa_present) else {
    return MoaStatus::NoMoa.into();
  };

  let days = days_until(today, expiration);
  let status = if days < 0 {
    MoaStatus::Expired
  } else if days <= i64::from(window_days) {
    MoaStatus::ExpiringSoon
  } else {
    MoaStatus::Valid
  };
  status.into()
}

// ─── Summary ─────────────────────────────────────────────────────────────────

/// Per-status record counts, as shown on a dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
  pub valid:         usize,
  pub expiring_soon: usize,
  pub expired:       usize,
  pub no_moa:        usize,
}

impl StatusCounts {
  pub fn add(&mut self, status: MoaStatus) {
    match status {
      MoaStatus::Valid => self.valid += 1,
      MoaStatus::ExpiringSoon => self.expiring_soon += 1,
      MoaStatus::Expired => self.expired += 1,
      MoaStatus::NoMoa => self.no_moa += 1,
    }
  }

  pub fn total(&self) -> usize {
    self.valid + self.expiring_soon + self.expired + self.no_moa
  }

  pub fn visible(&self) -> usize { self.valid + self.expiring_soon }
}

impl FromIterator<MoaStatus> for StatusCounts {
  fn from_iter<I: IntoIterator<Item = MoaStatus>>(iter: I) -> Self {
    let mut counts = Self::default();
    for status in iter {
      counts.add(status);
    }
    counts
  }
}

#[cfg(test)]
mod tests {
  use std::str::FromStr as _;

  use chrono::Days;

  use super::*;

  fn today() -> NaiveDate { NaiveDate::from_ymd_opt(2024, 6, 1).unwrap() }

  fn at_offset(days: i64) -> NaiveDate {
    if days >= 0 {
      today().checked_add_days(Days::new(days as u64)).unwrap()
    } else {
      today().checked_sub_days(Days::new(days.unsigned_abs())).unwrap()
    }
  }

  #[test]
  fn window_boundaries() {
    let eval = |d| evaluate(today(), true, Some(at_offset(d)), 30).status;
    assert_eq!(eval(30), MoaStatus::ExpiringSoon);
    assert_eq!(eval(31), MoaStatus::Valid);
    assert_eq!(eval(0), MoaStatus::ExpiringSoon);
    assert_eq!(eval(-1), MoaStatus::Expired);
  }

  #[test]
  fn absent_moa_ignores_expiration() {
    for d in [-400, -1, 0, 15, 30, 31, 400] {
      let e = evaluate(today(), false, Some(at_offset(d)), 30);
      assert_eq!(e, Evaluation { status: MoaStatus::NoMoa, visible: false });
    }
  }

  #[test]
  fn present_moa_without_expiration_is_no_moa() {
    let e = evaluate(today(), true, None, 30);
    assert_eq!(e.status, MoaStatus::NoMoa);
    assert!(!e.visible);
  }

  #[test]
  fn visibility_follows_status() {
    for d in -5..=40 {
      for present in [true, false] {
        let e = evaluate(today(), present, Some(at_offset(d)), 30);
        assert_eq!(
          e.visible,
          matches!(e.status, MoaStatus::Valid | MoaStatus::ExpiringSoon)
        );
      }
    }
  }

  #[test]
  fn one_year_moa_two_weeks_out() {
    let expiration = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    let today = NaiveDate::from_ymd_opt(2024, 12, 15).unwrap();
    assert_eq!(days_until(today, expiration), 17);
    let e = evaluate(today, true, Some(expiration), DEFAULT_WINDOW_DAYS);
    assert_eq!(e, Evaluation { status: MoaStatus::ExpiringSoon, visible: true });
  }

  #[test]
  fn zero_window_only_today_is_soon() {
    assert_eq!(evaluate(today(), true, Some(at_offset(0)), 0).status, MoaStatus::ExpiringSoon);
    assert_eq!(evaluate(today(), true, Some(at_offset(1)), 0).status, MoaStatus::Valid);
  }

  #[test]
  fn status_strings_are_kebab_case() {
    assert_eq!(MoaStatus::ExpiringSoon.as_ref(), "expiring-soon");
    assert_eq!(MoaStatus::from_str("no-moa").unwrap(), MoaStatus::NoMoa);
    assert_eq!(
      serde_json::to_string(&MoaStatus::ExpiringSoon).unwrap(),
      "\"expiring-soon\""
    );
  }

  #[test]
  fn counts_tally() {
    let counts: StatusCounts = [
      MoaStatus::Valid,
      MoaStatus::Valid,
      MoaStatus::Expired,
      MoaStatus::ExpiringSoon,
      MoaStatus::NoMoa,
    ]
    .into_iter()
    .collect();
    assert_eq!(counts.valid, 2);
    assert_eq!(counts.total(), 5);
    assert_eq!(counts.visible(), 3);
  }
}
