//! The time source seam.
//!
//! The evaluator takes `today` as an argument; the engine obtains it from a
//! [`Clock`] so tests can pin or advance the date.

use std::sync::RwLock;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset as _, Utc};

pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;

  /// The calendar date used for MOA evaluation.
  fn today(&self) -> NaiveDate;
}

/// Wall-clock time, with "today" taken in a fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
  offset: FixedOffset,
}

impl SystemClock {
  pub fn utc() -> Self {
    Self { offset: Utc.fix() }
  }

  /// Returns `None` if the offset is outside ±24h.
  pub fn with_offset_minutes(minutes: i32) -> Option<Self> {
    FixedOffset::east_opt(minutes.checked_mul(60)?).map(|offset| Self { offset })
  }
}

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> { Utc::now() }

  fn today(&self) -> NaiveDate { Utc::now().with_timezone(&self.offset).date_naive() }
}

/// A settable clock for tests and replays. "Today" is the UTC date of `now`.
#[derive(Debug)]
pub struct FixedClock {
  now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
  pub fn new(now: DateTime<Utc>) -> Self { Self { now: RwLock::new(now) } }

  /// Midnight UTC on `date`.
  pub fn on(date: NaiveDate) -> Self { Self::new(date.and_time(chrono::NaiveTime::MIN).and_utc()) }

  pub fn set(&self, now: DateTime<Utc>) {
    *self.now.write().unwrap_or_else(|e| e.into_inner()) = now;
  }

  pub fn advance(&self, by: Duration) {
    let mut guard = self.now.write().unwrap_or_else(|e| e.into_inner());
    *guard += by;
  }
}

impl Clock for FixedClock {
  fn now(&self) -> DateTime<Utc> { *self.now.read().unwrap_or_else(|e| e.into_inner()) }

  fn today(&self) -> NaiveDate { self.now().date_naive() }
}
