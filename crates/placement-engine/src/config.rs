//! Engine tuning, deserialised from the `[engine]` table of the server config.

use std::time::Duration;

use placement_core::status::DEFAULT_WINDOW_DAYS;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Days before expiration at which a record turns `expiring-soon`.
  pub window_days:             u32,
  /// Whether new and edited records must carry an MOA.
  pub moa_required:            bool,
  /// Seconds between periodic full reconciliation passes.
  pub reconcile_interval_secs: u64,
  pub mirror_retry:            RetryPolicy,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      window_days:             DEFAULT_WINDOW_DAYS,
      moa_required:            true,
      reconcile_interval_secs: 3600,
      mirror_retry:            RetryPolicy::default(),
    }
  }
}

impl EngineConfig {
  pub fn reconcile_interval(&self) -> Duration {
    Duration::from_secs(self.reconcile_interval_secs.max(1))
  }
}

/// How the mirror queue retries a failing write before dead-lettering it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
  pub max_attempts:       u32,
  pub initial_backoff_ms: u64,
  pub max_backoff_ms:     u64,
  /// Maximum number of distinct ids waiting in the queue.
  pub queue_capacity:     usize,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts:       5,
      initial_backoff_ms: 200,
      max_backoff_ms:     10_000,
      queue_capacity:     1024,
    }
  }
}

impl RetryPolicy {
  /// Delay after the `attempt`-th failure (1-based): doubles each time,
  /// capped at `max_backoff_ms`.
  pub fn backoff(&self, attempt: u32) -> Duration {
    let shift = attempt.saturating_sub(1).min(32);
    let ms = self
      .initial_backoff_ms
      .saturating_mul(1u64 << shift)
      .min(self.max_backoff_ms);
    Duration::from_millis(ms)
  }
}
