//! Per-resource cache policies.

use std::time::Duration;

/// Retry behavior for a failed fetch.
///
/// Delays follow `min(base * 2^attempt, cap)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Number of retries after the initial attempt.
  pub retries: u32,
  pub base: Duration,
  pub cap: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      retries: 3,
      base: Duration::from_secs(1),
      cap: Duration::from_secs(30),
    }
  }
}

impl RetryPolicy {
  /// A policy with a custom retry count and backoff cap.
  pub fn capped(retries: u32, cap: Duration) -> Self {
    Self {
      retries,
      cap,
      ..Self::default()
    }
  }

  /// No retries, fail on the first error. Useful in tests.
  #[allow(dead_code)]
  pub fn none() -> Self {
    Self {
      retries: 0,
      ..Self::default()
    }
  }

  /// Backoff delay before retry number `attempt` (zero-based).
  pub fn delay_for(&self, attempt: u32) -> Duration {
    let exp = self
      .base
      .checked_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
      .unwrap_or(self.cap);
    exp.min(self.cap)
  }
}

/// Declarative cache policy for one resource.
#[derive(Debug, Clone)]
pub struct CachePolicy {
  /// Age after which cached data is stale but still servable while a
  /// background refresh runs.
  pub stale_after: Duration,
  /// Age after which an entry with no active subscribers is evicted.
  pub retain_for: Duration,
  /// Periodic background refetch while at least one subscriber is mounted.
  pub refresh_every: Option<Duration>,
  pub retry: RetryPolicy,
}

impl CachePolicy {
  pub fn new(stale_after: Duration, retain_for: Duration) -> Self {
    Self {
      stale_after,
      retain_for,
      refresh_every: None,
      retry: RetryPolicy::default(),
    }
  }

  pub fn with_refresh_every(mut self, interval: Duration) -> Self {
    self.refresh_every = Some(interval);
    self
  }

  pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
    self.retry = retry;
    self
  }

  /// Same policy with a shorter stale window, used by prefetching so a
  /// near-future real read hits just-warmed data.
  pub fn for_prefetch(mut self, stale_after: Duration) -> Self {
    self.stale_after = stale_after;
    self.refresh_every = None;
    self
  }
}
