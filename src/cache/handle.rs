//! Live subscription to one cached query.
//!
//! A [`QueryHandle`] is what a view holds: it exposes the entry's data,
//! loading/error state, staleness and last-update time, and can force a
//! refetch. Handles are polled from the event loop tick, in the same way
//! terminal views poll async queries elsewhere in the app.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::error::QueryError;
use super::key::QueryKey;
use super::policy::CachePolicy;
use super::store::{downcast, erase, EntrySnapshot, QueryCache};

pub struct QueryHandle<T> {
  cache: QueryCache,
  key: QueryKey,
  policy: CachePolicy,
  /// Served while no real data exists, including after a failed fetch.
  placeholder: Option<Arc<T>>,
  changed: watch::Receiver<u64>,
  /// Periodic background refetch, alive for as long as the handle is.
  refresher: Option<JoinHandle<()>>,
}

impl<T: Send + Sync + 'static> QueryHandle<T> {
  /// Subscribe to `key` and start the initial fetch in the background.
  ///
  /// The fetcher is stored with the entry so auto-refresh and namespace
  /// invalidation can refetch without the handle's involvement.
  pub fn new<F, Fut>(cache: &QueryCache, key: QueryKey, policy: CachePolicy, fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, QueryError>> + Send + 'static,
  {
    let changed = cache.register(&key, &policy, erase(fetcher));
    cache.ensure(&key);

    let refresher = policy.refresh_every.map(|interval| {
      let cache = cache.clone();
      let key = key.clone();
      tokio::spawn(async move {
        loop {
          tokio::time::sleep(interval).await;
          cache.refetch(&key);
        }
      })
    });

    Self {
      cache: cache.clone(),
      key,
      policy,
      placeholder: None,
      changed,
      refresher,
    }
  }

  pub fn with_placeholder(mut self, value: T) -> Self {
    self.placeholder = Some(Arc::new(value));
    self
  }

  /// The cached value, or the placeholder when nothing real has arrived.
  pub fn data(&self) -> Option<Arc<T>> {
    let real = self
      .snapshot()
      .and_then(|s| s.data)
      .and_then(|payload| downcast::<T>(payload).ok());
    real.or_else(|| self.placeholder.clone())
  }

  /// True until the first real value arrives. A background revalidation of
  /// existing data does not count as loading.
  pub fn is_loading(&self) -> bool {
    match self.snapshot() {
      Some(s) => s.fetching && s.data.is_none(),
      None => false,
    }
  }

  /// True whenever a fetch is in flight, including background refreshes.
  pub fn is_fetching(&self) -> bool {
    self.snapshot().map(|s| s.fetching).unwrap_or(false)
  }

  pub fn is_error(&self) -> bool {
    self.error().is_some()
  }

  pub fn error(&self) -> Option<QueryError> {
    self.snapshot().and_then(|s| s.error)
  }

  pub fn data_updated_at(&self) -> Option<DateTime<Utc>> {
    self.snapshot().and_then(|s| s.updated_at)
  }

  pub fn is_stale(&self) -> bool {
    match self.snapshot() {
      None => true,
      Some(s) => {
        if s.invalidated {
          return true;
        }
        match s.fetched_at {
          Some(at) => at.elapsed() > self.policy.stale_after,
          None => true,
        }
      }
    }
  }

  /// Force a background refetch.
  pub fn refetch(&self) {
    self.cache.refetch(&self.key);
  }

  /// Refetch in the background only if the entry is stale, invalidated, or
  /// missing. Cheap to call on every tick.
  pub fn ensure(&self) {
    self.cache.ensure(&self.key);
  }

  /// Returns `true` when the entry changed since the last poll.
  pub fn poll(&mut self) -> bool {
    match self.changed.has_changed() {
      Ok(true) => {
        self.changed.borrow_and_update();
        true
      }
      // Unchanged, or the cache was reset out from under us.
      _ => false,
    }
  }

  fn snapshot(&self) -> Option<EntrySnapshot> {
    self.cache.snapshot(&self.key)
  }
}

impl<T> Drop for QueryHandle<T> {
  fn drop(&mut self) {
    if let Some(refresher) = &self.refresher {
      refresher.abort();
    }
  }
}

impl<T> std::fmt::Debug for QueryHandle<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("QueryHandle")
      .field("key", &self.key)
      .field("policy", &self.policy)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::policy::RetryPolicy;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::time::Duration;

  fn policy() -> CachePolicy {
    CachePolicy::new(Duration::from_secs(60), Duration::from_secs(600))
      .with_retry(RetryPolicy::none())
  }

  #[tokio::test]
  async fn test_loading_then_data() {
    let cache = QueryCache::new();
    let key = QueryKey::dashboard().push("stats");
    let mut handle = QueryHandle::new(&cache, key, policy(), || async {
      tokio::time::sleep(Duration::from_millis(20)).await;
      Ok::<_, QueryError>(vec![1u32, 2, 3])
    });

    assert!(handle.is_loading());
    assert!(handle.data().is_none());
    assert!(handle.is_stale());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(handle.poll());
    assert!(!handle.is_loading());
    assert!(!handle.is_error());
    assert_eq!(handle.data().as_deref(), Some(&vec![1, 2, 3]));
    assert!(handle.data_updated_at().is_some());
    assert!(!handle.is_stale());
  }

  #[tokio::test]
  async fn test_error_after_retries() {
    let cache = QueryCache::new();
    let key = QueryKey::dashboard().push("stats");
    let handle: QueryHandle<u32> = QueryHandle::new(&cache, key, policy(), || async {
      Err(QueryError::Api("HTTP 500".to_string()))
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(handle.is_error());
    assert_eq!(handle.error(), Some(QueryError::Api("HTTP 500".to_string())));
    assert!(handle.data().is_none());
  }

  #[tokio::test]
  async fn test_placeholder_served_through_failure() {
    let cache = QueryCache::new();
    let key = QueryKey::dashboard().push("trends").push("performance").push(30u32);
    let handle: QueryHandle<Vec<u32>> = QueryHandle::new(&cache, key, policy(), || async {
      Err(QueryError::Transport("unreachable".to_string()))
    })
    .with_placeholder(Vec::new());

    // Placeholder is visible immediately, while the fetch is still running.
    assert!(handle.is_loading());
    assert_eq!(handle.data().as_deref(), Some(&Vec::new()));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(handle.is_error());
    // Data stays on the placeholder after the fetch errors out.
    assert_eq!(handle.data().as_deref(), Some(&Vec::new()));
  }

  #[tokio::test]
  async fn test_auto_refresh_while_mounted() {
    let cache = QueryCache::new();
    let key = QueryKey::dashboard().push("projects").push("recent").push(5u32);
    let calls = Arc::new(AtomicU32::new(0));
    let policy = CachePolicy::new(Duration::from_secs(60), Duration::from_secs(600))
      .with_refresh_every(Duration::from_millis(20))
      .with_retry(RetryPolicy::none());

    let handle = {
      let calls = calls.clone();
      QueryHandle::new(&cache, key, policy, move || {
        let calls = calls.clone();
        async move { Ok::<_, QueryError>(calls.fetch_add(1, Ordering::SeqCst)) }
      })
    };

    tokio::time::sleep(Duration::from_millis(90)).await;
    let while_mounted = calls.load(Ordering::SeqCst);
    assert!(while_mounted >= 3, "expected periodic refetches, saw {}", while_mounted);

    drop(handle);
    tokio::time::sleep(Duration::from_millis(60)).await;
    // The refresher dies with the handle.
    assert_eq!(calls.load(Ordering::SeqCst), while_mounted);
  }

  #[tokio::test]
  async fn test_poll_notices_invalidation() {
    let cache = QueryCache::new();
    let key = QueryKey::dashboard().push("stats");
    let mut handle = QueryHandle::new(&cache, key, policy(), || async {
      Ok::<_, QueryError>(1u32)
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.poll();

    cache.invalidate_prefix(&QueryKey::dashboard());
    assert!(handle.poll());
  }

  #[tokio::test]
  async fn test_ensure_does_not_retry_errored_entries() {
    let cache = QueryCache::new();
    let key = QueryKey::dashboard().push("stats");
    let calls = Arc::new(AtomicU32::new(0));

    let handle: QueryHandle<u32> = {
      let calls = calls.clone();
      QueryHandle::new(&cache, key, policy(), move || {
        calls.fetch_add(1, Ordering::SeqCst);
        std::future::ready(Err(QueryError::Api("HTTP 500".to_string())))
      })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(handle.is_error());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Polled ensure() must not hammer a failing backend.
    handle.ensure();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // An explicit refetch does try again.
    handle.refetch();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_ensure_refetches_when_stale() {
    let cache = QueryCache::new();
    let key = QueryKey::dashboard().push("stats");
    let calls = Arc::new(AtomicU32::new(0));
    let policy = CachePolicy::new(Duration::ZERO, Duration::from_secs(600))
      .with_retry(RetryPolicy::none());

    let handle = {
      let calls = calls.clone();
      QueryHandle::new(&cache, key, policy, move || {
        let calls = calls.clone();
        async move { Ok::<_, QueryError>(calls.fetch_add(1, Ordering::SeqCst)) }
      })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Zero stale window: ensure() sees a stale entry and refreshes it.
    handle.ensure();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }
}
