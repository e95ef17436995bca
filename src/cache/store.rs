//! In-memory query cache with stale-while-revalidate semantics.
//!
//! One [`QueryCache`] holds every dashboard resource, keyed by
//! [`QueryKey`]. Reads inside the stale window are served from memory with
//! no network call; stale reads return the cached value immediately while a
//! background refresh runs. At most one fetch per key is in flight at a
//! time: concurrent requests attach to the pending fetch instead of issuing
//! a duplicate call.
//!
//! The cache is an explicitly constructed object injected where it is
//! needed; [`QueryCache::reset`] is the teardown hook for tests.

use chrono::{DateTime, Utc};
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch};
use tracing::debug;

use super::error::QueryError;
use super::key::QueryKey;
use super::policy::{CachePolicy, RetryPolicy};

/// Type-erased cached value.
pub type Payload = Arc<dyn Any + Send + Sync>;

type FetchOutcome = Result<Payload, QueryError>;
type BoxFetch = Pin<Box<dyn Future<Output = FetchOutcome> + Send>>;

/// Fetch function stored per entry so refetches (auto-refresh,
/// invalidation) can run without the original caller.
pub(crate) type ErasedFetcher = Arc<dyn Fn() -> BoxFetch + Send + Sync>;

/// One cached resource instance.
struct Entry {
  data: Option<Payload>,
  /// Monotonic fetch time, drives staleness.
  fetched_at: Option<Instant>,
  /// Wall-clock fetch time, for display.
  updated_at: Option<DateTime<Utc>>,
  error: Option<QueryError>,
  /// Set by namespace invalidation; forces the next read to refetch.
  invalidated: bool,
  /// Join point for the single in-flight fetch, if any.
  in_flight: Option<broadcast::Sender<FetchOutcome>>,
  /// Version counter observed by subscribed handles. The receiver count is
  /// the live subscriber count, which gates eviction and auto-refresh.
  changed: watch::Sender<u64>,
  fetcher: Option<ErasedFetcher>,
  policy: CachePolicy,
  /// When the sweeper first saw this entry with zero subscribers.
  idle_since: Option<Instant>,
}

impl Entry {
  fn new(policy: CachePolicy) -> Self {
    let (changed, _) = watch::channel(0);
    Self {
      data: None,
      fetched_at: None,
      updated_at: None,
      error: None,
      invalidated: false,
      in_flight: None,
      changed,
      fetcher: None,
      policy,
      idle_since: None,
    }
  }

  fn is_fresh(&self, now: Instant) -> bool {
    if self.invalidated || self.data.is_none() {
      return false;
    }
    match self.fetched_at {
      Some(at) => now.duration_since(at) <= self.policy.stale_after,
      None => false,
    }
  }

  fn subscribers(&self) -> usize {
    self.changed.receiver_count()
  }

  fn bump(&mut self) {
    self.changed.send_modify(|v| *v += 1);
  }
}

/// Read-only view of an entry, taken under the lock.
#[derive(Clone)]
pub struct EntrySnapshot {
  pub data: Option<Payload>,
  pub fetched_at: Option<Instant>,
  pub updated_at: Option<DateTime<Utc>>,
  pub error: Option<QueryError>,
  pub fetching: bool,
  pub invalidated: bool,
}

struct Inner {
  entries: Mutex<HashMap<QueryKey, Entry>>,
}

impl Inner {
  fn lock(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
    // Entries stay consistent across a poisoning panic; keep serving.
    self.entries.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn sweep(&self) {
    let now = Instant::now();
    self.lock().retain(|key, entry| {
      if entry.subscribers() > 0 {
        entry.idle_since = None;
        return true;
      }
      if entry.in_flight.is_some() {
        return true;
      }
      let idle = *entry.idle_since.get_or_insert(now);
      if now.duration_since(idle) >= entry.policy.retain_for {
        debug!(key = %key, "evicting idle cache entry");
        false
      } else {
        true
      }
    });
  }
}

/// The shared in-memory cache.
#[derive(Clone)]
pub struct QueryCache {
  inner: Arc<Inner>,
}

impl QueryCache {
  /// Create a cache with the default eviction sweep cadence.
  pub fn new() -> Self {
    Self::with_sweep_interval(Duration::from_secs(30))
  }

  /// Create a cache sweeping idle entries every `every`. The sweeper task
  /// stops once the last clone of the cache is dropped.
  pub fn with_sweep_interval(every: Duration) -> Self {
    let inner = Arc::new(Inner {
      entries: Mutex::new(HashMap::new()),
    });
    spawn_sweeper(&inner, every);
    Self { inner }
  }

  /// Register a subscriber for `key`, recording the policy and fetcher used
  /// for later refetches. Returns the change-notification receiver.
  pub(crate) fn register(
    &self,
    key: &QueryKey,
    policy: &CachePolicy,
    fetcher: ErasedFetcher,
  ) -> watch::Receiver<u64> {
    let mut entries = self.inner.lock();
    let entry = entries
      .entry(key.clone())
      .or_insert_with(|| Entry::new(policy.clone()));
    entry.policy = policy.clone();
    entry.fetcher = Some(fetcher);
    entry.idle_since = None;
    entry.changed.subscribe()
  }

  /// Start a background fetch when the entry is missing data, stale, or
  /// invalidated. Never blocks and never duplicates an in-flight fetch.
  pub(crate) fn ensure(&self, key: &QueryKey) {
    self.spawn_fetch(key, false);
  }

  /// Force a background refetch regardless of freshness.
  pub(crate) fn refetch(&self, key: &QueryKey) {
    self.spawn_fetch(key, true);
  }

  /// Fetch `key`, serving from cache when fresh.
  ///
  /// Stale entries resolve immediately with the cached value while a
  /// background refresh runs. A fetch already in flight is joined, not
  /// duplicated. Used by prefetching and anywhere a resolved value is
  /// needed outside a subscription.
  pub async fn fetch<T, F, Fut>(
    &self,
    key: &QueryKey,
    policy: &CachePolicy,
    fetcher: F,
  ) -> Result<Arc<T>, QueryError>
  where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, QueryError>> + Send + 'static,
  {
    enum Plan {
      Hit(Payload),
      HitAndRefresh(Payload, RetryPolicy),
      Join(broadcast::Receiver<FetchOutcome>),
      Run(RetryPolicy, broadcast::Receiver<FetchOutcome>),
    }

    let erased = erase(fetcher);
    let plan = {
      let mut entries = self.inner.lock();
      let entry = entries
        .entry(key.clone())
        .or_insert_with(|| Entry::new(policy.clone()));
      entry.policy = policy.clone();
      entry.fetcher = Some(erased.clone());

      if let Some(data) = entry.data.clone() {
        if entry.is_fresh(Instant::now()) || entry.in_flight.is_some() {
          // Fresh, or a refresh is already running: serve the cached
          // value now either way.
          Plan::Hit(data)
        } else {
          let (tx, _) = broadcast::channel(1);
          entry.in_flight = Some(tx);
          entry.bump();
          Plan::HitAndRefresh(data, entry.policy.retry)
        }
      } else if let Some(tx) = &entry.in_flight {
        Plan::Join(tx.subscribe())
      } else {
        let (tx, rx) = broadcast::channel(1);
        entry.in_flight = Some(tx);
        entry.bump();
        Plan::Run(entry.policy.retry, rx)
      }
    };

    match plan {
      Plan::Hit(payload) => downcast(payload),
      Plan::HitAndRefresh(payload, retry) => {
        self.spawn_run(key.clone(), erased, retry);
        downcast(payload)
      }
      Plan::Join(mut rx) => match rx.recv().await {
        Ok(outcome) => outcome.and_then(downcast),
        Err(_) => Err(abandoned(key)),
      },
      Plan::Run(retry, mut rx) => {
        self.spawn_run(key.clone(), erased, retry);
        match rx.recv().await {
          Ok(outcome) => outcome.and_then(downcast),
          Err(_) => Err(abandoned(key)),
        }
      }
    }
  }

  /// Mark every key under `prefix` invalid. Entries with live subscribers
  /// refresh immediately; the rest refetch on their next read.
  pub fn invalidate_prefix(&self, prefix: &QueryKey) {
    let mut refresh = Vec::new();
    {
      let mut entries = self.inner.lock();
      for (key, entry) in entries.iter_mut() {
        if !key.starts_with(prefix) {
          continue;
        }
        entry.invalidated = true;
        entry.bump();
        if entry.subscribers() > 0 && entry.in_flight.is_none() {
          refresh.push(key.clone());
        }
      }
    }
    for key in refresh {
      self.spawn_fetch(&key, true);
    }
  }

  /// Drop every entry. Teardown hook for tests and sign-out.
  #[allow(dead_code)]
  pub fn reset(&self) {
    self.inner.lock().clear();
  }

  pub fn snapshot(&self, key: &QueryKey) -> Option<EntrySnapshot> {
    self.inner.lock().get(key).map(|entry| EntrySnapshot {
      data: entry.data.clone(),
      fetched_at: entry.fetched_at,
      updated_at: entry.updated_at,
      error: entry.error.clone(),
      fetching: entry.in_flight.is_some(),
      invalidated: entry.invalidated,
    })
  }

  fn spawn_fetch(&self, key: &QueryKey, force: bool) {
    let started = {
      let mut entries = self.inner.lock();
      let Some(entry) = entries.get_mut(key) else {
        return;
      };
      if entry.in_flight.is_some() {
        return;
      }
      if !force {
        if entry.is_fresh(Instant::now()) {
          return;
        }
        // An entry that already exhausted its retries waits for an
        // explicit refetch, an auto-refresh tick, or invalidation;
        // re-running it on every poll would hammer a failing backend.
        if entry.error.is_some() && !entry.invalidated {
          return;
        }
      }
      let Some(fetcher) = entry.fetcher.clone() else {
        return;
      };
      let (tx, _) = broadcast::channel(1);
      entry.in_flight = Some(tx);
      entry.bump();
      (fetcher, entry.policy.retry)
    };
    self.spawn_run(key.clone(), started.0, started.1);
  }

  fn spawn_run(&self, key: QueryKey, fetcher: ErasedFetcher, retry: RetryPolicy) {
    let inner = Arc::clone(&self.inner);
    tokio::spawn(run_fetch(inner, key, fetcher, retry));
  }
}

impl Default for QueryCache {
  fn default() -> Self {
    Self::new()
  }
}

/// Run one fetch to completion, retrying with exponential backoff, then
/// publish the outcome into the entry and to any joined waiters.
async fn run_fetch(inner: Arc<Inner>, key: QueryKey, fetcher: ErasedFetcher, retry: RetryPolicy) {
  let mut attempt = 0u32;
  let outcome = loop {
    match fetcher().await {
      Ok(payload) => break Ok(payload),
      Err(err) => {
        if attempt >= retry.retries {
          debug!(key = %key, error = %err, "fetch failed, retries exhausted");
          break Err(err);
        }
        let delay = retry.delay_for(attempt);
        debug!(key = %key, attempt, ?delay, error = %err, "fetch failed, retrying");
        tokio::time::sleep(delay).await;
        attempt += 1;
      }
    }
  };

  let waiters = {
    let mut entries = inner.lock();
    match entries.get_mut(&key) {
      Some(entry) => {
        match &outcome {
          Ok(payload) => {
            entry.data = Some(payload.clone());
            entry.fetched_at = Some(Instant::now());
            entry.updated_at = Some(Utc::now());
            entry.error = None;
            entry.invalidated = false;
          }
          Err(err) => {
            // Stale data, if present, stays servable.
            entry.error = Some(err.clone());
          }
        }
        let tx = entry.in_flight.take();
        entry.bump();
        tx
      }
      // Entry evicted or reset mid-flight: nobody left to notify.
      None => None,
    }
  };

  if let Some(tx) = waiters {
    let _ = tx.send(outcome);
  }
}

fn spawn_sweeper(inner: &Arc<Inner>, every: Duration) {
  let weak: Weak<Inner> = Arc::downgrade(inner);
  tokio::spawn(async move {
    let mut tick = tokio::time::interval(every);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // First tick completes immediately; skip it.
    tick.tick().await;
    loop {
      tick.tick().await;
      let Some(inner) = weak.upgrade() else {
        break;
      };
      inner.sweep();
    }
  });
}

pub(crate) fn erase<T, F, Fut>(fetcher: F) -> ErasedFetcher
where
  T: Send + Sync + 'static,
  F: Fn() -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<T, QueryError>> + Send + 'static,
{
  Arc::new(move || {
    let fut = fetcher();
    Box::pin(async move { fut.await.map(|value| Arc::new(value) as Payload) })
  })
}

pub(crate) fn downcast<T: Send + Sync + 'static>(payload: Payload) -> Result<Arc<T>, QueryError> {
  payload
    .downcast::<T>()
    .map_err(|_| QueryError::Decode("cached value has an unexpected type".to_string()))
}

fn abandoned(key: &QueryKey) -> QueryError {
  QueryError::Transport(format!("fetch for {} was abandoned", key))
}
