//! Composed dashboard view state.
//!
//! The main dashboard renders four resources at once. Instead of every
//! view hand-rolling a four-way loading/error reduction, the aggregation
//! rules live here once: OR for loading and staleness, first-wins by fixed
//! precedence for errors, MAX for freshness.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::api::types::{DashboardStats, PriorityIssue, ProjectSummary, TrendPoint};
use crate::cache::{QueryError, QueryHandle, QueryKey};
use crate::queries::{Dashboard, DashboardQuery};

use std::time::Duration;

/// How many recent projects the overview shows.
pub const RECENT_PROJECT_LIMIT: u32 = 5;
/// How many priority issues the overview shows.
pub const PRIORITY_ISSUE_LIMIT: u32 = 10;

/// Stats + recent projects + priority issues + performance trend, reduced
/// to one loading/error/freshness state.
pub struct DashboardOverview {
  stats: QueryHandle<DashboardStats>,
  projects: QueryHandle<Vec<ProjectSummary>>,
  issues: QueryHandle<Vec<PriorityIssue>>,
  trends: QueryHandle<Vec<TrendPoint>>,
}

impl DashboardOverview {
  pub fn new(
    stats: QueryHandle<DashboardStats>,
    projects: QueryHandle<Vec<ProjectSummary>>,
    issues: QueryHandle<Vec<PriorityIssue>>,
    trends: QueryHandle<Vec<TrendPoint>>,
  ) -> Self {
    Self {
      stats,
      projects,
      issues,
      trends,
    }
  }

  pub fn stats(&self) -> &QueryHandle<DashboardStats> {
    &self.stats
  }

  pub fn projects(&self) -> &QueryHandle<Vec<ProjectSummary>> {
    &self.projects
  }

  pub fn issues(&self) -> &QueryHandle<Vec<PriorityIssue>> {
    &self.issues
  }

  pub fn trends(&self) -> &QueryHandle<Vec<TrendPoint>> {
    &self.trends
  }

  /// True while any constituent query is still loading its first value.
  pub fn is_loading(&self) -> bool {
    self.stats.is_loading()
      || self.projects.is_loading()
      || self.issues.is_loading()
      || self.trends.is_loading()
  }

  /// First error by fixed precedence: stats, then projects, then issues.
  /// Simultaneous errors from the others are subordinate; this mirrors the
  /// product's existing behavior (see DESIGN.md).
  pub fn error(&self) -> Option<QueryError> {
    self
      .stats
      .error()
      .or_else(|| self.projects.error())
      .or_else(|| self.issues.error())
  }

  pub fn is_error(&self) -> bool {
    self.error().is_some()
  }

  /// Freshest constituent fetch time; the newest feed wins for display.
  pub fn last_updated(&self) -> Option<DateTime<Utc>> {
    [
      self.stats.data_updated_at(),
      self.projects.data_updated_at(),
      self.issues.data_updated_at(),
      self.trends.data_updated_at(),
    ]
    .into_iter()
    .flatten()
    .max()
  }

  /// True while any constituent has a fetch in flight, including
  /// background revalidation of data already on screen.
  pub fn is_fetching(&self) -> bool {
    self.stats.is_fetching()
      || self.projects.is_fetching()
      || self.issues.is_fetching()
      || self.trends.is_fetching()
  }

  /// True when any constituent has gone stale.
  pub fn is_stale(&self) -> bool {
    self.stats.is_stale()
      || self.projects.is_stale()
      || self.issues.is_stale()
      || self.trends.is_stale()
  }

  /// Refetch all constituents concurrently.
  pub fn refetch(&self) {
    self.stats.refetch();
    self.projects.refetch();
    self.issues.refetch();
    self.trends.refetch();
  }

  /// Background-refresh any constituent that has gone stale. Called on the
  /// event-loop tick.
  pub fn ensure_fresh(&self) {
    self.stats.ensure();
    self.projects.ensure();
    self.issues.ensure();
    self.trends.ensure();
  }

  /// Returns `true` when any constituent changed since the last poll.
  pub fn poll(&mut self) -> bool {
    let changed = [
      self.stats.poll(),
      self.projects.poll(),
      self.issues.poll(),
      self.trends.poll(),
    ];
    changed.into_iter().any(|c| c)
  }
}

impl Dashboard {
  /// Subscribe to the composed dashboard view.
  pub fn overview(&self, trend_days: u32) -> DashboardOverview {
    DashboardOverview::new(
      self.stats(),
      self.recent_projects(RECENT_PROJECT_LIMIT),
      self.priority_issues(PRIORITY_ISSUE_LIMIT),
      self.performance_trends(trend_days),
    )
  }

  /// Warm the cache for the resources the dashboard is about to need.
  ///
  /// Uses shorter stale windows than the main queries so a real read right
  /// after landing hits just-warmed data, not a tolerated-stale value.
  /// Best effort: failures are logged and swallowed.
  pub async fn prefetch_all(&self) {
    let stats = DashboardQuery::Stats;
    let projects = DashboardQuery::RecentProjects {
      limit: RECENT_PROJECT_LIMIT,
    };
    let issues = DashboardQuery::PriorityIssues {
      limit: PRIORITY_ISSUE_LIMIT,
    };

    let stats_key = stats.key();
    let stats_policy = stats.policy().for_prefetch(Duration::from_secs(30));
    let projects_key = projects.key();
    let projects_policy = projects.policy().for_prefetch(Duration::from_secs(10));
    let issues_key = issues.key();
    let issues_policy = issues.policy().for_prefetch(Duration::from_secs(10));

    let stats_fut = {
      let api = self.api().clone();
      self.cache().fetch(&stats_key, &stats_policy, move || {
        let api = api.clone();
        async move { api.dashboard_stats().await }
      })
    };
    let projects_fut = {
      let api = self.api().clone();
      self.cache().fetch(&projects_key, &projects_policy, move || {
        let api = api.clone();
        async move { api.recent_projects(RECENT_PROJECT_LIMIT).await }
      })
    };
    let issues_fut = {
      let api = self.api().clone();
      self.cache().fetch(&issues_key, &issues_policy, move || {
        let api = api.clone();
        async move { api.priority_issues(PRIORITY_ISSUE_LIMIT).await }
      })
    };

    let (stats_res, projects_res, issues_res) =
      futures::join!(stats_fut, projects_fut, issues_fut);
    for (what, failed) in [
      ("stats", stats_res.is_err()),
      ("recent projects", projects_res.is_err()),
      ("priority issues", issues_res.is_err()),
    ] {
      if failed {
        debug!(resource = what, "prefetch failed");
      }
    }
  }

  /// Drop the backend's dashboard caches, then invalidate the whole local
  /// `dashboard` namespace so no read serves pre-invalidation data.
  ///
  /// No sub-key guessing: a state change anywhere invalidates everything
  /// under the namespace.
  pub async fn invalidate_cache(&self) -> Result<(), QueryError> {
    self.api().invalidate_dashboard().await?;
    self.cache().invalidate_prefix(&QueryKey::dashboard());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CachePolicy, QueryCache, RetryPolicy};
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;

  fn policy() -> CachePolicy {
    CachePolicy::new(Duration::from_secs(60), Duration::from_secs(600))
      .with_retry(RetryPolicy::none())
  }

  fn stats_value() -> DashboardStats {
    DashboardStats {
      total_projects: 3,
      average_score: 78.0,
      score_delta: 1.5,
      critical_issues: 4,
      analyses_this_week: 9,
    }
  }

  fn overview_with(
    stats: QueryHandle<DashboardStats>,
    projects: QueryHandle<Vec<ProjectSummary>>,
    issues: QueryHandle<Vec<PriorityIssue>>,
    trends: QueryHandle<Vec<TrendPoint>>,
  ) -> DashboardOverview {
    DashboardOverview::new(stats, projects, issues, trends)
  }

  fn ok_projects(cache: &QueryCache) -> QueryHandle<Vec<ProjectSummary>> {
    QueryHandle::new(
      cache,
      DashboardQuery::RecentProjects { limit: 5 }.key(),
      policy(),
      || async { Ok(Vec::new()) },
    )
  }

  fn ok_issues(cache: &QueryCache) -> QueryHandle<Vec<PriorityIssue>> {
    QueryHandle::new(
      cache,
      DashboardQuery::PriorityIssues { limit: 10 }.key(),
      policy(),
      || async { Ok(Vec::new()) },
    )
  }

  fn ok_trends(cache: &QueryCache) -> QueryHandle<Vec<TrendPoint>> {
    QueryHandle::new(
      cache,
      DashboardQuery::PerformanceTrends { days: 30 }.key(),
      policy(),
      || async { Ok(Vec::new()) },
    )
    .with_placeholder(Vec::new())
  }

  #[tokio::test]
  async fn test_loading_or_rule_and_error_precedence() {
    let cache = QueryCache::new();

    // Stats errors, projects never resolves, issues succeed.
    let stats: QueryHandle<DashboardStats> = QueryHandle::new(
      &cache,
      DashboardQuery::Stats.key(),
      policy(),
      || async { Err(QueryError::Api("stats exploded".to_string())) },
    );
    let projects: QueryHandle<Vec<ProjectSummary>> = QueryHandle::new(
      &cache,
      DashboardQuery::RecentProjects { limit: 5 }.key(),
      policy(),
      || async {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(Vec::new())
      },
    );
    let issues = ok_issues(&cache);
    let trends = ok_trends(&cache);

    let overview = overview_with(stats, projects, issues, trends);
    tokio::time::sleep(Duration::from_millis(30)).await;

    // Projects still loading: OR rule keeps the whole view loading.
    assert!(overview.is_loading());
    // Stats' error wins the precedence order.
    assert_eq!(
      overview.error(),
      Some(QueryError::Api("stats exploded".to_string()))
    );
  }

  #[tokio::test]
  async fn test_error_precedence_skips_healthy_stats() {
    let cache = QueryCache::new();

    let stats: QueryHandle<DashboardStats> = QueryHandle::new(
      &cache,
      DashboardQuery::Stats.key(),
      policy(),
      || async { Ok(stats_value()) },
    );
    let projects: QueryHandle<Vec<ProjectSummary>> = QueryHandle::new(
      &cache,
      DashboardQuery::RecentProjects { limit: 5 }.key(),
      policy(),
      || async { Err(QueryError::Transport("projects down".to_string())) },
    );
    let issues: QueryHandle<Vec<PriorityIssue>> = QueryHandle::new(
      &cache,
      DashboardQuery::PriorityIssues { limit: 10 }.key(),
      policy(),
      || async { Err(QueryError::Transport("issues down".to_string())) },
    );
    let trends = ok_trends(&cache);

    let overview = overview_with(stats, projects, issues, trends);
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert!(!overview.is_loading());
    // Projects outranks issues once stats is healthy.
    assert_eq!(
      overview.error(),
      Some(QueryError::Transport("projects down".to_string()))
    );
  }

  #[tokio::test]
  async fn test_last_updated_takes_freshest_feed() {
    let cache = QueryCache::new();

    let stats: QueryHandle<DashboardStats> = QueryHandle::new(
      &cache,
      DashboardQuery::Stats.key(),
      policy(),
      || async { Ok(stats_value()) },
    );
    let projects = ok_projects(&cache);
    let issues = ok_issues(&cache);
    let trends = ok_trends(&cache);

    let overview = overview_with(stats, projects, issues, trends);
    tokio::time::sleep(Duration::from_millis(30)).await;

    let newest = overview.last_updated().unwrap();
    for at in [
      overview.stats().data_updated_at(),
      overview.projects().data_updated_at(),
      overview.issues().data_updated_at(),
      overview.trends().data_updated_at(),
    ]
    .into_iter()
    .flatten()
    {
      assert!(newest >= at);
    }
  }

  #[tokio::test]
  async fn test_refetch_hits_every_constituent() {
    let cache = QueryCache::new();
    let calls = Arc::new(AtomicU32::new(0));

    let counted = |value: Vec<ProjectSummary>| {
      let calls = calls.clone();
      move || {
        let calls = calls.clone();
        let value = value.clone();
        async move {
          calls.fetch_add(1, Ordering::SeqCst);
          Ok(value)
        }
      }
    };

    let stats: QueryHandle<DashboardStats> = {
      let calls = calls.clone();
      QueryHandle::new(&cache, DashboardQuery::Stats.key(), policy(), move || {
        let calls = calls.clone();
        async move {
          calls.fetch_add(1, Ordering::SeqCst);
          Ok(stats_value())
        }
      })
    };
    let projects = QueryHandle::new(
      &cache,
      DashboardQuery::RecentProjects { limit: 5 }.key(),
      policy(),
      counted(Vec::new()),
    );
    let issues: QueryHandle<Vec<PriorityIssue>> = {
      let calls = calls.clone();
      QueryHandle::new(
        &cache,
        DashboardQuery::PriorityIssues { limit: 10 }.key(),
        policy(),
        move || {
          let calls = calls.clone();
          async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
          }
        },
      )
    };
    let trends: QueryHandle<Vec<TrendPoint>> = {
      let calls = calls.clone();
      QueryHandle::new(
        &cache,
        DashboardQuery::PerformanceTrends { days: 30 }.key(),
        policy(),
        move || {
          let calls = calls.clone();
          async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
          }
        },
      )
    };

    let mut overview = overview_with(stats, projects, issues, trends);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert!(overview.poll());

    overview.refetch();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 8);
  }
}
