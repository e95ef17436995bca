//! Dashboard query definitions.
//!
//! [`DashboardQuery`] enumerates every cacheable dashboard resource and is
//! the single source of truth for its cache key and cache policy.
//! [`Dashboard`] binds those definitions to the API client and hands out
//! live [`QueryHandle`]s.

use std::time::Duration;

use crate::api::types::{
  AnalysisHistoryPage, DashboardStats, DistributionSlice, PriorityIssue, ProjectSummary,
  TrendPoint,
};
use crate::api::ApiClient;
use crate::cache::{CachePolicy, QueryCache, QueryHandle, QueryKey, RetryPolicy};

const MINUTE: Duration = Duration::from_secs(60);

/// Query key and policy registry for dashboard resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardQuery {
  Stats,
  RecentProjects { limit: u32 },
  PriorityIssues { limit: u32 },
  PerformanceTrends { days: u32 },
  IssueTrends { days: u32 },
  ProjectDistribution,
  AnalysisHistory { page: u32, page_size: u32 },
}

impl DashboardQuery {
  /// Cache key: `[dashboard, category, ...params]`, parameters in call
  /// order so distinct parameterizations never collide.
  pub fn key(&self) -> QueryKey {
    match self {
      Self::Stats => QueryKey::dashboard().push("stats"),
      Self::RecentProjects { limit } => QueryKey::dashboard()
        .push("projects")
        .push("recent")
        .push(*limit),
      Self::PriorityIssues { limit } => QueryKey::dashboard()
        .push("issues")
        .push("priority")
        .push(*limit),
      Self::PerformanceTrends { days } => QueryKey::dashboard()
        .push("trends")
        .push("performance")
        .push(*days),
      Self::IssueTrends { days } => QueryKey::dashboard()
        .push("trends")
        .push("issues")
        .push(*days),
      Self::ProjectDistribution => QueryKey::dashboard().push("projects").push("distribution"),
      Self::AnalysisHistory { page, page_size } => QueryKey::dashboard()
        .push("analyses")
        .push(*page)
        .push(*page_size),
    }
  }

  /// Per-resource cache policy.
  ///
  /// The dashboard lists refresh every minute while visible and give up
  /// fast on failure; the slower-moving aggregates tolerate longer
  /// staleness and lean on the default retry.
  pub fn policy(&self) -> CachePolicy {
    let list_retry = RetryPolicy::capped(2, Duration::from_secs(10));
    match self {
      Self::Stats => CachePolicy::new(5 * MINUTE, 10 * MINUTE),
      Self::RecentProjects { .. } | Self::PriorityIssues { .. } => {
        CachePolicy::new(MINUTE, 10 * MINUTE)
          .with_refresh_every(MINUTE)
          .with_retry(list_retry)
      }
      Self::PerformanceTrends { .. } | Self::IssueTrends { .. } => {
        CachePolicy::new(5 * MINUTE, 10 * MINUTE)
      }
      Self::ProjectDistribution => {
        CachePolicy::new(10 * MINUTE, 30 * MINUTE).with_retry(list_retry)
      }
      Self::AnalysisHistory { .. } => CachePolicy::new(2 * MINUTE, 10 * MINUTE),
    }
  }

  pub fn description(&self) -> String {
    match self {
      Self::Stats => "dashboard stats".to_string(),
      Self::RecentProjects { limit } => format!("{} recent projects", limit),
      Self::PriorityIssues { limit } => format!("{} priority issues", limit),
      Self::PerformanceTrends { days } => format!("performance trend over {} days", days),
      Self::IssueTrends { days } => format!("issue trend over {} days", days),
      Self::ProjectDistribution => "project score distribution".to_string(),
      Self::AnalysisHistory { page, page_size } => {
        format!("analysis history page {} ({} per page)", page, page_size)
      }
    }
  }
}

/// Dashboard query surface: API client plus the shared cache.
///
/// Cloning is cheap; all clones share one cache.
#[derive(Clone)]
pub struct Dashboard {
  api: ApiClient,
  cache: QueryCache,
}

impl Dashboard {
  pub fn new(api: ApiClient, cache: QueryCache) -> Self {
    Self { api, cache }
  }

  pub fn api(&self) -> &ApiClient {
    &self.api
  }

  pub fn cache(&self) -> &QueryCache {
    &self.cache
  }

  pub fn stats(&self) -> QueryHandle<DashboardStats> {
    let query = DashboardQuery::Stats;
    let api = self.api.clone();
    QueryHandle::new(&self.cache, query.key(), query.policy(), move || {
      let api = api.clone();
      async move { api.dashboard_stats().await }
    })
  }

  pub fn recent_projects(&self, limit: u32) -> QueryHandle<Vec<ProjectSummary>> {
    let query = DashboardQuery::RecentProjects { limit };
    let api = self.api.clone();
    QueryHandle::new(&self.cache, query.key(), query.policy(), move || {
      let api = api.clone();
      async move { api.recent_projects(limit).await }
    })
  }

  pub fn priority_issues(&self, limit: u32) -> QueryHandle<Vec<PriorityIssue>> {
    let query = DashboardQuery::PriorityIssues { limit };
    let api = self.api.clone();
    QueryHandle::new(&self.cache, query.key(), query.policy(), move || {
      let api = api.clone();
      async move { api.priority_issues(limit).await }
    })
  }

  /// Score trend series. Served as an empty series until the first fetch
  /// lands, so views never special-case "no data yet".
  pub fn performance_trends(&self, days: u32) -> QueryHandle<Vec<TrendPoint>> {
    let query = DashboardQuery::PerformanceTrends { days };
    let api = self.api.clone();
    QueryHandle::new(&self.cache, query.key(), query.policy(), move || {
      let api = api.clone();
      async move { api.performance_trends(days).await }
    })
    .with_placeholder(Vec::new())
  }

  pub fn issue_trends(&self, days: u32) -> QueryHandle<Vec<TrendPoint>> {
    let query = DashboardQuery::IssueTrends { days };
    let api = self.api.clone();
    QueryHandle::new(&self.cache, query.key(), query.policy(), move || {
      let api = api.clone();
      async move { api.issue_trends(days).await }
    })
    .with_placeholder(Vec::new())
  }

  pub fn project_distribution(&self) -> QueryHandle<Vec<DistributionSlice>> {
    let query = DashboardQuery::ProjectDistribution;
    let api = self.api.clone();
    QueryHandle::new(&self.cache, query.key(), query.policy(), move || {
      let api = api.clone();
      async move { api.project_distribution().await }
    })
  }

  pub fn analysis_history(&self, page: u32, page_size: u32) -> QueryHandle<AnalysisHistoryPage> {
    let query = DashboardQuery::AnalysisHistory { page, page_size };
    let api = self.api.clone();
    QueryHandle::new(&self.cache, query.key(), query.policy(), move || {
      let api = api.clone();
      async move { api.analysis_history(page, page_size).await }
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashSet;

  #[test]
  fn test_every_query_key_is_unique() {
    let queries = [
      DashboardQuery::Stats,
      DashboardQuery::RecentProjects { limit: 5 },
      DashboardQuery::RecentProjects { limit: 10 },
      DashboardQuery::PriorityIssues { limit: 10 },
      DashboardQuery::PerformanceTrends { days: 30 },
      DashboardQuery::IssueTrends { days: 30 },
      DashboardQuery::ProjectDistribution,
      DashboardQuery::AnalysisHistory { page: 1, page_size: 20 },
      DashboardQuery::AnalysisHistory { page: 2, page_size: 20 },
    ];

    let keys: HashSet<_> = queries.iter().map(|q| q.key()).collect();
    assert_eq!(keys.len(), queries.len());
  }

  #[test]
  fn test_all_keys_live_under_dashboard_namespace() {
    let root = QueryKey::dashboard();
    for query in [
      DashboardQuery::Stats,
      DashboardQuery::RecentProjects { limit: 5 },
      DashboardQuery::PriorityIssues { limit: 10 },
      DashboardQuery::PerformanceTrends { days: 30 },
      DashboardQuery::IssueTrends { days: 7 },
      DashboardQuery::ProjectDistribution,
      DashboardQuery::AnalysisHistory { page: 1, page_size: 20 },
    ] {
      assert!(query.key().starts_with(&root), "{}", query.key());
    }
  }

  #[test]
  fn test_parameterized_keys_share_resource_prefix() {
    let five = DashboardQuery::RecentProjects { limit: 5 }.key();
    let ten = DashboardQuery::RecentProjects { limit: 10 }.key();
    let prefix = QueryKey::dashboard().push("projects").push("recent");
    assert!(five.starts_with(&prefix));
    assert!(ten.starts_with(&prefix));
    assert_ne!(five, ten);
  }

  #[test]
  fn test_list_policies_refresh_and_fail_fast() {
    let policy = DashboardQuery::RecentProjects { limit: 5 }.policy();
    assert_eq!(policy.stale_after, MINUTE);
    assert_eq!(policy.retain_for, 10 * MINUTE);
    assert_eq!(policy.refresh_every, Some(MINUTE));
    assert_eq!(policy.retry.retries, 2);
    assert_eq!(policy.retry.cap, Duration::from_secs(10));
  }

  #[test]
  fn test_stats_policy_uses_default_retry() {
    let policy = DashboardQuery::Stats.policy();
    assert_eq!(policy.stale_after, 5 * MINUTE);
    assert_eq!(policy.retain_for, 10 * MINUTE);
    assert_eq!(policy.refresh_every, None);
    assert_eq!(policy.retry, RetryPolicy::default());
  }

  #[test]
  fn test_distribution_policy_is_long_lived() {
    let policy = DashboardQuery::ProjectDistribution.policy();
    assert_eq!(policy.stale_after, 10 * MINUTE);
    assert_eq!(policy.retain_for, 30 * MINUTE);
  }

  #[test]
  fn test_descriptions() {
    assert_eq!(
      DashboardQuery::RecentProjects { limit: 5 }.description(),
      "5 recent projects"
    );
    assert_eq!(
      DashboardQuery::PerformanceTrends { days: 30 }.description(),
      "performance trend over 30 days"
    );
  }
}
