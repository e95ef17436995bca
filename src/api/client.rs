//! HTTP client for the analysis backend's dashboard API.

use color_eyre::{eyre::eyre, Result};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use crate::cache::QueryError;
use crate::config::Config;

use super::api_types::{
  ApiAnalysisHistory, ApiDistributionSlice, ApiEnvelope, ApiIssue, ApiProject, ApiStats,
  ApiTrendPoint,
};
use super::types::{
  AnalysisHistoryPage, DashboardStats, DistributionSlice, PriorityIssue, ProjectSummary,
  TrendPoint,
};

/// Per-attempt network timeout; retries are the cache layer's concern.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Dashboard API client.
///
/// Each method performs exactly one network call and returns a cloneable
/// [`QueryError`] on failure so the cache layer can retry and share the
/// outcome between deduplicated waiters.
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base: Url,
  token: String,
}

impl ApiClient {
  pub fn new(config: &Config) -> Result<Self> {
    let token = Config::get_api_token()?;

    let base = Url::parse(&config.backend.url)
      .map_err(|e| eyre!("Invalid backend URL {}: {}", config.backend.url, e))?;

    let http = reqwest::Client::builder()
      .timeout(REQUEST_TIMEOUT)
      .build()
      .map_err(|e| eyre!("Failed to build HTTP client: {}", e))?;

    Ok(Self { http, base, token })
  }

  pub async fn dashboard_stats(&self) -> Result<DashboardStats, QueryError> {
    let stats: ApiStats = self.get("api/dashboard/stats", &[]).await?;
    Ok(stats.into())
  }

  pub async fn recent_projects(&self, limit: u32) -> Result<Vec<ProjectSummary>, QueryError> {
    let projects: Vec<ApiProject> = self
      .get("api/dashboard/projects/recent", &[("limit", limit.to_string())])
      .await?;
    Ok(projects.into_iter().map(Into::into).collect())
  }

  pub async fn priority_issues(&self, limit: u32) -> Result<Vec<PriorityIssue>, QueryError> {
    let issues: Vec<ApiIssue> = self
      .get("api/dashboard/issues/priority", &[("limit", limit.to_string())])
      .await?;
    Ok(issues.into_iter().map(Into::into).collect())
  }

  pub async fn performance_trends(&self, days: u32) -> Result<Vec<TrendPoint>, QueryError> {
    let points: Vec<ApiTrendPoint> = self
      .get("api/dashboard/trends/performance", &[("days", days.to_string())])
      .await?;
    Ok(points.into_iter().map(Into::into).collect())
  }

  pub async fn issue_trends(&self, days: u32) -> Result<Vec<TrendPoint>, QueryError> {
    let points: Vec<ApiTrendPoint> = self
      .get("api/dashboard/trends/issues", &[("days", days.to_string())])
      .await?;
    Ok(points.into_iter().map(Into::into).collect())
  }

  pub async fn project_distribution(&self) -> Result<Vec<DistributionSlice>, QueryError> {
    let slices: Vec<ApiDistributionSlice> =
      self.get("api/dashboard/projects/distribution", &[]).await?;
    Ok(slices.into_iter().map(Into::into).collect())
  }

  pub async fn analysis_history(
    &self,
    page: u32,
    page_size: u32,
  ) -> Result<AnalysisHistoryPage, QueryError> {
    let history: ApiAnalysisHistory = self
      .get(
        "api/dashboard/analyses",
        &[("page", page.to_string()), ("pageSize", page_size.to_string())],
      )
      .await?;
    Ok(history.into())
  }

  /// Ask the backend to drop its server-side dashboard caches. The caller
  /// is responsible for invalidating the client-side namespace afterwards.
  pub async fn invalidate_dashboard(&self) -> Result<(), QueryError> {
    let url = self.endpoint("api/dashboard/cache/invalidate")?;

    let response = self
      .http
      .post(url)
      .bearer_auth(&self.token)
      .send()
      .await
      .map_err(transport)?;

    let envelope: ApiEnvelope<serde_json::Value> = check_status(response)?
      .json()
      .await
      .map_err(|e| QueryError::Decode(e.to_string()))?;

    if !envelope.success {
      return Err(QueryError::Api(
        envelope.error.unwrap_or_else(|| "invalidation rejected".to_string()),
      ));
    }
    Ok(())
  }

  async fn get<T: DeserializeOwned>(
    &self,
    path: &str,
    params: &[(&str, String)],
  ) -> Result<T, QueryError> {
    let url = self.endpoint(path)?;

    let response = self
      .http
      .get(url)
      .bearer_auth(&self.token)
      .query(params)
      .send()
      .await
      .map_err(transport)?;

    let envelope: ApiEnvelope<T> = check_status(response)?
      .json()
      .await
      .map_err(|e| QueryError::Decode(e.to_string()))?;

    envelope.into_data()
  }

  fn endpoint(&self, path: &str) -> Result<Url, QueryError> {
    self
      .base
      .join(path)
      .map_err(|e| QueryError::Transport(format!("invalid endpoint {}: {}", path, e)))
  }
}

fn transport(err: reqwest::Error) -> QueryError {
  if err.is_timeout() {
    QueryError::Transport(format!("request timed out after {:?}", REQUEST_TIMEOUT))
  } else {
    QueryError::Transport(err.to_string())
  }
}

fn check_status(response: reqwest::Response) -> Result<reqwest::Response, QueryError> {
  let status = response.status();
  if status.is_success() {
    Ok(response)
  } else if status == StatusCode::UNAUTHORIZED {
    Err(QueryError::Api("HTTP 401: check SEODASH_API_TOKEN".to_string()))
  } else {
    Err(QueryError::Api(format!("HTTP {}", status)))
  }
}
