//! Serde-deserializable types matching the backend API responses.
//!
//! These are separate from the domain types to allow clean deserialization
//! of the camelCase wire format while keeping domain types focused on
//! application needs.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::cache::QueryError;

use super::types::{
  AnalysisHistoryPage, AnalysisRecord, AnalysisStatus, DashboardStats, DistributionSlice,
  PriorityIssue, ProjectSummary, Severity, TrendPoint,
};

// ============================================================================
// Response envelope
// ============================================================================

/// Every backend endpoint wraps its payload in `{success, data, error}`.
/// `success: false` is a fetch failure, handled by the retry policy exactly
/// like a transport error.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
  #[serde(default)]
  pub success: bool,
  pub data: Option<T>,
  pub error: Option<String>,
}

impl<T> ApiEnvelope<T> {
  pub fn into_data(self) -> Result<T, QueryError> {
    if !self.success {
      return Err(QueryError::Api(
        self.error.unwrap_or_else(|| "backend reported failure".to_string()),
      ));
    }
    self
      .data
      .ok_or_else(|| QueryError::Decode("successful envelope without data".to_string()))
  }
}

// ============================================================================
// Resource payloads
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiStats {
  #[serde(default)]
  pub total_projects: u32,
  #[serde(default)]
  pub average_score: f64,
  #[serde(default)]
  pub score_delta: f64,
  #[serde(default)]
  pub critical_issues: u32,
  #[serde(default)]
  pub analyses_this_week: u32,
}

impl From<ApiStats> for DashboardStats {
  fn from(api: ApiStats) -> Self {
    Self {
      total_projects: api.total_projects,
      average_score: api.average_score,
      score_delta: api.score_delta,
      critical_issues: api.critical_issues,
      analyses_this_week: api.analyses_this_week,
    }
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiProject {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub url: String,
  #[serde(default)]
  pub score: u32,
  #[serde(default)]
  pub critical_issues: u32,
  pub last_analyzed: Option<DateTime<Utc>>,
}

impl From<ApiProject> for ProjectSummary {
  fn from(api: ApiProject) -> Self {
    Self {
      id: api.id,
      name: api.name,
      url: api.url,
      score: api.score,
      critical_issues: api.critical_issues,
      last_analyzed: api.last_analyzed,
    }
  }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiSeverity {
  Critical,
  Warning,
  Notice,
}

impl From<ApiSeverity> for Severity {
  fn from(api: ApiSeverity) -> Self {
    match api {
      ApiSeverity::Critical => Severity::Critical,
      ApiSeverity::Warning => Severity::Warning,
      ApiSeverity::Notice => Severity::Notice,
    }
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiIssue {
  pub id: String,
  #[serde(rename = "projectName")]
  pub project: String,
  pub severity: ApiSeverity,
  #[serde(default)]
  pub category: String,
  pub title: String,
  #[serde(default)]
  pub affected_pages: u32,
}

impl From<ApiIssue> for PriorityIssue {
  fn from(api: ApiIssue) -> Self {
    Self {
      id: api.id,
      project: api.project,
      severity: api.severity.into(),
      category: api.category,
      title: api.title,
      affected_pages: api.affected_pages,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiTrendPoint {
  pub date: NaiveDate,
  pub value: f64,
}

impl From<ApiTrendPoint> for TrendPoint {
  fn from(api: ApiTrendPoint) -> Self {
    Self {
      date: api.date,
      value: api.value,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiDistributionSlice {
  pub bucket: String,
  #[serde(default)]
  pub count: u32,
}

impl From<ApiDistributionSlice> for DistributionSlice {
  fn from(api: ApiDistributionSlice) -> Self {
    Self {
      bucket: api.bucket,
      count: api.count,
    }
  }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiAnalysisStatus {
  Completed,
  Failed,
  Running,
}

impl From<ApiAnalysisStatus> for AnalysisStatus {
  fn from(api: ApiAnalysisStatus) -> Self {
    match api {
      ApiAnalysisStatus::Completed => AnalysisStatus::Completed,
      ApiAnalysisStatus::Failed => AnalysisStatus::Failed,
      ApiAnalysisStatus::Running => AnalysisStatus::Running,
    }
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiAnalysisRecord {
  pub id: String,
  #[serde(rename = "projectName")]
  pub project: String,
  pub status: ApiAnalysisStatus,
  pub score: Option<u32>,
  pub started_at: DateTime<Utc>,
}

impl From<ApiAnalysisRecord> for AnalysisRecord {
  fn from(api: ApiAnalysisRecord) -> Self {
    Self {
      id: api.id,
      project: api.project,
      status: api.status.into(),
      score: api.score,
      started_at: api.started_at,
    }
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiAnalysisHistory {
  #[serde(default)]
  pub items: Vec<ApiAnalysisRecord>,
  #[serde(default)]
  pub page: u32,
  #[serde(default)]
  pub page_size: u32,
  #[serde(default)]
  pub total: u32,
}

impl From<ApiAnalysisHistory> for AnalysisHistoryPage {
  fn from(api: ApiAnalysisHistory) -> Self {
    Self {
      items: api.items.into_iter().map(Into::into).collect(),
      page: api.page,
      page_size: api.page_size,
      total: api.total,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_envelope_success() {
    let envelope: ApiEnvelope<Vec<ApiProject>> = serde_json::from_str(
      r#"{"success":true,"data":[{"id":"p1","name":"Example","url":"https://example.com","score":87,"criticalIssues":2,"lastAnalyzed":"2026-08-01T10:00:00Z"}]}"#,
    )
    .unwrap();

    let projects = envelope.into_data().unwrap();
    assert_eq!(projects.len(), 1);
    let project: ProjectSummary = projects.into_iter().next().unwrap().into();
    assert_eq!(project.id, "p1");
    assert_eq!(project.score, 87);
    assert_eq!(project.critical_issues, 2);
  }

  #[test]
  fn test_envelope_failure_is_api_error() {
    let envelope: ApiEnvelope<ApiStats> =
      serde_json::from_str(r#"{"success":false,"error":"cache backend unavailable"}"#).unwrap();

    match envelope.into_data() {
      Err(QueryError::Api(msg)) => assert_eq!(msg, "cache backend unavailable"),
      other => panic!("expected api error, got {:?}", other),
    }
  }

  #[test]
  fn test_envelope_success_without_data_is_decode_error() {
    let envelope: ApiEnvelope<ApiStats> = serde_json::from_str(r#"{"success":true}"#).unwrap();
    assert!(matches!(envelope.into_data(), Err(QueryError::Decode(_))));
  }

  #[test]
  fn test_issue_severity_parsing() {
    let issue: ApiIssue = serde_json::from_str(
      r#"{"id":"i1","projectName":"Example","severity":"critical","category":"meta","title":"Missing description","affectedPages":14}"#,
    )
    .unwrap();
    let issue: PriorityIssue = issue.into();
    assert_eq!(issue.severity, Severity::Critical);
    assert_eq!(issue.affected_pages, 14);
  }

  #[test]
  fn test_trend_point_parsing() {
    let point: ApiTrendPoint = serde_json::from_str(r#"{"date":"2026-07-31","value":82.5}"#).unwrap();
    let point: TrendPoint = point.into();
    assert_eq!(point.value, 82.5);
  }
}
