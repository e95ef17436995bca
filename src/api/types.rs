//! Domain types for dashboard resources.
//!
//! All of these are read-only projections of backend state. The client
//! never mutates them in place; updates replace the cached value wholesale.

use chrono::{DateTime, NaiveDate, Utc};

/// Aggregate dashboard counters, fetched as one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardStats {
  pub total_projects: u32,
  pub average_score: f64,
  /// Change in average score against the previous period.
  pub score_delta: f64,
  pub critical_issues: u32,
  pub analyses_this_week: u32,
}

/// A recently analyzed project, for the dashboard list.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectSummary {
  pub id: String,
  pub name: String,
  pub url: String,
  pub score: u32,
  pub critical_issues: u32,
  pub last_analyzed: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
  Notice,
  Warning,
  Critical,
}

impl Severity {
  pub fn label(&self) -> &'static str {
    match self {
      Severity::Critical => "critical",
      Severity::Warning => "warning",
      Severity::Notice => "notice",
    }
  }
}

/// An issue surfaced on the dashboard for attention.
#[derive(Debug, Clone, PartialEq)]
pub struct PriorityIssue {
  pub id: String,
  pub project: String,
  pub severity: Severity,
  pub category: String,
  pub title: String,
  pub affected_pages: u32,
}

/// One time bucket of a trend series.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendPoint {
  pub date: NaiveDate,
  pub value: f64,
}

/// One bucket of the project score distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionSlice {
  pub bucket: String,
  pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStatus {
  Completed,
  Failed,
  Running,
}

/// A single past analysis run.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRecord {
  pub id: String,
  pub project: String,
  pub status: AnalysisStatus,
  pub score: Option<u32>,
  pub started_at: DateTime<Utc>,
}

/// One page of analysis history.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisHistoryPage {
  pub items: Vec<AnalysisRecord>,
  pub page: u32,
  pub page_size: u32,
  pub total: u32,
}
