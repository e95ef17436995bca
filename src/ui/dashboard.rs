//! Dashboard widgets: stat tiles, resource lists, trend charts.

use ratatui::prelude::*;
use ratatui::widgets::{Bar, BarChart, BarGroup, Block, Borders, List, ListItem, Paragraph, Sparkline};

use crate::api::types::{DistributionSlice, PriorityIssue, ProjectSummary, Severity, TrendPoint};
use crate::cache::QueryHandle;
use crate::overview::DashboardOverview;

use super::score_color;

pub fn draw_stat_tiles(frame: &mut Frame, area: Rect, overview: &DashboardOverview) {
  let tiles = Layout::default()
    .direction(Direction::Horizontal)
    .constraints([
      Constraint::Percentage(25),
      Constraint::Percentage(25),
      Constraint::Percentage(25),
      Constraint::Percentage(25),
    ])
    .split(area);

  let stats = overview.stats().data();
  let loading = overview.stats().is_loading();

  let values: [(String, &str, Color); 4] = match stats.as_deref() {
    Some(s) => [
      (s.total_projects.to_string(), "projects", Color::Cyan),
      (
        format!("{:.1} ({:+.1})", s.average_score, s.score_delta),
        "avg score",
        score_color(s.average_score.round() as u32),
      ),
      (s.critical_issues.to_string(), "critical issues", Color::Red),
      (
        s.analyses_this_week.to_string(),
        "analyses this week",
        Color::White,
      ),
    ],
    None => {
      let placeholder = if loading { "..." } else { "-" };
      [
        (placeholder.to_string(), "projects", Color::DarkGray),
        (placeholder.to_string(), "avg score", Color::DarkGray),
        (placeholder.to_string(), "critical issues", Color::DarkGray),
        (placeholder.to_string(), "analyses this week", Color::DarkGray),
      ]
    }
  };

  for (tile, (value, label, color)) in tiles.iter().zip(values) {
    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::DarkGray));
    let text = vec![
      Line::default(),
      Line::styled(value, Style::default().fg(color).bold()).alignment(Alignment::Center),
      Line::styled(label, Style::default().fg(Color::Gray)).alignment(Alignment::Center),
    ];
    frame.render_widget(Paragraph::new(text).block(block), *tile);
  }
}

pub fn draw_lists(frame: &mut Frame, area: Rect, overview: &DashboardOverview) {
  let halves = Layout::default()
    .direction(Direction::Horizontal)
    .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
    .split(area);

  draw_project_list(frame, halves[0], overview.projects());
  draw_issue_list(frame, halves[1], overview.issues());
}

fn draw_project_list(frame: &mut Frame, area: Rect, projects: &QueryHandle<Vec<ProjectSummary>>) {
  let title = if projects.is_loading() {
    " Recent Projects (loading...) ".to_string()
  } else if let Some(err) = projects.error() {
    format!(" Recent Projects (error: {}) ", err)
  } else {
    format!(
      " Recent Projects ({}) ",
      projects.data().map(|p| p.len()).unwrap_or(0)
    )
  };

  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  let data = projects.data();
  let items: Vec<ListItem> = data
    .as_deref()
    .map(|projects| {
      projects
        .iter()
        .map(|p| {
          let analyzed = match &p.last_analyzed {
            Some(at) => format!("  {}", at.format("%m-%d %H:%M")),
            None => "  never analyzed".to_string(),
          };
          let line = Line::from(vec![
            Span::styled(format!("{:<10} ", p.id), Style::default().fg(Color::DarkGray)),
            Span::styled(
              format!("{:>3} ", p.score),
              Style::default().fg(score_color(p.score)).bold(),
            ),
            Span::styled(p.name.clone(), Style::default().fg(Color::White)),
            Span::styled(
              format!("  {} critical", p.critical_issues),
              Style::default().fg(if p.critical_issues > 0 {
                Color::Red
              } else {
                Color::DarkGray
              }),
            ),
            Span::styled(analyzed, Style::default().fg(Color::DarkGray)),
          ]);
          ListItem::new(line)
        })
        .collect()
    })
    .unwrap_or_default();

  frame.render_widget(List::new(items).block(block), area);
}

fn draw_issue_list(frame: &mut Frame, area: Rect, issues: &QueryHandle<Vec<PriorityIssue>>) {
  let title = if issues.is_loading() {
    " Priority Issues (loading...) ".to_string()
  } else if let Some(err) = issues.error() {
    format!(" Priority Issues (error: {}) ", err)
  } else {
    format!(
      " Priority Issues ({}) ",
      issues.data().map(|i| i.len()).unwrap_or(0)
    )
  };

  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  let data = issues.data();
  let items: Vec<ListItem> = data
    .as_deref()
    .map(|issues| {
      issues
        .iter()
        .map(|issue| {
          let line = Line::from(vec![
            Span::styled(
              format!("{:<8} ", issue.severity.label()),
              Style::default().fg(severity_color(issue.severity)).bold(),
            ),
            Span::styled(
              format!("{:<12} ", issue.category),
              Style::default().fg(Color::Cyan),
            ),
            Span::styled(issue.title.clone(), Style::default().fg(Color::White)),
            Span::styled(
              format!("  {} ({} pages)", issue.project, issue.affected_pages),
              Style::default().fg(Color::DarkGray),
            ),
          ]);
          ListItem::new(line)
        })
        .collect()
    })
    .unwrap_or_default();

  frame.render_widget(List::new(items).block(block), area);
}

pub fn draw_trends(
  frame: &mut Frame,
  area: Rect,
  overview: &DashboardOverview,
  issue_trends: &QueryHandle<Vec<TrendPoint>>,
  distribution: &QueryHandle<Vec<DistributionSlice>>,
) {
  let thirds = Layout::default()
    .direction(Direction::Horizontal)
    .constraints([
      Constraint::Percentage(34),
      Constraint::Percentage(33),
      Constraint::Percentage(33),
    ])
    .split(area);

  draw_sparkline(frame, thirds[0], " Score Trend ", overview.trends(), Color::Green);
  draw_sparkline(frame, thirds[1], " Issue Trend ", issue_trends, Color::Red);
  draw_distribution(frame, thirds[2], distribution);
}

fn draw_sparkline(
  frame: &mut Frame,
  area: Rect,
  title: &str,
  trend: &QueryHandle<Vec<TrendPoint>>,
  color: Color,
) {
  // The placeholder keeps this an empty series rather than a missing one.
  let data = trend.data();
  let series = data.as_deref();

  let title = if trend.is_error() {
    format!("{}(error) ", title)
  } else {
    match series.and_then(|points| points.first().zip(points.last())) {
      Some((first, last)) => format!("{}{} - {} ", title, first.date, last.date),
      None => title.to_string(),
    }
  };

  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));

  let points: Vec<u64> = series
    .map(|points| points.iter().map(|p| p.value.max(0.0) as u64).collect())
    .unwrap_or_default();

  let sparkline = Sparkline::default()
    .block(block)
    .data(points.iter().copied())
    .style(Style::default().fg(color));
  frame.render_widget(sparkline, area);
}

fn draw_distribution(
  frame: &mut Frame,
  area: Rect,
  distribution: &QueryHandle<Vec<DistributionSlice>>,
) {
  let block = Block::default()
    .title(" Score Distribution ")
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));

  let data = distribution.data();
  let bars: Vec<Bar> = data
    .as_deref()
    .map(|slices| {
      slices
        .iter()
        .map(|slice| {
          Bar::default()
            .label(Line::from(slice.bucket.clone()))
            .value(slice.count as u64)
        })
        .collect()
    })
    .unwrap_or_default();

  let chart = BarChart::default()
    .block(block)
    .bar_width(7)
    .bar_gap(1)
    .data(BarGroup::default().bars(&bars));
  frame.render_widget(chart, area);
}

fn severity_color(severity: Severity) -> Color {
  match severity {
    Severity::Critical => Color::Red,
    Severity::Warning => Color::Yellow,
    Severity::Notice => Color::Blue,
  }
}
