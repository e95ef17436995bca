//! Paginated analysis history view.

use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph};

use crate::api::types::{AnalysisHistoryPage, AnalysisStatus};
use crate::cache::QueryHandle;
use crate::queries::DashboardQuery;

use super::score_color;

pub fn draw_history(
  frame: &mut Frame,
  area: Rect,
  history: &QueryHandle<AnalysisHistoryPage>,
  page: u32,
  page_size: u32,
) {
  let query = DashboardQuery::AnalysisHistory { page, page_size };
  let title = if history.is_loading() {
    format!(" {} (loading...) ", query.description())
  } else if let Some(err) = history.error() {
    format!(" {} (error: {}) ", query.description(), err)
  } else {
    format!(" {} ", query.description())
  };

  let block = Block::default()
    .title(title)
    .title_alignment(Alignment::Center)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  let data = history.data();
  let Some(page_data) = data.as_deref() else {
    frame.render_widget(block, area);
    return;
  };

  let items: Vec<ListItem> = page_data
    .items
    .iter()
    .map(|record| {
      let (status_label, status_color) = match record.status {
        AnalysisStatus::Completed => ("done", Color::Green),
        AnalysisStatus::Failed => ("failed", Color::Red),
        AnalysisStatus::Running => ("running", Color::Yellow),
      };
      let score = match record.score {
        Some(score) => Span::styled(
          format!("{:>3}", score),
          Style::default().fg(score_color(score)).bold(),
        ),
        None => Span::styled("  -", Style::default().fg(Color::DarkGray)),
      };
      let line = Line::from(vec![
        Span::styled(format!("{:<10} ", record.id), Style::default().fg(Color::DarkGray)),
        Span::styled(
          format!("{:<8} ", status_label),
          Style::default().fg(status_color),
        ),
        score,
        Span::raw(" "),
        Span::styled(record.project.clone(), Style::default().fg(Color::White)),
        Span::styled(
          format!("  {}", record.started_at.format("%Y-%m-%d %H:%M")),
          Style::default().fg(Color::DarkGray),
        ),
      ]);
      ListItem::new(line)
    })
    .collect();

  let inner_area = block.inner(area);
  frame.render_widget(block, area);

  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([Constraint::Min(1), Constraint::Length(1)])
    .split(inner_area);

  frame.render_widget(List::new(items), chunks[0]);

  let total_pages = if page_data.page_size > 0 {
    page_data.total.div_ceil(page_data.page_size).max(1)
  } else {
    1
  };
  let pager = Paragraph::new(Span::styled(
    format!(
      " page {}/{} ({} analyses)  \u{2190}/\u{2192} page ",
      page_data.page, total_pages, page_data.total
    ),
    Style::default().fg(Color::DarkGray),
  ));
  frame.render_widget(pager, chunks[1]);
}
