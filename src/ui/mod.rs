mod dashboard;
mod history;
mod status;

use crate::app::{App, View};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Main draw function
pub fn draw(frame: &mut Frame, app: &App) {
  match app.view() {
    View::Dashboard => draw_dashboard(frame, app),
    View::History => draw_history_view(frame, app),
  }
}

fn draw_dashboard(frame: &mut Frame, app: &App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Length(6), // Stat tiles
      Constraint::Min(8),    // Project + issue lists
      Constraint::Length(8), // Trend charts
      Constraint::Length(1), // Status bar
    ])
    .split(frame.area());

  draw_header(frame, chunks[0], app);
  dashboard::draw_stat_tiles(frame, chunks[1], app.overview());
  dashboard::draw_lists(frame, chunks[2], app.overview());
  dashboard::draw_trends(
    frame,
    chunks[3],
    app.overview(),
    app.issue_trends(),
    app.distribution(),
  );
  status::draw_status_bar(frame, chunks[4], app);
}

fn draw_history_view(frame: &mut Frame, app: &App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(8),    // History list
      Constraint::Length(1), // Status bar
    ])
    .split(frame.area());

  draw_header(frame, chunks[0], app);
  history::draw_history(
    frame,
    chunks[1],
    app.history(),
    app.history_page(),
    app.history_page_size(),
  );
  status::draw_status_bar(frame, chunks[2], app);
}

fn draw_header(frame: &mut Frame, area: Rect, app: &App) {
  let line = Line::from(vec![
    Span::styled(" seodash ", Style::default().fg(Color::Black).bg(Color::Cyan).bold()),
    Span::raw(" "),
    Span::styled(app.title(), Style::default().fg(Color::White).bold()),
  ]);
  frame.render_widget(Paragraph::new(line), area);
}

/// Color for an SEO score on the 0-100 scale.
pub(crate) fn score_color(score: u32) -> Color {
  match score {
    90..=100 => Color::Green,
    70..=89 => Color::Yellow,
    _ => Color::Red,
  }
}
