//! Bottom status bar: notices, freshness, key hints.

use chrono::Utc;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::app::App;

pub fn draw_status_bar(frame: &mut Frame, area: Rect, app: &App) {
  let mut spans = vec![Span::raw(" ")];

  if let Some(notice) = app.notice() {
    spans.push(Span::styled(
      notice.to_string(),
      Style::default().fg(Color::Black).bg(Color::Yellow),
    ));
    spans.push(Span::raw("  "));
  } else if app.overview().is_error() {
    let err = app
      .overview()
      .error()
      .map(|e| e.to_string())
      .unwrap_or_default();
    spans.push(Span::styled(err, Style::default().fg(Color::White).bg(Color::Red)));
    spans.push(Span::raw("  "));
  }

  spans.push(Span::styled(freshness(app), Style::default().fg(Color::DarkGray)));

  let hints = " h history  r refresh  i invalidate  p prefetch  q quit ";
  let hint_width = hints.len() as u16;
  let left = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(left, area);

  if area.width > hint_width {
    let right = Rect {
      x: area.x + area.width - hint_width,
      width: hint_width,
      ..area
    };
    frame.render_widget(
      Paragraph::new(Span::styled(hints, Style::default().fg(Color::DarkGray))),
      right,
    );
  }
}

fn freshness(app: &App) -> String {
  let overview = app.overview();
  match overview.last_updated() {
    Some(at) => {
      let seconds = (Utc::now() - at).num_seconds().max(0);
      let age = if seconds < 60 {
        format!("{}s", seconds)
      } else {
        format!("{}m", seconds / 60)
      };
      let marker = if overview.is_fetching() {
        " (refreshing)"
      } else if overview.is_stale() {
        " (stale)"
      } else {
        ""
      };
      format!("updated {} ago{}", age, marker)
    }
    None if overview.is_loading() => "loading...".to_string(),
    None => "no data".to_string(),
  }
}
