use crate::api::types::{AnalysisHistoryPage, DistributionSlice, TrendPoint};
use crate::api::ApiClient;
use crate::cache::{QueryCache, QueryHandle};
use crate::config::Config;
use crate::event::{Event, EventHandler};
use crate::overview::DashboardOverview;
use crate::queries::Dashboard;
use crate::ui;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// How long a status-bar notice stays visible.
const NOTICE_TTL: Duration = Duration::from_secs(5);

/// Rows per analysis-history page.
const HISTORY_PAGE_SIZE: u32 = 20;

/// Which screen is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
  Dashboard,
  History,
}

/// Main application state
pub struct App {
  /// Application configuration
  config: Config,

  /// Query surface over the backend API and the shared cache
  dashboard: Dashboard,

  /// Composed dashboard view state
  overview: DashboardOverview,

  /// Secondary charts, subscribed independently of the overview
  issue_trends: QueryHandle<Vec<TrendPoint>>,
  distribution: QueryHandle<Vec<DistributionSlice>>,

  /// Current screen
  view: View,

  /// Analysis history, re-subscribed per page (each page is its own
  /// cache entry)
  history: QueryHandle<AnalysisHistoryPage>,
  history_page: u32,

  /// Transient status-bar message
  notice: Option<(String, Instant)>,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  pub fn new(config: Config) -> Result<Self> {
    let api = ApiClient::new(&config)?;
    let dashboard = Dashboard::new(api, QueryCache::new());

    let trend_days = config.dashboard.trend_days;
    let overview = dashboard.overview(trend_days);
    let issue_trends = dashboard.issue_trends(trend_days);
    let distribution = dashboard.project_distribution();
    let history = dashboard.analysis_history(1, HISTORY_PAGE_SIZE);

    Ok(Self {
      config,
      dashboard,
      overview,
      issue_trends,
      distribution,
      view: View::Dashboard,
      history,
      history_page: 1,
      notice: None,
      should_quit: false,
    })
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut events = EventHandler::new(Duration::from_millis(250));

    // Warm the cache while the first frame paints
    let dashboard = self.dashboard.clone();
    tokio::spawn(async move { dashboard.prefetch_all().await });

    let result = self.event_loop(&mut terminal, &mut events).await;

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop(
    &mut self,
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    events: &mut EventHandler,
  ) -> Result<()> {
    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      let Some(event) = events.next().await else {
        break;
      };

      match event {
        Event::Key(key) => self.on_key(key, events.sender()),
        Event::Tick => self.on_tick(),
        Event::Resize => {}
        Event::Notice(text) => self.notice = Some((text, Instant::now())),
      }
    }
    Ok(())
  }

  fn on_key(&mut self, key: KeyEvent, tx: mpsc::UnboundedSender<Event>) {
    match (key.code, key.modifiers) {
      (KeyCode::Char('q'), _) | (KeyCode::Char('c'), KeyModifiers::CONTROL) => {
        self.should_quit = true;
      }
      (KeyCode::Char('h'), _) => {
        self.view = match self.view {
          View::Dashboard => View::History,
          View::History => View::Dashboard,
        };
      }
      (KeyCode::Right, _) if self.view == View::History => {
        self.set_history_page(self.history_page + 1);
      }
      (KeyCode::Left, _) if self.view == View::History => {
        self.set_history_page(self.history_page.saturating_sub(1).max(1));
      }
      (KeyCode::Char('r'), _) => {
        self.overview.refetch();
        self.issue_trends.refetch();
        self.distribution.refetch();
        self.history.refetch();
        self.set_notice("refreshing dashboard");
      }
      (KeyCode::Char('i'), _) => {
        // The only flow that actively notifies on failure; everything else
        // renders its error inline.
        let dashboard = self.dashboard.clone();
        tokio::spawn(async move {
          let message = match dashboard.invalidate_cache().await {
            Ok(()) => "dashboard cache invalidated".to_string(),
            Err(err) => format!("invalidation failed: {}", err),
          };
          let _ = tx.send(Event::Notice(message));
        });
        self.set_notice("invalidating cache...");
      }
      (KeyCode::Char('p'), _) => {
        let dashboard = self.dashboard.clone();
        tokio::spawn(async move { dashboard.prefetch_all().await });
        self.set_notice("prefetching dashboard data");
      }
      _ => {}
    }
  }

  fn on_tick(&mut self) {
    self.overview.poll();
    self.issue_trends.poll();
    self.distribution.poll();
    self.history.poll();

    // Reads that outlived their stale window refresh in the background
    // while the old data stays on screen.
    self.overview.ensure_fresh();
    self.issue_trends.ensure();
    self.distribution.ensure();
    self.history.ensure();

    if let Some((_, shown_at)) = &self.notice {
      if shown_at.elapsed() > NOTICE_TTL {
        self.notice = None;
      }
    }
  }

  /// Re-subscribe to the requested history page. The old page's entry
  /// loses its subscriber and ages out through the retention window.
  fn set_history_page(&mut self, page: u32) {
    if page == self.history_page {
      return;
    }
    self.history_page = page;
    self.history = self.dashboard.analysis_history(page, HISTORY_PAGE_SIZE);
  }

  fn set_notice(&mut self, text: &str) {
    self.notice = Some((text.to_string(), Instant::now()));
  }

  pub fn title(&self) -> String {
    self.config.display_title()
  }

  pub fn overview(&self) -> &DashboardOverview {
    &self.overview
  }

  pub fn issue_trends(&self) -> &QueryHandle<Vec<TrendPoint>> {
    &self.issue_trends
  }

  pub fn distribution(&self) -> &QueryHandle<Vec<DistributionSlice>> {
    &self.distribution
  }

  pub fn view(&self) -> View {
    self.view
  }

  pub fn history(&self) -> &QueryHandle<AnalysisHistoryPage> {
    &self.history
  }

  pub fn history_page(&self) -> u32 {
    self.history_page
  }

  pub fn history_page_size(&self) -> u32 {
    HISTORY_PAGE_SIZE
  }

  pub fn notice(&self) -> Option<&str> {
    self.notice.as_ref().map(|(text, _)| text.as_str())
  }
}
