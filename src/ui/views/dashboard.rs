use std::collections::BTreeSet;

use crate::api::cache::scope;
use crate::api::types::{Change, ChangeFilter, Company, Page, Significance, UsageStats};
use crate::query::{Query, QueryState};
use crate::ui::renderfns::{ensure_valid_selection, significance_color, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction, ViewContext};
use crate::ui::views::ChangeDetailView;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

const RECENT_CHANGES: u32 = 10;

/// Headline numbers for the dashboard tiles
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardStats {
  pub tracked_companies: usize,
  pub recent_changes: usize,
  pub high_significance: usize,
  pub categories: usize,
}

impl DashboardStats {
  pub fn compute(companies: &[Company], changes: &[Change]) -> Self {
    Self {
      tracked_companies: companies.len(),
      recent_changes: changes.len(),
      high_significance: changes
        .iter()
        .filter(|c| c.significance() == Significance::High)
        .count(),
      categories: changes
        .iter()
        .map(|c| c.category.as_str())
        .collect::<BTreeSet<_>>()
        .len(),
    }
  }
}

/// Landing view after login
pub struct DashboardView {
  ctx: ViewContext,
  companies: Query<Vec<Company>>,
  changes: Query<Vec<Change>>,
  usage: Query<UsageStats>,
  list_state: ListState,
}

impl DashboardView {
  pub fn new(ctx: ViewContext) -> Self {
    let page = Page {
      skip: 0,
      limit: ctx.page_size,
    };

    let client = ctx.client.clone();
    let mut companies = Query::new(move || {
      let client = client.clone();
      async move { client.companies(page).await }
    });

    let client = ctx.client.clone();
    let mut changes = Query::new(move || {
      let client = client.clone();
      async move { client.changes(ChangeFilter::recent(RECENT_CHANGES)).await }
    });

    let client = ctx.client.clone();
    let mut usage = Query::new(move || {
      let client = client.clone();
      async move { client.usage_stats().await }
    });

    companies.fetch();
    changes.fetch();
    usage.fetch();

    Self {
      ctx,
      companies,
      changes,
      usage,
      list_state: ListState::default(),
    }
  }

  fn recent(&self) -> &[Change] {
    self.changes.data().map(|v| v.as_slice()).unwrap_or(&[])
  }

  fn stats(&self) -> DashboardStats {
    let companies = self.companies.data().map(|v| v.as_slice()).unwrap_or(&[]);
    DashboardStats::compute(companies, self.recent())
  }

  fn refresh(&mut self) {
    let cache = self.ctx.client.cache();
    cache.invalidate_scope(scope::COMPANIES);
    cache.invalidate_scope(scope::CHANGES);
    cache.invalidate_scope(scope::USAGE_STATS);
    self.companies.refetch();
    self.changes.refetch();
    self.usage.refetch();
  }

  fn render_tiles(&self, frame: &mut Frame, area: Rect) {
    let stats = self.stats();
    let tiles = [
      ("Tracked Companies", stats.tracked_companies, Color::Blue),
      ("Recent Changes", stats.recent_changes, Color::Green),
      ("High Significance", stats.high_significance, Color::Yellow),
      ("Categories", stats.categories, Color::Magenta),
    ];

    let chunks = Layout::default()
      .direction(Direction::Horizontal)
      .constraints([Constraint::Ratio(1, 4); 4])
      .split(area);

    for ((label, value, color), chunk) in tiles.iter().zip(chunks.iter()) {
      let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(*color));
      let text = vec![
        Line::styled(*label, Style::default().fg(Color::DarkGray)),
        Line::styled(value.to_string(), Style::default().fg(Color::White).bold()),
      ];
      frame.render_widget(Paragraph::new(text).block(block), *chunk);
    }
  }

  fn render_usage(&self, frame: &mut Frame, area: Rect) {
    let line = match self.usage.state() {
      QueryState::Success(usage) => {
        let mut spans = vec![Span::styled(" Usage: ", Style::default().fg(Color::DarkGray))];
        if let Some(plan) = &usage.plan {
          spans.push(Span::styled(
            format!("{} plan  ", plan),
            Style::default().fg(Color::Yellow),
          ));
        }
        spans.push(Span::raw(format!(
          "{} companies tracked  {} changes detected",
          usage.companies_tracked, usage.changes_detected
        )));
        for (name, value) in &usage.extra {
          spans.push(Span::styled(
            format!("  {}: {}", name.replace('_', " "), value),
            Style::default().fg(Color::DarkGray),
          ));
        }
        Line::from(spans)
      }
      QueryState::Error(e) => Line::styled(
        format!(" Usage unavailable: {}", e),
        Style::default().fg(Color::Red),
      ),
      _ => Line::styled(" Loading usage...", Style::default().fg(Color::DarkGray)),
    };
    frame.render_widget(Paragraph::new(line), area);
  }

  fn render_recent(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.recent().len();
    ensure_valid_selection(&mut self.list_state, len);

    let title = match self.changes.state() {
      QueryState::Loading => " Recent Changes (loading...) ".to_string(),
      QueryState::Error(e) => format!(" Recent Changes (error: {}) ", e),
      _ => format!(" Recent Changes ({}) ", len),
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if len == 0 && !self.changes.is_loading() {
      let content = if self.changes.is_error() {
        "Failed to load changes. Press 'r' to retry."
      } else {
        "No changes detected yet."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = self
      .recent()
      .iter()
      .map(|change| {
        let color = significance_color(change.significance());
        ListItem::new(Line::from(vec![
          Span::styled(
            format!("{:>4}% ", change.significance_score),
            Style::default().fg(color).bold(),
          ),
          Span::styled(
            format!("{:<20}", truncate(&change.company_name, 20)),
            Style::default().fg(Color::Cyan),
          ),
          Span::raw(" "),
          Span::raw(truncate(&change.summary, 70)),
        ]))
      })
      .collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut self.list_state);
  }
}

impl View for DashboardView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('r') => self.refresh(),
      KeyCode::Enter => {
        if let Some(change) = self.list_state.selected().and_then(|i| self.recent().get(i)) {
          return ViewAction::Push(Box::new(ChangeDetailView::new(
            change.id.clone(),
            self.ctx.clone(),
          )));
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(4), // Tiles
        Constraint::Length(1), // Usage
        Constraint::Min(3),    // Recent changes
      ])
      .split(area);

    self.render_tiles(frame, chunks[0]);
    self.render_usage(frame, chunks[1]);
    self.render_recent(frame, chunks[2]);
  }

  fn breadcrumb_label(&self) -> String {
    "Dashboard".to_string()
  }

  fn tick(&mut self) -> ViewAction {
    if self.companies.poll() {
      if let Some(companies) = self.companies.data() {
        self.ctx.store.set_companies(companies.clone());
      }
    }
    self.changes.poll();
    self.usage.poll();
    ViewAction::None
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("enter", "open change").with_priority(20),
      ShortcutInfo::new("r", "refresh").with_priority(30),
    ]
  }
}
