use crate::api::cache::scope;
use crate::api::types::{Change, ChangeFilter};
use crate::query::{Query, QueryState};
use crate::ui::renderfns::{ensure_valid_selection, format_timestamp, significance_color, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction, ViewContext};
use crate::ui::views::ChangeDetailView;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

const SIGNIFICANCE_STEP: u8 = 10;
const FEED_LIMIT: u32 = 50;

/// Change feed across all companies, filtered by minimum significance
pub struct ChangesView {
  ctx: ViewContext,
  filter: ChangeFilter,
  query: Query<Vec<Change>>,
  list_state: ListState,
}

impl ChangesView {
  pub fn new(ctx: ViewContext) -> Self {
    let filter = ChangeFilter::recent(FEED_LIMIT);
    let query = Self::build_query(&ctx, filter.clone());
    Self {
      ctx,
      filter,
      query,
      list_state: ListState::default(),
    }
  }

  fn build_query(ctx: &ViewContext, filter: ChangeFilter) -> Query<Vec<Change>> {
    let client = ctx.client.clone();
    let mut query = Query::new(move || {
      let client = client.clone();
      let filter = filter.clone();
      async move { client.changes(filter).await }
    });
    query.fetch();
    query
  }

  fn set_min_significance(&mut self, min: u8) {
    let min = min.min(100);
    if min == self.filter.min_significance {
      return;
    }
    self.filter.min_significance = min;
    self.query = Self::build_query(&self.ctx, self.filter.clone());
    self.list_state.select(Some(0));
  }

  fn changes(&self) -> &[Change] {
    self.query.data().map(|v| v.as_slice()).unwrap_or(&[])
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.changes().len();
    ensure_valid_selection(&mut self.list_state, len);

    let min = self.filter.min_significance;
    let title = match self.query.state() {
      QueryState::Loading => format!(" Changes [>= {}%] (loading...) ", min),
      QueryState::Error(e) => format!(" Changes [>= {}%] (error: {}) ", min, e),
      _ => format!(" Changes [>= {}%] ({}) ", min, len),
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if len == 0 && !self.query.is_loading() {
      let content = if self.query.is_error() {
        "Failed to load changes. Press 'r' to retry."
      } else {
        "No changes at this significance. Press '-' to lower the threshold."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = self
      .changes()
      .iter()
      .map(|change| {
        ListItem::new(Line::from(vec![
          Span::styled(
            format!("{:>4}% ", change.significance_score),
            Style::default().fg(significance_color(change.significance())).bold(),
          ),
          Span::styled(
            format!("{:<16} ", format_timestamp(change.detected_at)),
            Style::default().fg(Color::DarkGray),
          ),
          Span::styled(
            format!("{:<20} ", truncate(&change.company_name, 20)),
            Style::default().fg(Color::Cyan),
          ),
          Span::styled(
            format!("{:<12} ", truncate(&change.category, 12)),
            Style::default().fg(Color::Magenta),
          ),
          Span::raw(truncate(&change.summary, 60)),
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

impl View for ChangesView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('+') | KeyCode::Char('=') => {
        let min = self.filter.min_significance.saturating_add(SIGNIFICANCE_STEP);
        self.set_min_significance(min);
      }
      KeyCode::Char('-') => {
        let min = self.filter.min_significance.saturating_sub(SIGNIFICANCE_STEP);
        self.set_min_significance(min);
      }
      KeyCode::Char('r') => {
        self.ctx.client.cache().invalidate_scope(scope::CHANGES);
        self.query.refetch();
      }
      KeyCode::Enter => {
        if let Some(change) = self.list_state.selected().and_then(|i| self.changes().get(i)) {
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
    self.render_list(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Changes".to_string()
  }

  fn tick(&mut self) -> ViewAction {
    self.query.poll();
    ViewAction::None
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("+/-", "min significance").with_priority(10),
      ShortcutInfo::new("enter", "open").with_priority(20),
      ShortcutInfo::new("r", "refresh").with_priority(30),
      ShortcutInfo::new("q", "back").with_priority(40),
    ]
  }
}
