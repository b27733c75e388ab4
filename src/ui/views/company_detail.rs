use crate::api::cache::TrackerQueryKey;
use crate::api::types::{Ack, Change, ChangeFilter, Company, CompanyDetail};
use crate::query::{Mutation, Query, QueryState};
use crate::ui::renderfns::{
  ensure_valid_selection, format_timestamp, significance_color, status_color, truncate,
};
use crate::ui::view::{ShortcutInfo, View, ViewAction, ViewContext};
use crate::ui::views::ChangeDetailView;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

/// One company: its fields, change totals, and its change feed
pub struct CompanyDetailView {
  ctx: ViewContext,
  company: Company,
  detail: Query<CompanyDetail>,
  changes: Query<Vec<Change>>,
  list_state: ListState,
  scan: Mutation<Ack>,
  notice: Option<String>,
}

impl CompanyDetailView {
  pub fn new(company: Company, ctx: ViewContext) -> Self {
    let client = ctx.client.clone();
    let id = company.id.clone();
    let mut detail = Query::new(move || {
      let client = client.clone();
      let id = id.clone();
      async move { client.company(&id).await }
    });

    let client = ctx.client.clone();
    let filter = ChangeFilter::for_company(company.id.clone());
    let mut changes = Query::new(move || {
      let client = client.clone();
      let filter = filter.clone();
      async move { client.changes(filter).await }
    });

    detail.fetch();
    changes.fetch();

    Self {
      ctx,
      company,
      detail,
      changes,
      list_state: ListState::default(),
      scan: Mutation::new(),
      notice: None,
    }
  }

  /// Freshest copy of the company we have
  fn company(&self) -> &Company {
    self
      .detail
      .data()
      .map(|d| &d.company)
      .unwrap_or(&self.company)
  }

  fn company_changes(&self) -> &[Change] {
    self.changes.data().map(|v| v.as_slice()).unwrap_or(&[])
  }

  fn render_fields(&self, frame: &mut Frame, area: Rect) {
    let title = match self.detail.state() {
      QueryState::Loading => format!(" {} (loading...) ", self.company.name),
      QueryState::Error(e) => format!(" {} (error: {}) ", self.company.name, e),
      _ => format!(" {} ", self.company().name),
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let company = self.company();
    let label = |s: &'static str| Span::styled(s, Style::default().fg(Color::DarkGray));

    let mut lines = vec![
      Line::from(vec![label("URL:          "), Span::raw(company.url.clone())]),
      Line::from(vec![
        label("Status:       "),
        Span::styled(
          company.status.as_str().to_string(),
          Style::default().fg(status_color(&company.status)),
        ),
      ]),
      Line::from(vec![
        label("Industry:     "),
        Span::raw(company.industry.clone().unwrap_or_else(|| "-".to_string())),
      ]),
      Line::from(vec![
        label("Last scanned: "),
        Span::raw(format_timestamp(company.last_scanned)),
        label("   Next scan: "),
        Span::raw(format_timestamp(company.next_scan)),
      ]),
    ];

    if let Some(detail) = self.detail.data() {
      lines.push(Line::from(vec![
        label("Changes:      "),
        Span::styled(
          detail.total_changes.to_string(),
          Style::default().fg(Color::Yellow).bold(),
        ),
        label("   Last change: "),
        Span::raw(format_timestamp(detail.last_change)),
      ]));
    }

    if let Some(notes) = &company.notes {
      lines.push(Line::from(vec![label("Notes:        "), Span::raw(notes.clone())]));
    }

    if let Some(notice) = &self.notice {
      lines.push(Line::styled(notice.clone(), Style::default().fg(Color::Yellow)));
    }

    frame.render_widget(Paragraph::new(lines).block(block), area);
  }

  fn render_changes(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.company_changes().len();
    ensure_valid_selection(&mut self.list_state, len);

    let title = match self.changes.state() {
      QueryState::Loading => " Changes (loading...) ".to_string(),
      QueryState::Error(e) => format!(" Changes (error: {}) ", e),
      _ => format!(" Changes ({}) ", len),
    };
    let block = Block::default()
      .title(title)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if len == 0 && !self.changes.is_loading() {
      let paragraph = Paragraph::new("No changes recorded for this company.")
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = self
      .company_changes()
      .iter()
      .map(|change| {
        ListItem::new(Line::from(vec![
          Span::styled(
            format!("{:>4}% ", change.significance_score),
            Style::default().fg(significance_color(change.significance())),
          ),
          Span::styled(
            format!("{:<16} ", format_timestamp(change.detected_at)),
            Style::default().fg(Color::DarkGray),
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
      .highlight_style(Style::default().bg(Color::DarkGray))
      .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut self.list_state);
  }
}

impl View for CompanyDetailView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('r') => {
        let cache = self.ctx.client.cache();
        cache.invalidate(&TrackerQueryKey::Company {
          id: self.company.id.clone(),
        });
        cache.invalidate(&TrackerQueryKey::Changes {
          filter: ChangeFilter::for_company(self.company.id.clone()),
        });
        self.detail.refetch();
        self.changes.refetch();
      }
      KeyCode::Char('s') => {
        let client = self.ctx.client.clone();
        let id = self.company.id.clone();
        if self.scan.start(async move { client.scan_company(&id).await }) {
          self.notice = Some("Scanning...".to_string());
        }
      }
      KeyCode::Enter => {
        if let Some(change) = self
          .list_state
          .selected()
          .and_then(|i| self.company_changes().get(i))
        {
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
      .constraints([Constraint::Length(9), Constraint::Min(3)])
      .split(area);

    self.render_fields(frame, chunks[0]);
    self.render_changes(frame, chunks[1]);
  }

  fn breadcrumb_label(&self) -> String {
    self.company.name.clone()
  }

  fn tick(&mut self) -> ViewAction {
    self.detail.poll();
    self.changes.poll();

    if let Some(result) = self.scan.poll() {
      match result {
        Ok(ack) => {
          self.notice = Some(ack.message.unwrap_or_else(|| "Scan triggered".to_string()));
          // The scan invalidated this company's entry
          self.detail.refetch();
        }
        Err(e) => self.notice = Some(format!("Scan failed: {}", e)),
      }
    }
    ViewAction::None
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("s", "scan"),
      ShortcutInfo::new("enter", "open change"),
      ShortcutInfo::new("r", "refresh"),
      ShortcutInfo::new("q", "back"),
    ]
  }
}
