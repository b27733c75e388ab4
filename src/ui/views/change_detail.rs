use crate::api::cache::TrackerQueryKey;
use crate::api::types::ChangeDetail;
use crate::api::CachedTrackerClient;
use crate::query::{Query, QueryState};
use crate::ui::renderfns::{format_timestamp, significance_color};
use crate::ui::view::{ShortcutInfo, View, ViewAction, ViewContext};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

/// View for displaying one change with its analysis and raw diff data
pub struct ChangeDetailView {
  client: CachedTrackerClient,
  id: String,
  query: Query<ChangeDetail>,
  scroll: u16,
}

impl ChangeDetailView {
  pub fn new(id: String, ctx: ViewContext) -> Self {
    let change_id = id.clone();
    let client = ctx.client.clone();
    let mut query = Query::new(move || {
      let client = client.clone();
      let id = change_id.clone();
      async move { client.change(&id).await }
    });

    query.fetch();

    Self {
      client: ctx.client,
      id,
      query,
      scroll: 0,
    }
  }

  fn render_detail(&self, frame: &mut Frame, area: Rect) {
    let title = match self.query.state() {
      QueryState::Loading => format!(" Change {} (loading...) ", self.id),
      QueryState::Error(e) => format!(" Change {} (error: {}) ", self.id, e),
      _ => format!(" Change {} ", self.id),
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    if self.query.is_loading() {
      let paragraph =
        Paragraph::new("Loading change details...").style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, inner);
      return;
    }

    if let Some(error) = self.query.error() {
      let paragraph = Paragraph::new(format!("Error: {}\n\nPress 'r' to retry.", error))
        .style(Style::default().fg(Color::Red));
      frame.render_widget(paragraph, inner);
      return;
    }

    let Some(detail) = self.query.data() else {
      return;
    };
    let change = &detail.change;

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(4), // Header
        Constraint::Length(1), // Separator
        Constraint::Min(1),    // Analysis and data
      ])
      .split(inner);

    let dim = Style::default().fg(Color::DarkGray);
    let header = vec![
      Line::from(vec![
        Span::styled("Company:  ", dim),
        Span::styled(change.company_name.clone(), Style::default().fg(Color::Cyan)),
        Span::styled("   Detected: ", dim),
        Span::raw(format_timestamp(change.detected_at)),
      ]),
      Line::from(vec![
        Span::styled("Score:    ", dim),
        Span::styled(
          format!("{}%", change.significance_score),
          Style::default()
            .fg(significance_color(change.significance()))
            .bold(),
        ),
        Span::styled("   Category: ", dim),
        Span::styled(change.category.clone(), Style::default().fg(Color::Magenta)),
      ]),
      Line::from(vec![Span::styled("Summary:  ", dim), Span::raw(change.summary.clone())]),
    ];
    frame.render_widget(Paragraph::new(header), chunks[0]);

    let sep = Paragraph::new("─".repeat(chunks[1].width as usize)).style(dim);
    frame.render_widget(sep, chunks[1]);

    let mut body: Vec<Line> = Vec::new();
    let analysis = if detail.analysis.trim().is_empty() {
      "No analysis available."
    } else {
      detail.analysis.as_str()
    };
    body.extend(analysis.lines().map(|l| Line::raw(l.to_string())));

    if detail
      .change_data
      .as_object()
      .is_some_and(|data| !data.is_empty())
    {
      body.push(Line::raw(""));
      body.push(Line::styled("Change data", Style::default().fg(Color::Yellow)));
      let pretty = serde_json::to_string_pretty(&detail.change_data).unwrap_or_default();
      body.extend(pretty.lines().map(|l| Line::styled(l.to_string(), dim)));
    }

    let paragraph = Paragraph::new(body)
      .wrap(Wrap { trim: false })
      .scroll((self.scroll, 0));
    frame.render_widget(paragraph, chunks[2]);
  }
}

impl View for ChangeDetailView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.scroll = self.scroll.saturating_add(1),
      KeyCode::Char('k') | KeyCode::Up => self.scroll = self.scroll.saturating_sub(1),
      KeyCode::Char('r') => {
        self.client.cache().invalidate(&TrackerQueryKey::Change {
          id: self.id.clone(),
        });
        self.query.refetch();
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_detail(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    format!("Change {}", self.id)
  }

  fn tick(&mut self) -> ViewAction {
    self.query.poll();
    ViewAction::None
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("j/k", "scroll"),
      ShortcutInfo::new("r", "refresh"),
      ShortcutInfo::new("q", "back"),
    ]
  }
}
