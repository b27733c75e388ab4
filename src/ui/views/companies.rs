use crate::api::cache::scope;
use crate::api::types::{Ack, Company, NewCompany, Page};
use crate::api::ApiError;
use crate::query::{Mutation, Query, QueryState};
use crate::ui::components::{
  ConfirmDialog, Form, FormEvent, KeyResult, SearchEvent, SearchInput, TextInput,
};
use crate::ui::renderfns::{ensure_valid_selection, format_timestamp, status_color, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction, ViewContext};
use crate::ui::views::CompanyDetailView;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

/// Pending delete: the dialog plus the company it is about
struct PendingDelete {
  id: String,
  dialog: ConfirmDialog,
}

/// List of tracked companies with add, delete, and scan
pub struct CompaniesView {
  ctx: ViewContext,
  query: Query<Vec<Company>>,
  list_state: ListState,
  search: SearchInput,
  add_form: Option<Form>,
  confirm: Option<PendingDelete>,
  create: Mutation<Company>,
  delete: Mutation<String>,
  scan: Mutation<Ack>,
  notice: Option<String>,
}

impl CompaniesView {
  pub fn new(ctx: ViewContext) -> Self {
    let page = Page {
      skip: 0,
      limit: ctx.page_size,
    };
    let client = ctx.client.clone();
    let mut query = Query::new(move || {
      let client = client.clone();
      async move { client.companies(page).await }
    });

    query.fetch();
    ctx.store.set_companies_loading(true);

    // Come back to the company opened last
    let mut list_state = ListState::default();
    if let Some(selected) = ctx.store.selected_company() {
      let position = ctx
        .store
        .filtered_companies("")
        .iter()
        .position(|c| c.id == selected.id);
      list_state.select(position);
    }

    Self {
      ctx,
      query,
      list_state,
      search: SearchInput::new(),
      add_form: None,
      confirm: None,
      create: Mutation::new(),
      delete: Mutation::new(),
      scan: Mutation::new(),
      notice: None,
    }
  }

  /// Rows after the search filter
  fn visible(&self) -> Vec<Company> {
    self.ctx.store.filtered_companies(self.search.query())
  }

  fn selected(&self) -> Option<Company> {
    let idx = self.list_state.selected()?;
    self.visible().into_iter().nth(idx)
  }

  fn refresh(&mut self) {
    self.ctx.client.cache().invalidate_scope(scope::COMPANIES);
    self.ctx.store.set_companies_loading(true);
    self.query.refetch();
  }

  fn open_add_form(&mut self) {
    self.add_form = Some(
      Form::new("Add company")
        .field("Name", TextInput::new())
        .field("URL", TextInput::new())
        .optional("Industry", TextInput::new()),
    );
  }

  fn submit_new_company(&mut self, values: Vec<String>) {
    let [name, url, industry] = values.as_slice() else {
      return;
    };
    let body = NewCompany::new(name.clone(), url.clone()).with_industry(industry.clone());

    // Validate up front so the form can show the problem
    if let Err(e) = body.clone().validated() {
      if let Some(form) = self.add_form.as_mut() {
        form.set_error(Some(e.to_string()));
      }
      return;
    }

    let client = self.ctx.client.clone();
    if self
      .create
      .start(async move { client.create_company(body).await })
    {
      self.add_form = None;
      self.notice = Some(format!("Adding {}...", name));
    }
  }

  fn confirm_delete(&mut self) {
    if let Some(company) = self.selected() {
      self.confirm = Some(PendingDelete {
        dialog: ConfirmDialog::new(
          "Delete company",
          format!(
            "Stop tracking {} and delete its history?",
            company.name
          ),
        ),
        id: company.id,
      });
    }
  }

  fn start_delete(&mut self, id: String) {
    let client = self.ctx.client.clone();
    let started = self.delete.start(async move {
      client.delete_company(&id).await?;
      Ok::<_, ApiError>(id)
    });
    self.notice = Some(if started {
      "Deleting...".to_string()
    } else {
      "Delete already in progress".to_string()
    });
  }

  fn start_scan(&mut self) {
    let Some(company) = self.selected() else {
      return;
    };
    let client = self.ctx.client.clone();
    let id = company.id;
    self.notice = Some(
      if self
        .scan
        .start(async move { client.scan_company(&id).await })
      {
        format!("Scanning {}...", company.name)
      } else {
        "Scan already in progress".to_string()
      },
    );
  }

  fn poll_mutations(&mut self) {
    if let Some(result) = self.create.poll() {
      self.notice = Some(match result {
        Ok(company) => {
          let message = format!("Added {}", company.name);
          self.ctx.store.add_company(company);
          message
        }
        Err(e) => format!("Add failed: {}", e),
      });
    }

    if let Some(result) = self.delete.poll() {
      self.notice = Some(match result {
        Ok(id) => {
          self.ctx.store.remove_company(&id);
          "Company deleted".to_string()
        }
        Err(e) => format!("Delete failed: {}", e),
      });
    }

    if let Some(result) = self.scan.poll() {
      self.notice = Some(match result {
        Ok(ack) => {
          // Status and scan times changed server side
          self.query.refetch();
          ack.message.unwrap_or_else(|| "Scan triggered".to_string())
        }
        Err(e) => format!("Scan failed: {}", e),
      });
    }
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let companies = self.visible();
    ensure_valid_selection(&mut self.list_state, companies.len());

    let filter = if self.search.is_filtering() {
      format!(" /{}", self.search.query())
    } else {
      String::new()
    };
    let title = match self.query.state() {
      QueryState::Error(e) => format!(" Companies{} (error: {}) ", filter, e),
      _ if self.ctx.store.companies_loading() => format!(" Companies{} (loading...) ", filter),
      _ => format!(" Companies{} ({}) ", filter, companies.len()),
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if companies.is_empty() && !self.query.is_loading() {
      let content = if self.query.is_error() {
        "Failed to load companies. Press 'r' to retry."
      } else if self.search.is_filtering() {
        "No companies match the filter."
      } else {
        "No companies tracked yet. Press 'a' to add one."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = companies
      .iter()
      .map(|company| {
        ListItem::new(Line::from(vec![
          Span::styled(
            format!("{:<24}", truncate(&company.name, 24)),
            Style::default().fg(Color::Cyan),
          ),
          Span::raw(" "),
          Span::styled(
            format!("{:<9}", company.status.as_str()),
            Style::default().fg(status_color(&company.status)),
          ),
          Span::raw(" "),
          Span::styled(
            format!("{:<16}", format_timestamp(company.last_scanned)),
            Style::default().fg(Color::DarkGray),
          ),
          Span::raw(" "),
          Span::raw(truncate(&company.url, 40)),
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

impl View for CompaniesView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if let Some(pending) = self.confirm.as_mut() {
      if let KeyResult::Event(confirmed) = pending.dialog.handle_key(key) {
        if let Some(pending) = self.confirm.take() {
          if confirmed {
            self.start_delete(pending.id);
          }
        }
      }
      return ViewAction::None;
    }

    if let Some(form) = self.add_form.as_mut() {
      match form.handle_key(key) {
        KeyResult::Event(FormEvent::Submitted(values)) => self.submit_new_company(values),
        KeyResult::Event(FormEvent::Cancelled) => self.add_form = None,
        KeyResult::Handled | KeyResult::NotHandled => {}
      }
      return ViewAction::None;
    }

    match self.search.handle_key(key) {
      KeyResult::Event(SearchEvent::Changed(_)) => {
        self.list_state.select(Some(0));
        return ViewAction::None;
      }
      KeyResult::Event(SearchEvent::Submitted) | KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('r') => self.refresh(),
      KeyCode::Char('a') => self.open_add_form(),
      KeyCode::Char('d') | KeyCode::Delete => self.confirm_delete(),
      KeyCode::Char('s') => self.start_scan(),
      KeyCode::Enter => {
        if let Some(company) = self.selected() {
          self.ctx.store.select_company(Some(company.id.clone()));
          return ViewAction::Push(Box::new(CompanyDetailView::new(
            company,
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
      .constraints([Constraint::Min(3), Constraint::Length(1)])
      .split(area);

    self.render_list(frame, chunks[0]);

    let notice = self.notice.as_deref().unwrap_or("");
    frame.render_widget(
      Paragraph::new(format!(" {}", notice)).style(Style::default().fg(Color::Yellow)),
      chunks[1],
    );

    let matches = self.visible().len();
    self.search.render_overlay(frame, chunks[0], matches);
    if let Some(form) = &self.add_form {
      form.render_overlay(frame, area);
    }
    if let Some(pending) = &self.confirm {
      pending.dialog.render_overlay(frame, area);
    }
  }

  fn breadcrumb_label(&self) -> String {
    "Companies".to_string()
  }

  fn tick(&mut self) -> ViewAction {
    if self.query.poll() {
      match self.query.data() {
        Some(companies) => self.ctx.store.set_companies(companies.clone()),
        None => self.ctx.store.set_companies_loading(false),
      }
    }
    self.poll_mutations();
    ViewAction::None
  }

  fn captures_input(&self) -> bool {
    self.search.is_active() || self.add_form.is_some() || self.confirm.is_some()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("/", "search").with_priority(10),
      ShortcutInfo::new("a", "add").with_priority(20),
      ShortcutInfo::new("d", "delete").with_priority(30),
      ShortcutInfo::new("s", "scan").with_priority(40),
      ShortcutInfo::new("r", "refresh").with_priority(50),
      ShortcutInfo::new("q", "back").with_priority(60),
    ]
  }
}
