use crate::api::{CachedTrackerClient, Redirect, TokenSlot};
use crate::commands::Command;
use crate::config::Config;
use crate::db::Database;
use crate::event::{Event, EventHandler};
use crate::store::Store;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::renderfns::{draw_footer, draw_header};
use crate::ui::view::{View, ViewAction, ViewContext};
use crate::ui::views::{ChangesView, CompaniesView, DashboardView, LoginView, SettingsView};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::TryRecvError};

/// Main application state
pub struct App {
  ctx: ViewContext,
  /// Header title
  title: String,
  /// Navigation stack; root is at index 0
  view_stack: Vec<Box<dyn View>>,
  command: CommandInput,
  redirects: broadcast::Receiver<Redirect>,
  /// One-line message in the footer
  notice: Option<String>,
  should_quit: bool,
}

impl App {
  pub fn new(config: Config) -> Result<Self> {
    let db = Database::open()?;
    let token = TokenSlot::new(db)?;
    let client = CachedTrackerClient::from_config(&config, token)?;

    let ctx = ViewContext {
      client,
      store: Store::new(),
      page_size: config.companies.page_size,
      email: config.api.email.clone(),
      password: Config::get_password(),
    };

    Ok(Self::with_context(ctx, config.display_title()))
  }

  pub fn with_context(ctx: ViewContext, title: String) -> Self {
    let redirects = ctx.client.api().subscribe_redirects();

    let root: Box<dyn View> = if ctx.client.has_session_token() {
      Box::new(LoginView::resuming(ctx.clone()))
    } else {
      Box::new(LoginView::new(ctx.clone()))
    };

    Self {
      ctx,
      title,
      view_stack: vec![root],
      command: CommandInput::new(),
      redirects,
      notice: None,
      should_quit: false,
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;

    let result = self.event_loop().await;

    // Restore the terminal even if the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop(&mut self) -> Result<()> {
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    let mut events = EventHandler::new(Duration::from_millis(100));

    while !self.should_quit {
      terminal.draw(|frame| self.draw(frame))?;

      match events.next().await {
        Some(Event::Key(key)) => self.handle_key(key),
        Some(Event::Tick) => self.tick(),
        Some(Event::Resize) => {}
        None => break,
      }
    }

    Ok(())
  }

  fn draw(&mut self, frame: &mut Frame) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(1), // Header
        Constraint::Min(1),    // View
        Constraint::Length(1), // Footer
      ])
      .split(frame.area());

    let user = self.ctx.store.user();
    let shortcuts = self
      .view_stack
      .last()
      .map(|v| v.shortcuts())
      .unwrap_or_default();
    draw_header(frame, chunks[0], &self.title, user.as_ref(), &shortcuts);

    if let Some(view) = self.view_stack.last_mut() {
      view.render(frame, chunks[1]);
    }
    self.command.render_overlay(frame, chunks[1]);

    draw_footer(frame, chunks[2], &self.breadcrumb(), self.notice.as_deref());
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    let view_captures = self
      .view_stack
      .last()
      .is_some_and(|v| v.captures_input());

    if self.command.is_active() || !view_captures {
      match self.command.handle_key(key) {
        KeyResult::Event(CommandEvent::Submitted(cmd)) => {
          self.execute_command(cmd);
          return;
        }
        KeyResult::Event(CommandEvent::Unknown(input)) => {
          self.notice = Some(format!("Unknown command: {}", input));
          return;
        }
        KeyResult::Event(CommandEvent::Cancelled) | KeyResult::Handled => return,
        KeyResult::NotHandled => {}
      }
    }

    self.notice = None;
    if let Some(view) = self.view_stack.last_mut() {
      let action = view.handle_key(key);
      self.apply(action);
    }
  }

  fn apply(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => self.view_stack.push(view),
      ViewAction::Pop => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        } else if self.ctx.store.is_authenticated() {
          self.should_quit = true;
        }
      }
      ViewAction::Replace(view) => self.view_stack = vec![view],
    }
  }

  fn execute_command(&mut self, cmd: &Command) {
    if !cmd.anonymous && !self.ctx.store.is_authenticated() {
      self.notice = Some("Log in first".to_string());
      return;
    }

    let ctx = self.ctx.clone();
    match cmd.name {
      "dashboard" => self.view_stack = vec![Box::new(DashboardView::new(ctx))],
      "companies" => self.view_stack = vec![Box::new(CompaniesView::new(ctx))],
      "changes" => self.view_stack = vec![Box::new(ChangesView::new(ctx))],
      "settings" => self.view_stack = vec![Box::new(SettingsView::new(ctx))],
      "logout" => self.logout(false),
      "quit" => self.should_quit = true,
      other => tracing::warn!(command = other, "command has no handler"),
    }
  }

  /// Drop the session everywhere and go back to the login form
  fn logout(&mut self, expired: bool) {
    self.ctx.client.logout();
    self.ctx.store.logout();
    let login = if expired {
      LoginView::expired(self.ctx.clone())
    } else {
      LoginView::new(self.ctx.clone())
    };
    self.view_stack = vec![Box::new(login)];
  }

  fn tick(&mut self) {
    // Every view polls so background writes finish; only the top one navigates
    let top = self.view_stack.len().saturating_sub(1);
    let mut action = ViewAction::None;
    for (i, view) in self.view_stack.iter_mut().enumerate() {
      let requested = view.tick();
      if i == top {
        action = requested;
      }
    }
    self.apply(action);

    self.handle_redirects();
  }

  fn handle_redirects(&mut self) {
    let mut redirected = false;
    loop {
      match self.redirects.try_recv() {
        // Only one kind of redirect exists, so a lag still means "go to login"
        Ok(Redirect::Login) | Err(TryRecvError::Lagged(_)) => redirected = true,
        Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
      }
    }

    // A failed login is reported by the login form itself
    if redirected && self.ctx.store.is_authenticated() {
      tracing::warn!("session rejected by server, returning to login");
      self.logout(true);
    }
  }

  pub fn breadcrumb(&self) -> Vec<String> {
    self
      .view_stack
      .iter()
      .map(|v| v.breadcrumb_label())
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::UserProfile;
  use crate::commands::COMMANDS;
  use crate::store::SessionState;
  use wiremock::matchers::{method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  async fn setup() -> (MockServer, App) {
    let server = MockServer::start().await;
    let ctx = ViewContext::for_server(&server.uri());
    (server, App::with_context(ctx, "test".into()))
  }

  fn command(name: &str) -> &'static Command {
    COMMANDS.iter().find(|c| c.name == name).unwrap()
  }

  fn ann() -> UserProfile {
    UserProfile {
      id: "u1".into(),
      email: "ann@acme.com".into(),
      name: "Ann".into(),
      plan: "free".into(),
    }
  }

  #[tokio::test]
  async fn test_starts_at_login() {
    let (_server, app) = setup().await;
    assert_eq!(app.breadcrumb(), vec!["Login".to_string()]);
  }

  #[tokio::test]
  async fn test_commands_need_a_session() {
    let (_server, mut app) = setup().await;
    app.execute_command(command("companies"));
    assert_eq!(app.breadcrumb(), vec!["Login".to_string()]);
    assert_eq!(app.notice.as_deref(), Some("Log in first"));

    app.execute_command(command("quit"));
    assert!(app.should_quit);
  }

  #[tokio::test]
  async fn test_commands_switch_root_view() {
    let (_server, mut app) = setup().await;
    app.ctx.store.login(ann());

    app.execute_command(command("companies"));
    assert_eq!(app.breadcrumb(), vec!["Companies".to_string()]);
    app.execute_command(command("changes"));
    assert_eq!(app.breadcrumb(), vec!["Changes".to_string()]);
    app.execute_command(command("settings"));
    assert_eq!(app.breadcrumb(), vec!["Settings".to_string()]);
  }

  #[tokio::test]
  async fn test_401_while_logged_in_returns_to_login() {
    let (server, mut app) = setup().await;
    Mock::given(method("GET"))
      .and(path("/users/stats"))
      .respond_with(ResponseTemplate::new(401))
      .mount(&server)
      .await;

    app.ctx.client.api().token().set("stale");
    app.ctx.store.login(ann());
    app.execute_command(command("dashboard"));

    let err = app.ctx.client.usage_stats().await.unwrap_err();
    assert!(err.is_unauthorized());

    app.tick();

    assert_eq!(app.ctx.store.session(), SessionState::Anonymous);
    assert!(!app.ctx.client.has_session_token());
    assert_eq!(app.breadcrumb(), vec!["Login".to_string()]);
  }

  #[tokio::test]
  async fn test_401_while_anonymous_is_ignored() {
    let (server, mut app) = setup().await;
    Mock::given(method("POST"))
      .and(path("/auth/token"))
      .respond_with(ResponseTemplate::new(401))
      .mount(&server)
      .await;

    assert!(app.ctx.client.login("ann@acme.com", "nope").await.is_err());
    app.tick();

    assert_eq!(app.ctx.store.session(), SessionState::Anonymous);
    assert_eq!(app.breadcrumb(), vec!["Login".to_string()]);
  }

  #[tokio::test]
  async fn test_logout_command_clears_session() {
    let (_server, mut app) = setup().await;
    app.ctx.client.api().token().set("tok");
    app.ctx.store.login(ann());
    app.execute_command(command("dashboard"));

    app.execute_command(command("logout"));

    assert!(!app.ctx.store.is_authenticated());
    assert!(!app.ctx.client.has_session_token());
    assert_eq!(app.breadcrumb(), vec!["Login".to_string()]);
  }
}
