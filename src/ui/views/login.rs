use crate::api::types::UserProfile;
use crate::api::ApiError;
use crate::query::Mutation;
use crate::ui::components::{Form, FormEvent, KeyResult, TextInput};
use crate::ui::view::{ShortcutInfo, View, ViewAction, ViewContext};
use crate::ui::views::DashboardView;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
  Login,
  Register,
}

/// Login and registration form; the only view available without a session
pub struct LoginView {
  ctx: ViewContext,
  mode: Mode,
  form: Form,
  submit: Mutation<UserProfile>,
  /// Profile check for a token left over from the last run
  resume: Mutation<UserProfile>,
  notice: Option<String>,
}

impl LoginView {
  pub fn new(ctx: ViewContext) -> Self {
    let form = login_form(&ctx, None);
    Self {
      ctx,
      mode: Mode::Login,
      form,
      submit: Mutation::new(),
      resume: Mutation::new(),
      notice: None,
    }
  }

  /// Login view that first tries the stored token
  pub fn resuming(ctx: ViewContext) -> Self {
    let mut view = Self::new(ctx);
    let client = view.ctx.client.clone();
    view.resume.start(async move { client.profile().await });
    view
  }

  /// Login view shown after the backend rejected the token
  pub fn expired(ctx: ViewContext) -> Self {
    let mut view = Self::new(ctx);
    view.notice = Some("Session expired, please log in again".to_string());
    view
  }

  fn toggle_mode(&mut self) {
    let email = self.form.values().into_iter().next().filter(|e| !e.is_empty());
    self.mode = match self.mode {
      Mode::Login => Mode::Register,
      Mode::Register => Mode::Login,
    };
    self.form = match self.mode {
      Mode::Login => login_form(&self.ctx, email),
      Mode::Register => register_form(email),
    };
  }

  fn submit(&mut self, values: Vec<String>) {
    let client = self.ctx.client.clone();
    let started = match (self.mode, values.as_slice()) {
      (Mode::Login, [email, password]) => {
        let (email, password) = (email.clone(), password.clone());
        self
          .submit
          .start(async move { client.login(&email, &password).await })
      }
      (Mode::Register, [email, name, password]) => {
        let (email, name, password) = (email.clone(), name.clone(), password.clone());
        self
          .submit
          .start(async move { client.register(&email, &password, &name).await })
      }
      _ => false,
    };
    if started {
      self.form.set_error(None);
      self.notice = None;
    }
  }

  fn logged_in(&mut self, user: UserProfile) -> ViewAction {
    tracing::info!(user = %user.email, "session started");
    self.ctx.store.login(user);
    ViewAction::Replace(Box::new(DashboardView::new(self.ctx.clone())))
  }
}

fn login_form(ctx: &ViewContext, email: Option<String>) -> Form {
  let email = email.or_else(|| ctx.email.clone()).unwrap_or_default();
  let password = ctx.password.clone().unwrap_or_default();
  Form::new("Log in")
    .field("Email", TextInput::new().with_value(email))
    .field("Password", TextInput::masked().with_value(password))
    .focus_first_empty()
}

fn register_form(email: Option<String>) -> Form {
  Form::new("Create account")
    .field("Email", TextInput::new().with_value(email.unwrap_or_default()))
    .field("Name", TextInput::new())
    .field("Password", TextInput::masked())
    .focus_first_empty()
}

fn describe_failure(mode: Mode, error: &ApiError) -> String {
  match (mode, error) {
    (Mode::Login, ApiError::Unauthorized) => "Incorrect email or password".to_string(),
    (Mode::Register, ApiError::Status { detail, .. }) => format!("Registration failed: {}", detail),
    _ => error.to_string(),
  }
}

impl View for LoginView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if self.submit.is_pending() || self.resume.is_pending() {
      return ViewAction::None;
    }

    if key.code == KeyCode::Char('r') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.toggle_mode();
      return ViewAction::None;
    }

    match self.form.handle_key(key) {
      KeyResult::Event(FormEvent::Submitted(values)) => self.submit(values),
      // Nothing to go back to
      KeyResult::Event(FormEvent::Cancelled) => self.form.set_error(None),
      KeyResult::Handled | KeyResult::NotHandled => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let width = area.width.clamp(20, 60);
    let height = 14.min(area.height);
    let panel = Rect::new(
      area.x + area.width.saturating_sub(width) / 2,
      area.y + area.height.saturating_sub(height) / 3,
      width,
      height,
    );

    let title = match self.mode {
      Mode::Login => " Log in ",
      Mode::Register => " Create account ",
    };
    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    let inner = block.inner(panel);
    frame.render_widget(block, panel);

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(2), // Status
        Constraint::Min(1),    // Fields
        Constraint::Length(1), // Hint
      ])
      .split(inner);

    let status = if self.resume.is_pending() {
      Line::styled("Restoring session...", Style::default().fg(Color::DarkGray))
    } else if self.submit.is_pending() {
      Line::styled("Contacting server...", Style::default().fg(Color::DarkGray))
    } else if let Some(notice) = &self.notice {
      Line::styled(notice.clone(), Style::default().fg(Color::Yellow))
    } else {
      Line::raw("")
    };
    frame.render_widget(Paragraph::new(status), chunks[0]);

    self.form.render_fields(frame, chunks[1]);

    let hint = match self.mode {
      Mode::Login => "Enter: log in   Tab: next field   Ctrl-R: create account",
      Mode::Register => "Enter: register   Tab: next field   Ctrl-R: back to log in",
    };
    frame.render_widget(
      Paragraph::new(hint).style(Style::default().fg(Color::DarkGray)),
      chunks[2],
    );
  }

  fn breadcrumb_label(&self) -> String {
    match self.mode {
      Mode::Login => "Login".to_string(),
      Mode::Register => "Register".to_string(),
    }
  }

  fn tick(&mut self) -> ViewAction {
    if let Some(result) = self.resume.poll() {
      match result {
        Ok(user) => return self.logged_in(user),
        Err(e) => {
          tracing::info!(error = %e, "stored session not usable");
          if !e.is_unauthorized() {
            self.notice = Some(format!("Could not restore session: {}", e));
          }
        }
      }
    }

    if let Some(result) = self.submit.poll() {
      match result {
        Ok(user) => return self.logged_in(user),
        Err(e) => {
          tracing::warn!(error = %e, "login failed");
          self.form.set_error(Some(describe_failure(self.mode, &e)));
        }
      }
    }

    ViewAction::None
  }

  fn captures_input(&self) -> bool {
    true
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("enter", "submit").with_priority(10),
      ShortcutInfo::new("ctrl-r", "login/register").with_priority(20),
      ShortcutInfo::new("ctrl-c", "quit").with_priority(30),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_failure_messages() {
    assert_eq!(
      describe_failure(Mode::Login, &ApiError::Unauthorized),
      "Incorrect email or password"
    );
    let taken = ApiError::Status {
      status: reqwest::StatusCode::BAD_REQUEST,
      detail: "Email already registered".into(),
    };
    assert_eq!(
      describe_failure(Mode::Register, &taken),
      "Registration failed: Email already registered"
    );
  }
}
