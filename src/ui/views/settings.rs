use crate::api::types::{ProfileUpdate, UserProfile};
use crate::query::Mutation;
use crate::ui::components::{Form, FormEvent, KeyResult, TextInput};
use crate::ui::view::{ShortcutInfo, View, ViewAction, ViewContext};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

/// Account details with an edit form for name and email
pub struct SettingsView {
  ctx: ViewContext,
  edit_form: Option<Form>,
  save: Mutation<UserProfile>,
  notice: Option<String>,
}

impl SettingsView {
  pub fn new(ctx: ViewContext) -> Self {
    Self {
      ctx,
      edit_form: None,
      save: Mutation::new(),
      notice: None,
    }
  }

  fn open_edit_form(&mut self) {
    let Some(user) = self.ctx.store.user() else {
      return;
    };
    self.edit_form = Some(
      Form::new("Edit profile")
        .field("Name", TextInput::new().with_value(user.name))
        .field("Email", TextInput::new().with_value(user.email)),
    );
  }

  fn submit(&mut self, values: Vec<String>) {
    let [name, email] = values.as_slice() else {
      return;
    };
    let Some(user) = self.ctx.store.user() else {
      return;
    };

    let update = ProfileUpdate::diff(&user, name, email);
    if update.is_empty() {
      self.edit_form = None;
      self.notice = Some("Nothing to change".to_string());
      return;
    }
    let update = match update.validated() {
      Ok(update) => update,
      Err(e) => {
        if let Some(form) = self.edit_form.as_mut() {
          form.set_error(Some(e.to_string()));
        }
        return;
      }
    };

    let client = self.ctx.client.clone();
    if self
      .save
      .start(async move { client.update_profile(update).await })
    {
      self.notice = Some("Saving...".to_string());
    }
  }

  fn render_profile(&self, frame: &mut Frame, area: Rect) {
    let block = Block::default()
      .title(" Settings ")
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let dim = Style::default().fg(Color::DarkGray);
    let lines = match self.ctx.store.user() {
      Some(user) => vec![
        Line::from(vec![Span::styled("Name:   ", dim), Span::raw(user.name)]),
        Line::from(vec![Span::styled("Email:  ", dim), Span::raw(user.email)]),
        Line::from(vec![
          Span::styled("Plan:   ", dim),
          Span::styled(user.plan, Style::default().fg(Color::Magenta)),
        ]),
        Line::raw(""),
        Line::styled("Press 'e' to edit your name or email.", dim),
      ],
      None => vec![Line::styled("Not logged in.", dim)],
    };

    frame.render_widget(Paragraph::new(lines).block(block), area);
  }
}

impl View for SettingsView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if let Some(form) = self.edit_form.as_mut() {
      match form.handle_key(key) {
        KeyResult::Event(FormEvent::Submitted(values)) => self.submit(values),
        KeyResult::Event(FormEvent::Cancelled) => self.edit_form = None,
        KeyResult::Handled | KeyResult::NotHandled => {}
      }
      return ViewAction::None;
    }

    match key.code {
      KeyCode::Char('e') => self.open_edit_form(),
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

    self.render_profile(frame, chunks[0]);

    let notice = self.notice.as_deref().unwrap_or("");
    frame.render_widget(
      Paragraph::new(format!(" {}", notice)).style(Style::default().fg(Color::Yellow)),
      chunks[1],
    );

    if let Some(form) = &self.edit_form {
      form.render_overlay(frame, area);
    }
  }

  fn breadcrumb_label(&self) -> String {
    "Settings".to_string()
  }

  fn tick(&mut self) -> ViewAction {
    if let Some(result) = self.save.poll() {
      match result {
        Ok(profile) => {
          self.ctx.store.set_user(profile);
          self.edit_form = None;
          self.notice = Some("Profile updated".to_string());
        }
        Err(e) => {
          tracing::warn!(error = %e, "profile update failed");
          self.notice = None;
          match self.edit_form.as_mut() {
            Some(form) => form.set_error(Some(e.to_string())),
            None => self.notice = Some(format!("Update failed: {}", e)),
          }
        }
      }
    }
    ViewAction::None
  }

  fn captures_input(&self) -> bool {
    self.edit_form.is_some()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("e", "edit").with_priority(10),
      ShortcutInfo::new(":", "command").with_priority(20),
      ShortcutInfo::new("q", "back").with_priority(30),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyModifiers;
  use serde_json::json;
  use std::time::Duration;
  use wiremock::matchers::{body_json, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn ann() -> UserProfile {
    UserProfile {
      id: "u1".into(),
      email: "ann@acme.com".into(),
      name: "Ann".into(),
      plan: "pro".into(),
    }
  }

  fn press(view: &mut SettingsView, code: KeyCode) {
    view.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
  }

  fn type_str(view: &mut SettingsView, s: &str) {
    for c in s.chars() {
      press(view, KeyCode::Char(c));
    }
  }

  async fn setup() -> (MockServer, ViewContext, SettingsView) {
    let server = MockServer::start().await;
    let ctx = ViewContext::for_server(&server.uri());
    ctx.store.login(ann());
    let view = SettingsView::new(ctx.clone());
    (server, ctx, view)
  }

  #[tokio::test]
  async fn test_rename_updates_session_profile() {
    let (server, ctx, mut view) = setup().await;
    Mock::given(method("PUT"))
      .and(path("/users/me"))
      .and(body_json(json!({"name": "Annie"})))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "id": "u1", "email": "ann@acme.com", "name": "Annie", "plan": "pro"
      })))
      .expect(1)
      .mount(&server)
      .await;

    press(&mut view, KeyCode::Char('e'));
    assert!(view.captures_input());
    type_str(&mut view, "ie");
    press(&mut view, KeyCode::Enter);
    press(&mut view, KeyCode::Enter);
    assert!(view.save.is_pending());

    for _ in 0..200 {
      view.tick();
      if !view.save.is_pending() {
        break;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(ctx.store.user().map(|u| u.name), Some("Annie".to_string()));
    assert!(view.edit_form.is_none());
    assert_eq!(view.notice.as_deref(), Some("Profile updated"));
  }

  #[tokio::test]
  async fn test_unchanged_form_sends_nothing() {
    let (server, ctx, mut view) = setup().await;
    Mock::given(method("PUT"))
      .and(path("/users/me"))
      .respond_with(ResponseTemplate::new(200))
      .expect(0)
      .mount(&server)
      .await;

    press(&mut view, KeyCode::Char('e'));
    press(&mut view, KeyCode::Enter);
    press(&mut view, KeyCode::Enter);

    assert!(!view.save.is_pending());
    assert_eq!(view.notice.as_deref(), Some("Nothing to change"));
    assert_eq!(ctx.store.user(), Some(ann()));
  }

  #[tokio::test]
  async fn test_invalid_email_stays_in_form() {
    let (_server, _ctx, mut view) = setup().await;

    press(&mut view, KeyCode::Char('e'));
    press(&mut view, KeyCode::Tab);
    for _ in 0.."@acme.com".len() {
      press(&mut view, KeyCode::Backspace);
    }
    press(&mut view, KeyCode::Enter);

    assert!(!view.save.is_pending());
    assert_eq!(
      view.edit_form.as_ref().and_then(|f| f.error()),
      Some("invalid input: ann is not an email address")
    );
  }
}
