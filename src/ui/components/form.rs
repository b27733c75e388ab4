use super::input::{InputResult, TextInput};
use super::KeyResult;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

/// Events emitted by a form that the parent needs to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
  /// Enter pressed on the last field; values in field order
  Submitted(Vec<String>),
  Cancelled,
}

#[derive(Debug, Clone)]
struct Field {
  label: &'static str,
  input: TextInput,
  required: bool,
}

/// Stack of labelled inputs with Tab/Shift-Tab focus.
#[derive(Debug, Clone)]
pub struct Form {
  title: &'static str,
  fields: Vec<Field>,
  focused: usize,
  error: Option<String>,
}

impl Form {
  pub fn new(title: &'static str) -> Self {
    Self {
      title,
      fields: Vec::new(),
      focused: 0,
      error: None,
    }
  }

  pub fn field(mut self, label: &'static str, input: TextInput) -> Self {
    self.fields.push(Field {
      label,
      input,
      required: true,
    });
    self
  }

  pub fn optional(mut self, label: &'static str, input: TextInput) -> Self {
    self.fields.push(Field {
      label,
      input,
      required: false,
    });
    self
  }

  /// Put focus on the first empty required field
  pub fn focus_first_empty(mut self) -> Self {
    self.focused = self
      .fields
      .iter()
      .position(|f| f.required && f.input.is_empty())
      .unwrap_or(0);
    self
  }

  pub fn values(&self) -> Vec<String> {
    self
      .fields
      .iter()
      .map(|f| f.input.value().trim().to_string())
      .collect()
  }

  pub fn set_error(&mut self, error: Option<String>) {
    self.error = error;
  }

  #[cfg(test)]
  pub fn error(&self) -> Option<&str> {
    self.error.as_deref()
  }

  #[cfg(test)]
  pub fn focused(&self) -> usize {
    self.focused
  }

  fn focus_next(&mut self) {
    if !self.fields.is_empty() {
      self.focused = (self.focused + 1) % self.fields.len();
    }
  }

  fn focus_prev(&mut self) {
    if !self.fields.is_empty() {
      self.focused = self
        .focused
        .checked_sub(1)
        .unwrap_or(self.fields.len() - 1);
    }
  }

  fn missing_field(&self) -> Option<&'static str> {
    self
      .fields
      .iter()
      .find(|f| f.required && f.input.value().trim().is_empty())
      .map(|f| f.label)
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<FormEvent> {
    match key.code {
      KeyCode::Tab | KeyCode::Down => {
        self.focus_next();
        return KeyResult::Handled;
      }
      KeyCode::BackTab | KeyCode::Up => {
        self.focus_prev();
        return KeyResult::Handled;
      }
      _ => {}
    }

    let Some(field) = self.fields.get_mut(self.focused) else {
      return KeyResult::NotHandled;
    };

    match field.input.handle_key(key) {
      InputResult::Consumed => {
        self.error = None;
        KeyResult::Handled
      }
      InputResult::Cancelled => KeyResult::Event(FormEvent::Cancelled),
      InputResult::Submitted(_) => {
        if self.focused + 1 < self.fields.len() {
          self.focus_next();
          return KeyResult::Handled;
        }
        if let Some(label) = self.missing_field() {
          self.error = Some(format!("{} is required", label));
          return KeyResult::Handled;
        }
        KeyResult::Event(FormEvent::Submitted(self.values()))
      }
      InputResult::NotHandled => KeyResult::NotHandled,
    }
  }

  /// Draw the form inside `area` without a surrounding block
  pub fn render_fields(&self, frame: &mut Frame, area: Rect) {
    let label_width = self
      .fields
      .iter()
      .map(|f| f.label.len())
      .max()
      .unwrap_or(0)
      + 2;

    let mut lines: Vec<Line> = Vec::new();
    for (i, field) in self.fields.iter().enumerate() {
      let focused = i == self.focused;
      let label_style = if focused {
        Style::default().fg(Color::Yellow).bold()
      } else {
        Style::default().fg(Color::DarkGray)
      };
      let mut spans = vec![
        Span::styled(format!("{:<width$}", field.label, width = label_width), label_style),
        Span::raw(field.input.display()),
      ];
      if focused {
        spans.push(Span::styled("_", Style::default().fg(Color::Yellow)));
      }
      lines.push(Line::from(spans));
      lines.push(Line::raw(""));
    }

    if let Some(error) = &self.error {
      lines.push(Line::styled(error.clone(), Style::default().fg(Color::Red)));
    }

    frame.render_widget(Paragraph::new(lines), area);
  }

  /// Draw the form as a bordered overlay
  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    let height = (self.fields.len() as u16) * 2 + 3;
    let width = (area.width * 60 / 100).clamp(30, 70).min(area.width);
    let overlay_area = Rect::new(
      area.x + area.width.saturating_sub(width) / 2,
      area.y + area.height.saturating_sub(height) / 3,
      width,
      height.min(area.height),
    );

    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(format!(" {} ", self.title));
    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);

    self.render_fields(frame, inner);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyModifiers;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn type_str(form: &mut Form, s: &str) {
    for c in s.chars() {
      form.handle_key(key(KeyCode::Char(c)));
    }
  }

  fn company_form() -> Form {
    Form::new("Add company")
      .field("Name", TextInput::new())
      .field("URL", TextInput::new())
      .optional("Industry", TextInput::new())
  }

  #[test]
  fn test_enter_advances_then_submits() {
    let mut form = company_form();
    type_str(&mut form, "Acme");
    assert_eq!(form.handle_key(key(KeyCode::Enter)), KeyResult::Handled);
    type_str(&mut form, "acme.com");
    form.handle_key(key(KeyCode::Enter));

    assert_eq!(
      form.handle_key(key(KeyCode::Enter)),
      KeyResult::Event(FormEvent::Submitted(vec![
        "Acme".to_string(),
        "acme.com".to_string(),
        String::new(),
      ]))
    );
  }

  #[test]
  fn test_missing_required_field_blocks_submit() {
    let mut form = company_form();
    type_str(&mut form, "Acme");
    form.handle_key(key(KeyCode::Tab));
    form.handle_key(key(KeyCode::Tab));

    assert_eq!(form.handle_key(key(KeyCode::Enter)), KeyResult::Handled);
    assert_eq!(form.error(), Some("URL is required"));
  }

  #[test]
  fn test_backtab_wraps() {
    let mut form = company_form();
    form.handle_key(key(KeyCode::BackTab));
    assert_eq!(form.focused(), 2);
  }

  #[test]
  fn test_focus_first_empty_skips_prefilled() {
    let form = Form::new("Log in")
      .field("Email", TextInput::new().with_value("ann@acme.com"))
      .field("Password", TextInput::masked())
      .focus_first_empty();
    assert_eq!(form.focused(), 1);
  }

  #[test]
  fn test_escape_cancels() {
    let mut form = company_form();
    assert_eq!(
      form.handle_key(key(KeyCode::Esc)),
      KeyResult::Event(FormEvent::Cancelled)
    );
  }
}
