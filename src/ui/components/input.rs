use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Result of handling a key event in an input component
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputResult {
  /// Key was handled, continue input mode
  Consumed,
  /// Enter pressed, here's the submitted value
  Submitted(String),
  /// Escape pressed, input cancelled
  Cancelled,
  /// Key not handled, pass to next handler
  NotHandled,
}

/// Single-line text input.
///
/// The cursor counts characters, not bytes, so emails and company names with
/// non-ASCII letters edit correctly.
#[derive(Debug, Clone, Default)]
pub struct TextInput {
  buffer: String,
  cursor: usize,
  masked: bool,
}

impl TextInput {
  pub fn new() -> Self {
    Self::default()
  }

  /// An input whose contents render as bullets
  pub fn masked() -> Self {
    Self {
      masked: true,
      ..Self::default()
    }
  }

  pub fn with_value(mut self, value: impl Into<String>) -> Self {
    self.set_value(value);
    self
  }

  pub fn value(&self) -> &str {
    &self.buffer
  }

  pub fn set_value(&mut self, value: impl Into<String>) {
    self.buffer = value.into();
    self.cursor = self.len();
  }

  pub fn is_empty(&self) -> bool {
    self.buffer.is_empty()
  }

  pub fn clear(&mut self) {
    self.buffer.clear();
    self.cursor = 0;
  }

  /// Text to draw: the value, or bullets for masked inputs
  pub fn display(&self) -> String {
    if self.masked {
      "•".repeat(self.len())
    } else {
      self.buffer.clone()
    }
  }

  /// Cursor position in characters
  #[cfg(test)]
  pub fn cursor_position(&self) -> usize {
    self.cursor
  }

  fn len(&self) -> usize {
    self.buffer.chars().count()
  }

  fn byte_index(&self, char_idx: usize) -> usize {
    self
      .buffer
      .char_indices()
      .nth(char_idx)
      .map(|(i, _)| i)
      .unwrap_or(self.buffer.len())
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> InputResult {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
      KeyCode::Esc => InputResult::Cancelled,
      KeyCode::Enter => InputResult::Submitted(self.buffer.clone()),
      KeyCode::Backspace => {
        if self.cursor > 0 {
          self.cursor -= 1;
          let at = self.byte_index(self.cursor);
          self.buffer.remove(at);
        }
        InputResult::Consumed
      }
      KeyCode::Delete => {
        if self.cursor < self.len() {
          let at = self.byte_index(self.cursor);
          self.buffer.remove(at);
        }
        InputResult::Consumed
      }
      KeyCode::Left => {
        self.cursor = self.cursor.saturating_sub(1);
        InputResult::Consumed
      }
      KeyCode::Right => {
        self.cursor = (self.cursor + 1).min(self.len());
        InputResult::Consumed
      }
      KeyCode::Home => {
        self.cursor = 0;
        InputResult::Consumed
      }
      KeyCode::End => {
        self.cursor = self.len();
        InputResult::Consumed
      }
      KeyCode::Char('a') if ctrl => {
        self.cursor = 0;
        InputResult::Consumed
      }
      KeyCode::Char('e') if ctrl => {
        self.cursor = self.len();
        InputResult::Consumed
      }
      KeyCode::Char('u') if ctrl => {
        let at = self.byte_index(self.cursor);
        self.buffer.drain(..at);
        self.cursor = 0;
        InputResult::Consumed
      }
      KeyCode::Char('w') if ctrl => {
        if self.cursor > 0 {
          let end = self.byte_index(self.cursor);
          let start = self.buffer[..end]
            .trim_end()
            .rfind(' ')
            .map(|i| i + 1)
            .unwrap_or(0);
          self.cursor -= self.buffer[start..end].chars().count();
          self.buffer.drain(start..end);
        }
        InputResult::Consumed
      }
      // Other control chords belong to the parent
      KeyCode::Char(_) if ctrl => InputResult::NotHandled,
      KeyCode::Char(c) => {
        let at = self.byte_index(self.cursor);
        self.buffer.insert(at, c);
        self.cursor += 1;
        InputResult::Consumed
      }
      _ => InputResult::NotHandled,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn ctrl_key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::CONTROL)
  }

  fn type_str(input: &mut TextInput, s: &str) {
    for c in s.chars() {
      input.handle_key(key(KeyCode::Char(c)));
    }
  }

  #[test]
  fn test_submit() {
    let mut input = TextInput::new();
    type_str(&mut input, "acme.com");
    let result = input.handle_key(key(KeyCode::Enter));
    assert_eq!(result, InputResult::Submitted("acme.com".to_string()));
  }

  #[test]
  fn test_cancel() {
    let mut input = TextInput::new();
    type_str(&mut input, "x");
    assert_eq!(input.handle_key(key(KeyCode::Esc)), InputResult::Cancelled);
  }

  #[test]
  fn test_multibyte_editing() {
    let mut input = TextInput::new();
    type_str(&mut input, "Zürich");
    input.handle_key(key(KeyCode::Left));
    input.handle_key(key(KeyCode::Left));
    input.handle_key(key(KeyCode::Left));
    input.handle_key(key(KeyCode::Left));
    input.handle_key(key(KeyCode::Backspace));
    assert_eq!(input.value(), "Zrich");
    input.handle_key(key(KeyCode::Char('ü')));
    assert_eq!(input.value(), "Zürich");
    assert_eq!(input.cursor_position(), 2);
  }

  #[test]
  fn test_ctrl_u_clear_before_cursor() {
    let mut input = TextInput::new();
    type_str(&mut input, "hello world");
    for _ in 0..5 {
      input.handle_key(key(KeyCode::Left));
    }
    input.handle_key(ctrl_key(KeyCode::Char('u')));
    assert_eq!(input.value(), "world");
  }

  #[test]
  fn test_ctrl_w_deletes_word() {
    let mut input = TextInput::new().with_value("Acme Corp");
    input.handle_key(ctrl_key(KeyCode::Char('w')));
    assert_eq!(input.value(), "Acme ");
    assert_eq!(input.cursor_position(), 5);
  }

  #[test]
  fn test_unknown_ctrl_chord_is_not_typed() {
    let mut input = TextInput::new();
    assert_eq!(
      input.handle_key(ctrl_key(KeyCode::Char('r'))),
      InputResult::NotHandled
    );
    assert!(input.is_empty());
  }

  #[test]
  fn test_masked_display() {
    let input = TextInput::masked().with_value("hunter2");
    assert_eq!(input.value(), "hunter2");
    assert_eq!(input.display(), "•••••••");
  }
}
