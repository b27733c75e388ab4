use super::input::{InputResult, TextInput};
use super::KeyResult;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

/// Events emitted by search input that parent needs to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
  /// Query changed (each keystroke; empty string on cancel)
  Changed(String),
  /// Overlay closed, filter stays applied
  Submitted,
}

/// `/`-activated filter box. The query outlives the overlay so a list can
/// stay filtered after Enter; Esc clears it.
#[derive(Debug, Clone, Default)]
pub struct SearchInput {
  input: TextInput,
  active: bool,
}

impl SearchInput {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  pub fn query(&self) -> &str {
    self.input.value()
  }

  /// Whether a filter is applied, open or not
  pub fn is_filtering(&self) -> bool {
    !self.input.value().trim().is_empty()
  }

  pub fn activate(&mut self) {
    self.active = true;
    self.input.clear();
  }

  pub fn clear(&mut self) {
    self.active = false;
    self.input.clear();
  }

  /// Call this regardless of active state; it handles activation too
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<SearchEvent> {
    if !self.active {
      return match key.code {
        KeyCode::Char('/') => {
          self.activate();
          KeyResult::Handled
        }
        // Esc outside the overlay drops a lingering filter first
        KeyCode::Esc if self.is_filtering() => {
          self.input.clear();
          KeyResult::Event(SearchEvent::Changed(String::new()))
        }
        _ => KeyResult::NotHandled,
      };
    }

    match self.input.handle_key(key) {
      InputResult::Submitted(_) => {
        self.active = false;
        KeyResult::Event(SearchEvent::Submitted)
      }
      InputResult::Cancelled => {
        self.clear();
        KeyResult::Event(SearchEvent::Changed(String::new()))
      }
      InputResult::Consumed => {
        KeyResult::Event(SearchEvent::Changed(self.input.value().to_string()))
      }
      // Keep stray keys out of the list while typing
      InputResult::NotHandled => KeyResult::Handled,
    }
  }

  /// Render the search overlay if active
  pub fn render_overlay(&self, frame: &mut Frame, area: Rect, matches: usize) {
    if !self.active {
      return;
    }

    let width = (area.width * 60 / 100).clamp(30, 60).min(area.width);
    let overlay_area = Rect::new(area.x + 1, area.y + 1, width, 3.min(area.height));

    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(" Search ")
      .title_bottom(Line::from(format!(" {} matches ", matches)).right_aligned());

    let input_line = Line::from(vec![
      Span::styled("/", Style::default().fg(Color::Yellow)),
      Span::raw(self.input.value()),
      Span::styled("_", Style::default().fg(Color::Yellow)),
    ]);
    frame.render_widget(Paragraph::new(input_line).block(block), overlay_area);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyModifiers;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  #[test]
  fn test_slash_activates() {
    let mut search = SearchInput::new();
    assert_eq!(search.handle_key(key(KeyCode::Char('j'))), KeyResult::NotHandled);
    assert_eq!(search.handle_key(key(KeyCode::Char('/'))), KeyResult::Handled);
    assert!(search.is_active());
  }

  #[test]
  fn test_filter_survives_submit_and_esc_clears_it() {
    let mut search = SearchInput::new();
    search.handle_key(key(KeyCode::Char('/')));
    assert_eq!(
      search.handle_key(key(KeyCode::Char('a'))),
      KeyResult::Event(SearchEvent::Changed("a".into()))
    );
    assert_eq!(
      search.handle_key(key(KeyCode::Enter)),
      KeyResult::Event(SearchEvent::Submitted)
    );
    assert!(!search.is_active());
    assert_eq!(search.query(), "a");

    assert_eq!(
      search.handle_key(key(KeyCode::Esc)),
      KeyResult::Event(SearchEvent::Changed(String::new()))
    );
    assert!(!search.is_filtering());
    assert_eq!(search.handle_key(key(KeyCode::Esc)), KeyResult::NotHandled);
  }
}
