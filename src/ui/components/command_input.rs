use super::input::{InputResult, TextInput};
use super::KeyResult;
use crate::commands::{self, Command};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};

const MAX_SUGGESTIONS: usize = 8;

/// Events emitted by command input that parent needs to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandEvent {
  /// A known command was chosen
  Submitted(&'static Command),
  /// Enter on input that matches nothing
  Unknown(String),
  Cancelled,
}

/// `:` palette with autocomplete
#[derive(Debug, Clone, Default)]
pub struct CommandInput {
  input: TextInput,
  active: bool,
  selected_suggestion: usize,
}

impl CommandInput {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  pub fn activate(&mut self) {
    self.active = true;
    self.input.clear();
    self.selected_suggestion = 0;
  }

  fn close(&mut self) {
    self.active = false;
    self.input.clear();
    self.selected_suggestion = 0;
  }

  pub fn suggestions(&self) -> Vec<&'static Command> {
    commands::get_suggestions(self.input.value())
  }

  /// Call this regardless of active state; it handles activation too
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<CommandEvent> {
    if !self.active {
      if key.code == KeyCode::Char(':') {
        self.activate();
        return KeyResult::Handled;
      }
      return KeyResult::NotHandled;
    }

    match key.code {
      KeyCode::Esc => {
        self.close();
        return KeyResult::Event(CommandEvent::Cancelled);
      }
      KeyCode::Enter => {
        let event = self.resolve_command();
        self.close();
        return KeyResult::Event(event);
      }
      KeyCode::Tab | KeyCode::Down => {
        let count = self.suggestions().len().min(MAX_SUGGESTIONS);
        if count > 0 {
          self.selected_suggestion = (self.selected_suggestion + 1) % count;
        }
        return KeyResult::Handled;
      }
      KeyCode::BackTab | KeyCode::Up => {
        let count = self.suggestions().len().min(MAX_SUGGESTIONS);
        if count > 0 {
          self.selected_suggestion = self.selected_suggestion.checked_sub(1).unwrap_or(count - 1);
        }
        return KeyResult::Handled;
      }
      _ => {}
    }

    match self.input.handle_key(key) {
      InputResult::Consumed => {
        self.selected_suggestion = 0;
        KeyResult::Handled
      }
      InputResult::Submitted(_) | InputResult::Cancelled | InputResult::NotHandled => {
        KeyResult::Handled
      }
    }
  }

  fn resolve_command(&self) -> CommandEvent {
    match self.suggestions().get(self.selected_suggestion).copied() {
      Some(cmd) => CommandEvent::Submitted(cmd),
      None => CommandEvent::Unknown(self.input.value().trim().to_lowercase()),
    }
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.active {
      return;
    }

    let suggestions = self.suggestions();
    let shown = suggestions.len().min(MAX_SUGGESTIONS) as u16;

    let width = (area.width * 60 / 100).clamp(30, 60).min(area.width);
    let height = (3 + shown).min(area.height);
    let overlay_area = Rect::new(area.x + 1, area.y + 1, width, height);

    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(" Command ");

    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);

    if inner.height == 0 {
      return;
    }

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Length(1), Constraint::Min(0)])
      .split(inner);

    let input_line = Line::from(vec![
      Span::styled(":", Style::default().fg(Color::Yellow)),
      Span::raw(self.input.value()),
      Span::styled("_", Style::default().fg(Color::Yellow)),
    ]);
    frame.render_widget(Paragraph::new(input_line), chunks[0]);

    if shown == 0 || chunks[1].height == 0 {
      return;
    }

    let items: Vec<ListItem> = suggestions
      .iter()
      .take(MAX_SUGGESTIONS)
      .map(|cmd| {
        ListItem::new(Line::from(vec![
          Span::styled(format!("{:<12}", cmd.name), Style::default().fg(Color::Cyan)),
          Span::styled(
            format!("{:<8}", cmd.aliases.first().copied().unwrap_or("")),
            Style::default().fg(Color::Blue),
          ),
          Span::styled(cmd.description, Style::default().fg(Color::DarkGray)),
        ]))
      })
      .collect();

    let list =
      List::new(items).highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White));

    let mut state = ListState::default();
    state.select(Some(self.selected_suggestion));
    frame.render_stateful_widget(list, chunks[1], &mut state);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyModifiers;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn submit(text: &str) -> KeyResult<CommandEvent> {
    let mut cmd = CommandInput::new();
    cmd.handle_key(key(KeyCode::Char(':')));
    for c in text.chars() {
      cmd.handle_key(key(KeyCode::Char(c)));
    }
    cmd.handle_key(key(KeyCode::Enter))
  }

  #[test]
  fn test_prefix_resolves_to_command() {
    match submit("comp") {
      KeyResult::Event(CommandEvent::Submitted(cmd)) => assert_eq!(cmd.name, "companies"),
      other => panic!("unexpected {:?}", other),
    }
  }

  #[test]
  fn test_unknown_command() {
    assert_eq!(
      submit("zzz"),
      KeyResult::Event(CommandEvent::Unknown("zzz".into()))
    );
  }

  #[test]
  fn test_closes_after_submit() {
    let mut cmd = CommandInput::new();
    cmd.handle_key(key(KeyCode::Char(':')));
    assert!(cmd.is_active());
    cmd.handle_key(key(KeyCode::Esc));
    assert!(!cmd.is_active());
  }
}
