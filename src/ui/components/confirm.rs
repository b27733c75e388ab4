use super::KeyResult;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

/// Yes/no prompt guarding a destructive action.
///
/// Emits `true` on `y`, `false` on `n` or Esc. Every other key is swallowed
/// so nothing behind the dialog reacts while it is open.
#[derive(Debug, Clone)]
pub struct ConfirmDialog {
  title: String,
  message: String,
}

impl ConfirmDialog {
  pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      title: title.into(),
      message: message.into(),
    }
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<bool> {
    match key.code {
      KeyCode::Char('y') | KeyCode::Char('Y') => KeyResult::Event(true),
      KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => KeyResult::Event(false),
      _ => KeyResult::Handled,
    }
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    let width = (area.width * 50 / 100).clamp(30, 60).min(area.width);
    let height = 6.min(area.height);
    let overlay_area = Rect::new(
      area.x + area.width.saturating_sub(width) / 2,
      area.y + area.height.saturating_sub(height) / 2,
      width,
      height,
    );

    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Red))
      .title(format!(" {} ", self.title));

    let text = vec![
      Line::raw(self.message.clone()),
      Line::raw(""),
      Line::from(vec![
        Span::styled("<y>", Style::default().fg(Color::Cyan)),
        Span::styled(" confirm   ", Style::default().fg(Color::DarkGray)),
        Span::styled("<n>", Style::default().fg(Color::Cyan)),
        Span::styled(" cancel", Style::default().fg(Color::DarkGray)),
      ]),
    ];

    let paragraph = Paragraph::new(text)
      .block(block)
      .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, overlay_area);
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
  fn test_answers() {
    let mut dialog = ConfirmDialog::new("Delete", "Delete Acme?");
    assert_eq!(dialog.handle_key(key(KeyCode::Char('y'))), KeyResult::Event(true));
    assert_eq!(dialog.handle_key(key(KeyCode::Char('n'))), KeyResult::Event(false));
    assert_eq!(dialog.handle_key(key(KeyCode::Esc)), KeyResult::Event(false));
  }

  #[test]
  fn test_other_keys_are_swallowed() {
    let mut dialog = ConfirmDialog::new("Delete", "Delete Acme?");
    assert_eq!(dialog.handle_key(key(KeyCode::Char('d'))), KeyResult::Handled);
    assert_eq!(dialog.handle_key(key(KeyCode::Enter)), KeyResult::Handled);
  }
}
