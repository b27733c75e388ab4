use crate::api::types::UserProfile;
use crate::ui::view::ShortcutInfo;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the header bar with logo, backend, user, and the view's shortcuts
pub fn draw_header(
  frame: &mut Frame,
  area: Rect,
  title: &str,
  user: Option<&UserProfile>,
  shortcuts: &[ShortcutInfo],
) {
  let separator = Span::styled("│", Style::default().fg(Color::DarkGray));

  let mut spans = vec![
    Span::styled(" pivotwatch ", Style::default().fg(Color::Cyan).bold()),
    separator.clone(),
    Span::styled(format!(" {} ", title), Style::default().fg(Color::White)),
    separator,
  ];

  match user {
    Some(user) => {
      spans.push(Span::styled(
        format!(" {} ", user.email),
        Style::default().fg(Color::Yellow).bold(),
      ));
      spans.push(Span::styled(
        format!("[{}] ", user.plan),
        Style::default().fg(Color::DarkGray),
      ));
    }
    None => spans.push(Span::styled(
      " not logged in ",
      Style::default().fg(Color::DarkGray),
    )),
  }

  spans.push(Span::raw(" "));
  for shortcut in visible_shortcuts(shortcuts) {
    spans.push(Span::styled(
      format!("<{}>", shortcut.key),
      Style::default().fg(Color::Cyan),
    ));
    spans.push(Span::styled(
      format!(" {}   ", shortcut.label),
      Style::default().fg(Color::DarkGray),
    ));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}

fn visible_shortcuts(shortcuts: &[ShortcutInfo]) -> Vec<&ShortcutInfo> {
  let mut visible: Vec<&ShortcutInfo> = shortcuts.iter().collect();
  visible.sort_by_key(|s| s.priority);
  visible
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_visible_shortcuts_sorted_by_priority() {
    let shortcuts = [
      ShortcutInfo::new("q", "back").with_priority(30),
      ShortcutInfo::new("r", "refresh"),
      ShortcutInfo::new(":", "command").with_priority(10),
    ];
    let keys: Vec<_> = visible_shortcuts(&shortcuts).iter().map(|s| s.key).collect();
    assert_eq!(keys, vec![":", "q", "r"]);
  }
}
