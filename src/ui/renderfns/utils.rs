use chrono::{DateTime, Local, Utc};
use ratatui::prelude::Color;
use ratatui::widgets::ListState;

use crate::api::types::{CompanyStatus, Significance};

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Display color for a company's tracking status
pub fn status_color(status: &CompanyStatus) -> Color {
  match status {
    CompanyStatus::Active => Color::Green,
    CompanyStatus::Inactive => Color::DarkGray,
    CompanyStatus::Other(_) => Color::Yellow,
  }
}

/// Display color for a change's significance band
pub fn significance_color(significance: Significance) -> Color {
  match significance {
    Significance::High => Color::Red,
    Significance::Medium => Color::Yellow,
    Significance::Low => Color::Gray,
  }
}

/// Local time, minute precision, or a dash
pub fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
  ts.map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
    .unwrap_or_else(|| "-".to_string())
}

/// Keep a list selection inside `0..len`, selecting the first row when unset
pub fn ensure_valid_selection(state: &mut ListState, len: usize) {
  if len == 0 {
    state.select(None);
    return;
  }
  match state.selected() {
    Some(i) if i >= len => state.select(Some(len - 1)),
    None => state.select(Some(0)),
    _ => {}
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate("hello", 10), "hello");
    assert_eq!(truncate("hello", 5), "hello");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate("hello world", 8), "hello...");
  }

  #[test]
  fn test_truncate_counts_chars() {
    assert_eq!(truncate("Zürich Ventures", 9), "Zürich...");
  }

  #[test]
  fn test_status_color() {
    assert_eq!(status_color(&CompanyStatus::Active), Color::Green);
    assert_eq!(status_color(&CompanyStatus::Inactive), Color::DarkGray);
    assert_eq!(status_color(&CompanyStatus::Other("error".into())), Color::Yellow);
  }

  #[test]
  fn test_significance_color() {
    assert_eq!(significance_color(Significance::of(85)), Color::Red);
    assert_eq!(significance_color(Significance::of(40)), Color::Yellow);
    assert_eq!(significance_color(Significance::of(10)), Color::Gray);
  }

  #[test]
  fn test_format_missing_timestamp() {
    assert_eq!(format_timestamp(None), "-");
  }

  #[test]
  fn test_ensure_valid_selection() {
    let mut state = ListState::default();
    ensure_valid_selection(&mut state, 3);
    assert_eq!(state.selected(), Some(0));

    state.select(Some(5));
    ensure_valid_selection(&mut state, 3);
    assert_eq!(state.selected(), Some(2));

    ensure_valid_selection(&mut state, 0);
    assert_eq!(state.selected(), None);
  }
}
