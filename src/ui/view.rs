use crossterm::event::KeyEvent;
use ratatui::prelude::*;

use crate::api::CachedTrackerClient;
use crate::store::Store;

/// A keyboard shortcut hint for display in the header
#[derive(Debug, Clone)]
pub struct ShortcutInfo {
  pub key: &'static str,
  pub label: &'static str,
  /// Lower = shown first
  pub priority: u8,
}

impl ShortcutInfo {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

/// Everything a view needs to load and change data.
///
/// Built once in `App::new` and cloned into each view.
#[derive(Clone)]
pub struct ViewContext {
  pub client: CachedTrackerClient,
  pub store: Store,
  pub page_size: u32,
  /// Login form prefill
  pub email: Option<String>,
  pub password: Option<String>,
}

#[cfg(test)]
impl ViewContext {
  /// Context for views talking to a mock server
  pub fn for_server(uri: &str) -> Self {
    Self {
      client: CachedTrackerClient::for_server(uri),
      store: Store::new(),
      page_size: 50,
      email: None,
      password: None,
    }
  }
}

/// Actions that a view can request in response to user input
pub enum ViewAction {
  None,
  /// Push a new view onto the stack
  Push(Box<dyn View>),
  /// Pop current view from stack (go back)
  Pop,
  /// Drop the whole stack and start over from this view
  Replace(Box<dyn View>),
}

/// Trait for view behavior
///
/// Views handle their own input modes (search, forms, dialogs) and return
/// actions for the App to execute: App → View → Components.
///
/// Views that load data asynchronously use `Query<T>`/`Mutation<T>`
/// internally and poll them in `tick()`.
pub trait View {
  /// Handle a key event, returning an action for App to execute
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction;

  fn render(&mut self, frame: &mut Frame, area: Rect);

  fn breadcrumb_label(&self) -> String;

  /// Called on each tick to poll async work. A finished login or
  /// mutation may ask for navigation.
  fn tick(&mut self) -> ViewAction {
    ViewAction::None
  }

  /// True while the view is taking free text, so `:` is typed rather than
  /// opening the command palette
  fn captures_input(&self) -> bool {
    false
  }

  /// Keyboard shortcuts to display in the header
  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("r", "refresh").with_priority(20),
      ShortcutInfo::new("q", "back").with_priority(30),
    ]
  }
}
