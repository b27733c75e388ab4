use crate::api::types::UserProfile;

/// Who is using the app right now
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
  #[default]
  Anonymous,
  Authenticated(UserProfile),
}

impl SessionState {
  pub fn is_authenticated(&self) -> bool {
    matches!(self, SessionState::Authenticated(_))
  }

  pub fn user(&self) -> Option<&UserProfile> {
    match self {
      SessionState::Authenticated(user) => Some(user),
      SessionState::Anonymous => None,
    }
  }
}
