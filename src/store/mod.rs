//! Shared view state: the session and the company list.
//!
//! The store never talks to the network. Views call the API and then record
//! the outcome here so sibling views see the same data.

mod companies;
mod session;

pub use companies::{company_matches, CompanyList};
pub use session::SessionState;

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::api::types::{Company, UserProfile};

#[derive(Debug, Default)]
struct StoreState {
  session: SessionState,
  companies: CompanyList,
}

/// Cheaply cloneable handle to the shared state.
#[derive(Clone, Debug, Default)]
pub struct Store {
  state: Arc<RwLock<StoreState>>,
}

impl Store {
  pub fn new() -> Self {
    Self::default()
  }

  fn read(&self) -> RwLockReadGuard<'_, StoreState> {
    self.state.read().unwrap_or_else(PoisonError::into_inner)
  }

  fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
    self.state.write().unwrap_or_else(PoisonError::into_inner)
  }

  #[cfg(test)]
  pub fn session(&self) -> SessionState {
    self.read().session.clone()
  }

  pub fn user(&self) -> Option<UserProfile> {
    self.read().session.user().cloned()
  }

  pub fn is_authenticated(&self) -> bool {
    self.read().session.is_authenticated()
  }

  pub fn login(&self, user: UserProfile) {
    self.write().session = SessionState::Authenticated(user);
  }

  /// Replace the profile of an existing session (after an update)
  pub fn set_user(&self, user: UserProfile) {
    let mut state = self.write();
    if state.session.is_authenticated() {
      state.session = SessionState::Authenticated(user);
    }
  }

  /// Reset every slice to its initial state.
  pub fn logout(&self) {
    *self.write() = StoreState::default();
  }

  #[cfg(test)]
  pub fn companies(&self) -> Vec<Company> {
    self.read().companies.items().to_vec()
  }

  pub fn filtered_companies(&self, query: &str) -> Vec<Company> {
    self
      .read()
      .companies
      .items()
      .iter()
      .filter(|c| company_matches(c, query))
      .cloned()
      .collect()
  }

  pub fn set_companies(&self, companies: Vec<Company>) {
    self.write().companies.set(companies);
  }

  pub fn add_company(&self, company: Company) {
    self.write().companies.add(company);
  }

  pub fn remove_company(&self, id: &str) -> bool {
    self.write().companies.remove(id)
  }

  pub fn select_company(&self, id: Option<String>) {
    self.write().companies.select(id);
  }

  pub fn selected_company(&self) -> Option<Company> {
    self.read().companies.selected().cloned()
  }

  pub fn set_companies_loading(&self, loading: bool) {
    self.write().companies.set_loading(loading);
  }

  pub fn companies_loading(&self) -> bool {
    self.read().companies.is_loading()
  }
}
