//! Process-wide bearer token slot with pluggable persistence.

use color_eyre::Result;
use std::sync::{Arc, PoisonError, RwLock};

use crate::db::Database;

/// Persistence backend for the bearer token.
pub trait TokenStorage: Send + Sync {
  fn load(&self) -> Result<Option<String>>;
  fn store(&self, token: &str) -> Result<()>;
  fn clear(&self) -> Result<()>;
}

/// Storage that keeps nothing beyond the process lifetime.
#[cfg(test)]
pub struct MemoryTokenStorage;

#[cfg(test)]
impl TokenStorage for MemoryTokenStorage {
  fn load(&self) -> Result<Option<String>> {
    Ok(None)
  }

  fn store(&self, _token: &str) -> Result<()> {
    Ok(())
  }

  fn clear(&self) -> Result<()> {
    Ok(())
  }
}

impl TokenStorage for Database {
  fn load(&self) -> Result<Option<String>> {
    self.load_token()
  }

  fn store(&self, token: &str) -> Result<()> {
    self.store_token(token)
  }

  fn clear(&self) -> Result<()> {
    self.clear_token()
  }
}

/// The single token slot shared by every request.
///
/// Clones share state: once any clone evicts the token, every other clone
/// sees the eviction on its next read.
#[derive(Clone)]
pub struct TokenSlot {
  current: Arc<RwLock<Option<String>>>,
  storage: Arc<dyn TokenStorage>,
}

impl TokenSlot {
  /// Create a slot backed by `storage`, seeded with whatever it has persisted.
  pub fn new(storage: impl TokenStorage + 'static) -> Result<Self> {
    let initial = storage.load()?;
    Ok(Self {
      current: Arc::new(RwLock::new(initial)),
      storage: Arc::new(storage),
    })
  }

  /// A slot with no persistence.
  #[cfg(test)]
  pub fn in_memory() -> Self {
    Self {
      current: Arc::new(RwLock::new(None)),
      storage: Arc::new(MemoryTokenStorage),
    }
  }

  pub fn get(&self) -> Option<String> {
    self
      .current
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }

  pub fn is_present(&self) -> bool {
    self
      .current
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .is_some()
  }

  pub fn set(&self, token: impl Into<String>) {
    let token = token.into();
    if let Err(e) = self.storage.store(&token) {
      tracing::warn!(error = %e, "failed to persist session token");
    }
    *self
      .current
      .write()
      .unwrap_or_else(PoisonError::into_inner) = Some(token);
  }

  /// Remove the token from memory and from persistent storage.
  pub fn evict(&self) {
    *self
      .current
      .write()
      .unwrap_or_else(PoisonError::into_inner) = None;
    self.clear_storage();
  }

  /// Evict only if the slot still holds `used`, the token a rejected request
  /// was sent with. Returns whether the slot was cleared.
  ///
  /// A 401 that arrives after a re-login belongs to the old session and must
  /// not wipe the new token.
  pub fn evict_if(&self, used: Option<&str>) -> bool {
    {
      let mut current = self
        .current
        .write()
        .unwrap_or_else(PoisonError::into_inner);
      if current.as_deref() != used {
        return false;
      }
      *current = None;
    }
    self.clear_storage();
    true
  }

  fn clear_storage(&self) {
    if let Err(e) = self.storage.clear() {
      tracing::warn!(error = %e, "failed to clear persisted session token");
    }
  }
}

impl std::fmt::Debug for TokenSlot {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TokenSlot")
      .field("present", &self.is_present())
      .finish_non_exhaustive()
  }
}
