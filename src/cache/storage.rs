//! Cache storage trait and in-memory implementation.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// A single cached query payload.
#[derive(Debug, Clone)]
pub struct CachedEntry {
  /// Serialized payload
  pub payload: serde_json::Value,
  /// Scope of the key that produced this entry
  pub scope: &'static str,
  /// When the entry was stored
  pub cached_at: DateTime<Utc>,
}

/// Trait for cache storage backends.
pub trait CacheStorage: Send + Sync {
  /// Look up an entry by key hash.
  fn get(&self, hash: &str) -> Option<CachedEntry>;

  /// Insert or replace an entry.
  fn put(&self, hash: &str, entry: CachedEntry);

  /// Remove one entry. Returns whether it existed.
  fn remove(&self, hash: &str) -> bool;

  /// Remove every entry in a scope. Returns the number removed.
  fn remove_scope(&self, scope: &str) -> usize;

  /// Drop everything.
  fn clear(&self);
}

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn get(&self, _hash: &str) -> Option<CachedEntry> {
    None // Always miss
  }

  fn put(&self, _hash: &str, _entry: CachedEntry) {}

  fn remove(&self, _hash: &str) -> bool {
    false
  }

  fn remove_scope(&self, _scope: &str) -> usize {
    0
  }

  fn clear(&self) {}
}

/// Process-local cache storage.
#[derive(Default)]
pub struct MemoryStorage {
  entries: Mutex<HashMap<String, CachedEntry>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }

  fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, CachedEntry>> {
    // A panic mid-insert cannot leave a HashMap half-written
    self.entries.lock().unwrap_or_else(PoisonError::into_inner)
  }

  #[cfg(test)]
  pub fn len(&self) -> usize {
    self.entries().len()
  }
}

impl CacheStorage for MemoryStorage {
  fn get(&self, hash: &str) -> Option<CachedEntry> {
    self.entries().get(hash).cloned()
  }

  fn put(&self, hash: &str, entry: CachedEntry) {
    self.entries().insert(hash.to_string(), entry);
  }

  fn remove(&self, hash: &str) -> bool {
    self.entries().remove(hash).is_some()
  }

  fn remove_scope(&self, scope: &str) -> usize {
    let mut entries = self.entries();
    let before = entries.len();
    entries.retain(|_, entry| entry.scope != scope);
    before - entries.len()
  }

  fn clear(&self) {
    self.entries().clear();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entry(scope: &'static str) -> CachedEntry {
    CachedEntry {
      payload: serde_json::json!([]),
      scope,
      cached_at: Utc::now(),
    }
  }

  #[test]
  fn test_remove_scope_leaves_other_scopes() {
    let storage = MemoryStorage::new();
    storage.put("a", entry("companies"));
    storage.put("b", entry("companies"));
    storage.put("c", entry("changes"));

    assert_eq!(storage.remove_scope("companies"), 2);
    assert!(storage.get("a").is_none());
    assert!(storage.get("c").is_some());
    assert_eq!(storage.len(), 1);
  }

  #[test]
  fn test_noop_storage_never_hits() {
    let storage = NoopStorage;
    storage.put("a", entry("companies"));
    assert!(storage.get("a").is_none());
  }
}
