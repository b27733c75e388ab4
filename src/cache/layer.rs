//! Cache layer that orchestrates caching logic with network fetching.

use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;

use super::storage::{CacheStorage, CachedEntry};
use super::traits::{CacheResult, QueryKey};
use crate::api::ApiError;

/// Cache layer that manages caching logic and network fetching.
///
/// A read within the staleness window is served from storage without calling
/// the fetcher. Otherwise the fetcher runs; a failure is retried once (unless
/// the error says a retry is pointless) and then returned, leaving whatever
/// was cached before untouched. Concurrent misses on the same key are not
/// de-duplicated: each one runs its own fetcher.
pub struct CacheLayer {
  storage: Arc<dyn CacheStorage>,
  /// How long before cached data is considered stale
  stale_time: Duration,
  /// Pause before the single retry
  retry_delay: std::time::Duration,
}

impl CacheLayer {
  /// Create a new cache layer with the given storage backend.
  pub fn new(storage: impl CacheStorage + 'static) -> Self {
    Self {
      storage: Arc::new(storage),
      stale_time: Duration::minutes(5),
      retry_delay: std::time::Duration::from_secs(1),
    }
  }

  /// Set the stale time for cached data.
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  /// Set the delay before a failed fetch is retried.
  pub fn with_retry_delay(mut self, retry_delay: std::time::Duration) -> Self {
    self.retry_delay = retry_delay;
    self
  }

  /// Check if cached data is stale based on cached_at timestamp.
  fn is_stale(&self, cached_at: DateTime<Utc>) -> bool {
    Utc::now() - cached_at > self.stale_time
  }

  /// Fetch with a cache-first strategy.
  ///
  /// 1. Check cache - if fresh, return immediately
  /// 2. If stale/missing, fetch from network (retrying once)
  /// 3. Store the result with a fresh timestamp
  pub async fn fetch<K, T, F, Fut>(&self, key: &K, fetcher: F) -> Result<CacheResult<T>, ApiError>
  where
    K: QueryKey,
    T: Serialize + DeserializeOwned,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
  {
    let hash = key.cache_hash();

    if let Some(cached) = self.storage.get(&hash) {
      if !self.is_stale(cached.cached_at) {
        match serde_json::from_value::<T>(cached.payload) {
          Ok(data) => {
            tracing::debug!(key = %key.description(), "cache hit");
            return Ok(CacheResult::from_cache(data, cached.cached_at));
          }
          Err(e) => {
            tracing::warn!(key = %key.description(), error = %e, "dropping undecodable cache entry");
            self.storage.remove(&hash);
          }
        }
      }
    }

    tracing::debug!(key = %key.description(), "cache miss, fetching");
    let data = self.fetch_with_retry(key, &fetcher).await?;

    match serde_json::to_value(&data) {
      Ok(payload) => self.storage.put(
        &hash,
        CachedEntry {
          payload,
          scope: key.scope(),
          cached_at: Utc::now(),
        },
      ),
      Err(e) => tracing::warn!(key = %key.description(), error = %e, "could not cache payload"),
    }

    Ok(CacheResult::from_network(data))
  }

  async fn fetch_with_retry<K, T, F, Fut>(&self, key: &K, fetcher: &F) -> Result<T, ApiError>
  where
    K: QueryKey,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
  {
    match fetcher().await {
      Ok(data) => Ok(data),
      Err(e) if e.is_retryable() => {
        tracing::warn!(key = %key.description(), error = %e, "fetch failed, retrying once");
        if !self.retry_delay.is_zero() {
          tokio::time::sleep(self.retry_delay).await;
        }
        fetcher().await
      }
      Err(e) => Err(e),
    }
  }

  /// Drop one entry so the next read refetches.
  pub fn invalidate<K: QueryKey>(&self, key: &K) -> bool {
    let removed = self.storage.remove(&key.cache_hash());
    tracing::debug!(key = %key.description(), removed, "invalidated");
    removed
  }

  /// Drop every entry in a scope.
  pub fn invalidate_scope(&self, scope: &str) -> usize {
    let removed = self.storage.remove_scope(scope);
    tracing::debug!(scope, removed, "invalidated scope");
    removed
  }

  /// Drop everything (logout).
  pub fn clear(&self) {
    self.storage.clear();
  }
}

impl Clone for CacheLayer {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      stale_time: self.stale_time,
      retry_delay: self.retry_delay,
    }
  }
}
