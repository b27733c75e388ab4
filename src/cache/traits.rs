//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};

/// Key identifying one cached query.
///
/// Keys belong to a scope (a resource family such as every page of the
/// company list) so that a mutation can invalidate the whole family at once.
pub trait QueryKey {
  /// Stable, fixed-length storage key
  fn cache_hash(&self) -> String;

  /// Resource family this key belongs to
  fn scope(&self) -> &'static str;

  /// Human readable description for logs
  fn description(&self) -> String;
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  /// Create a new cache result from cached data.
  pub fn from_cache(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
      cached_at: Some(cached_at),
    }
  }
}

/// Indicates where returned data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fetched from the network by this call
  Network,
  /// Served from cache within the staleness window
  Cache,
}
