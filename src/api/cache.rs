//! Query keys for tracker API reads.

use sha2::{Digest, Sha256};

use crate::cache::QueryKey;

use super::types::{ChangeFilter, Page};

/// Scope names. Invalidating a scope drops every key inside it.
pub mod scope {
  pub const COMPANIES: &str = "companies";
  pub const COMPANY: &str = "company";
  pub const CHANGES: &str = "changes";
  pub const CHANGE: &str = "change";
  pub const USAGE_STATS: &str = "usage_stats";
  pub const PROFILE: &str = "profile";
}

/// Query key types for tracker API calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrackerQueryKey {
  /// One page of the company list
  Companies { page: Page },
  /// A single company by id
  Company { id: String },
  /// The change feed under a filter
  Changes { filter: ChangeFilter },
  /// A single change by id
  Change { id: String },
  /// Account usage counters
  UsageStats,
  /// Profile of the logged-in user
  Profile,
}

impl QueryKey for TrackerQueryKey {
  fn cache_hash(&self) -> String {
    let input = match self {
      Self::Companies { page } => format!("companies:{}:{}", page.skip, page.limit),
      Self::Company { id } => format!("company:{}", id),
      Self::Changes { filter } => format!("changes:{}", normalize_filter(filter)),
      Self::Change { id } => format!("change:{}", id),
      Self::UsageStats => "usage_stats".to_string(),
      Self::Profile => "profile".to_string(),
    };

    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let result = hasher.finalize();
    hex::encode(result)
  }

  fn scope(&self) -> &'static str {
    match self {
      Self::Companies { .. } => scope::COMPANIES,
      Self::Company { .. } => scope::COMPANY,
      Self::Changes { .. } => scope::CHANGES,
      Self::Change { .. } => scope::CHANGE,
      Self::UsageStats => scope::USAGE_STATS,
      Self::Profile => scope::PROFILE,
    }
  }

  fn description(&self) -> String {
    match self {
      Self::Companies { page } => format!("companies (skip {}, limit {})", page.skip, page.limit),
      Self::Company { id } => format!("company {}", id),
      Self::Changes { filter } => match &filter.company_id {
        Some(company) => format!(
          "changes for company {} (min {}, limit {})",
          company, filter.min_significance, filter.limit
        ),
        None => format!(
          "changes (min {}, limit {})",
          filter.min_significance, filter.limit
        ),
      },
      Self::Change { id } => format!("change {}", id),
      Self::UsageStats => "usage stats".to_string(),
      Self::Profile => "profile".to_string(),
    }
  }
}

/// Normalize a change filter for consistent hashing.
/// Surrounding whitespace in the category is ignored.
fn normalize_filter(filter: &ChangeFilter) -> String {
  format!(
    "{}|{}|{}|{}|{}|{}|{}",
    filter.company_id.as_deref().unwrap_or(""),
    filter.min_significance,
    filter
      .category
      .as_deref()
      .map(str::trim)
      .unwrap_or_default(),
    filter.from_date.map(|d| d.to_rfc3339()).unwrap_or_default(),
    filter.to_date.map(|d| d.to_rfc3339()).unwrap_or_default(),
    filter.limit,
    filter.offset,
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_distinct_pages_have_distinct_hashes_but_share_scope() {
    let first = TrackerQueryKey::Companies {
      page: Page::default(),
    };
    let second = TrackerQueryKey::Companies {
      page: Page { skip: 50, limit: 50 },
    };
    assert_ne!(first.cache_hash(), second.cache_hash());
    assert_eq!(first.scope(), second.scope());
    assert_eq!(first.cache_hash().len(), 64);
  }

  #[test]
  fn test_category_whitespace_does_not_change_hash() {
    let a = TrackerQueryKey::Changes {
      filter: ChangeFilter {
        category: Some("Pricing".into()),
        ..ChangeFilter::default()
      },
    };
    let b = TrackerQueryKey::Changes {
      filter: ChangeFilter {
        category: Some(" Pricing ".into()),
        ..ChangeFilter::default()
      },
    };
    assert_eq!(a.cache_hash(), b.cache_hash());
  }

  #[test]
  fn test_company_detail_is_not_in_list_scope() {
    let detail = TrackerQueryKey::Company { id: "1".into() };
    assert_ne!(detail.scope(), scope::COMPANIES);
  }
}
