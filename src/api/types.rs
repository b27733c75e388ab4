use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

use super::error::ApiError;

/// Tracking status of a company
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CompanyStatus {
  Active,
  Inactive,
  /// Any status the client does not know about (e.g. "paused", "error")
  Other(String),
}

impl CompanyStatus {
  pub fn as_str(&self) -> &str {
    match self {
      CompanyStatus::Active => "active",
      CompanyStatus::Inactive => "inactive",
      CompanyStatus::Other(s) => s,
    }
  }

  pub fn is_active(&self) -> bool {
    matches!(self, CompanyStatus::Active)
  }
}

impl From<String> for CompanyStatus {
  fn from(s: String) -> Self {
    match s.to_lowercase().as_str() {
      "active" => CompanyStatus::Active,
      "inactive" => CompanyStatus::Inactive,
      _ => CompanyStatus::Other(s),
    }
  }
}

impl From<CompanyStatus> for String {
  fn from(status: CompanyStatus) -> Self {
    status.as_str().to_string()
  }
}

/// A tracked company
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
  pub id: String,
  pub name: String,
  pub url: String,
  pub industry: Option<String>,
  pub notes: Option<String>,
  pub status: CompanyStatus,
  pub last_scanned: Option<DateTime<Utc>>,
  pub next_scan: Option<DateTime<Utc>>,
  pub created_at: Option<DateTime<Utc>>,
}

/// Company with change statistics, as returned by the detail endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyDetail {
  pub company: Company,
  pub total_changes: u64,
  pub last_change: Option<DateTime<Utc>>,
}

/// Body for creating a company
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewCompany {
  pub name: String,
  pub url: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub industry: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub notes: Option<String>,
  pub scan_frequency: String,
  pub alert_threshold: u8,
}

impl NewCompany {
  pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      url: url.into(),
      industry: None,
      notes: None,
      scan_frequency: "daily".to_string(),
      alert_threshold: 50,
    }
  }

  pub fn with_industry(mut self, industry: impl Into<String>) -> Self {
    let industry = industry.into();
    self.industry = if industry.trim().is_empty() {
      None
    } else {
      Some(industry)
    };
    self
  }

  /// Check the body before it is sent.
  ///
  /// A bare domain like `acme.com` is upgraded to `https://acme.com`.
  pub fn validated(mut self) -> Result<Self, ApiError> {
    self.name = self.name.trim().to_string();
    if self.name.is_empty() {
      return Err(ApiError::InvalidInput("company name is required".into()));
    }

    let raw = self.url.trim();
    if raw.is_empty() {
      return Err(ApiError::InvalidInput("company url is required".into()));
    }
    let candidate = if raw.contains("://") {
      raw.to_string()
    } else {
      format!("https://{}", raw)
    };
    let parsed = Url::parse(&candidate)
      .map_err(|e| ApiError::InvalidInput(format!("invalid company url '{}': {}", raw, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
      return Err(ApiError::InvalidInput(format!(
        "company url must be an http(s) address: {}",
        raw
      )));
    }
    self.url = parsed.to_string();

    if self.alert_threshold > 100 {
      return Err(ApiError::InvalidInput(
        "alert threshold must be between 0 and 100".into(),
      ));
    }

    Ok(self)
  }
}

/// Offset pagination for list endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Page {
  pub skip: u32,
  pub limit: u32,
}

impl Default for Page {
  fn default() -> Self {
    Self { skip: 0, limit: 50 }
  }
}

/// How impactful a change is, bucketed from its score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Significance {
  Low,
  Medium,
  High,
}

impl Significance {
  pub fn of(score: u8) -> Self {
    match score {
      70..=u8::MAX => Significance::High,
      40..=69 => Significance::Medium,
      _ => Significance::Low,
    }
  }
}

/// A detected change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
  pub id: String,
  pub company_id: String,
  pub company_name: String,
  pub detected_at: Option<DateTime<Utc>>,
  /// 0-100
  pub significance_score: u8,
  pub category: String,
  pub summary: String,
}

impl Change {
  pub fn significance(&self) -> Significance {
    Significance::of(self.significance_score)
  }
}

/// A change with its analysis and raw diff data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeDetail {
  pub change: Change,
  pub analysis: String,
  pub change_data: serde_json::Value,
  pub old_snapshot_id: Option<String>,
  pub new_snapshot_id: Option<String>,
}

/// Query parameters for the change feed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ChangeFilter {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub company_id: Option<String>,
  #[serde(skip_serializing_if = "is_zero")]
  pub min_significance: u8,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub category: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub from_date: Option<DateTime<Utc>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub to_date: Option<DateTime<Utc>>,
  pub limit: u32,
  #[serde(skip_serializing_if = "is_zero")]
  pub offset: u32,
}

fn is_zero<T: Default + PartialEq>(v: &T) -> bool {
  *v == T::default()
}

impl Default for ChangeFilter {
  fn default() -> Self {
    Self {
      company_id: None,
      min_significance: 0,
      category: None,
      from_date: None,
      to_date: None,
      limit: 20,
      offset: 0,
    }
  }
}

impl ChangeFilter {
  pub const MAX_LIMIT: u32 = 100;

  pub fn recent(limit: u32) -> Self {
    Self {
      limit,
      ..Self::default()
    }
  }

  pub fn for_company(company_id: impl Into<String>) -> Self {
    Self {
      company_id: Some(company_id.into()),
      ..Self::default()
    }
  }

  pub fn validated(mut self) -> Result<Self, ApiError> {
    if self.min_significance > 100 {
      return Err(ApiError::InvalidInput(
        "minimum significance must be between 0 and 100".into(),
      ));
    }
    if let (Some(from), Some(to)) = (self.from_date, self.to_date) {
      if from > to {
        return Err(ApiError::InvalidInput("from date is after to date".into()));
      }
    }
    self.category = self
      .category
      .map(|c| c.trim().to_string())
      .filter(|c| !c.is_empty());
    self.limit = self.limit.clamp(1, Self::MAX_LIMIT);
    Ok(self)
  }
}

/// Identity of the logged-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
  pub id: String,
  pub email: String,
  pub name: String,
  pub plan: String,
}

/// Partial profile update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
}

impl ProfileUpdate {
  /// The fields that differ from `current`. Blank values leave a field alone.
  pub fn diff(current: &UserProfile, name: &str, email: &str) -> Self {
    let changed = |new: &str, old: &str| {
      let new = new.trim();
      (!new.is_empty() && new != old).then(|| new.to_string())
    };
    Self {
      name: changed(name, &current.name),
      email: changed(email, &current.email),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.name.is_none() && self.email.is_none()
  }

  pub fn validated(self) -> Result<Self, ApiError> {
    if let Some(email) = &self.email {
      let well_formed = email
        .split_once('@')
        .is_some_and(|(user, domain)| !user.is_empty() && domain.contains('.'));
      if !well_formed {
        return Err(ApiError::InvalidInput(format!("{} is not an email address", email)));
      }
    }
    Ok(self)
  }
}

/// Account usage counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
  #[serde(default)]
  pub plan: Option<String>,
  #[serde(default, alias = "total_companies", alias = "companies")]
  pub companies_tracked: u64,
  #[serde(default, alias = "total_changes", alias = "changes")]
  pub changes_detected: u64,
  /// Counters this client does not know by name
  #[serde(flatten)]
  pub extra: BTreeMap<String, serde_json::Value>,
}

/// Access token issued by the login endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenResponse {
  pub access_token: String,
  #[serde(default = "default_token_type")]
  pub token_type: String,
}

fn default_token_type() -> String {
  "bearer".to_string()
}

/// Acknowledgement body returned by delete/scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Ack {
  #[serde(default)]
  pub message: Option<String>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_status_parsing() {
    assert_eq!(CompanyStatus::from("active".to_string()), CompanyStatus::Active);
    assert_eq!(CompanyStatus::from("Inactive".to_string()), CompanyStatus::Inactive);
    assert_eq!(
      CompanyStatus::from("paused".to_string()),
      CompanyStatus::Other("paused".to_string())
    );
    assert_eq!(CompanyStatus::Other("paused".into()).as_str(), "paused");
  }

  #[test]
  fn test_significance_bands() {
    assert_eq!(Significance::of(100), Significance::High);
    assert_eq!(Significance::of(70), Significance::High);
    assert_eq!(Significance::of(69), Significance::Medium);
    assert_eq!(Significance::of(40), Significance::Medium);
    assert_eq!(Significance::of(0), Significance::Low);
  }

  #[test]
  fn test_new_company_normalizes_bare_domain() {
    let company = NewCompany::new(" Acme ", "acme.com").validated().unwrap();
    assert_eq!(company.name, "Acme");
    assert_eq!(company.url, "https://acme.com/");
  }

  #[test]
  fn test_new_company_rejects_bad_input() {
    assert!(NewCompany::new("", "acme.com").validated().is_err());
    assert!(NewCompany::new("Acme", "").validated().is_err());
    assert!(NewCompany::new("Acme", "ftp://acme.com").validated().is_err());
  }

  #[test]
  fn test_new_company_body_omits_empty_industry() {
    let body = NewCompany::new("Acme", "https://acme.com").with_industry("  ");
    let json = serde_json::to_value(&body).unwrap();
    assert!(json.get("industry").is_none());
    assert_eq!(json["scan_frequency"], "daily");
    assert_eq!(json["alert_threshold"], 50);
  }

  #[test]
  fn test_change_filter_query_skips_defaults() {
    let filter = ChangeFilter::recent(10);
    let json = serde_json::to_value(&filter).unwrap();
    assert_eq!(json, serde_json::json!({"limit": 10}));
  }

  #[test]
  fn test_change_filter_clamps_limit() {
    let filter = ChangeFilter {
      limit: 500,
      ..ChangeFilter::default()
    };
    assert_eq!(filter.validated().unwrap().limit, ChangeFilter::MAX_LIMIT);

    let filter = ChangeFilter {
      min_significance: 101,
      ..ChangeFilter::default()
    };
    assert!(filter.validated().is_err());
  }

  #[test]
  fn test_usage_stats_keeps_unknown_counters() {
    let stats: UsageStats = serde_json::from_value(serde_json::json!({
      "plan": "pro",
      "total_companies": 3,
      "changes_detected": 12,
      "scans_this_month": 40
    }))
    .unwrap();
    assert_eq!(stats.companies_tracked, 3);
    assert_eq!(stats.changes_detected, 12);
    assert_eq!(stats.extra["scans_this_month"], 40);
  }

  #[test]
  fn test_profile_update_keeps_only_changes() {
    let current = UserProfile {
      id: "u1".into(),
      email: "ann@acme.com".into(),
      name: "Ann".into(),
      plan: "pro".into(),
    };

    assert!(ProfileUpdate::diff(&current, "Ann", " ann@acme.com ").is_empty());
    assert!(ProfileUpdate::diff(&current, "", "").is_empty());
    assert_eq!(
      ProfileUpdate::diff(&current, "Annie", "ann@acme.com"),
      ProfileUpdate {
        name: Some("Annie".into()),
        email: None,
      }
    );

    let bad = ProfileUpdate::diff(&current, "Ann", "ann-at-acme");
    assert!(matches!(bad.validated(), Err(ApiError::InvalidInput(_))));
  }
}
