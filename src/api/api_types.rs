//! Serde-deserializable types matching tracker API responses.
//!
//! These types are separate from domain types so that every payload passes
//! through an explicit validation step before the rest of the app sees it.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

use super::error::ApiError;
use super::types::{Change, ChangeDetail, Company, CompanyDetail, CompanyStatus, UserProfile};

// ============================================================================
// Field helpers
// ============================================================================

/// Ids are UUID strings on the real backend, but accept plain integers too.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum RawId {
    Str(String),
    Int(i64),
  }

  Ok(match RawId::deserialize(deserializer)? {
    RawId::Str(s) => s,
    RawId::Int(i) => i.to_string(),
  })
}

fn deserialize_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum RawId {
    Str(String),
    Int(i64),
  }

  Ok(
    Option::<RawId>::deserialize(deserializer)?.map(|raw| match raw {
      RawId::Str(s) => s,
      RawId::Int(i) => i.to_string(),
    }),
  )
}

fn require_id(what: &'static str, id: String) -> Result<String, ApiError> {
  if id.trim().is_empty() {
    Err(ApiError::malformed(what, "empty id"))
  } else {
    Ok(id)
  }
}

/// Parse a backend timestamp.
///
/// The backend serializes naive UTC datetimes (`2024-05-01T10:00:00.123456`);
/// RFC 3339 strings with an offset are accepted as well.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Some(dt.with_timezone(&Utc));
  }
  NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
    .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
    .ok()
    .map(|dt| dt.and_utc())
}

fn timestamp(what: &'static str, field: &str, raw: Option<String>) -> Result<Option<DateTime<Utc>>, ApiError> {
  match raw {
    None => Ok(None),
    Some(s) => parse_timestamp(&s)
      .map(Some)
      .ok_or_else(|| ApiError::malformed(what, format!("bad {} timestamp '{}'", field, s))),
  }
}

// ============================================================================
// Companies
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiCompany {
  #[serde(deserialize_with = "deserialize_id")]
  pub id: String,
  pub name: String,
  pub url: String,
  pub industry: Option<String>,
  pub notes: Option<String>,
  #[serde(default = "default_status")]
  pub status: String,
  pub last_scanned: Option<String>,
  pub next_scan: Option<String>,
  pub created_at: Option<String>,
}

fn default_status() -> String {
  "active".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ApiCompanyDetail {
  #[serde(flatten)]
  pub company: ApiCompany,
  #[serde(default)]
  pub total_changes: u64,
  pub last_change: Option<String>,
}

impl TryFrom<ApiCompany> for Company {
  type Error = ApiError;

  fn try_from(c: ApiCompany) -> Result<Self, Self::Error> {
    const WHAT: &str = "company";
    if c.name.trim().is_empty() {
      return Err(ApiError::malformed(WHAT, "empty name"));
    }
    Ok(Company {
      id: require_id(WHAT, c.id)?,
      name: c.name,
      url: c.url,
      industry: c.industry.filter(|s| !s.is_empty()),
      notes: c.notes.filter(|s| !s.is_empty()),
      status: CompanyStatus::from(c.status),
      last_scanned: timestamp(WHAT, "last_scanned", c.last_scanned)?,
      next_scan: timestamp(WHAT, "next_scan", c.next_scan)?,
      created_at: timestamp(WHAT, "created_at", c.created_at)?,
    })
  }
}

impl TryFrom<ApiCompanyDetail> for CompanyDetail {
  type Error = ApiError;

  fn try_from(d: ApiCompanyDetail) -> Result<Self, Self::Error> {
    Ok(CompanyDetail {
      company: d.company.try_into()?,
      total_changes: d.total_changes,
      last_change: timestamp("company", "last_change", d.last_change)?,
    })
  }
}

// ============================================================================
// Changes
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiChange {
  #[serde(deserialize_with = "deserialize_id")]
  pub id: String,
  #[serde(deserialize_with = "deserialize_id")]
  pub company_id: String,
  #[serde(default)]
  pub company_name: String,
  pub detected_at: Option<String>,
  #[serde(default)]
  pub significance_score: i64,
  #[serde(default = "default_category")]
  pub category: String,
  #[serde(default = "default_summary")]
  pub summary: String,
}

fn default_category() -> String {
  "unknown".to_string()
}

fn default_summary() -> String {
  "Changes detected".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ApiChangeDetail {
  #[serde(flatten)]
  pub change: ApiChange,
  #[serde(default)]
  pub analysis: String,
  #[serde(default)]
  pub change_data: serde_json::Value,
  #[serde(default, deserialize_with = "deserialize_opt_id")]
  pub old_snapshot_id: Option<String>,
  #[serde(default, deserialize_with = "deserialize_opt_id")]
  pub new_snapshot_id: Option<String>,
}

impl TryFrom<ApiChange> for Change {
  type Error = ApiError;

  fn try_from(c: ApiChange) -> Result<Self, Self::Error> {
    const WHAT: &str = "change";
    let score = u8::try_from(c.significance_score)
      .ok()
      .filter(|s| *s <= 100)
      .ok_or_else(|| {
        ApiError::malformed(
          WHAT,
          format!("significance score {} outside 0-100", c.significance_score),
        )
      })?;

    Ok(Change {
      id: require_id(WHAT, c.id)?,
      company_id: require_id(WHAT, c.company_id)?,
      company_name: c.company_name,
      detected_at: timestamp(WHAT, "detected_at", c.detected_at)?,
      significance_score: score,
      category: c.category,
      summary: c.summary,
    })
  }
}

impl TryFrom<ApiChangeDetail> for ChangeDetail {
  type Error = ApiError;

  fn try_from(d: ApiChangeDetail) -> Result<Self, Self::Error> {
    let change_data = match d.change_data {
      serde_json::Value::Null => serde_json::Value::Object(Default::default()),
      v @ serde_json::Value::Object(_) => v,
      _ => return Err(ApiError::malformed("change", "change_data is not an object")),
    };

    Ok(ChangeDetail {
      change: d.change.try_into()?,
      analysis: d.analysis,
      change_data,
      old_snapshot_id: d.old_snapshot_id,
      new_snapshot_id: d.new_snapshot_id,
    })
  }
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiUser {
  #[serde(deserialize_with = "deserialize_id")]
  pub id: String,
  pub email: String,
  #[serde(default)]
  pub name: String,
  #[serde(default = "default_plan")]
  pub plan: String,
}

fn default_plan() -> String {
  "free".to_string()
}

impl TryFrom<ApiUser> for UserProfile {
  type Error = ApiError;

  fn try_from(u: ApiUser) -> Result<Self, Self::Error> {
    const WHAT: &str = "user";
    if !u.email.contains('@') {
      return Err(ApiError::malformed(WHAT, format!("bad email '{}'", u.email)));
    }
    Ok(UserProfile {
      id: require_id(WHAT, u.id)?,
      email: u.email,
      name: u.name,
      plan: u.plan,
    })
  }
}

// ============================================================================
// Helpers
// ============================================================================

/// Convert a list of wire records, failing on the first invalid one.
pub fn convert_all<A, T>(items: Vec<A>) -> Result<Vec<T>, ApiError>
where
  T: TryFrom<A, Error = ApiError>,
{
  items.into_iter().map(T::try_from).collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_company_from_minimal_payload() {
    let api: ApiCompany = serde_json::from_value(json!({
      "id": "1", "name": "Acme", "url": "acme.com", "status": "active"
    }))
    .unwrap();
    let company = Company::try_from(api).unwrap();
    assert_eq!(company.id, "1");
    assert_eq!(company.status, CompanyStatus::Active);
    assert_eq!(company.last_scanned, None);
  }

  #[test]
  fn test_company_accepts_numeric_id_and_naive_timestamp() {
    let api: ApiCompany = serde_json::from_value(json!({
      "id": 7, "name": "Acme", "url": "https://acme.com",
      "status": "inactive", "last_scanned": "2024-05-01T10:00:00.123456"
    }))
    .unwrap();
    let company = Company::try_from(api).unwrap();
    assert_eq!(company.id, "7");
    assert_eq!(company.status, CompanyStatus::Inactive);
    assert_eq!(
      company.last_scanned.unwrap().to_rfc3339(),
      "2024-05-01T10:00:00.123456+00:00"
    );
  }

  #[test]
  fn test_company_rejects_empty_id_and_bad_timestamp() {
    let api: ApiCompany =
      serde_json::from_value(json!({"id": "", "name": "Acme", "url": "acme.com"})).unwrap();
    assert!(matches!(Company::try_from(api), Err(ApiError::Malformed { .. })));

    let api: ApiCompany = serde_json::from_value(
      json!({"id": "1", "name": "Acme", "url": "acme.com", "last_scanned": "yesterday"}),
    )
    .unwrap();
    assert!(matches!(Company::try_from(api), Err(ApiError::Malformed { .. })));
  }

  #[test]
  fn test_change_score_must_be_in_range() {
    let make = |score: i64| -> ApiChange {
      serde_json::from_value(json!({
        "id": "c1", "company_id": "1", "company_name": "Acme",
        "significance_score": score, "category": "pricing", "summary": "New tier"
      }))
      .unwrap()
    };

    assert_eq!(Change::try_from(make(85)).unwrap().significance_score, 85);
    assert!(Change::try_from(make(101)).is_err());
    assert!(Change::try_from(make(-1)).is_err());
  }

  #[test]
  fn test_change_detail_defaults() {
    let api: ApiChangeDetail = serde_json::from_value(json!({
      "id": "c1", "company_id": "1", "detected_at": "2024-05-01T10:00:00Z"
    }))
    .unwrap();
    let detail = ChangeDetail::try_from(api).unwrap();
    assert_eq!(detail.change.category, "unknown");
    assert_eq!(detail.change.summary, "Changes detected");
    assert_eq!(detail.change_data, json!({}));
  }

  #[test]
  fn test_user_defaults_to_free_plan() {
    let api: ApiUser =
      serde_json::from_value(json!({"id": "u1", "email": "a@b.co", "name": "Ann"})).unwrap();
    let user = UserProfile::try_from(api).unwrap();
    assert_eq!(user.plan, "free");
  }

  #[test]
  fn test_convert_all_fails_on_first_invalid() {
    let items: Vec<ApiCompany> = serde_json::from_value(json!([
      {"id": "1", "name": "Acme", "url": "acme.com"},
      {"id": "2", "name": "", "url": "beta.io"}
    ]))
    .unwrap();
    let result: Result<Vec<Company>, _> = convert_all(items);
    assert!(result.is_err());
  }
}
