//! Typed accessors, one per REST resource.
//!
//! Each method maps one-to-one onto an endpoint. Payloads are validated on
//! the way in; nothing else happens here.

use super::api_types::{
  convert_all, ApiChange, ApiChangeDetail, ApiCompany, ApiCompanyDetail, ApiUser,
};
use super::client::ApiClient;
use super::error::ApiError;
use super::types::{
  Ack, Change, ChangeDetail, ChangeFilter, Company, CompanyDetail, NewCompany, Page,
  ProfileUpdate, TokenResponse, UsageStats, UserProfile,
};

impl ApiClient {
  pub fn auth(&self) -> AuthApi<'_> {
    AuthApi { client: self }
  }

  pub fn companies(&self) -> CompaniesApi<'_> {
    CompaniesApi { client: self }
  }

  pub fn changes(&self) -> ChangesApi<'_> {
    ChangesApi { client: self }
  }

  pub fn users(&self) -> UsersApi<'_> {
    UsersApi { client: self }
  }
}

#[derive(Clone, Copy)]
pub struct AuthApi<'a> {
  client: &'a ApiClient,
}

impl<'a> AuthApi<'a> {
  /// Exchange credentials for an access token (OAuth2 password form).
  pub async fn login(self, email: &str, password: &str) -> Result<TokenResponse, ApiError> {
    let form = [("username", email), ("password", password)];
    let token: TokenResponse = self
      .client
      .post_form("/auth/token", &form, "token")
      .await?;
    if token.access_token.is_empty() {
      return Err(ApiError::malformed("token", "empty access_token"));
    }
    // Every request sends it as a bearer header
    if !token.token_type.eq_ignore_ascii_case("bearer") {
      return Err(ApiError::malformed(
        "token",
        format!("unsupported token type {}", token.token_type),
      ));
    }
    Ok(token)
  }

  pub async fn register(
    self,
    email: &str,
    password: &str,
    name: &str,
  ) -> Result<UserProfile, ApiError> {
    let body = serde_json::json!({
      "email": email,
      "password": password,
      "name": name,
    });
    let user: ApiUser = self
      .client
      .post_json("/auth/register", &body, "user")
      .await?;
    user.try_into()
  }
}

#[derive(Clone, Copy)]
pub struct CompaniesApi<'a> {
  client: &'a ApiClient,
}

impl<'a> CompaniesApi<'a> {
  pub async fn list(self, page: Page) -> Result<Vec<Company>, ApiError> {
    let items: Vec<ApiCompany> = self
      .client
      .get_query("/companies", &page, "company list")
      .await?;
    convert_all(items)
  }

  pub async fn get(self, id: &str) -> Result<CompanyDetail, ApiError> {
    let detail: ApiCompanyDetail = self
      .client
      .get(&format!("/companies/{}", id), "company")
      .await?;
    detail.try_into()
  }

  pub async fn create(self, company: &NewCompany) -> Result<Company, ApiError> {
    let created: ApiCompany = self
      .client
      .post_json("/companies", company, "company")
      .await?;
    created.try_into()
  }

  pub async fn delete(self, id: &str) -> Result<Ack, ApiError> {
    self
      .client
      .delete(&format!("/companies/{}", id), "acknowledgement")
      .await
  }

  /// Ask the backend to rescan a company. Completion is not observable here.
  pub async fn scan(self, id: &str) -> Result<Ack, ApiError> {
    self
      .client
      .post_empty(&format!("/companies/{}/scan", id), "acknowledgement")
      .await
  }
}

#[derive(Clone, Copy)]
pub struct ChangesApi<'a> {
  client: &'a ApiClient,
}

impl<'a> ChangesApi<'a> {
  pub async fn list(self, filter: &ChangeFilter) -> Result<Vec<Change>, ApiError> {
    let items: Vec<ApiChange> = self
      .client
      .get_query("/changes", filter, "change list")
      .await?;
    convert_all(items)
  }

  pub async fn get(self, id: &str) -> Result<ChangeDetail, ApiError> {
    let detail: ApiChangeDetail = self
      .client
      .get(&format!("/changes/{}", id), "change")
      .await?;
    detail.try_into()
  }
}

#[derive(Clone, Copy)]
pub struct UsersApi<'a> {
  client: &'a ApiClient,
}

impl<'a> UsersApi<'a> {
  pub async fn me(self) -> Result<UserProfile, ApiError> {
    let user: ApiUser = self.client.get("/users/me", "user").await?;
    user.try_into()
  }

  pub async fn update_me(self, update: &ProfileUpdate) -> Result<UserProfile, ApiError> {
    let user: ApiUser = self
      .client
      .put_json("/users/me", update, "user")
      .await?;
    user.try_into()
  }

  pub async fn stats(self) -> Result<UsageStats, ApiError> {
    self.client.get("/users/stats", "usage stats").await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::token::TokenSlot;
  use pretty_assertions::assert_eq;
  use serde_json::json;
  use std::time::Duration;
  use wiremock::matchers::{body_string_contains, header, method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  async fn setup() -> (MockServer, ApiClient) {
    let server = MockServer::start().await;
    let client =
      ApiClient::new(&server.uri(), TokenSlot::in_memory(), Duration::from_secs(5)).unwrap();
    (server, client)
  }

  #[tokio::test]
  async fn test_login_posts_form_credentials() {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
      .and(path("/auth/token"))
      .and(header("content-type", "application/x-www-form-urlencoded"))
      .and(body_string_contains("username=ann%40acme.com"))
      .and(body_string_contains("password=hunter2"))
      .respond_with(
        ResponseTemplate::new(200)
          .set_body_json(json!({"access_token": "tok", "token_type": "bearer"})),
      )
      .expect(1)
      .mount(&server)
      .await;

    let token = client.auth().login("ann@acme.com", "hunter2").await.unwrap();
    assert_eq!(token.access_token, "tok");
  }

  #[tokio::test]
  async fn test_login_rejects_non_bearer_token() {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
      .and(path("/auth/token"))
      .respond_with(
        ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok", "token_type": "mac"})),
      )
      .mount(&server)
      .await;

    let err = client.auth().login("ann@acme.com", "hunter2").await.unwrap_err();
    assert!(matches!(err, ApiError::Malformed { what: "token", .. }));
  }

  #[tokio::test]
  async fn test_list_companies_sends_pagination() {
    let (server, client) = setup().await;
    Mock::given(method("GET"))
      .and(path("/companies"))
      .and(query_param("skip", "0"))
      .and(query_param("limit", "50"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([
        {"id": "1", "name": "Acme", "url": "acme.com", "status": "active"}
      ])))
      .expect(1)
      .mount(&server)
      .await;

    let companies = client.companies().list(Page::default()).await.unwrap();
    assert_eq!(companies.len(), 1);
    assert_eq!(companies[0].name, "Acme");
  }

  #[tokio::test]
  async fn test_scan_and_delete_hit_company_paths() {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
      .and(path("/companies/abc/scan"))
      .respond_with(
        ResponseTemplate::new(200).set_body_json(json!({"message": "Scan triggered successfully"})),
      )
      .expect(1)
      .mount(&server)
      .await;
    Mock::given(method("DELETE"))
      .and(path("/companies/abc"))
      .respond_with(
        ResponseTemplate::new(200).set_body_json(json!({"message": "Company deleted successfully"})),
      )
      .expect(1)
      .mount(&server)
      .await;

    let ack = client.companies().scan("abc").await.unwrap();
    assert_eq!(ack.message.as_deref(), Some("Scan triggered successfully"));
    client.companies().delete("abc").await.unwrap();
  }

  #[tokio::test]
  async fn test_change_list_sends_filter_params() {
    let (server, client) = setup().await;
    Mock::given(method("GET"))
      .and(path("/changes"))
      .and(query_param("min_significance", "70"))
      .and(query_param("limit", "10"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([
        {"id": "c1", "company_id": "1", "company_name": "Acme",
         "significance_score": 80, "category": "pricing", "summary": "New tier"}
      ])))
      .expect(1)
      .mount(&server)
      .await;

    let filter = ChangeFilter {
      min_significance: 70,
      limit: 10,
      ..ChangeFilter::default()
    };
    let changes = client.changes().list(&filter).await.unwrap();
    assert_eq!(changes[0].significance_score, 80);
  }

  #[tokio::test]
  async fn test_malformed_list_entry_is_rejected() {
    let (server, client) = setup().await;
    Mock::given(method("GET"))
      .and(path("/changes"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([
        {"id": "c1", "company_id": "1", "significance_score": 250}
      ])))
      .mount(&server)
      .await;

    let err = client
      .changes()
      .list(&ChangeFilter::default())
      .await
      .unwrap_err();
    assert!(matches!(err, ApiError::Malformed { what: "change", .. }));
  }

  #[tokio::test]
  async fn test_every_resource_bounces_on_401() {
    let (server, client) = setup().await;
    Mock::given(wiremock::matchers::any())
      .respond_with(ResponseTemplate::new(401))
      .mount(&server)
      .await;

    let mut redirects = client.subscribe_redirects();

    client.token().set("t");
    assert!(client.companies().list(Page::default()).await.unwrap_err().is_unauthorized());
    assert!(!client.token().is_present());

    client.token().set("t");
    assert!(client.changes().get("c1").await.unwrap_err().is_unauthorized());
    assert!(!client.token().is_present());

    client.token().set("t");
    assert!(client.users().stats().await.unwrap_err().is_unauthorized());
    assert!(!client.token().is_present());

    client.token().set("t");
    assert!(client.auth().login("a@b.co", "x").await.unwrap_err().is_unauthorized());
    assert!(!client.token().is_present());

    let mut bounces = 0;
    while redirects.try_recv().is_ok() {
      bounces += 1;
    }
    assert_eq!(bounces, 4);
  }
}
