//! Cached tracker client that wraps ApiClient with transparent caching.

use chrono::Utc;
use color_eyre::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;

use crate::cache::{CacheLayer, CacheSource, MemoryStorage, NoopStorage, QueryKey};
use crate::config::Config;

use super::cache::{scope, TrackerQueryKey};
use super::client::ApiClient;
use super::error::ApiError;
use super::token::TokenSlot;
use super::types::{
  Ack, Change, ChangeDetail, ChangeFilter, Company, CompanyDetail, NewCompany, Page,
  ProfileUpdate, UsageStats, UserProfile,
};

/// Tracker client with transparent caching support.
///
/// Reads go through the cache; every mutation invalidates the keys whose
/// data it changes so the next read refetches.
#[derive(Clone)]
pub struct CachedTrackerClient {
  inner: ApiClient,
  cache: CacheLayer,
}

impl CachedTrackerClient {
  pub fn new(inner: ApiClient, cache: CacheLayer) -> Self {
    Self { inner, cache }
  }

  /// Build the client and cache described by the configuration.
  pub fn from_config(config: &Config, token: TokenSlot) -> Result<Self> {
    let inner = ApiClient::new(&config.api.url, token, config.api.timeout())?;

    let cache = if config.cache.enabled {
      CacheLayer::new(MemoryStorage::new())
    } else {
      CacheLayer::new(NoopStorage)
    }
    .with_stale_time(config.cache.stale_time())
    .with_retry_delay(config.cache.retry_delay());

    Ok(Self::new(inner, cache))
  }

  /// Client for a test server: unpersisted token, no retry pause.
  #[cfg(test)]
  pub fn for_server(uri: &str) -> Self {
    let inner = ApiClient::new(uri, TokenSlot::in_memory(), std::time::Duration::from_secs(5))
      .expect("mock server uri is a valid base url");
    let cache = CacheLayer::new(MemoryStorage::new()).with_retry_delay(std::time::Duration::ZERO);
    Self::new(inner, cache)
  }

  pub fn api(&self) -> &ApiClient {
    &self.inner
  }

  pub fn cache(&self) -> &CacheLayer {
    &self.cache
  }

  // ==========================================================================
  // Session
  // ==========================================================================

  /// Log in and load the profile of the new session.
  ///
  /// The token is only kept if the profile loads too.
  pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile, ApiError> {
    let token = self.inner.auth().login(email, password).await?.access_token;
    // Whatever was cached belongs to the previous session
    self.cache.clear();
    self.inner.token().set(token.clone());

    match self.inner.users().me().await {
      Ok(profile) => {
        tracing::info!(user = %profile.email, plan = %profile.plan, "logged in");
        Ok(profile)
      }
      Err(e) => {
        // A 401 on the profile call already cleared it
        self.inner.token().evict_if(Some(token.as_str()));
        Err(e)
      }
    }
  }

  /// Create an account, then log into it.
  pub async fn register(
    &self,
    email: &str,
    password: &str,
    name: &str,
  ) -> Result<UserProfile, ApiError> {
    let created = self.inner.auth().register(email, password, name).await?;
    tracing::info!(user = %created.email, "registered account");
    self.login(email, password).await
  }

  /// Forget the token and every cached payload.
  pub fn logout(&self) {
    self.inner.token().evict();
    self.cache.clear();
    tracing::info!("logged out");
  }

  pub fn has_session_token(&self) -> bool {
    self.inner.token().is_present()
  }

  pub async fn profile(&self) -> Result<UserProfile, ApiError> {
    self
      .read(TrackerQueryKey::Profile, || self.inner.users().me())
      .await
  }

  pub async fn update_profile(&self, update: ProfileUpdate) -> Result<UserProfile, ApiError> {
    let update = update.validated()?;
    let profile = self.inner.users().update_me(&update).await?;
    tracing::info!(user = %profile.email, "profile updated");
    self.cache.invalidate(&TrackerQueryKey::Profile);
    Ok(profile)
  }

  // ==========================================================================
  // Reads
  // ==========================================================================

  async fn read<T, F, Fut>(&self, key: TrackerQueryKey, fetcher: F) -> Result<T, ApiError>
  where
    T: Serialize + DeserializeOwned,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
  {
    let result = self.cache.fetch(&key, fetcher).await?;
    if let (CacheSource::Cache, Some(cached_at)) = (result.source, result.cached_at) {
      tracing::trace!(
        key = %key.description(),
        age_secs = (Utc::now() - cached_at).num_seconds(),
        "served from cache"
      );
    }
    Ok(result.data)
  }

  pub async fn companies(&self, page: Page) -> Result<Vec<Company>, ApiError> {
    self
      .read(TrackerQueryKey::Companies { page }, || {
        self.inner.companies().list(page)
      })
      .await
  }

  pub async fn company(&self, id: &str) -> Result<CompanyDetail, ApiError> {
    let key = TrackerQueryKey::Company { id: id.to_string() };
    self.read(key, || self.inner.companies().get(id)).await
  }

  pub async fn changes(&self, filter: ChangeFilter) -> Result<Vec<Change>, ApiError> {
    let filter = filter.validated()?;
    let key = TrackerQueryKey::Changes {
      filter: filter.clone(),
    };
    self.read(key, || self.inner.changes().list(&filter)).await
  }

  pub async fn change(&self, id: &str) -> Result<ChangeDetail, ApiError> {
    let key = TrackerQueryKey::Change { id: id.to_string() };
    self.read(key, || self.inner.changes().get(id)).await
  }

  pub async fn usage_stats(&self) -> Result<UsageStats, ApiError> {
    self
      .read(TrackerQueryKey::UsageStats, || self.inner.users().stats())
      .await
  }

  // ==========================================================================
  // Mutations
  // ==========================================================================

  pub async fn create_company(&self, company: NewCompany) -> Result<Company, ApiError> {
    let company = company.validated()?;
    let created = self.inner.companies().create(&company).await?;
    tracing::info!(id = %created.id, name = %created.name, "company created");
    self.cache.invalidate_scope(scope::COMPANIES);
    self.cache.invalidate(&TrackerQueryKey::UsageStats);
    Ok(created)
  }

  /// Delete a company. Only the company list is invalidated.
  pub async fn delete_company(&self, id: &str) -> Result<Ack, ApiError> {
    let ack = self.inner.companies().delete(id).await?;
    tracing::info!(id, "company deleted");
    self.cache.invalidate_scope(scope::COMPANIES);
    Ok(ack)
  }

  /// Trigger a rescan. Status and last-scanned time change server side, so
  /// both the list and the company's own entry are invalidated.
  pub async fn scan_company(&self, id: &str) -> Result<Ack, ApiError> {
    let ack = self.inner.companies().scan(id).await?;
    tracing::info!(id, "scan triggered");
    self.cache.invalidate_scope(scope::COMPANIES);
    self.cache.invalidate(&TrackerQueryKey::Company { id: id.to_string() });
    Ok(ack)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::{SessionState, Store};
  use serde_json::json;
  use wiremock::matchers::{method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  async fn setup() -> (MockServer, CachedTrackerClient) {
    let server = MockServer::start().await;
    let client = CachedTrackerClient::for_server(&server.uri());
    (server, client)
  }

  fn acme() -> serde_json::Value {
    json!({"id": "1", "name": "Acme", "url": "acme.com", "status": "active"})
  }

  async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
      .and(path("/auth/token"))
      .respond_with(
        ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok", "token_type": "bearer"})),
      )
      .mount(server)
      .await;
    Mock::given(method("GET"))
      .and(path("/users/me"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "id": "u1", "email": "ann@acme.com", "name": "Ann", "plan": "pro"
      })))
      .mount(server)
      .await;
  }

  #[tokio::test]
  async fn test_repeated_reads_hit_network_once() {
    let (server, client) = setup().await;
    Mock::given(method("GET"))
      .and(path("/companies"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([acme()])))
      .expect(1)
      .mount(&server)
      .await;

    let first = client.companies(Page::default()).await.unwrap();
    let second = client.companies(Page::default()).await.unwrap();
    assert_eq!(first, second);
  }

  #[tokio::test]
  async fn test_delete_invalidates_company_list_only() {
    let (server, client) = setup().await;
    Mock::given(method("GET"))
      .and(path("/companies"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([acme()])))
      .expect(2)
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/changes"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
      .expect(1)
      .mount(&server)
      .await;
    Mock::given(method("DELETE"))
      .and(path("/companies/1"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "deleted"})))
      .expect(1)
      .mount(&server)
      .await;

    let store = Store::new();
    store.set_companies(client.companies(Page::default()).await.unwrap());
    client.changes(ChangeFilter::recent(10)).await.unwrap();

    client.delete_company("1").await.unwrap();
    store.remove_company("1");
    assert!(store.companies().is_empty());

    // Next render refetches the list but not the change feed
    client.companies(Page::default()).await.unwrap();
    client.changes(ChangeFilter::recent(10)).await.unwrap();
  }

  #[tokio::test]
  async fn test_scan_invalidates_company_entry() {
    let (server, client) = setup().await;
    let mut detail = acme();
    detail["total_changes"] = json!(4);
    Mock::given(method("GET"))
      .and(path("/companies/1"))
      .respond_with(ResponseTemplate::new(200).set_body_json(detail))
      .expect(2)
      .mount(&server)
      .await;
    Mock::given(method("POST"))
      .and(path("/companies/1/scan"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "ok"})))
      .expect(1)
      .mount(&server)
      .await;

    assert_eq!(client.company("1").await.unwrap().total_changes, 4);
    client.scan_company("1").await.unwrap();
    client.company("1").await.unwrap();
  }

  #[tokio::test]
  async fn test_create_rejects_invalid_body_without_network() {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
      .and(path("/companies"))
      .respond_with(ResponseTemplate::new(200).set_body_json(acme()))
      .expect(0)
      .mount(&server)
      .await;

    let err = client
      .create_company(NewCompany::new("", "acme.com"))
      .await
      .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));
  }

  #[tokio::test]
  async fn test_login_populates_session() {
    let (server, client) = setup().await;
    mount_login(&server).await;

    let store = Store::new();
    let profile = client.login("ann@acme.com", "pw").await.unwrap();
    store.login(profile);

    assert!(client.has_session_token());
    match store.session() {
      SessionState::Authenticated(user) => {
        assert_eq!(user.id, "u1");
        assert_eq!(user.email, "ann@acme.com");
        assert_eq!(user.name, "Ann");
        assert_eq!(user.plan, "pro");
      }
      SessionState::Anonymous => panic!("expected an authenticated session"),
    }
  }

  #[tokio::test]
  async fn test_failed_login_stays_anonymous() {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
      .and(path("/auth/token"))
      .respond_with(
        ResponseTemplate::new(401).set_body_json(json!({"detail": "Incorrect email or password"})),
      )
      .mount(&server)
      .await;

    let store = Store::new();
    let result = client.login("ann@acme.com", "wrong").await;
    if let Ok(profile) = result {
      store.login(profile);
    }

    assert!(!client.has_session_token());
    assert_eq!(store.session(), SessionState::Anonymous);
  }

  #[tokio::test]
  async fn test_login_drops_token_when_profile_fails() {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
      .and(path("/auth/token"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok"})))
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/users/me"))
      .respond_with(ResponseTemplate::new(500))
      .mount(&server)
      .await;

    assert!(client.login("ann@acme.com", "pw").await.is_err());
    assert!(!client.has_session_token());
  }

  #[tokio::test]
  async fn test_profile_update_refreshes_cached_profile() {
    let (server, client) = setup().await;
    Mock::given(method("GET"))
      .and(path("/users/me"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "id": "u1", "email": "ann@acme.com", "name": "Ann", "plan": "pro"
      })))
      .expect(2)
      .mount(&server)
      .await;
    Mock::given(method("PUT"))
      .and(path("/users/me"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "id": "u1", "email": "ann@acme.com", "name": "Annie", "plan": "pro"
      })))
      .expect(1)
      .mount(&server)
      .await;

    client.profile().await.unwrap();
    client.profile().await.unwrap();

    let update = ProfileUpdate {
      name: Some("Annie".into()),
      ..ProfileUpdate::default()
    };
    assert_eq!(client.update_profile(update).await.unwrap().name, "Annie");

    // The cached profile was dropped, so this read goes back to the server
    client.profile().await.unwrap();
  }

  #[tokio::test]
  async fn test_logout_clears_cache() {
    let (server, client) = setup().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
      .and(path("/users/stats"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"companies_tracked": 1})))
      .expect(2)
      .mount(&server)
      .await;

    client.login("ann@acme.com", "pw").await.unwrap();
    client.usage_stats().await.unwrap();
    client.logout();
    assert!(!client.has_session_token());

    client.login("ann@acme.com", "pw").await.unwrap();
    client.usage_stats().await.unwrap();
  }
}
