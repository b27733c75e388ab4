use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::broadcast;
use url::Url;

use super::error::ApiError;
use super::token::TokenSlot;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

/// Navigation the HTTP layer forces on the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redirect {
  /// The session was rejected; show the login view.
  Login,
}

/// Thin HTTP wrapper around the tracker REST API.
///
/// Every request goes to `base_url`, carries a JSON content type and, when
/// the token slot holds a token, a bearer `Authorization` header. A 401 on
/// any call evicts the token that call was sent with and publishes
/// [`Redirect::Login`] before the call fails with [`ApiError::Unauthorized`].
/// If the slot already holds a different token the 401 is stale and only the
/// error is returned. No retries happen here.
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base_url: Url,
  token: TokenSlot,
  redirects: broadcast::Sender<Redirect>,
}

impl ApiClient {
  pub fn new(base_url: &str, token: TokenSlot, timeout: Duration) -> Result<Self, ApiError> {
    // Url::join drops the last path segment unless the base ends with '/'
    let base_url = if base_url.ends_with('/') {
      Url::parse(base_url)?
    } else {
      Url::parse(&format!("{}/", base_url))?
    };

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let http = reqwest::Client::builder()
      .default_headers(headers)
      .timeout(timeout)
      .build()?;

    let (redirects, _) = broadcast::channel(16);

    Ok(Self {
      http,
      base_url,
      token,
      redirects,
    })
  }

  pub fn token(&self) -> &TokenSlot {
    &self.token
  }

  /// Subscribe to forced navigations (currently only login bounces).
  pub fn subscribe_redirects(&self) -> broadcast::Receiver<Redirect> {
    self.redirects.subscribe()
  }

  fn url(&self, path: &str) -> Result<Url, ApiError> {
    Ok(self.base_url.join(path.trim_start_matches('/'))?)
  }

  /// Start a request, returning it with the token it carries so a 401 can
  /// be matched against the session that sent it.
  fn request(
    &self,
    method: Method,
    path: &str,
  ) -> Result<(RequestBuilder, Option<String>), ApiError> {
    let builder = self.http.request(method, self.url(path)?);
    let token = self.token.get();
    let builder = match &token {
      Some(token) => builder.bearer_auth(token),
      None => builder,
    };
    Ok((builder, token))
  }

  pub async fn get<T: DeserializeOwned>(&self, path: &str, what: &'static str) -> Result<T, ApiError> {
    let (builder, used) = self.request(Method::GET, path)?;
    self.send(builder, used, what).await
  }

  pub async fn get_query<T, Q>(&self, path: &str, query: &Q, what: &'static str) -> Result<T, ApiError>
  where
    T: DeserializeOwned,
    Q: Serialize + ?Sized,
  {
    let (builder, used) = self.request(Method::GET, path)?;
    self.send(builder.query(query), used, what).await
  }

  pub async fn post_json<T, B>(&self, path: &str, body: &B, what: &'static str) -> Result<T, ApiError>
  where
    T: DeserializeOwned,
    B: Serialize + ?Sized,
  {
    let (builder, used) = self.request(Method::POST, path)?;
    self.send(builder.json(body), used, what).await
  }

  /// POST a url-encoded form. The form content type replaces the JSON default.
  pub async fn post_form<T, F>(&self, path: &str, form: &F, what: &'static str) -> Result<T, ApiError>
  where
    T: DeserializeOwned,
    F: Serialize + ?Sized,
  {
    let (builder, used) = self.request(Method::POST, path)?;
    self.send(builder.form(form), used, what).await
  }

  pub async fn post_empty<T: DeserializeOwned>(
    &self,
    path: &str,
    what: &'static str,
  ) -> Result<T, ApiError> {
    let (builder, used) = self.request(Method::POST, path)?;
    self.send(builder, used, what).await
  }

  pub async fn put_json<T, B>(&self, path: &str, body: &B, what: &'static str) -> Result<T, ApiError>
  where
    T: DeserializeOwned,
    B: Serialize + ?Sized,
  {
    let (builder, used) = self.request(Method::PUT, path)?;
    self.send(builder.json(body), used, what).await
  }

  pub async fn delete<T: DeserializeOwned>(
    &self,
    path: &str,
    what: &'static str,
  ) -> Result<T, ApiError> {
    let (builder, used) = self.request(Method::DELETE, path)?;
    self.send(builder, used, what).await
  }

  async fn send<T: DeserializeOwned>(
    &self,
    builder: RequestBuilder,
    used: Option<String>,
    what: &'static str,
  ) -> Result<T, ApiError> {
    let response = builder.send().await?;
    let status = response.status();
    tracing::debug!(url = %response.url(), %status, "api response");

    if status == StatusCode::UNAUTHORIZED {
      self.bounce_to_login(used.as_deref());
      return Err(ApiError::Unauthorized);
    }

    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(ApiError::Status {
        status,
        detail: extract_detail(&body, status),
      });
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::malformed(what, e))
  }

  fn bounce_to_login(&self, used: Option<&str>) {
    if !self.token.evict_if(used) {
      tracing::debug!("401 for a token that was already replaced, keeping current session");
      return;
    }
    tracing::warn!("request rejected with 401, evicted session token");
    // No subscribers simply means nobody is rendering a login view
    let _ = self.redirects.send(Redirect::Login);
  }
}

impl std::fmt::Debug for ApiClient {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ApiClient")
      .field("base_url", &self.base_url.as_str())
      .field("token", &self.token)
      .finish_non_exhaustive()
  }
}

/// Pull a human readable message out of an error body.
///
/// The backend returns `{"detail": "..."}` for handled errors and
/// `{"detail": [{"msg": "..."}, ...]}` for request validation failures.
fn extract_detail(body: &str, status: StatusCode) -> String {
  let fallback = || {
    status
      .canonical_reason()
      .unwrap_or("request failed")
      .to_string()
  };

  let value: serde_json::Value = match serde_json::from_str(body) {
    Ok(v) => v,
    Err(_) if body.trim().is_empty() => return fallback(),
    Err(_) => return body.trim().to_string(),
  };

  match value.get("detail") {
    Some(serde_json::Value::String(s)) => s.clone(),
    Some(serde_json::Value::Array(items)) => {
      let msgs: Vec<&str> = items
        .iter()
        .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
        .collect();
      if msgs.is_empty() {
        fallback()
      } else {
        msgs.join("; ")
      }
    }
    _ => fallback(),
  }
}
