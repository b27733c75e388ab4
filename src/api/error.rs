use reqwest::StatusCode;
use thiserror::Error;

/// Errors produced by the tracker API layer.
///
/// `Unauthorized` is special: by the time a caller sees it the token it was
/// sent with has already been evicted and a login redirect published.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("network error: {0}")]
  Transport(#[from] reqwest::Error),

  #[error("session expired, please log in again")]
  Unauthorized,

  #[error("server returned {status}: {detail}")]
  Status { status: StatusCode, detail: String },

  #[error("malformed {what} payload: {reason}")]
  Malformed { what: &'static str, reason: String },

  #[error("invalid input: {0}")]
  InvalidInput(String),

  #[error("invalid url: {0}")]
  InvalidUrl(#[from] url::ParseError),
}

impl ApiError {
  pub fn malformed(what: &'static str, reason: impl ToString) -> Self {
    Self::Malformed {
      what,
      reason: reason.to_string(),
    }
  }

  /// Whether the cache layer may retry a fetch that failed with this error.
  ///
  /// A 401 has already cleared the token, so a retry can only fail the same way.
  /// Validation failures on either side are deterministic.
  pub fn is_retryable(&self) -> bool {
    !matches!(
      self,
      ApiError::Unauthorized
        | ApiError::Malformed { .. }
        | ApiError::InvalidInput(_)
        | ApiError::InvalidUrl(_)
    )
  }

  pub fn is_unauthorized(&self) -> bool {
    matches!(self, ApiError::Unauthorized)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_unauthorized_is_not_retryable() {
    assert!(!ApiError::Unauthorized.is_retryable());
    assert!(!ApiError::InvalidInput("name".into()).is_retryable());
  }

  #[test]
  fn test_status_errors_are_retryable() {
    let err = ApiError::Status {
      status: StatusCode::BAD_GATEWAY,
      detail: "upstream".into(),
    };
    assert!(err.is_retryable());
    assert_eq!(err.to_string(), "server returned 502 Bad Gateway: upstream");
  }

  #[test]
  fn test_malformed_message() {
    let err = ApiError::malformed("company", "missing id");
    assert_eq!(err.to_string(), "malformed company payload: missing id");
    assert!(!err.is_retryable());
  }
}
