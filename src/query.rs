//! Async reads and writes that views poll from their tick.
//!
//! A `Query<T>` owns a fetcher closure and runs it on a spawned task; the
//! view calls `poll()` on every tick and renders whatever state it is in.
//! A `Mutation<T>` is the one-shot counterpart for create/delete/scan: the
//! view starts it, and `poll()` hands back the outcome exactly once so the
//! view can update the store.
//!
//! ```ignore
//! let api = client.clone();
//! let mut query = Query::new(move || {
//!     let api = api.clone();
//!     async move { api.companies(Page::default()).await }
//! });
//! query.fetch();
//!
//! // In tick
//! if query.poll() {
//!     // State changed, re-render
//! }
//! ```

use futures::future::BoxFuture;
use std::future::Future;
use tokio::sync::oneshot;

use crate::api::ApiError;

/// The state of a query
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Query has not been started
  Idle,
  /// Query is currently fetching data
  Loading,
  /// Query completed successfully
  Success(T),
  /// Query failed; the message is ready for display
  Error(String),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error(_))
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<'static, Result<T, ApiError>> + Send + Sync>;

/// Async query for data fetching with state management.
pub struct Query<T> {
  state: QueryState<T>,
  fetcher: FetcherFn<T>,
  receiver: Option<oneshot::Receiver<Result<T, ApiError>>>,
}

impl<T: Send + 'static> Query<T> {
  /// Create a new query with the given fetcher function.
  ///
  /// The fetcher is called each time `fetch()` or `refetch()` starts a
  /// request. Caching happens below, in the API client.
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    Self {
      state: QueryState::Idle,
      fetcher: Box::new(move || Box::pin(fetcher())),
      receiver: None,
    }
  }

  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  pub fn data(&self) -> Option<&T> {
    self.state.data()
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  pub fn is_error(&self) -> bool {
    self.state.is_error()
  }

  pub fn error(&self) -> Option<&str> {
    self.state.error()
  }

  /// Start fetching data if not already loading.
  pub fn fetch(&mut self) {
    if self.state.is_loading() {
      return;
    }
    self.start_fetch();
  }

  /// Force a refetch, dropping any pending result.
  pub fn refetch(&mut self) {
    self.receiver = None;
    self.start_fetch();
  }

  /// Poll for results from a pending fetch.
  ///
  /// Returns `true` if the state changed.
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    match receiver.try_recv() {
      Ok(Ok(data)) => {
        self.state = QueryState::Success(data);
        self.receiver = None;
        true
      }
      Ok(Err(error)) => {
        self.state = QueryState::Error(error.to_string());
        self.receiver = None;
        true
      }
      Err(oneshot::error::TryRecvError::Empty) => false,
      Err(oneshot::error::TryRecvError::Closed) => {
        self.state = QueryState::Error("Query was cancelled".to_string());
        self.receiver = None;
        true
      }
    }
  }

  fn start_fetch(&mut self) {
    let (tx, rx) = oneshot::channel();
    self.receiver = Some(rx);
    self.state = QueryState::Loading;

    let future = (self.fetcher)();
    tokio::spawn(async move {
      // Receiver may have been dropped by a refetch
      let _ = tx.send(future.await);
    });
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("state", &self.state)
      .finish_non_exhaustive()
  }
}

/// A one-shot write started from a view.
pub struct Mutation<T> {
  receiver: Option<oneshot::Receiver<Result<T, ApiError>>>,
}

impl<T> Default for Mutation<T> {
  fn default() -> Self {
    Self { receiver: None }
  }
}

impl<T: Send + 'static> Mutation<T> {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_pending(&self) -> bool {
    self.receiver.is_some()
  }

  /// Start the write. Ignored while another one is pending.
  pub fn start<Fut>(&mut self, future: Fut) -> bool
  where
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    if self.is_pending() {
      return false;
    }
    let (tx, rx) = oneshot::channel();
    self.receiver = Some(rx);
    tokio::spawn(async move {
      let _ = tx.send(future.await);
    });
    true
  }

  /// Take the outcome once it is available.
  pub fn poll(&mut self) -> Option<Result<T, ApiError>> {
    let receiver = self.receiver.as_mut()?;
    match receiver.try_recv() {
      Ok(result) => {
        self.receiver = None;
        Some(result)
      }
      Err(oneshot::error::TryRecvError::Empty) => None,
      Err(oneshot::error::TryRecvError::Closed) => {
        self.receiver = None;
        None
      }
    }
  }
}
