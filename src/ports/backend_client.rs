use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Custom error type for backend client operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BackendError {
    /// Error when connection to the remote host fails (DNS, TCP, TLS)
    #[error("{0}")]
    Connection(String),

    /// Error when the remote call exceeds its timeout
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// Error when the described request cannot be built (bad method, URL, header, proxy)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Error when the client has already been closed
    #[error("backend client is closed")]
    Closed,
}

/// Result type alias for backend client operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Cookie in the shape the backend client expects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendCookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub domain: String,
    pub expires: Option<DateTime<Utc>>,
    pub max_age: i64,
    pub secure: bool,
}

/// Per-call options bundle handed to [`BackendClient::execute`].
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub cookies: Vec<BackendCookie>,
    pub body: String,
    pub proxy: Option<String>,
    pub timeout: Duration,
    /// Effective headers in application order; a later entry wins over an earlier one
    /// whose name compares equal ignoring ASCII case.
    pub headers: Vec<(String, String)>,
    /// Opaque TLS fingerprint selector, passed through unmodified.
    pub fingerprint: Option<String>,
    pub user_agent: String,
    pub disable_redirect: bool,
}

/// Status and body returned by the remote host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendResponse {
    pub status: u16,
    pub body: String,
}

/// BackendClient defines the port (interface) for executing a single outbound HTTP request.
///
/// Implementations are long-lived, shared by every in-flight request and must be safe
/// for concurrent use; the gateway adds no locking around them.
#[async_trait]
pub trait BackendClient: Send + Sync + 'static {
    /// Execute one request against `url` with the given options and method
    ///
    /// # Returns
    /// The remote status and body, or the failure that prevented obtaining one
    async fn execute(
        &self,
        url: &str,
        options: RequestOptions,
        method: &str,
    ) -> BackendResult<BackendResponse>;

    /// Release the client's resources. Called once at shutdown.
    async fn close(&self);
}
