mod http;
mod retry;

use bytes::Bytes;
use futures::future::BoxFuture;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use std::time::Duration;
use url::Url;

pub use http::ReqwestTransport;
pub use retry::{is_http_retryable, LinearJitterBackoff, RetryPolicy, RetryingTransport};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(#[source] BoxError),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("{method} {url} giving up after {attempts} attempt(s): {last}")]
    RetriesExhausted {
        method: Method,
        url: String,
        attempts: u32,
        last: String,
    },
    #[error("deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
}

impl TransportError {
    /// Connection-level failures are worth another attempt; malformed
    /// requests and expired deadlines are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Network(_))
    }
}

/// Performs a single HTTP exchange.
pub trait Transport: Send + Sync {
    fn execute(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>>;
}
