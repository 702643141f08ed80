//! Retrying transport with linear-jitter backoff
//!
//! Wraps any [`Transport`] and repeats an exchange when it fails with a
//! connection error or a retryable HTTP status, up to `retry_max` extra
//! attempts.

use crate::config::{DEFAULT_RETRY_MAX, DEFAULT_RETRY_WAIT_MAX, DEFAULT_RETRY_WAIT_MIN};
use crate::transport::{HttpRequest, HttpResponse, Transport, TransportError};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

const LOG_TARGET: &str = "transport::retry";

/// Retry ceiling and backoff bounds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts allowed after the first one
    pub retry_max: u32,
    pub wait_min: Duration,
    pub wait_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_max: DEFAULT_RETRY_MAX,
            wait_min: DEFAULT_RETRY_WAIT_MIN,
            wait_max: DEFAULT_RETRY_WAIT_MAX,
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self) -> LinearJitterBackoff {
        LinearJitterBackoff {
            min: self.wait_min,
            max: self.wait_max,
        }
    }

    pub fn total_attempts(&self) -> u32 {
        self.retry_max.saturating_add(1)
    }

    /// Whether an outcome warrants another attempt.
    pub fn should_retry(&self, outcome: &Result<HttpResponse, TransportError>) -> bool {
        match outcome {
            Ok(resp) => is_http_retryable(resp.status.as_u16()),
            Err(e) => e.is_retryable(),
        }
    }
}

/// Delay grows linearly with the attempt number; each wait is drawn
/// uniformly from `[min, max)` before scaling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinearJitterBackoff {
    pub min: Duration,
    pub max: Duration,
}

impl LinearJitterBackoff {
    /// `attempt` is zero-based: the wait after the first failure uses 0.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = attempt.saturating_add(1);
        if self.max <= self.min {
            return self.min.saturating_mul(factor);
        }
        let jitter = (self.max - self.min).mul_f64(rand::random::<f64>());
        (self.min + jitter).saturating_mul(factor)
    }
}

/// Server errors other than 501 and rate limiting are transient.
pub fn is_http_retryable(status: u16) -> bool {
    status == 429 || ((500..=599).contains(&status) && status != 501)
}

#[derive(Clone)]
pub struct RetryingTransport<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: Transport> RetryingTransport<T> {
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T: Transport> Transport for RetryingTransport<T> {
    fn execute(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>> {
        async move {
            let backoff = self.policy.backoff();
            let mut last = String::new();

            for attempt in 0..self.policy.total_attempts() {
                if attempt > 0 {
                    info!(
                        target: LOG_TARGET,
                        path = request.url.path(),
                        attempt,
                        "retry url {} attempt {}",
                        request.url.path(),
                        attempt
                    );
                }
                debug!(target: LOG_TARGET, "{} {}", request.method, request.url);

                let outcome = self.inner.execute(request.clone()).await;
                if !self.policy.should_retry(&outcome) {
                    return outcome;
                }

                last = match &outcome {
                    Ok(resp) => format!("unexpected HTTP status {}", resp.status),
                    Err(e) => e.to_string(),
                };
                debug!(target: LOG_TARGET, "{} {} request failed: {}", request.method, request.url, last);

                if attempt < self.policy.retry_max {
                    let delay = backoff.delay_for_attempt(attempt);
                    debug!(target: LOG_TARGET, "{} {} retrying in {:?}", request.method, request.url, delay);
                    sleep(delay).await;
                }
            }

            Err(TransportError::RetriesExhausted {
                method: request.method.clone(),
                url: request.url.to_string(),
                attempts: self.policy.total_attempts(),
                last,
            })
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use reqwest::{Method, StatusCode};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use url::Url;

    /// Fails with `failure` for the first `failures` calls, then answers 200.
    #[derive(Clone)]
    struct FlakyTransport {
        calls: Arc<AtomicU32>,
        failures: u32,
        failure: fn() -> Result<HttpResponse, TransportError>,
    }

    impl FlakyTransport {
        fn new(failures: u32, failure: fn() -> Result<HttpResponse, TransportError>) -> Self {
            Self {
                calls: Arc::new(AtomicU32::new(0)),
                failures,
                failure,
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Transport for FlakyTransport {
        fn execute(
            &self,
            _request: HttpRequest,
        ) -> BoxFuture<'_, Result<HttpResponse, TransportError>> {
            async move {
                let n = self.calls.fetch_add(1, Ordering::SeqCst);
                if n < self.failures {
                    (self.failure)()
                } else {
                    Ok(status(StatusCode::OK))
                }
            }
            .boxed()
        }
    }

    fn status(code: StatusCode) -> HttpResponse {
        HttpResponse {
            status: code,
            body: Bytes::from_static(b"{}"),
        }
    }

    fn refused() -> Result<HttpResponse, TransportError> {
        Err(TransportError::Network(
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused").into(),
        ))
    }

    fn unavailable() -> Result<HttpResponse, TransportError> {
        Ok(status(StatusCode::SERVICE_UNAVAILABLE))
    }

    fn bad_request() -> Result<HttpResponse, TransportError> {
        Ok(status(StatusCode::BAD_REQUEST))
    }

    fn invalid() -> Result<HttpResponse, TransportError> {
        Err(TransportError::InvalidRequest("unsupported scheme".to_owned()))
    }

    fn no_wait(retry_max: u32) -> RetryPolicy {
        RetryPolicy {
            retry_max,
            wait_min: Duration::ZERO,
            wait_max: Duration::ZERO,
        }
    }

    fn request() -> HttpRequest {
        HttpRequest::new(
            Method::GET,
            Url::parse("http://localhost/v3/getLanguages").expect("url"),
        )
    }

    /// In-memory sink for the fmt subscriber.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn lines(&self) -> Vec<String> {
            let buf = self.0.lock().expect("lock");
            String::from_utf8_lossy(&buf).lines().map(str::to_owned).collect()
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_linear_backoff_without_jitter() {
        let b = LinearJitterBackoff {
            min: Duration::from_millis(100),
            max: Duration::from_millis(100),
        };
        assert_eq!(b.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(b.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(b.delay_for_attempt(4), Duration::from_millis(500));
    }

    #[test]
    fn test_linear_backoff_jitter_stays_in_bounds() {
        let b = LinearJitterBackoff {
            min: Duration::from_millis(100),
            max: Duration::from_millis(300),
        };
        for attempt in 0..5 {
            let factor = attempt + 1;
            for _ in 0..50 {
                let d = b.delay_for_attempt(attempt);
                assert!(d >= Duration::from_millis(100) * factor);
                assert!(d <= Duration::from_millis(300) * factor);
            }
        }
    }

    #[test]
    fn test_zero_bounds_mean_no_wait() {
        assert_eq!(no_wait(3).backoff().delay_for_attempt(2), Duration::ZERO);
    }

    #[test]
    fn test_is_http_retryable() {
        assert!(is_http_retryable(500));
        assert!(is_http_retryable(502));
        assert!(is_http_retryable(503));
        assert!(is_http_retryable(429)); // Too Many Requests
        assert!(!is_http_retryable(501)); // Not Implemented
        assert!(!is_http_retryable(200));
        assert!(!is_http_retryable(400));
        assert!(!is_http_retryable(401));
        assert!(!is_http_retryable(404));
    }

    #[tokio::test]
    async fn logs_each_retry_with_path_and_attempt() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let flaky = FlakyTransport::new(2, refused);
        let transport = RetryingTransport::new(flaky.clone(), no_wait(5));
        transport.execute(request()).await.expect("third attempt succeeds");
        assert_eq!(flaky.calls(), 3);

        let retries: Vec<String> = logs
            .lines()
            .into_iter()
            .filter(|l| l.contains("retry url"))
            .collect();
        assert_eq!(retries.len(), 2, "captured: {retries:?}");
        assert!(retries[0].contains("retry url /v3/getLanguages attempt 1"));
        assert!(retries[0].contains("attempt=1"));
        assert!(retries[1].contains("retry url /v3/getLanguages attempt 2"));
        assert!(retries[1].contains("path=\"/v3/getLanguages\""));
    }

    #[tokio::test]
    async fn first_attempt_is_not_logged_as_retry() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let transport = RetryingTransport::new(FlakyTransport::new(0, refused), no_wait(5));
        transport.execute(request()).await.expect("first attempt succeeds");

        assert!(logs.lines().iter().all(|l| !l.contains("retry url")));
    }

    #[tokio::test]
    async fn succeeds_on_nth_attempt() {
        for n in 1..=4 {
            let flaky = FlakyTransport::new(n - 1, refused);
            let transport = RetryingTransport::new(flaky.clone(), no_wait(5));
            let resp = transport.execute(request()).await.expect("eventually succeeds");
            assert_eq!(resp.status, StatusCode::OK);
            assert_eq!(flaky.calls(), n);
        }
    }

    #[tokio::test]
    async fn retries_retryable_status_codes() {
        let flaky = FlakyTransport::new(2, unavailable);
        let transport = RetryingTransport::new(flaky.clone(), no_wait(5));
        let resp = transport.execute(request()).await.expect("eventually succeeds");
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(flaky.calls(), 3);
    }

    #[tokio::test]
    async fn exhaustion_makes_retry_max_plus_one_attempts() {
        let flaky = FlakyTransport::new(u32::MAX, unavailable);
        let transport = RetryingTransport::new(flaky.clone(), no_wait(3));
        let err = transport.execute(request()).await.expect_err("always fails");
        assert_eq!(flaky.calls(), 4);
        match err {
            TransportError::RetriesExhausted { attempts, method, .. } => {
                assert_eq!(attempts, 4);
                assert_eq!(method, Method::GET);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn zero_retry_max_makes_a_single_attempt() {
        let flaky = FlakyTransport::new(u32::MAX, refused);
        let transport = RetryingTransport::new(flaky.clone(), no_wait(0));
        assert!(transport.execute(request()).await.is_err());
        assert_eq!(flaky.calls(), 1);
    }

    #[tokio::test]
    async fn client_errors_are_returned_without_retry() {
        let flaky = FlakyTransport::new(u32::MAX, bad_request);
        let transport = RetryingTransport::new(flaky.clone(), no_wait(5));
        let resp = transport.execute(request()).await.expect("4xx is a response");
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
        assert_eq!(flaky.calls(), 1);
    }

    #[tokio::test]
    async fn invalid_requests_are_not_retried() {
        let flaky = FlakyTransport::new(u32::MAX, invalid);
        let transport = RetryingTransport::new(flaky.clone(), no_wait(5));
        let err = transport.execute(request()).await.expect_err("invalid");
        assert!(matches!(err, TransportError::InvalidRequest(_)));
        assert_eq!(flaky.calls(), 1);
    }
}
