use crate::config::MAX_IDLE_PER_HOST;
use crate::transport::{HttpRequest, HttpResponse, Transport, TransportError};
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::Client;
use std::time::Duration;

const LOG_TARGET: &str = "transport::http";

/// Pooled reqwest client; one per logical API client, shared by every call.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
            .build()
            .map_err(|e| TransportError::Network(e.into()))?;
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

fn map_error(err: reqwest::Error) -> TransportError {
    if err.is_builder() || err.is_redirect() {
        TransportError::InvalidRequest(err.to_string())
    } else {
        TransportError::Network(err.into())
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>> {
        async move {
            let mut builder = self
                .client
                .request(request.method.clone(), request.url.clone())
                .headers(request.headers);
            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = builder.send().await.map_err(|e| {
                tracing::debug!(target: LOG_TARGET, "{} {} failed: {}", request.method, request.url, e);
                map_error(e)
            })?;

            let status = response.status();
            let body = response.bytes().await.map_err(map_error)?;
            tracing::debug!(
                target: LOG_TARGET,
                method = %request.method,
                path = request.url.path(),
                status = status.as_u16(),
                bytes = body.len(),
                "response received"
            );

            Ok(HttpResponse { status, body })
        }
        .boxed()
    }
}
