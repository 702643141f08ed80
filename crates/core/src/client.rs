use crate::config::ClientConfig;
use crate::model::{
    service_error, Language, LanguagesResponse, TranslateResponse, TranslationRequest,
    TranslationResult, PLATFORM,
};
use crate::transport::{
    HttpRequest, ReqwestTransport, RetryingTransport, Transport, TransportError,
};
use bytes::Bytes;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use std::sync::Arc;
use url::Url;

const LOG_TARGET: &str = "client";

#[derive(thiserror::Error, Debug)]
pub enum LingvanexError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Message reported by the service in the `err` field, verbatim.
    #[error("{0}")]
    Service(String),
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Issues authenticated calls against the translation API.
///
/// Configuration is fixed at build time (see [`crate::config::ClientBuilder`]),
/// so a client can be cloned and shared across tasks freely. Each call is one
/// logical exchange; retries happen inside the transport. Dropping a pending
/// call aborts the in-flight attempt and any retries still queued.
#[derive(Clone)]
pub struct LingvanexClient<T = ReqwestTransport> {
    config: Arc<ClientConfig>,
    transport: RetryingTransport<T>,
}

impl<T: Transport> LingvanexClient<T> {
    pub(crate) fn new(config: ClientConfig, transport: RetryingTransport<T>) -> Self {
        Self {
            config: Arc::new(config),
            transport,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Lists supported languages. A non-empty `code` asks the service to
    /// localize the listing for that language.
    pub async fn get_languages(&self, code: &str) -> Result<Vec<Language>, LingvanexError> {
        let mut url = parse_url(&self.config.languages_url())?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("platform", PLATFORM);
            if !code.is_empty() {
                query.append_pair("code", code);
            }
        }

        let request = self.request(Method::GET, url, None)?;
        let body = self.send(request).await?;

        let resp: LanguagesResponse = serde_json::from_slice(&body)?;
        if let Some(err) = service_error(resp.err) {
            tracing::warn!(target: LOG_TARGET, "getLanguages rejected: {}", err);
            return Err(LingvanexError::Service(err));
        }

        tracing::debug!(target: LOG_TARGET, count = resp.result.len(), "languages listed");
        Ok(resp.result)
    }

    /// Translates `text` into `target`. An empty `source` lets the service
    /// detect the input language.
    pub async fn translate(
        &self,
        text: &str,
        source: &str,
        target: &str,
    ) -> Result<TranslationResult, LingvanexError> {
        let request = self.translation_request(text, source, target);
        self.translate_request(&request).await
    }

    /// Builds a request carrying this client's transliteration default.
    pub fn translation_request(&self, text: &str, source: &str, target: &str) -> TranslationRequest {
        TranslationRequest::new(text, source, target)
            .with_transliteration(self.config.transliteration)
    }

    pub async fn translate_request(
        &self,
        params: &TranslationRequest,
    ) -> Result<TranslationResult, LingvanexError> {
        let payload = serde_json::to_vec(params).map_err(LingvanexError::Encode)?;
        let url = parse_url(&self.config.translate_url())?;

        let request = self.request(Method::POST, url, Some(Bytes::from(payload)))?;
        let body = self.send(request).await?;

        let resp: TranslateResponse = serde_json::from_slice(&body)?;
        if let Some(err) = service_error(resp.err.clone()) {
            tracing::warn!(target: LOG_TARGET, "translate rejected: {}", err);
            return Err(LingvanexError::Service(err));
        }

        Ok(TranslationResult::from(resp))
    }

    fn request(
        &self,
        method: Method,
        url: Url,
        body: Option<Bytes>,
    ) -> Result<HttpRequest, TransportError> {
        let mut auth = HeaderValue::from_str(self.config.api_key.expose())
            .map_err(|e| TransportError::InvalidRequest(format!("api key: {e}")))?;
        auth.set_sensitive(true);

        let mut request = HttpRequest::new(method, url);
        request.headers.insert(AUTHORIZATION, auth);
        request
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        request.body = body;
        Ok(request)
    }

    async fn send(&self, request: HttpRequest) -> Result<Bytes, TransportError> {
        let exchange = self.transport.execute(request);
        let response = match self.config.deadline {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .map_err(|_| TransportError::DeadlineExceeded(limit))??,
            None => exchange.await?,
        };

        if !response.status.is_success() {
            tracing::debug!(
                target: LOG_TARGET,
                status = response.status.as_u16(),
                "non-success status, decoding body anyway"
            );
        }
        Ok(response.body)
    }
}

fn parse_url(raw: &str) -> Result<Url, TransportError> {
    Url::parse(raw).map_err(|e| TransportError::InvalidRequest(format!("{raw}: {e}")))
}
