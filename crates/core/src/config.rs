use crate::client::LingvanexClient;
use crate::transport::{ReqwestTransport, RetryPolicy, RetryingTransport, Transport, TransportError};
use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};

pub const DEFAULT_BASE_URL: &str = "https://api-b2b.backenster.com/b1/api/v3";
pub const DEFAULT_RETRY_MAX: u32 = 5;
pub const DEFAULT_CONN_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_RETRY_WAIT_MIN: Duration = Duration::from_secs(1);
pub const DEFAULT_RETRY_WAIT_MAX: Duration = Duration::from_secs(30);
pub const MAX_IDLE_PER_HOST: usize = 10;

pub const LANGUAGES_PATH: &str = "/getLanguages";
pub const TRANSLATE_PATH: &str = "/translate";

pub const ENV_LINGVANEX_API_KEY: &str = "LINGVANEX_API_KEY";
pub const ENV_LINGVANEX_API_URL: &str = "LINGVANEX_API_URL";

/// Raw value sent in the `Authorization` header.
///
/// Not validated: a bad key is reported by the service on the first call.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ApiKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ApiKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(**redacted**)")
    }
}

/// Connection and retry parameters, fixed once the client is built.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: ApiKey,
    pub retry_max: u32,
    pub conn_timeout: Duration,
    pub transliteration: bool,
    pub retry_wait_min: Duration,
    pub retry_wait_max: Duration,
    /// Upper bound on a whole operation, retries included.
    pub deadline: Option<Duration>,
}

impl ClientConfig {
    pub fn languages_url(&self) -> String {
        format!("{}{}", self.base_url, LANGUAGES_PATH)
    }

    pub fn translate_url(&self) -> String {
        format!("{}{}", self.base_url, TRANSLATE_PATH)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retry_max: self.retry_max,
            wait_min: self.retry_wait_min,
            wait_max: self.retry_wait_max,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            api_key: ApiKey::default(),
            retry_max: DEFAULT_RETRY_MAX,
            conn_timeout: DEFAULT_CONN_TIMEOUT,
            transliteration: false,
            retry_wait_min: DEFAULT_RETRY_WAIT_MIN,
            retry_wait_max: DEFAULT_RETRY_WAIT_MAX,
            deadline: None,
        }
    }
}

/// Collects overrides and finalizes them into an immutable [`LingvanexClient`].
#[derive(Clone, Debug, Default)]
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: ClientConfig) -> Self {
        Self { config }
    }

    pub fn retry_max(mut self, retry_max: u32) -> Self {
        self.config.retry_max = retry_max;
        self
    }

    pub fn conn_timeout(mut self, conn_timeout: Duration) -> Self {
        self.config.conn_timeout = conn_timeout;
        self
    }

    pub fn base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    pub fn api_key<K: Into<ApiKey>>(mut self, api_key: K) -> Self {
        self.config.api_key = api_key.into();
        self
    }

    pub fn transliteration(mut self, enable: bool) -> Self {
        self.config.transliteration = enable;
        self
    }

    pub fn retry_wait(mut self, min: Duration, max: Duration) -> Self {
        self.config.retry_wait_min = min;
        self.config.retry_wait_max = max;
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.config.deadline = Some(deadline);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn build(self) -> Result<LingvanexClient, TransportError> {
        let transport = ReqwestTransport::new(self.config.conn_timeout)?;
        Ok(self.build_with_transport(transport))
    }

    pub fn build_with_transport<T: Transport>(self, transport: T) -> LingvanexClient<T> {
        let retrying = RetryingTransport::new(transport, self.config.retry_policy());
        LingvanexClient::new(self.config, retrying)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("api key must not be empty")]
    EmptyApiKey,
    #[error("api key is missing (pass --api-key or set LINGVANEX_API_KEY)")]
    MissingApiKey,
}

pub trait Env {
    fn var(&self, key: &str) -> Option<String>;
}

#[derive(Clone, Debug, Default)]
pub struct StdEnv;

impl Env for StdEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MapEnv {
    vars: std::collections::BTreeMap<String, String>,
}

impl MapEnv {
    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_owned(), value.to_owned());
        self
    }
}

impl Env for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

/// CLI value first, then the environment. Blank keys are rejected here
/// rather than sent to the service.
pub fn resolve_api_key(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
) -> Result<ApiKey, ConfigError> {
    let value = match cli_value {
        Some(v) => v,
        None => env.var(env_key).ok_or(ConfigError::MissingApiKey)?,
    };
    if value.trim().is_empty() {
        return Err(ConfigError::EmptyApiKey);
    }
    Ok(ApiKey::new(value))
}

pub fn resolve_string_with_default(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
    default: &str,
) -> String {
    match cli_value {
        Some(v) => v,
        None => env.var(env_key).unwrap_or_else(|| default.to_owned()),
    }
}
