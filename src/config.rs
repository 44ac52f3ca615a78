use crate::error::{QuartzBioError, QuartzBioResult};
use std::time::Duration;
use url::Url;

/// Environment variables checked for each setting, first match wins
const API_HOST_VARS: &[&str] = &["QUARTZBIO_API_HOST", "SOLVEBIO_API_HOST", "EDP_API_HOST"];
const API_KEY_VARS: &[&str] = &["QUARTZBIO_API_KEY", "SOLVEBIO_API_KEY", "EDP_API_KEY"];
const ACCESS_TOKEN_VARS: &[&str] = &[
    "QUARTZBIO_ACCESS_TOKEN",
    "SOLVEBIO_ACCESS_TOKEN",
    "EDP_ACCESS_TOKEN",
];

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Bounded retry applied to raw uploads against pre-signed URLs.
///
/// Attempt `n` (1-based) waits `backoff * n` before it is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::ZERO,
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_host: String,
    /// Sent as `Authorization: Token <key>`
    pub api_key: Option<String>,
    /// OAuth2 token, sent as `Authorization: Bearer <token>`; wins over `api_key`
    pub access_token: Option<String>,
    pub timeout: Option<Duration>,
    pub retry: RetryPolicy,
}

impl ClientConfig {
    pub fn new(api_host: impl Into<String>) -> Self {
        Self {
            api_host: api_host.into(),
            api_key: None,
            access_token: None,
            timeout: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Read the configuration from the process environment
    pub fn from_env() -> QuartzBioResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> QuartzBioResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |names: &[&str]| {
            names
                .iter()
                .filter_map(|name| lookup(name))
                .find(|value| !value.is_empty())
        };

        let api_host = first(API_HOST_VARS)
            .ok_or_else(|| QuartzBioError::Config("No QuartzBio API host is set".to_string()))?;

        Ok(Self {
            api_host,
            api_key: first(API_KEY_VARS),
            access_token: first(ACCESS_TOKEN_VARS),
            timeout: None,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> QuartzBioResult<Url> {
        validate_api_host_url(&self.api_host)
    }
}

/// Validate an API host URL.
///
/// Hosts without a scheme default to https. Only http and https are accepted
/// and a host name is required.
pub fn validate_api_host_url(host: &str) -> QuartzBioResult<Url> {
    let host = host.trim();
    if host.is_empty() {
        return Err(QuartzBioError::Config("No QuartzBio API host is set".to_string()));
    }

    let with_scheme = if host.contains("://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    };

    let url = Url::parse(&with_scheme)
        .map_err(|e| QuartzBioError::Config(format!("Invalid API host: {} ({})", host, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(QuartzBioError::Config(format!(
            "Invalid API host: {}. Missing url scheme (HTTP or HTTPS).",
            host
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(QuartzBioError::Config(format!("Invalid API host: {}.", host)));
    }

    Ok(url)
}
