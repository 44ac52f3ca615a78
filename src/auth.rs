use crate::error::{QuartzBioError, QuartzBioResult};

/// Authentication trait for the QuartzBio API
#[async_trait::async_trait]
pub trait Authentication: Send + Sync {
    /// Apply authentication to the request headers
    async fn apply_auth(&self, headers: &mut reqwest::header::HeaderMap) -> QuartzBioResult<()>;
}

fn insert_authorization(
    headers: &mut reqwest::header::HeaderMap,
    auth_value: String,
) -> QuartzBioResult<()> {
    headers.insert(
        reqwest::header::AUTHORIZATION,
        auth_value
            .parse()
            .map_err(|e| QuartzBioError::auth_error(format!("Invalid auth header: {}", e)))?,
    );
    Ok(())
}

/// API key authentication (`Authorization: Token <key>`)
#[derive(Debug, Clone)]
pub struct TokenAuth {
    api_key: String,
}

impl TokenAuth {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }
}

#[async_trait::async_trait]
impl Authentication for TokenAuth {
    async fn apply_auth(&self, headers: &mut reqwest::header::HeaderMap) -> QuartzBioResult<()> {
        insert_authorization(headers, format!("Token {}", self.api_key))
    }
}

/// OAuth2 access token authentication
#[derive(Debug, Clone)]
pub struct BearerAuth {
    token: String,
}

impl BearerAuth {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait::async_trait]
impl Authentication for BearerAuth {
    async fn apply_auth(&self, headers: &mut reqwest::header::HeaderMap) -> QuartzBioResult<()> {
        insert_authorization(headers, format!("Bearer {}", self.token))
    }
}

/// No authentication
#[derive(Debug, Clone)]
pub struct NoAuth;

#[async_trait::async_trait]
impl Authentication for NoAuth {
    async fn apply_auth(&self, _headers: &mut reqwest::header::HeaderMap) -> QuartzBioResult<()> {
        Ok(())
    }
}
