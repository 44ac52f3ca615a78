use crate::{
    apis::{DatasetApi, ObjectApi},
    auth::{Authentication, BearerAuth, NoAuth, TokenAuth},
    config::{ClientConfig, RetryPolicy},
    error::{QuartzBioError, QuartzBioResult},
    models::ErrorResponse,
    query::GlobalSearch,
};
use bytes::Bytes;
use log::{debug, warn};
use reqwest::{header::HeaderMap, Client, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use url::Url;

/// Main QuartzBio client
#[derive(Clone)]
pub struct QuartzBioClient {
    client: Client,
    base_url: Url,
    auth: Arc<dyn Authentication>,
    retry: RetryPolicy,
}

/// Raw response to a PUT against a pre-signed URL
#[derive(Debug, Clone)]
pub struct PresignedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl PresignedResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// ETag header with surrounding quotes kept, as storage services expect them back
    pub fn etag(&self) -> Option<String> {
        self.headers
            .get(reqwest::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

fn user_agent() -> &'static str {
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"))
}

impl QuartzBioClient {
    /// Create a new client with authentication
    pub fn new(
        base_url: impl AsRef<str>,
        auth: impl Authentication + 'static,
    ) -> QuartzBioResult<Self> {
        let base_url = Url::parse(base_url.as_ref())?;
        let client = Client::builder().user_agent(user_agent()).build()?;

        Ok(Self {
            client,
            base_url,
            auth: Arc::new(auth),
            retry: RetryPolicy::default(),
        })
    }

    /// Create a new client with custom reqwest client
    pub fn with_client(
        client: Client,
        base_url: impl AsRef<str>,
        auth: impl Authentication + 'static,
    ) -> QuartzBioResult<Self> {
        let base_url = Url::parse(base_url.as_ref())?;

        Ok(Self {
            client,
            base_url,
            auth: Arc::new(auth),
            retry: RetryPolicy::default(),
        })
    }

    /// Create a client from a configuration. An access token wins over an API key.
    pub fn from_config(config: &ClientConfig) -> QuartzBioResult<Self> {
        let base_url = config.base_url()?;
        let mut builder = Client::builder().user_agent(user_agent());
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        let auth: Arc<dyn Authentication> = match (&config.access_token, &config.api_key) {
            (Some(token), _) => Arc::new(BearerAuth::new(token.clone())),
            (None, Some(key)) => Arc::new(TokenAuth::new(key.clone())),
            (None, None) => Arc::new(NoAuth),
        };

        Ok(Self {
            client,
            base_url,
            auth,
            retry: config.retry,
        })
    }

    /// Create a client from the process environment
    pub fn from_env() -> QuartzBioResult<Self> {
        Self::from_config(&ClientConfig::from_env()?)
    }

    /// Replace the retry policy used for pre-signed uploads
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Get Dataset API
    pub fn datasets(&self) -> DatasetApi<'_> {
        DatasetApi::new(self)
    }

    /// Get Object (vault file) API
    pub fn objects(&self) -> ObjectApi<'_> {
        ObjectApi::new(self)
    }

    /// Start a global search across all accessible datasets and objects
    pub fn search(&self) -> GlobalSearch {
        GlobalSearch::global_search(self.clone())
    }

    /// Build a request to the given path with authentication
    pub async fn request(&self, method: Method, path: &str) -> QuartzBioResult<RequestBuilder> {
        let url = self.base_url.join(path)?;
        debug!("API {} Request: {}", method, url);
        let mut request = self.client.request(method, url);

        // Apply authentication
        let mut headers = HeaderMap::new();
        self.auth.apply_auth(&mut headers).await?;

        for (name, value) in headers.iter() {
            request = request.header(name, value);
        }

        Ok(request)
    }

    /// Execute a request and handle common error cases
    pub async fn execute<T>(&self, request: RequestBuilder) -> QuartzBioResult<T>
    where
        T: DeserializeOwned,
    {
        let response = request.send().await?;
        self.handle_response(response).await
    }

    /// GET a JSON resource
    pub async fn get<T>(&self, path: &str) -> QuartzBioResult<T>
    where
        T: DeserializeOwned,
    {
        let req = self.request(Method::GET, path).await?;
        self.execute(req).await
    }

    /// POST a JSON body and decode the JSON response
    pub async fn post<T, B>(&self, path: &str, body: &B) -> QuartzBioResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let req = self.request(Method::POST, path).await?.json(body);
        self.execute(req).await
    }

    /// DELETE a resource, optionally with a JSON body
    pub async fn delete<T, B>(&self, path: &str, body: Option<&B>) -> QuartzBioResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let mut req = self.request(Method::DELETE, path).await?;
        if let Some(body) = body {
            req = req.json(body);
        }
        self.execute(req).await
    }

    /// PUT a body to an absolute pre-signed URL.
    ///
    /// No API credentials are attached. Connection failures, timeouts and 5xx
    /// responses are retried according to the client's [`RetryPolicy`]; any
    /// other response is returned as is, so callers decide what a non-2xx means.
    pub async fn put_presigned(
        &self,
        url: &str,
        headers: HeaderMap,
        body: Bytes,
    ) -> QuartzBioResult<PresignedResponse> {
        let url = Url::parse(url)?;
        let mut attempt = 0;

        loop {
            if attempt > 0 {
                warn!(
                    "Retrying PUT {} (attempt {}/{})",
                    url.path(),
                    attempt,
                    self.retry.max_retries
                );
                tokio::time::sleep(self.retry.delay_for(attempt)).await;
            }

            let result = self
                .client
                .put(url.clone())
                .headers(headers.clone())
                .body(body.clone())
                .send()
                .await;

            let retries_left = attempt < self.retry.max_retries;
            match result {
                Ok(response) if response.status().is_server_error() && retries_left => {
                    debug!("PUT {} returned {}", url.path(), response.status());
                }
                Ok(response) => {
                    let status = response.status();
                    let headers = response.headers().clone();
                    let body = response.bytes().await?;
                    debug!("PUT {} returned {}", url.path(), status);
                    return Ok(PresignedResponse {
                        status,
                        headers,
                        body,
                    });
                }
                Err(e) if (e.is_connect() || e.is_timeout()) && retries_left => {
                    debug!("PUT {} failed: {}", url.path(), e);
                }
                Err(e) => return Err(e.into()),
            }

            attempt += 1;
        }
    }

    /// Handle response and deserialize JSON. An empty body decodes as `null`.
    async fn handle_response<T>(&self, response: Response) -> QuartzBioResult<T>
    where
        T: DeserializeOwned,
    {
        let status = response.status();
        debug!("API Response: {}", status.as_u16());

        if status.is_success() {
            let bytes = response.bytes().await?;
            if bytes.iter().all(u8::is_ascii_whitespace) {
                return Ok(serde_json::from_value(serde_json::Value::Null)?);
            }
            Ok(serde_json::from_slice(&bytes)?)
        } else {
            self.handle_error_response(status, response).await
        }
    }

    /// Handle error responses
    async fn handle_error_response<T>(
        &self,
        status: StatusCode,
        response: Response,
    ) -> QuartzBioResult<T> {
        let body = response.text().await.unwrap_or_default();
        let error_message = serde_json::from_str::<ErrorResponse>(&body)
            .ok()
            .and_then(ErrorResponse::into_message)
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    format!("HTTP {}", status)
                } else {
                    body.trim().to_string()
                }
            });

        match status {
            StatusCode::UNAUTHORIZED => Err(QuartzBioError::auth_error(error_message)),
            StatusCode::FORBIDDEN => Err(QuartzBioError::PermissionDenied(error_message)),
            StatusCode::NOT_FOUND => Err(QuartzBioError::NotFound(error_message)),
            _ => Err(QuartzBioError::api_error(status.as_u16(), error_message)),
        }
    }
}
