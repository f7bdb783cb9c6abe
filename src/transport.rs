use async_trait::async_trait;
use reqwest::Method;
use std::{collections::BTreeMap, fmt, sync::Arc, time::Duration};

use crate::{
    consts::{API_PREFIX, HTTP_REQUEST_TIMEOUT_SECS, LOGIN_PATH},
    error::ApiError,
    settings::normalize_base_url,
};

#[derive(Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path below `/api/v4`, starting with `/`.
    pub path: String,
    pub body: Option<serde_json::Value>,
    pub bearer: Option<String>,
}

impl fmt::Debug for ApiRequest {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("body", &self.body.as_ref().map(|_| "<json>"))
            .field("bearer", &self.bearer.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            bearer: None,
        }
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// The login exchange never carries a bearer and is never retried on 401.
    pub fn is_login(&self) -> bool {
        self.path
            .split('?')
            .next()
            .is_some_and(|path| path.trim_end_matches('/') == LOGIN_PATH)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    /// Header names are lowercase.
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }
}

/// One HTTP exchange. Any status is a successful send; only network and I/O
/// failures are errors.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError>;
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        (**self).send(request).await
    }
}

#[derive(Clone)]
pub struct ReqwestTransport {
    api_base: String,
    client: reqwest::Client,
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ReqwestTransport")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl ReqwestTransport {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let normalized = normalize_base_url(base_url).map_err(|error| ApiError::Backend {
            status: None,
            cause: error.to_string(),
        })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS))
            .user_agent(concat!("mattermost-launcher/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|error| ApiError::Backend {
                status: None,
                cause: format!("Failed to build HTTP client: {error}"),
            })?;

        Ok(Self {
            api_base: format!("{normalized}{API_PREFIX}"),
            client,
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let endpoint = format!("{}{}", self.api_base, request.path);
        let mut builder = self.client.request(request.method.clone(), &endpoint);
        if let Some(token) = request.bearer.as_deref() {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = request.body.as_ref() {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|error| ApiError::Backend {
            status: None,
            cause: format!("{} {} failed: {error}", request.method, request.path),
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_ascii_lowercase(), value.to_string()))
            })
            .collect();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unable to read response body>".to_string());

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}
