//! HTTP transport seam for the gateway.
//!
//! Keeping the wire layer behind a trait means the refresh/retry state machine
//! can be exercised without a server. [`ReqwestTransport`] is the production
//! implementation; tests script responses through their own fakes.

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use tracing::debug;

/// Marks requests as script-originated, matching the server's CSRF contract.
pub const REQUESTED_WITH_HEADER: (&str, &str) = ("X-Requested-With", "XMLHttpRequest");

/// Outbound request as the gateway sees it: an API path relative to the
/// configured base URL, plus the headers the gateway decided to attach.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub bearer_token: Option<String>,
    pub body: Option<Value>,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            bearer_token: None,
            body: None,
        }
    }
}

/// Response with the body already decoded to JSON. Non-JSON bodies decode to
/// `Value::Null`; control decisions only need the status and a message field.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiResponse {
    /// Server-provided message, accepting both casings of the field.
    #[must_use]
    pub fn message(&self) -> String {
        self.body
            .get("message")
            .or_else(|| self.body.get("Message"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string()
    }

    /// Machine-readable denial code on a 403, if any.
    #[must_use]
    pub fn denial_code(&self) -> Option<&str> {
        self.body
            .get("denialCode")
            .or_else(|| self.body.get("DenialCode"))
            .and_then(Value::as_str)
    }
}

/// Failure where no HTTP response was received at all.
#[derive(Debug, Clone)]
pub enum TransportError {
    Timeout,
    Connect(String),
}

impl From<TransportError> for GatewayError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => Self::Timeout,
            TransportError::Connect(message) => Self::Network(message),
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// Production transport over a shared [`reqwest::Client`].
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
}

impl ReqwestTransport {
    /// # Errors
    /// Returns an error if the underlying client cannot be built.
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| GatewayError::Config(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
        })
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.url_for(&request.path);
        debug!("{} {}", request.method, url);

        let mut builder = self
            .client
            .request(request.method, &url)
            .header(REQUESTED_WITH_HEADER.0, REQUESTED_WITH_HEADER.1)
            .header("Accept", "application/json");

        if let Some(token) = &request.bearer_token {
            builder = builder.bearer_auth(token);
        }

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|err| {
            if err.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Connect(err.to_string())
            }
        })?;

        let status = response.status();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);

        Ok(ApiResponse { status, body })
    }
}
