//! HTTP client abstraction for testability

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::Url;
use serde::de::DeserializeOwned;
use tracing::trace;

use super::error::TransportError;

/// Boxed future returned by [`HttpClient::send`], keeping the trait dyn-compatible.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HTTP verb of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

/// A request to the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    /// JSON body for POST/PUT/DELETE.
    pub body: Option<serde_json::Value>,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            body: None,
        }
    }

    pub fn with_body(method: Method, url: impl Into<String>, body: Option<serde_json::Value>) -> Self {
        Self {
            method,
            url: url.into(),
            body,
        }
    }
}

/// A response from the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// URL the request was sent to.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(url: impl Into<String>, status: u16, body: Vec<u8>) -> Self {
        Self {
            url: url.into(),
            status,
            body,
        }
    }

    /// Whether the status code is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Converts a non-success status into [`TransportError::Status`].
    pub fn error_for_status(self) -> Result<Self, TransportError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(TransportError::Status {
                status: self.status,
                url: self.url,
            })
        }
    }

    /// Decodes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        serde_json::from_slice(&self.body).map_err(|e| TransportError::Decode {
            url: self.url.clone(),
            reason: e.to_string(),
        })
    }
}

/// Trait for HTTP client operations.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock HTTP clients in tests.
pub trait HttpClient: Send + Sync {
    /// Sends a request and returns the raw response.
    ///
    /// Non-success status codes are returned as responses, not errors; the
    /// caller decides how to treat them.
    fn send<'a>(&'a self, request: Request) -> BoxFuture<'a, Result<Response, TransportError>>;
}

/// Settings for [`ReqwestClient`].
#[derive(Debug, Clone, Default)]
pub struct ClientSettings {
    /// Base URL that relative request paths are joined to.
    pub base_url: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// CSRF token sent as `X-CSRFToken` on mutating requests.
    pub csrf_token: Option<String>,
    /// Language sent as `Accept-Language` on mutating requests.
    pub language: Option<String>,
}

/// Real HTTP client implementation using reqwest.
pub struct ReqwestClient {
    client: reqwest::Client,
    settings: ClientSettings,
    base_url: Option<Url>,
}

impl ReqwestClient {
    /// Creates a new ReqwestClient with default configuration.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_settings(ClientSettings::default())
    }

    /// Creates a new ReqwestClient with the given settings.
    pub fn with_settings(settings: ClientSettings) -> Result<Self, TransportError> {
        let timeout = settings.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        let base_url = settings
            .base_url
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(|e| TransportError::Client(format!("invalid base URL: {}", e)))?;

        Ok(Self {
            client,
            settings,
            base_url,
        })
    }

    /// Resolves a request URL against the configured base URL, the way a
    /// browser resolves a link against the page it is on.
    fn resolve(&self, url: &str) -> Result<Url, TransportError> {
        let resolved = match &self.base_url {
            Some(base) => base.join(url),
            None => Url::parse(url),
        };
        resolved.map_err(|e| TransportError::Request {
            url: url.to_string(),
            reason: format!("invalid URL: {}", e),
        })
    }

    async fn execute(&self, request: Request) -> Result<Response, TransportError> {
        let url = self.resolve(&request.url)?;
        trace!(method = request.method.as_str(), url = %url, "sending request");

        let builder = match request.method {
            Method::Get => self.client.get(url.clone()),
            Method::Post => self.client.post(url.clone()),
            Method::Put => self.client.put(url.clone()),
            Method::Delete => self.client.delete(url.clone()),
        };

        let builder = builder.header("Accept", "application/json, */*");
        let builder = if request.method == Method::Get {
            builder
        } else {
            let mut builder = builder.header("Content-Type", "application/json");
            if let Some(token) = &self.settings.csrf_token {
                builder = builder.header("X-CSRFToken", token.as_str());
            }
            if let Some(language) = &self.settings.language {
                builder = builder.header("Accept-Language", language.as_str());
            }
            if let Some(body) = &request.body {
                builder = builder.body(body.to_string());
            }
            builder
        };

        let response = builder.send().await.map_err(|e| TransportError::Request {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| TransportError::Request {
            url: url.to_string(),
            reason: format!("failed to read response: {}", e),
        })?;

        Ok(Response::new(request.url, status, body.to_vec()))
    }
}

impl HttpClient for ReqwestClient {
    fn send<'a>(&'a self, request: Request) -> BoxFuture<'a, Result<Response, TransportError>> {
        Box::pin(self.execute(request))
    }
}
