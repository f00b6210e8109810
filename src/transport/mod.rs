//! Single-request HTTP transport contract shared by the streamers and the paginator.
//!
//! The core never talks to `reqwest` directly. Everything goes through the
//! object-safe [`Transport`] trait so that range streaming, segment streaming
//! and pagination can run against the real [`HttpTransport`] or an in-memory
//! double in tests.
//!
//! # Example
//!
//! ```no_run
//! use tubefetch_core::transport::{HttpTransport, Transport, TransportRequest};
//! use tubefetch_core::TransportConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = HttpTransport::new(&TransportConfig::default())?;
//! let response = transport
//!     .request(TransportRequest::get("https://example.com/").with_header("Range", "bytes=0-99"))
//!     .await?;
//! println!("status {}", response.status());
//! # Ok(())
//! # }
//! ```

mod error;
mod http;

pub use error::TransportError;
pub use http::HttpTransport;

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

/// HTTP methods the core issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Range and page fetches.
    Get,
    /// Size probes.
    Head,
    /// Continuation requests.
    Post,
}

impl Method {
    /// Returns the canonical method name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    /// Request method.
    pub method: Method,
    /// Absolute target URL.
    pub url: String,
    /// Extra headers layered over the transport's defaults.
    pub headers: BTreeMap<String, String>,
    /// Optional JSON body (sent with `Content-Type: application/json`).
    pub body: Option<Value>,
}

impl TransportRequest {
    /// Creates a request with no headers and no body.
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    /// Creates a GET request.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// Creates a HEAD request.
    #[must_use]
    pub fn head(url: impl Into<String>) -> Self {
        Self::new(Method::Head, url)
    }

    /// Creates a POST request carrying a JSON body.
    #[must_use]
    pub fn post_json(url: impl Into<String>, body: Value) -> Self {
        Self {
            body: Some(body),
            ..Self::new(Method::Post, url)
        }
    }

    /// Adds or replaces a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Adds every header from `headers`.
    #[must_use]
    pub fn with_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Looks up a header case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Readable response body, pulled one buffer at a time.
///
/// Buffer sizes are whatever the underlying connection hands back; callers
/// that need fixed-size chunks re-slice them.
#[async_trait]
pub trait ResponseBody: Send {
    /// Returns the next buffer, or `None` once the body is exhausted.
    async fn next_bytes(&mut self) -> Result<Option<Bytes>, TransportError>;
}

/// Response returned by a [`Transport`].
pub struct TransportResponse {
    status: u16,
    headers: HashMap<String, String>,
    body: Box<dyn ResponseBody>,
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl TransportResponse {
    /// Creates a response; header names are lower-cased.
    pub fn new<I, K, V>(status: u16, headers: I, body: Box<dyn ResponseBody>) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let headers = headers
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_ascii_lowercase(), v.into()))
            .collect();
        Self {
            status,
            headers,
            body,
        }
    }

    /// HTTP status code.
    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// True for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Looks up a header case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// All headers, keyed by lower-cased name.
    #[must_use]
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Pulls the next body buffer.
    ///
    /// # Errors
    ///
    /// Propagates the body's read error.
    pub async fn next_bytes(&mut self) -> Result<Option<Bytes>, TransportError> {
        self.body.next_bytes().await
    }

    /// Reads the whole body into memory.
    ///
    /// # Errors
    ///
    /// Propagates the body's read error.
    pub async fn bytes(mut self) -> Result<Vec<u8>, TransportError> {
        let mut buffer = Vec::new();
        while let Some(chunk) = self.body.next_bytes().await? {
            buffer.extend_from_slice(&chunk);
        }
        Ok(buffer)
    }

    /// Reads the whole body as UTF-8 text (lossy).
    ///
    /// # Errors
    ///
    /// Propagates the body's read error.
    pub async fn text(self) -> Result<String, TransportError> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Issues single HTTP requests.
///
/// Implementations must be safe for concurrent use by independent sessions;
/// the core keeps no state inside the transport.
///
/// # Contract
///
/// - Unreachable hosts and malformed URLs fail with a [`TransportError`].
/// - Status 400 fails with [`TransportError::BadRequest`].
/// - Every other status is returned as a normal response.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one request and returns the response with an unread body.
    async fn request(&self, request: TransportRequest)
    -> Result<TransportResponse, TransportError>;
}

/// Sends a GET and returns the body as text.
///
/// # Errors
///
/// Returns the transport's error for the request or body read.
pub async fn get_text(
    transport: &dyn Transport,
    url: &str,
    headers: &BTreeMap<String, String>,
) -> Result<String, TransportError> {
    let request = TransportRequest::get(url).with_headers(headers.clone());
    transport.request(request).await?.text().await
}

/// Sends a JSON POST and returns the body as text.
///
/// # Errors
///
/// Returns the transport's error for the request or body read.
pub async fn post_json(
    transport: &dyn Transport,
    url: &str,
    headers: &BTreeMap<String, String>,
    body: Value,
) -> Result<String, TransportError> {
    let request = TransportRequest::post_json(url, body).with_headers(headers.clone());
    transport.request(request).await?.text().await
}
