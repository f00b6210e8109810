//! Error types for the transport layer.

use thiserror::Error;

/// Errors surfaced by a [`Transport`](super::Transport) implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before a response arrived.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Server answered with HTTP 400.
    #[error("HTTP 400 bad request from {url}")]
    BadRequest {
        /// The URL that was rejected.
        url: String,
    },

    /// The provided URL is malformed or not http(s).
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// Reading the response body failed after headers were received.
    #[error("error reading response body from {url}: {message}")]
    Body {
        /// The URL whose body failed.
        url: String,
        /// Description of the failure.
        message: String,
    },

    /// The underlying HTTP client could not be constructed.
    #[error("failed to build HTTP client: {source}")]
    ClientBuild {
        /// The builder error.
        #[source]
        source: reqwest::Error,
    },
}

impl TransportError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates a bad-request (HTTP 400) error.
    pub fn bad_request(url: impl Into<String>) -> Self {
        Self::BadRequest { url: url.into() }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a body read error.
    pub fn body(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Body {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Maps a reqwest error, promoting timeouts to [`TransportError::Timeout`].
    pub fn from_reqwest(url: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::timeout(url)
        } else {
            Self::network(url, error)
        }
    }

    /// Returns true for timeout-class failures.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
