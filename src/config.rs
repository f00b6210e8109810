//! Per-session configuration injected at construction.
//!
//! Nothing here is global: each [`HttpTransport`](crate::transport::HttpTransport),
//! [`RangeStreamer`](crate::download::RangeStreamer) and
//! [`Playlist`](crate::playlist::Playlist) receives its own copy. All structs
//! deserialize with defaults for any missing field, so a host application can
//! load them from whatever serde format it already uses.

use std::time::Duration;

use serde::Deserialize;

use crate::download::RetryPolicy;
use crate::download::constants::{
    DEFAULT_CHUNK_SIZE, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_RANGE_SIZE,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_MAX_DELAY_MS,
};
use crate::playlist::constants::{
    BROWSE_PATH, CLIENT_NAME, CLIENT_NAME_HEADER, CLIENT_VERSION, YOUTUBE_ORIGIN,
};

/// HTTP transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// TCP/TLS connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Whole-request timeout in seconds (900 by default).
    pub request_timeout_secs: u64,
    /// Overrides the default browser User-Agent.
    pub user_agent: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            user_agent: None,
        }
    }
}

/// Range and segment streaming settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Bytes requested per range window.
    pub range_size: u64,
    /// Maximum bytes per yielded chunk.
    pub chunk_size: usize,
    /// Retries allowed per range window after the first attempt.
    pub max_retries: u32,
    /// Backoff before the first retry, in milliseconds (0 retries immediately).
    pub retry_base_delay_ms: u64,
    /// Backoff cap, in milliseconds.
    pub retry_max_delay_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            range_size: DEFAULT_RANGE_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_retries: 0,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            retry_max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
        }
    }
}

impl StreamConfig {
    /// Builds the retry policy these settings describe.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.retry_base_delay_ms),
            Duration::from_millis(self.retry_max_delay_ms),
        )
    }

    /// Range size clamped to at least one byte.
    pub(crate) fn window(&self) -> u64 {
        self.range_size.max(1)
    }

    /// Chunk size clamped to at least one byte.
    pub(crate) fn chunk(&self) -> usize {
        self.chunk_size.max(1)
    }
}

/// Client identity sent with playlist continuation requests.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InnertubeConfig {
    /// Site origin; also the `X-Origin` header and the prefix of watch URLs.
    pub origin: String,
    /// Path of the continuation endpoint below `origin`.
    pub browse_path: String,
    /// Value of `X-YouTube-Client-Name`.
    pub client_name_header: String,
    /// `context.client.clientName` in the request body.
    pub client_name: String,
    /// Client version, sent both as a header and in the body.
    pub client_version: String,
}

impl Default for InnertubeConfig {
    fn default() -> Self {
        Self {
            origin: YOUTUBE_ORIGIN.to_string(),
            browse_path: BROWSE_PATH.to_string(),
            client_name_header: CLIENT_NAME_HEADER.to_string(),
            client_name: CLIENT_NAME.to_string(),
            client_version: CLIENT_VERSION.to_string(),
        }
    }
}

impl InnertubeConfig {
    /// Continuation endpoint for the given API key.
    #[must_use]
    pub fn browse_url(&self, api_key: &str) -> String {
        format!(
            "{}{}?key={api_key}",
            self.origin.trim_end_matches('/'),
            self.browse_path
        )
    }
}
