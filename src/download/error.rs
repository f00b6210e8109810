//! Error types for the download module.
//!
//! A stream either completes or ends with exactly one of these; the core
//! never attempts partial-stream recovery.

use thiserror::Error;

use crate::transport::TransportError;

/// Errors that end a range or segment stream.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Non-retryable transport failure (anything but a timeout), or a body
    /// read failure after the response arrived.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Every attempt for one range window timed out.
    #[error("max retries exceeded for {url} (range {range}, {attempts} attempts)")]
    MaxRetriesExceeded {
        /// The URL being streamed.
        url: String,
        /// The `Range` header value of the failing window.
        range: String,
        /// Attempts made, including the first.
        attempts: u32,
    },

    /// A window came back empty before the advertised size was reached.
    #[error("stream of {url} ended at {downloaded} of {total} bytes")]
    Incomplete {
        /// The URL being streamed.
        url: String,
        /// Bytes yielded before the empty window.
        downloaded: u64,
        /// Size from the first `Content-Range`.
        total: u64,
    },

    /// With no known size, the server answered a window with more than was
    /// asked for, or with a non-206 status after the first window.
    #[error("server ignored range {range} for {url}")]
    RangeIgnored {
        /// The URL being streamed.
        url: String,
        /// The `Range` header value that was not honoured.
        range: String,
    },

    /// The header segment carried no `Segment-Count` line.
    #[error("no match for {pattern} in header segment of {url}")]
    SegmentCountMissing {
        /// The header segment URL.
        url: String,
        /// The pattern that was searched for.
        pattern: &'static str,
    },

    /// A size probe got no usable `Content-Length`.
    #[error("missing or invalid content-length for {url}")]
    MissingContentLength {
        /// The probed URL.
        url: String,
    },

    /// The stream URL could not be parsed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },
}

impl StreamError {
    /// Creates a retry-exhausted error.
    pub fn max_retries_exceeded(
        url: impl Into<String>,
        range: impl Into<String>,
        attempts: u32,
    ) -> Self {
        Self::MaxRetriesExceeded {
            url: url.into(),
            range: range.into(),
            attempts,
        }
    }

    /// Creates a truncated-stream error.
    pub fn incomplete(url: impl Into<String>, downloaded: u64, total: u64) -> Self {
        Self::Incomplete {
            url: url.into(),
            downloaded,
            total,
        }
    }

    /// Creates an ignored-range error.
    pub fn range_ignored(url: impl Into<String>, range: impl Into<String>) -> Self {
        Self::RangeIgnored {
            url: url.into(),
            range: range.into(),
        }
    }

    /// Creates a missing segment-count error.
    pub fn segment_count_missing(url: impl Into<String>, pattern: &'static str) -> Self {
        Self::SegmentCountMissing {
            url: url.into(),
            pattern,
        }
    }

    /// Creates a missing content-length error.
    pub fn missing_content_length(url: impl Into<String>) -> Self {
        Self::MissingContentLength { url: url.into() }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }
}
