//! Tubefetch Core Library
//!
//! Network plumbing for fetching large media resources and enumerating
//! playlists:
//!
//! - [`download`] - Byte-range streaming with bounded retry, and sequential
//!   `sq=0..N` segment streaming
//! - [`playlist`] - Continuation-token pagination over playlist JSON
//! - [`transport`] - The single-request HTTP contract both depend on, with a
//!   `reqwest` implementation
//! - [`config`] - Per-session settings injected at construction

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod download;
pub mod playlist;
pub mod transport;

pub(crate) mod user_agent;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use config::{InnertubeConfig, StreamConfig, TransportConfig};
pub use download::{
    DEFAULT_MAX_RETRIES, FailureType, RangeStream, RangeStreamer, RetryDecision, RetryPolicy,
    SegmentStream, SegmentStreamer, StreamError, classify_error, content_length,
    segmented_content_length,
};
pub use playlist::{
    ContinuationRequest, Page, PageLoader, PaginationError, PaginationState, Paginator, Playlist,
    extract_page,
};
pub use transport::{
    HttpTransport, Method, ResponseBody, Transport, TransportError, TransportRequest,
    TransportResponse, get_text, post_json,
};
