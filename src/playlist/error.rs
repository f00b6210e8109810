//! Error types for playlist enumeration.
//!
//! An unrecognised page shape is never an error; it ends enumeration. These
//! variants cover the failures that stop a session before or between pages.

use thiserror::Error;

use crate::transport::TransportError;

/// Errors raised while loading or paginating a playlist.
#[derive(Debug, Error)]
pub enum PaginationError {
    /// A page request failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The playlist page did not expose an `INNERTUBE_API_KEY`.
    #[error("no INNERTUBE_API_KEY found in playlist page {url}")]
    ApiKeyMissing {
        /// The playlist page URL.
        url: String,
    },

    /// The playlist page did not embed `ytInitialData`.
    #[error("no initial data found in playlist page {url}")]
    InitialDataMissing {
        /// The playlist page URL.
        url: String,
    },

    /// The input URL has no `list` parameter.
    #[error("not a playlist URL: {url}")]
    InvalidPlaylistUrl {
        /// The URL as given.
        url: String,
    },
}

impl PaginationError {
    /// Creates a missing API key error.
    pub fn api_key_missing(url: impl Into<String>) -> Self {
        Self::ApiKeyMissing { url: url.into() }
    }

    /// Creates a missing initial data error.
    pub fn initial_data_missing(url: impl Into<String>) -> Self {
        Self::InitialDataMissing { url: url.into() }
    }

    /// Creates an invalid playlist URL error.
    pub fn invalid_playlist_url(url: impl Into<String>) -> Self {
        Self::InvalidPlaylistUrl { url: url.into() }
    }
}
