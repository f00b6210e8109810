//! Continuation-token pagination over playlist JSON.
//!
//! # Architecture
//!
//! - [`extract_page`] - Turns one JSON payload into a [`Page`]
//! - [`Paginator`] - Drives a [`PageLoader`] until the token runs out or a stop identifier appears
//! - [`ContinuationRequest`] - The POST that fetches the page after a token
//! - [`Playlist`] - Loads a playlist page over a [`Transport`](crate::transport::Transport)
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tubefetch_core::playlist::Playlist;
//! use tubefetch_core::{HttpTransport, InnertubeConfig, TransportConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Arc::new(HttpTransport::new(&TransportConfig::default())?);
//! let playlist = Playlist::new(
//!     transport,
//!     "https://www.youtube.com/playlist?list=PL0123",
//!     InnertubeConfig::default(),
//! )?;
//!
//! let mut pages = playlist.pages(None).await?;
//! while let Some(ids) = pages.next_page().await? {
//!     println!("{} videos", ids.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod constants;
mod continuation;
mod error;
mod extract;
mod html;
mod paginator;
mod remote;

pub use continuation::ContinuationRequest;
pub use error::PaginationError;
pub use extract::{PageShape, SHAPES, ShapeMatcher, extract_page, extract_page_value, match_shape};
pub use html::{extract_api_key, extract_initial_data};
pub use paginator::{PageLoader, PaginationState, Paginator};
pub use remote::{Playlist, playlist_id};

/// One batch of item identifiers plus the token for the next batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    /// `/watch?v=<id>` paths in source order, without duplicates.
    pub item_ids: Vec<String>,
    /// Present when another page can be requested.
    pub continuation_token: Option<String>,
}

impl Page {
    /// True when the page has no items and no continuation.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.item_ids.is_empty() && self.continuation_token.is_none()
    }
}
