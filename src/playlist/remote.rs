//! Playlist facade over a [`Transport`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, instrument};
use url::Url;

use super::constants::{LIST_PARAM, WATCH_PREFIX};
use super::continuation::ContinuationRequest;
use super::error::PaginationError;
use super::html::{extract_api_key, extract_initial_data};
use super::paginator::{PageLoader, Paginator};
use crate::config::InnertubeConfig;
use crate::transport::{Transport, get_text, post_json};

/// Reads the `list` query parameter of a playlist or watch URL.
///
/// # Errors
///
/// Returns [`PaginationError::InvalidPlaylistUrl`] if the URL does not parse
/// or has no non-empty `list` parameter.
pub fn playlist_id(url: &str) -> Result<String, PaginationError> {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .query_pairs()
                .find(|(key, value)| key == LIST_PARAM && !value.is_empty())
                .map(|(_, value)| value.into_owned())
        })
        .ok_or_else(|| PaginationError::invalid_playlist_url(url))
}

/// A playlist page and the enumerations that can be run from it.
///
/// The playlist HTML is fetched at most once per `Playlist` and shared by
/// every enumeration started from it.
pub struct Playlist {
    transport: Arc<dyn Transport>,
    client: InnertubeConfig,
    playlist_id: String,
    html: OnceCell<Arc<str>>,
}

impl std::fmt::Debug for Playlist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Playlist")
            .field("playlist_id", &self.playlist_id)
            .field("origin", &self.client.origin)
            .field("html_loaded", &self.html.initialized())
            .finish_non_exhaustive()
    }
}

impl Playlist {
    /// Creates a playlist from any URL carrying a `list` parameter.
    ///
    /// # Errors
    ///
    /// Returns [`PaginationError::InvalidPlaylistUrl`] if no playlist id is present.
    pub fn new(
        transport: Arc<dyn Transport>,
        url: &str,
        client: InnertubeConfig,
    ) -> Result<Self, PaginationError> {
        Ok(Self {
            transport,
            client,
            playlist_id: playlist_id(url)?,
            html: OnceCell::new(),
        })
    }

    /// The playlist id.
    #[must_use]
    pub fn playlist_id(&self) -> &str {
        &self.playlist_id
    }

    /// Canonical playlist page URL.
    #[must_use]
    pub fn playlist_url(&self) -> String {
        format!(
            "{}/playlist?{LIST_PARAM}={}",
            self.client.origin.trim_end_matches('/'),
            self.playlist_id
        )
    }

    /// Absolute URL for an item identifier (`/watch?v=<id>`).
    #[must_use]
    pub fn video_url(&self, item_id: &str) -> String {
        format!("{}{item_id}", self.client.origin.trim_end_matches('/'))
    }

    /// The playlist page HTML, fetched on first use.
    ///
    /// # Errors
    ///
    /// Returns [`PaginationError::Transport`] if the page cannot be fetched.
    pub async fn html(&self) -> Result<Arc<str>, PaginationError> {
        let html = self
            .html
            .get_or_try_init(|| async {
                let url = self.playlist_url();
                debug!(%url, "fetching playlist page");
                let text = get_text(self.transport.as_ref(), &url, &Default::default()).await?;
                Ok::<_, PaginationError>(Arc::from(text))
            })
            .await?;
        Ok(Arc::clone(html))
    }

    /// Starts a page enumeration, optionally ending before `stop_at_video_id`.
    ///
    /// # Errors
    ///
    /// Returns [`PaginationError::Transport`] if the playlist page cannot be fetched.
    pub async fn pages(
        &self,
        stop_at_video_id: Option<&str>,
    ) -> Result<Paginator, PaginationError> {
        let loader = HtmlPageLoader {
            transport: Arc::clone(&self.transport),
            page_url: self.playlist_url(),
            html: self.html().await?,
        };
        Ok(Paginator::new(
            Box::new(loader),
            self.client.clone(),
            stop_at_video_id.map(|id| format!("{WATCH_PREFIX}{id}")),
        ))
    }

    /// Absolute URLs of every video in the playlist.
    ///
    /// # Errors
    ///
    /// Any error raised while loading a page.
    #[instrument(skip(self), fields(playlist_id = %self.playlist_id))]
    pub async fn video_urls(&self) -> Result<Vec<String>, PaginationError> {
        self.collect_urls(None).await
    }

    /// Absolute URLs of the videos before `video_id`.
    ///
    /// # Errors
    ///
    /// Any error raised while loading a page.
    #[instrument(skip(self), fields(playlist_id = %self.playlist_id))]
    pub async fn trimmed(&self, video_id: &str) -> Result<Vec<String>, PaginationError> {
        self.collect_urls(Some(video_id)).await
    }

    async fn collect_urls(&self, stop_at: Option<&str>) -> Result<Vec<String>, PaginationError> {
        let ids = self.pages(stop_at).await?.collect_all().await?;
        Ok(ids.iter().map(|id| self.video_url(id)).collect())
    }
}

/// Loads pages from the cached playlist HTML and continuation POSTs.
struct HtmlPageLoader {
    transport: Arc<dyn Transport>,
    page_url: String,
    html: Arc<str>,
}

#[async_trait]
impl PageLoader for HtmlPageLoader {
    async fn load_first_page(&self) -> Result<String, PaginationError> {
        extract_initial_data(&self.html)
            .map(str::to_string)
            .ok_or_else(|| PaginationError::initial_data_missing(&self.page_url))
    }

    async fn api_key(&self) -> Result<String, PaginationError> {
        extract_api_key(&self.html).ok_or_else(|| PaginationError::api_key_missing(&self.page_url))
    }

    async fn load_continuation(
        &self,
        request: ContinuationRequest,
    ) -> Result<String, PaginationError> {
        let text = post_json(
            self.transport.as_ref(),
            &request.endpoint_url,
            &request.headers,
            request.body,
        )
        .await?;
        Ok(text)
    }
}
