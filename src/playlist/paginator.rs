//! Page-by-page playlist enumeration.
//!
//! [`Paginator`] is an explicit state machine:
//!
//! ```text
//! AwaitingPage --first page--> HasToken(t) --continuation--> HasToken(t') ...
//!      |                           |
//!      +--no token / bad page------+--> Done
//!      +--stop_at found------------+--> StoppedAtTarget
//! ```
//!
//! Each call to [`Paginator::next_page`] performs at most one load, so the
//! consumer controls how many requests are made.

use std::collections::HashSet;

use async_trait::async_trait;
use futures_util::Stream;
use tracing::{debug, info, instrument};

use super::continuation::ContinuationRequest;
use super::error::PaginationError;
use super::extract::extract_page;
use crate::config::InnertubeConfig;

/// Source of raw page JSON for one enumeration.
#[async_trait]
pub trait PageLoader: Send + Sync {
    /// JSON text of the first page.
    async fn load_first_page(&self) -> Result<String, PaginationError>;

    /// API key for continuation requests. Only called once a token exists.
    async fn api_key(&self) -> Result<String, PaginationError>;

    /// JSON text returned for a continuation request.
    async fn load_continuation(
        &self,
        request: ContinuationRequest,
    ) -> Result<String, PaginationError>;
}

/// Where an enumeration stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaginationState {
    /// Nothing loaded yet.
    AwaitingPage,
    /// A continuation token is pending.
    HasToken(String),
    /// The last page had no token, or a load failed.
    Done,
    /// The stop identifier was reached.
    StoppedAtTarget,
}

impl PaginationState {
    /// True once no more pages will be produced.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::StoppedAtTarget)
    }
}

/// One enumeration session. Finite and not restartable.
pub struct Paginator {
    loader: Box<dyn PageLoader>,
    client: InnertubeConfig,
    stop_at: Option<String>,
    state: PaginationState,
    seen: HashSet<String>,
    api_key: Option<String>,
    pages_loaded: usize,
}

impl std::fmt::Debug for Paginator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Paginator")
            .field("state", &self.state)
            .field("stop_at", &self.stop_at)
            .field("pages_loaded", &self.pages_loaded)
            .field("seen", &self.seen.len())
            .finish_non_exhaustive()
    }
}

impl Paginator {
    /// Starts a session. `stop_at` is a full item identifier (`/watch?v=<id>`).
    #[must_use]
    pub fn new(
        loader: Box<dyn PageLoader>,
        client: InnertubeConfig,
        stop_at: Option<String>,
    ) -> Self {
        Self {
            loader,
            client,
            stop_at,
            state: PaginationState::AwaitingPage,
            seen: HashSet::new(),
            api_key: None,
            pages_loaded: 0,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> &PaginationState {
        &self.state
    }

    /// Pages loaded so far.
    #[must_use]
    pub fn pages_loaded(&self) -> usize {
        self.pages_loaded
    }

    /// Loads and returns the next page of identifiers.
    ///
    /// Identifiers already yielded earlier in the session are dropped. When
    /// the stop identifier appears, only the identifiers before it are
    /// returned and the session ends.
    ///
    /// # Errors
    ///
    /// Returns the loader's error; the session is then [`PaginationState::Done`].
    #[instrument(skip(self), fields(page = self.pages_loaded))]
    pub async fn next_page(&mut self) -> Result<Option<Vec<String>>, PaginationError> {
        let raw = match std::mem::replace(&mut self.state, PaginationState::Done) {
            PaginationState::AwaitingPage => self.loader.load_first_page().await?,
            PaginationState::HasToken(token) => {
                let api_key = self.api_key().await?;
                let request = ContinuationRequest::new(&self.client, &api_key, &token);
                debug!(url = %request.endpoint_url, "loading continuation");
                self.loader.load_continuation(request).await?
            }
            terminal => {
                self.state = terminal;
                return Ok(None);
            }
        };
        self.pages_loaded += 1;

        let page = extract_page(&raw);
        if page.is_empty() {
            debug!(pages = self.pages_loaded, "page carried no items and no continuation");
        }
        let mut ids = page.item_ids;

        if let Some(target) = self.stop_at.as_deref() {
            if let Some(position) = ids.iter().position(|id| id == target) {
                ids.truncate(position);
                self.state = PaginationState::StoppedAtTarget;
                info!(pages = self.pages_loaded, target, "stop identifier reached");
                return Ok(Some(self.unseen(ids)));
            }
        }

        self.state = match page.continuation_token {
            Some(token) => PaginationState::HasToken(token),
            None => {
                info!(pages = self.pages_loaded, "playlist enumeration complete");
                PaginationState::Done
            }
        };
        Ok(Some(self.unseen(ids)))
    }

    /// Drains the session into one list.
    ///
    /// # Errors
    ///
    /// Same as [`next_page`](Self::next_page).
    pub async fn collect_all(mut self) -> Result<Vec<String>, PaginationError> {
        let mut all = Vec::new();
        while let Some(page) = self.next_page().await? {
            all.extend(page);
        }
        Ok(all)
    }

    /// Adapts the session into a [`futures_util::Stream`] of pages.
    pub fn into_stream(self) -> impl Stream<Item = Result<Vec<String>, PaginationError>> + Send {
        futures_util::stream::try_unfold(self, |mut paginator| async move {
            Ok::<_, PaginationError>(paginator.next_page().await?.map(|page| (page, paginator)))
        })
    }

    async fn api_key(&mut self) -> Result<String, PaginationError> {
        if let Some(key) = &self.api_key {
            return Ok(key.clone());
        }
        let key = self.loader.api_key().await?;
        self.api_key = Some(key.clone());
        Ok(key)
    }

    fn unseen(&mut self, ids: Vec<String>) -> Vec<String> {
        ids.into_iter()
            .filter(|id| self.seen.insert(id.clone()))
            .collect()
    }
}
