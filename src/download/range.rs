//! Byte-range streaming of one resource.
//!
//! A [`RangeStream`] walks a resource window by window
//! (`Range: bytes=<start>-<stop>`), re-slicing each response body into
//! chunks of at most `chunk_size` bytes. The authoritative total size comes
//! from the first response's `Content-Range` header and is never revised.
//!
//! While the total is unknown, windows keep advancing and the stream ends at
//! the first window that yields no bytes. Each `206` body is held to the
//! length of the window it answers. A non-`206` answer to the first window
//! means the server ignored `Range`; its body is read as the whole resource
//! and the stream ends there. More bytes than requested, or a non-`206`
//! answer to a later window, ends the stream with
//! [`StreamError::RangeIgnored`].
//!
//! Once the total is known, an empty window before it is reached ends the
//! stream with [`StreamError::Incomplete`].

use std::sync::Arc;

use bytes::Bytes;
use futures_util::Stream;
use tracing::{debug, info, instrument, warn};

use super::error::StreamError;

const PARTIAL_CONTENT: u16 = 206;
use super::retry::{FailureType, RetryDecision, RetryPolicy, classify_error};
use crate::config::StreamConfig;
use crate::transport::{Transport, TransportRequest, TransportResponse};

/// Starts range streams against a shared transport.
#[derive(Clone)]
pub struct RangeStreamer {
    transport: Arc<dyn Transport>,
    config: StreamConfig,
    retry: RetryPolicy,
}

impl std::fmt::Debug for RangeStreamer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeStreamer")
            .field("config", &self.config)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl RangeStreamer {
    /// Creates a streamer using the retry policy described by `config`.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, config: StreamConfig) -> Self {
        let retry = config.retry_policy();
        Self {
            transport,
            config,
            retry,
        }
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Streaming settings in use.
    #[must_use]
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Transport in use.
    #[must_use]
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Starts a fresh stream of `url` from offset 0.
    ///
    /// Nothing is requested until the first chunk is pulled.
    #[must_use]
    pub fn stream(&self, url: impl Into<String>) -> RangeStream {
        RangeStream {
            transport: Arc::clone(&self.transport),
            retry: self.retry.clone(),
            url: url.into(),
            window: self.config.window(),
            chunk_size: self.config.chunk(),
            state: RangeRequestState::default(),
            response: None,
            range: String::new(),
            pending: Bytes::new(),
            overrun: false,
            finished: false,
        }
    }
}

/// Progress of one range stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RangeRequestState {
    /// Bytes yielded so far.
    pub downloaded: u64,
    /// Authoritative size, once learned from `Content-Range`.
    pub total_size: Option<u64>,
    /// Whether the first response has been inspected for the total size.
    size_probed: bool,
    /// Bytes received in the window currently being read.
    window_bytes: u64,
    /// Most bytes the current window may deliver, while the size is unknown.
    window_limit: Option<u64>,
    /// Set when the current response is read as the whole resource.
    last_window: bool,
    /// Set when a window yielded nothing.
    exhausted: bool,
}

impl RangeRequestState {
    fn has_more(&self) -> bool {
        if self.exhausted {
            return false;
        }
        self.total_size.is_none_or(|total| self.downloaded < total)
    }
}

/// One in-progress range stream. Finite and not restartable.
///
/// Pull with [`next_chunk`](Self::next_chunk) or adapt with
/// [`into_stream`](Self::into_stream). Dropping it releases any in-flight
/// response.
pub struct RangeStream {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    url: String,
    window: u64,
    chunk_size: usize,
    state: RangeRequestState,
    response: Option<TransportResponse>,
    range: String,
    pending: Bytes,
    overrun: bool,
    finished: bool,
}

impl std::fmt::Debug for RangeStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeStream")
            .field("url", &self.url)
            .field("state", &self.state)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl RangeStream {
    /// URL being streamed.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Bytes yielded so far.
    #[must_use]
    pub fn downloaded(&self) -> u64 {
        self.state.downloaded
    }

    /// Total size, once the first response has revealed it.
    #[must_use]
    pub fn total_size(&self) -> Option<u64> {
        self.state.total_size
    }

    /// Returns the next chunk, or `None` once the resource is consumed.
    ///
    /// After an error the stream is finished and keeps returning `None`.
    ///
    /// # Errors
    ///
    /// - [`StreamError::MaxRetriesExceeded`] when every attempt for one window timed out
    /// - [`StreamError::Incomplete`] when a window is empty before the known total
    /// - [`StreamError::RangeIgnored`] when a server without a known size
    ///   answers outside the requested window
    /// - [`StreamError::Transport`] for any other request or body failure
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, StreamError> {
        loop {
            if self.finished {
                return Ok(None);
            }

            if !self.pending.is_empty() {
                let take = self.chunk_size.min(self.pending.len());
                let chunk = self.pending.split_to(take);
                self.state.downloaded += chunk.len() as u64;
                return Ok(Some(chunk));
            }

            if let Some(response) = self.response.as_mut() {
                match response.next_bytes().await {
                    Ok(Some(bytes)) => {
                        let bytes = self.clamp_to_total(bytes);
                        self.pending = self.clamp_to_window(bytes);
                        self.state.window_bytes += self.pending.len() as u64;
                    }
                    Ok(None) => {
                        if let Err(error) = self.finish_window() {
                            self.finished = true;
                            return Err(error);
                        }
                    }
                    Err(error) => {
                        self.finished = true;
                        self.response = None;
                        return Err(error.into());
                    }
                }
                continue;
            }

            if self.overrun {
                self.finished = true;
                return Err(StreamError::range_ignored(&self.url, &self.range));
            }

            if !self.state.has_more() {
                self.finished = true;
                info!(
                    url = %self.url,
                    bytes = self.state.downloaded,
                    total = ?self.state.total_size,
                    "range stream complete"
                );
                return Ok(None);
            }

            match self.open_window().await {
                Ok(response) => {
                    self.state.window_bytes = 0;
                    self.response = Some(response);
                }
                Err(error) => {
                    self.finished = true;
                    return Err(error);
                }
            }
        }
    }

    /// Reads the remaining stream into one buffer.
    ///
    /// # Errors
    ///
    /// Same as [`next_chunk`](Self::next_chunk).
    pub async fn read_to_end(mut self) -> Result<Vec<u8>, StreamError> {
        let mut buffer = Vec::new();
        while let Some(chunk) = self.next_chunk().await? {
            buffer.extend_from_slice(&chunk);
        }
        Ok(buffer)
    }

    /// Adapts the stream into a [`futures_util::Stream`].
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, StreamError>> + Send {
        futures_util::stream::try_unfold(self, |mut stream| async move {
            Ok::<_, StreamError>(stream.next_chunk().await?.map(|chunk| (chunk, stream)))
        })
    }

    fn next_range(&self) -> (u64, u64) {
        let start = self.state.downloaded;
        let end = match self.state.total_size {
            Some(total) => start.saturating_add(self.window).min(total),
            None => start.saturating_add(self.window),
        };
        (start, end.saturating_sub(1))
    }

    fn clamp_to_total(&self, mut bytes: Bytes) -> Bytes {
        if let Some(total) = self.state.total_size {
            let allowed = total.saturating_sub(self.state.downloaded);
            if bytes.len() as u64 > allowed {
                warn!(
                    url = %self.url,
                    total,
                    extra = bytes.len() as u64 - allowed,
                    "server sent bytes past the advertised size; discarding"
                );
                #[allow(clippy::cast_possible_truncation)]
                bytes.truncate(allowed as usize);
            }
        }
        bytes
    }

    fn clamp_to_window(&mut self, mut bytes: Bytes) -> Bytes {
        let Some(limit) = self.state.window_limit else {
            return bytes;
        };
        let allowed = limit.saturating_sub(self.state.window_bytes);
        if bytes.len() as u64 > allowed {
            warn!(
                url = %self.url,
                range = %self.range,
                "server sent more than the requested window; ending stream"
            );
            #[allow(clippy::cast_possible_truncation)]
            bytes.truncate(allowed as usize);
            self.response = None;
            self.overrun = true;
        }
        bytes
    }

    fn finish_window(&mut self) -> Result<(), StreamError> {
        self.response = None;
        if self.state.last_window {
            self.state.exhausted = true;
            return Ok(());
        }
        if self.state.window_bytes > 0 {
            return Ok(());
        }
        self.state.exhausted = true;
        match self.state.total_size {
            Some(total) if self.state.downloaded < total => {
                warn!(
                    url = %self.url,
                    downloaded = self.state.downloaded,
                    total,
                    "empty range response before the advertised size"
                );
                Err(StreamError::incomplete(
                    &self.url,
                    self.state.downloaded,
                    total,
                ))
            }
            Some(_) => Ok(()),
            None => {
                debug!(url = %self.url, "empty window with unknown size; ending stream");
                Ok(())
            }
        }
    }

    #[instrument(skip(self), fields(url = %self.url))]
    async fn open_window(&mut self) -> Result<TransportResponse, StreamError> {
        let (start, stop) = self.next_range();
        let range = format!("bytes={start}-{stop}");
        debug!(%range, "requesting window");

        let mut attempt = 0u32;
        let response = loop {
            attempt += 1;
            let request = TransportRequest::get(&self.url).with_header("Range", &range);
            match self.transport.request(request).await {
                Ok(response) => break response,
                Err(error) => {
                    let failure = classify_error(&error);
                    if failure == FailureType::Permanent {
                        return Err(error.into());
                    }
                    match self.retry.should_retry(failure, attempt) {
                        RetryDecision::Retry { delay, .. } => {
                            warn!(%range, attempt, error = %error, "range request timed out; retrying");
                            if !delay.is_zero() {
                                tokio::time::sleep(delay).await;
                            }
                        }
                        RetryDecision::DoNotRetry { reason } => {
                            warn!(%range, attempt, %reason, "giving up on range window");
                            return Err(StreamError::max_retries_exceeded(
                                &self.url, range, attempt,
                            ));
                        }
                    }
                }
            }
        };

        if !response.is_success() {
            warn!(status = response.status(), %range, "unexpected status for range request");
        }

        if !self.state.size_probed {
            self.state.size_probed = true;
            match response.header("content-range").map(parse_content_range_total) {
                Some(Some(total)) => {
                    debug!(total, "learned total size");
                    self.state.total_size = Some(total);
                }
                Some(None) => warn!(
                    content_range = response.header("content-range").unwrap_or_default(),
                    "unparseable Content-Range; size unknown"
                ),
                None => warn!("no Content-Range on first response; size unknown"),
            }
        }

        self.state.window_limit = None;
        if self.state.total_size.is_none() {
            if response.status() == PARTIAL_CONTENT {
                self.state.window_limit = Some(stop.saturating_sub(start).saturating_add(1));
            } else if self.state.downloaded == 0 {
                debug!(
                    status = response.status(),
                    "range not honoured; reading body as the whole resource"
                );
                self.state.last_window = true;
            } else {
                warn!(status = response.status(), %range, "range not honoured mid-stream");
                return Err(StreamError::range_ignored(&self.url, range));
            }
        }

        self.range = range;
        Ok(response)
    }
}

/// Extracts `<total>` from `bytes <start>-<stop>/<total>`.
///
/// Returns `None` for a missing or `*` total.
#[must_use]
pub fn parse_content_range_total(header: &str) -> Option<u64> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}
