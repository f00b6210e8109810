//! Sequential segment streaming (`sq=0..N`).
//!
//! Segment 0 is a header blob whose bytes are delivered to the consumer like
//! any other data; it also carries a `Segment-Count: <n>` line that says how
//! many numbered segments follow. Segments are fetched strictly one after
//! another, each through a [`RangeStream`], because the count is only known
//! once the header has been read in full.

use std::sync::LazyLock;

use bytes::Bytes;
use futures_util::Stream;
use regex::bytes::Regex;
use tracing::{debug, info, instrument};
use url::Url;

use super::constants::SEQUENCE_PARAM;
use super::error::StreamError;
use super::range::{RangeStream, RangeStreamer};
use crate::transport::{Transport, TransportRequest};

/// Pattern searched for in each header line.
pub const SEGMENT_COUNT_PATTERN: &str = r"Segment-Count: (\d+)";

static SEGMENT_COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(SEGMENT_COUNT_PATTERN)
        .unwrap_or_else(|e| panic!("invalid static regex '{SEGMENT_COUNT_PATTERN}': {e}"))
});

/// A fully streamed segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// Sequence number (0 is the header).
    pub index: u64,
    /// Bytes delivered for this segment.
    pub byte_count: u64,
}

/// Starts sequential segment streams.
#[derive(Debug, Clone)]
pub struct SegmentStreamer {
    ranges: RangeStreamer,
}

impl SegmentStreamer {
    /// Wraps a range streamer; every segment is fetched through it.
    #[must_use]
    pub fn new(ranges: RangeStreamer) -> Self {
        Self { ranges }
    }

    /// Starts a segment stream for `url`.
    ///
    /// Existing query parameters are kept; `sq` is set per segment.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidUrl`] if `url` does not parse.
    pub fn stream_segments(&self, url: &str) -> Result<SegmentStream, StreamError> {
        let base = Url::parse(url).map_err(|_| StreamError::invalid_url(url))?;
        Ok(SegmentStream {
            ranges: self.ranges.clone(),
            base,
            phase: Phase::Start,
            header: Vec::new(),
            segment_count: None,
            completed: Vec::new(),
            current_bytes: 0,
        })
    }
}

enum Phase {
    Start,
    Header(RangeStream),
    Segment {
        seq: u64,
        count: u64,
        stream: RangeStream,
    },
    Done,
}

/// One in-progress segment stream. Finite and not restartable.
pub struct SegmentStream {
    ranges: RangeStreamer,
    base: Url,
    phase: Phase,
    header: Vec<u8>,
    segment_count: Option<u64>,
    completed: Vec<Segment>,
    current_bytes: u64,
}

impl std::fmt::Debug for SegmentStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentStream")
            .field("base", &self.base.as_str())
            .field("completed", &self.completed)
            .finish_non_exhaustive()
    }
}

impl SegmentStream {
    /// Segments delivered in full so far, in order.
    #[must_use]
    pub fn completed(&self) -> &[Segment] {
        &self.completed
    }

    /// Segment count announced by the header, once it has been read.
    #[must_use]
    pub fn segment_count(&self) -> Option<u64> {
        self.segment_count
    }

    /// Returns the next chunk, header segment first, then `sq=1..N` in order.
    ///
    /// # Errors
    ///
    /// - Any [`RangeStream`] error for the segment being fetched
    /// - [`StreamError::SegmentCountMissing`] when the header has no
    ///   `Segment-Count` line (after the header bytes were yielded)
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, StreamError> {
        loop {
            match &mut self.phase {
                Phase::Done => return Ok(None),
                Phase::Start => {
                    let url = sequence_url(&self.base, 0);
                    debug!(%url, "requesting header segment");
                    self.phase = Phase::Header(self.ranges.stream(url));
                }
                Phase::Header(stream) => match stream.next_chunk().await {
                    Ok(Some(chunk)) => {
                        self.header.extend_from_slice(&chunk);
                        self.current_bytes += chunk.len() as u64;
                        return Ok(Some(chunk));
                    }
                    Ok(None) => {
                        let header_url = stream.url().to_string();
                        self.close_segment(0);
                        let Some(count) = parse_segment_count(&self.header) else {
                            self.phase = Phase::Done;
                            return Err(StreamError::segment_count_missing(
                                header_url,
                                SEGMENT_COUNT_PATTERN,
                            ));
                        };
                        debug!(count, "header segment parsed");
                        self.segment_count = Some(count);
                        self.phase = self.start_segment(1, count);
                    }
                    Err(error) => {
                        self.phase = Phase::Done;
                        return Err(error);
                    }
                },
                Phase::Segment { seq, count, stream } => match stream.next_chunk().await {
                    Ok(Some(chunk)) => {
                        self.current_bytes += chunk.len() as u64;
                        return Ok(Some(chunk));
                    }
                    Ok(None) => {
                        let (seq, count) = (*seq, *count);
                        self.close_segment(seq);
                        self.phase = self.start_segment(seq + 1, count);
                    }
                    Err(error) => {
                        self.phase = Phase::Done;
                        return Err(error);
                    }
                },
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

    fn close_segment(&mut self, index: u64) {
        self.completed.push(Segment {
            index,
            byte_count: self.current_bytes,
        });
        self.current_bytes = 0;
    }

    fn start_segment(&self, seq: u64, count: u64) -> Phase {
        if seq > count {
            info!(
                base = %self.base,
                segments = count,
                "segment stream complete"
            );
            return Phase::Done;
        }
        let url = sequence_url(&self.base, seq);
        debug!(seq, count, %url, "requesting segment");
        Phase::Segment {
            seq,
            count,
            stream: self.ranges.stream(url),
        }
    }
}

/// Builds `base` with `sq=<seq>`, keeping every other query parameter.
#[must_use]
pub fn sequence_url(base: &Url, seq: u64) -> String {
    let kept: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(key, _)| key != SEQUENCE_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut url = base.clone();
    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (key, value) in &kept {
            pairs.append_pair(key, value);
        }
        pairs.append_pair(SEQUENCE_PARAM, &seq.to_string());
    }
    url.into()
}

/// Finds the last `Segment-Count: <n>` among the header's CRLF-separated lines.
#[must_use]
pub fn parse_segment_count(header: &[u8]) -> Option<u64> {
    header
        .split(|&b| b == b'\n')
        .filter_map(|line| SEGMENT_COUNT.captures(line.strip_suffix(b"\r").unwrap_or(line)))
        .filter_map(|caps| {
            let digits = caps.get(1)?.as_bytes();
            std::str::from_utf8(digits).ok()?.parse().ok()
        })
        .last()
}

/// Size of a plain resource from a HEAD request's `Content-Length`.
///
/// # Errors
///
/// - [`StreamError::Transport`] if the request fails
/// - [`StreamError::MissingContentLength`] if the header is absent or not a number
#[instrument(skip(transport))]
pub async fn content_length(transport: &dyn Transport, url: &str) -> Result<u64, StreamError> {
    let response = transport.request(TransportRequest::head(url)).await?;
    response
        .header("content-length")
        .and_then(|value| value.trim().parse().ok())
        .ok_or_else(|| StreamError::missing_content_length(url))
}

/// Total size of a segmented resource.
///
/// Fetches the header segment in full (its bytes count towards the total),
/// reads `Segment-Count` from it, then sums `Content-Length` from a HEAD
/// request per numbered segment. `Segment-Count: 0` is a valid count and
/// yields the header size alone.
///
/// # Errors
///
/// - [`StreamError::InvalidUrl`] if `url` does not parse
/// - [`StreamError::SegmentCountMissing`] if the header has no count
/// - [`StreamError::MissingContentLength`] if a segment HEAD lacks a size
/// - [`StreamError::Transport`] for request failures
#[instrument(skip(transport))]
pub async fn segmented_content_length(
    transport: &dyn Transport,
    url: &str,
) -> Result<u64, StreamError> {
    let base = Url::parse(url).map_err(|_| StreamError::invalid_url(url))?;

    let header_url = sequence_url(&base, 0);
    let header = transport
        .request(TransportRequest::get(&header_url))
        .await?
        .bytes()
        .await?;

    let count = parse_segment_count(&header)
        .ok_or_else(|| StreamError::segment_count_missing(&header_url, SEGMENT_COUNT_PATTERN))?;

    let mut total = header.len() as u64;
    for seq in 1..=count {
        total += content_length(transport, &sequence_url(&base, seq)).await?;
    }
    debug!(count, total, "segmented size computed");
    Ok(total)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::StreamConfig;
    use crate::test_support::fake::{FakeTransport, payload, ranged_response, response};
    use crate::transport::TransportError;
    use futures_util::TryStreamExt;

    const HEADER: &[u8] = b"Content-Type: video/mp4\r\nSegment-Count: 3\r\nX-Head-Seqnum: 3\r\n\r\n";

    fn segment_body(seq: u64) -> Vec<u8> {
        match seq {
            0 => HEADER.to_vec(),
            n => payload(40 + n as usize * 10).into_iter().map(|b| b ^ n as u8).collect(),
        }
    }

    fn seq_of(url: &str) -> u64 {
        Url::parse(url)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == "sq")
            .map(|(_, v)| v.parse().unwrap())
            .unwrap()
    }

    fn segmented_fake() -> Arc<FakeTransport> {
        Arc::new(FakeTransport::new(|req, _| {
            Ok(ranged_response(&segment_body(seq_of(&req.url)), req, 16))
        }))
    }

    fn streamer(fake: &Arc<FakeTransport>) -> SegmentStreamer {
        let config = StreamConfig {
            range_size: 32,
            chunk_size: 8,
            max_retries: 1,
            retry_base_delay_ms: 0,
            retry_max_delay_ms: 0,
        };
        SegmentStreamer::new(RangeStreamer::new(
            Arc::clone(fake) as Arc<dyn Transport>,
            config,
        ))
    }

    #[test]
    fn test_parse_segment_count_finds_line() {
        assert_eq!(parse_segment_count(HEADER), Some(3));
        assert_eq!(parse_segment_count(b"Segment-Count: 12"), Some(12));
        assert_eq!(parse_segment_count(b"Content-Type: video/mp4\r\n"), None);
    }

    #[test]
    fn test_parse_segment_count_takes_last_match() {
        assert_eq!(
            parse_segment_count(b"Segment-Count: 2\r\nSegment-Count: 5\r\n"),
            Some(5)
        );
    }

    #[test]
    fn test_sequence_url_replaces_sq_and_keeps_other_params() {
        let base = Url::parse("https://media.test/videoplayback?id=abc&sq=9&itag=22").unwrap();
        let url = sequence_url(&base, 0);
        assert_eq!(url, "https://media.test/videoplayback?id=abc&itag=22&sq=0");

        let base = Url::parse("https://media.test/videoplayback").unwrap();
        assert_eq!(sequence_url(&base, 4), "https://media.test/videoplayback?sq=4");
    }

    #[tokio::test]
    async fn test_stream_segments_yields_header_then_segments_in_order() {
        let fake = segmented_fake();
        let mut stream = streamer(&fake).stream_segments("https://media.test/v?id=x").unwrap();

        let mut bytes = Vec::new();
        while let Some(chunk) = stream.next_chunk().await.unwrap() {
            bytes.extend_from_slice(&chunk);
        }

        let expected: Vec<u8> = (0..=3).flat_map(segment_body).collect();
        assert_eq!(bytes, expected);
        assert_eq!(stream.segment_count(), Some(3));
        let indices: Vec<u64> = stream.completed().iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert_eq!(stream.completed()[0].byte_count, HEADER.len() as u64);
        assert_eq!(stream.completed()[2].byte_count, 60);

        let seqs: Vec<u64> = fake.requests().iter().map(|r| seq_of(&r.url)).collect();
        assert!(seqs.windows(2).all(|w| w[0] <= w[1]), "out of order: {seqs:?}");
        assert_eq!(seqs.first(), Some(&0));
        assert_eq!(seqs.last(), Some(&3));
    }

    #[tokio::test]
    async fn test_missing_segment_count_fails_after_header_bytes() {
        let fake = Arc::new(FakeTransport::new(|req, _| {
            Ok(ranged_response(b"Content-Type: video/mp4\r\n", req, 64))
        }));
        let mut stream = streamer(&fake).stream_segments("https://media.test/v").unwrap();

        let mut header = Vec::new();
        let error = loop {
            match stream.next_chunk().await {
                Ok(Some(chunk)) => header.extend_from_slice(&chunk),
                Ok(None) => panic!("expected SegmentCountMissing"),
                Err(error) => break error,
            }
        };

        assert_eq!(header, b"Content-Type: video/mp4\r\n");
        assert!(matches!(error, StreamError::SegmentCountMissing { .. }));
        assert!(stream.next_chunk().await.unwrap().is_none());
        assert!(fake.requests().iter().all(|r| seq_of(&r.url) == 0));
    }

    #[tokio::test]
    async fn test_zero_segment_count_yields_header_only() {
        let fake = Arc::new(FakeTransport::new(|req, _| {
            Ok(ranged_response(b"Segment-Count: 0\r\n", req, 64))
        }));
        let bytes = streamer(&fake)
            .stream_segments("https://media.test/v")
            .unwrap()
            .read_to_end()
            .await
            .unwrap();

        assert_eq!(bytes, b"Segment-Count: 0\r\n");
        assert_eq!(fake.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_segment_error_ends_stream() {
        let fake = Arc::new(FakeTransport::new(|req, _| {
            if seq_of(&req.url) == 2 {
                Err(TransportError::timeout(&req.url))
            } else {
                Ok(ranged_response(&segment_body(seq_of(&req.url)), req, 64))
            }
        }));

        let result = streamer(&fake)
            .stream_segments("https://media.test/v")
            .unwrap()
            .read_to_end()
            .await;

        assert!(matches!(result, Err(StreamError::MaxRetriesExceeded { .. })));
        assert!(fake.requests().iter().all(|r| seq_of(&r.url) <= 2));
    }

    #[tokio::test]
    async fn test_into_stream_matches_pull_api() {
        let fake = segmented_fake();
        let chunks: Vec<Bytes> = streamer(&fake)
            .stream_segments("https://media.test/v")
            .unwrap()
            .into_stream()
            .try_collect()
            .await
            .unwrap();

        let expected: Vec<u8> = (0..=3).flat_map(segment_body).collect();
        assert_eq!(chunks.concat(), expected);
    }

    #[test]
    fn test_invalid_url_rejected() {
        let fake = segmented_fake();
        assert!(matches!(
            streamer(&fake).stream_segments("not a url"),
            Err(StreamError::InvalidUrl { .. })
        ));
    }

    #[tokio::test]
    async fn test_segmented_content_length_sums_header_and_heads() {
        let fake = FakeTransport::new(|req, _| {
            let seq = seq_of(&req.url);
            match req.method {
                crate::transport::Method::Get => Ok(response(200, &[], HEADER)),
                crate::transport::Method::Head => {
                    let len = (seq * 100).to_string();
                    Ok(response(200, &[("Content-Length", len.as_str())], b""))
                }
                crate::transport::Method::Post => unreachable!(),
            }
        });

        let total = segmented_content_length(&fake, "https://media.test/v").await.unwrap();
        assert_eq!(total, HEADER.len() as u64 + 100 + 200 + 300);
    }

    #[tokio::test]
    async fn test_segmented_content_length_missing_count_fails_fast() {
        let fake = FakeTransport::new(|_, _| Ok(response(200, &[], b"no count here")));

        let result = segmented_content_length(&fake, "https://media.test/v").await;
        assert!(matches!(result, Err(StreamError::SegmentCountMissing { .. })));
        assert_eq!(fake.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_segmented_content_length_zero_count_is_header_size() {
        let fake = FakeTransport::new(|_, _| Ok(response(200, &[], b"Segment-Count: 0\r\n")));

        let total = segmented_content_length(&fake, "https://media.test/v").await.unwrap();
        assert_eq!(total, b"Segment-Count: 0\r\n".len() as u64);
        assert_eq!(fake.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_content_length_requires_header() {
        let fake = FakeTransport::new(|_, _| Ok(response(200, &[], b"")));
        let result = content_length(&fake, "https://media.test/v").await;
        assert!(matches!(result, Err(StreamError::MissingContentLength { .. })));

        let fake = FakeTransport::new(|_, _| Ok(response(200, &[("Content-Length", "42")], b"")));
        assert_eq!(content_length(&fake, "https://media.test/v").await.unwrap(), 42);
    }
}
