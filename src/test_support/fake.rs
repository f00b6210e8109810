//! Scripted in-memory [`Transport`] for deterministic tests.
//!
//! The handler receives each request plus its zero-based index in the
//! request log, which is enough to inject timeouts on chosen attempts.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use crate::transport::{ResponseBody, Transport, TransportError, TransportRequest, TransportResponse};

type Handler =
    dyn Fn(&TransportRequest, usize) -> Result<TransportResponse, TransportError> + Send + Sync;

pub struct FakeTransport {
    handler: Box<Handler>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl FakeTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&TransportRequest, usize) -> Result<TransportResponse, TransportError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every request seen so far, in order.
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// `Range` headers of every request seen so far.
    pub fn ranges(&self) -> Vec<String> {
        self.requests()
            .iter()
            .filter_map(|r| r.header("range").map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn request(
        &self,
        request: TransportRequest,
    ) -> Result<TransportResponse, TransportError> {
        let index = {
            let mut log = self
                .requests
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            log.push(request.clone());
            log.len() - 1
        };
        (self.handler)(&request, index)
    }
}

/// Body served from a fixed list of buffers, optionally ending in an error.
pub struct ChunkedBody {
    parts: VecDeque<Bytes>,
    trailing_error: Option<TransportError>,
}

impl ChunkedBody {
    pub fn new(parts: Vec<Vec<u8>>) -> Self {
        Self {
            parts: parts.into_iter().map(Bytes::from).collect(),
            trailing_error: None,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn failing_after(parts: Vec<Vec<u8>>, error: TransportError) -> Self {
        Self {
            trailing_error: Some(error),
            ..Self::new(parts)
        }
    }
}

#[async_trait]
impl ResponseBody for ChunkedBody {
    async fn next_bytes(&mut self) -> Result<Option<Bytes>, TransportError> {
        if let Some(part) = self.parts.pop_front() {
            return Ok(Some(part));
        }
        match self.trailing_error.take() {
            Some(error) => Err(error),
            None => Ok(None),
        }
    }
}

/// Plain response with the given status, headers and body text.
pub fn response(status: u16, headers: &[(&str, &str)], body: &[u8]) -> TransportResponse {
    TransportResponse::new(
        status,
        headers.iter().map(|(k, v)| (*k, (*v).to_string())),
        Box::new(ChunkedBody::new(vec![body.to_vec()])),
    )
}

/// Parses `bytes=<start>-<stop>`.
pub fn parse_range(header: &str) -> Option<(u64, u64)> {
    let (start, stop) = header.strip_prefix("bytes=")?.split_once('-')?;
    Some((start.parse().ok()?, stop.parse().ok()?))
}

/// The part of `data` a request's `Range` header asks for (all of it when absent).
#[allow(clippy::cast_possible_truncation)]
pub fn range_slice<'a>(data: &'a [u8], request: &TransportRequest) -> &'a [u8] {
    let total = data.len() as u64;
    let (start, stop) = request
        .header("range")
        .and_then(parse_range)
        .unwrap_or((0, total.saturating_sub(1)));
    let end = stop.saturating_add(1).min(total) as usize;
    let start = (start.min(total) as usize).min(end);
    &data[start..end]
}

/// Serves `data` as a byte-range resource, splitting each body into
/// `piece`-sized buffers so chunk re-slicing is exercised.
#[allow(clippy::cast_possible_truncation)]
pub fn ranged_response(data: &[u8], request: &TransportRequest, piece: usize) -> TransportResponse {
    let slice = range_slice(data, request);
    let start = request
        .header("range")
        .and_then(parse_range)
        .map_or(0, |(start, _)| start);
    let last = start + (slice.len() as u64).saturating_sub(1);
    let parts = slice.chunks(piece.max(1)).map(<[u8]>::to_vec).collect();
    TransportResponse::new(
        206,
        [("Content-Range", format!("bytes {start}-{last}/{}", data.len()))],
        Box::new(ChunkedBody::new(parts)),
    )
}

/// Deterministic test payload of `len` bytes.
#[allow(clippy::cast_possible_truncation)]
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
