//! Chunked byte-range and sequential segment streaming.
//!
//! Media servers often throttle or cut off single large GETs, so content is
//! fetched in fixed-size `Range` windows and handed to the consumer in small
//! chunks. Each window gets its own timeout retry budget.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tubefetch_core::download::RangeStreamer;
//! use tubefetch_core::{HttpTransport, StreamConfig, TransportConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Arc::new(HttpTransport::new(&TransportConfig::default())?);
//! let streamer = RangeStreamer::new(transport, StreamConfig::default());
//!
//! let mut stream = streamer.stream("https://media.example.com/videoplayback?id=1");
//! while let Some(chunk) = stream.next_chunk().await? {
//!     println!("{} bytes", chunk.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod constants;
mod error;
mod range;
mod retry;
mod segmented;

pub use error::StreamError;
pub use range::{RangeRequestState, RangeStream, RangeStreamer, parse_content_range_total};
pub use retry::{DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryPolicy, classify_error};
pub use segmented::{
    SEGMENT_COUNT_PATTERN, Segment, SegmentStream, SegmentStreamer, content_length,
    parse_segment_count, segmented_content_length, sequence_url,
};
