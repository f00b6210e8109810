//! Constants for the download module (window sizes, timeouts, backoff).

/// Default bytes per range window (9 MiB).
pub const DEFAULT_RANGE_SIZE: u64 = 9 * 1024 * 1024;

/// Default bytes per yielded chunk (4 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Default HTTP connect timeout (30 seconds).
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default whole-request timeout (15 minutes, sized for one full range window).
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 900;

/// Default backoff before the first retry.
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;

/// Default backoff cap.
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 8_000;

/// Query parameter carrying the segment sequence number.
pub const SEQUENCE_PARAM: &str = "sq";
