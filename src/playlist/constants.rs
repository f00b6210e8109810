//! Fixed values of the playlist web client.

/// Site origin used for playlist pages, watch URLs and `X-Origin`.
pub const YOUTUBE_ORIGIN: &str = "https://www.youtube.com";

/// Continuation endpoint path.
pub const BROWSE_PATH: &str = "/youtubei/v1/browse";

/// `X-YouTube-Client-Name` for the web client.
pub const CLIENT_NAME_HEADER: &str = "1";

/// `clientName` in the continuation body.
pub const CLIENT_NAME: &str = "WEB";

/// Client version sent as a header and in the body.
pub const CLIENT_VERSION: &str = "2.20200720.00.02";

/// Prefix of every item identifier a page yields.
pub const WATCH_PREFIX: &str = "/watch?v=";

/// Query parameter carrying the playlist id.
pub const LIST_PARAM: &str = "list";
