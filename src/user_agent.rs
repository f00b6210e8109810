//! Default request identity for the HTTP transport.
//!
//! The media and browse endpoints serve desktop-browser clients, so the
//! transport presents itself as one unless a caller overrides the agent.

/// Browser User-Agent sent by default.
pub(crate) const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_14) \
    AppleWebKit/605.1.15 (KHTML, like Gecko) Version/12.0 Safari/605.1.15";

/// Accept-Language sent with every request.
pub(crate) const ACCEPT_LANGUAGE: &str = "en-gb";

/// Accept sent with every request; covers HTML pages, JSON and media.
pub(crate) const ACCEPT: &str = "text/html,application/xhtml+xml,application/json,application/xml,*/*";
