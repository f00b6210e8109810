//! Continuation request construction.

use std::collections::BTreeMap;

use serde_json::{Value, json};

use crate::config::InnertubeConfig;

/// Everything needed to fetch the page after a continuation token.
#[derive(Debug, Clone, PartialEq)]
pub struct ContinuationRequest {
    /// Browse endpoint including the `key` query parameter.
    pub endpoint_url: String,
    /// Client identification headers.
    pub headers: BTreeMap<String, String>,
    /// JSON body carrying the token and client context.
    pub body: Value,
}

impl ContinuationRequest {
    /// Builds the request for `token` with the client identity in `client`.
    #[must_use]
    pub fn new(client: &InnertubeConfig, api_key: &str, token: &str) -> Self {
        let headers = BTreeMap::from([
            (
                "X-YouTube-Client-Name".to_string(),
                client.client_name_header.clone(),
            ),
            (
                "X-YouTube-Client-Version".to_string(),
                client.client_version.clone(),
            ),
            ("X-Origin".to_string(), client.origin.clone()),
        ]);
        let body = json!({
            "continuation": token,
            "context": {
                "client": {
                    "clientName": client.client_name,
                    "clientVersion": client.client_version,
                }
            }
        });
        Self {
            endpoint_url: client.browse_url(api_key),
            headers,
            body,
        }
    }

    /// The token this request continues from.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.body.get("continuation").and_then(Value::as_str)
    }
}
