//! `reqwest`-backed [`Transport`] implementation.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use reqwest::{Client, ClientBuilder};
use tracing::{debug, instrument, warn};
use url::Url;

use super::{Method, ResponseBody, Transport, TransportError, TransportRequest, TransportResponse};
use crate::config::TransportConfig;
use crate::user_agent;

/// HTTP transport over a pooled `reqwest` client.
///
/// Cheap to clone; clones share the connection pool, so one instance can
/// serve any number of concurrent streams and enumerations.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Builds a transport from explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ClientBuild`] if `reqwest` rejects the
    /// configuration.
    #[instrument(level = "debug", skip(config))]
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let client = build_client(config)
            .build()
            .map_err(|source| TransportError::ClientBuild { source })?;
        Ok(Self { client })
    }

    /// Wraps an already configured client.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn request(
        &self,
        request: TransportRequest,
    ) -> Result<TransportResponse, TransportError> {
        let url = validate_url(&request.url)?;

        let mut builder = match request.method {
            Method::Get => self.client.get(url),
            Method::Head => self.client.head(url),
            Method::Post => self.client.post(url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&request.url, e))?;

        let status = response.status().as_u16();
        if status == 400 {
            return Err(TransportError::bad_request(&request.url));
        }
        if !response.status().is_success() {
            // Passed through; callers decide what a non-2xx means for them.
            warn!(status, "non-success status");
        }
        debug!(status, "response received");

        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        Ok(TransportResponse::new(
            status,
            headers,
            Box::new(ReqwestBody {
                url: request.url,
                response,
            }),
        ))
    }
}

struct ReqwestBody {
    url: String,
    response: reqwest::Response,
}

#[async_trait]
impl ResponseBody for ReqwestBody {
    async fn next_bytes(&mut self) -> Result<Option<Bytes>, TransportError> {
        self.response
            .chunk()
            .await
            .map_err(|e| TransportError::from_reqwest(&self.url, e))
    }
}

fn validate_url(raw: &str) -> Result<Url, TransportError> {
    let url = Url::parse(raw).map_err(|_| TransportError::invalid_url(raw))?;
    if matches!(url.scheme(), "http" | "https") {
        Ok(url)
    } else {
        Err(TransportError::invalid_url(raw))
    }
}

fn build_client(config: &TransportConfig) -> ClientBuilder {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static(user_agent::ACCEPT_LANGUAGE),
    );
    default_headers.insert(ACCEPT, HeaderValue::from_static(user_agent::ACCEPT));

    let agent = config
        .user_agent
        .clone()
        .unwrap_or_else(|| user_agent::BROWSER_USER_AGENT.to_string());

    Client::builder()
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .gzip(true)
        .cookie_store(true)
        .user_agent(agent)
        .default_headers(default_headers)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, ResponseTemplate};

    fn transport() -> HttpTransport {
        HttpTransport::new(&TransportConfig::default()).unwrap()
    }

    #[test]
    fn test_validate_url_rejects_non_http() {
        assert!(matches!(
            validate_url("ftp://example.com/file"),
            Err(TransportError::InvalidUrl { .. })
        ));
        assert!(matches!(
            validate_url("not a url"),
            Err(TransportError::InvalidUrl { .. })
        ));
        assert!(validate_url("https://example.com/watch").is_ok());
    }

    #[tokio::test]
    async fn test_invalid_url_fails_without_network() {
        let result = transport().request(TransportRequest::get("youtube.com/watch")).await;
        assert!(matches!(result, Err(TransportError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_get_sends_headers_and_returns_body() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("GET"))
            .and(path("/media"))
            .and(header("Range", "bytes=0-3"))
            .respond_with(
                ResponseTemplate::new(206)
                    .insert_header("Content-Range", "bytes 0-3/10")
                    .set_body_bytes(b"abcd".to_vec()),
            )
            .mount(&mock_server)
            .await;

        let url = format!("{}/media", mock_server.uri());
        let response = transport()
            .request(TransportRequest::get(&url).with_header("Range", "bytes=0-3"))
            .await
            .unwrap();

        assert_eq!(response.status(), 206);
        assert_eq!(response.header("content-range"), Some("bytes 0-3/10"));
        assert_eq!(response.bytes().await.unwrap(), b"abcd");
    }

    #[tokio::test]
    async fn test_status_400_is_distinguished_error() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("POST"))
            .and(path("/browse"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&mock_server)
            .await;

        let url = format!("{}/browse", mock_server.uri());
        let result = transport()
            .request(TransportRequest::post_json(&url, serde_json::json!({})))
            .await;

        assert!(matches!(result, Err(TransportError::BadRequest { .. })));
    }

    #[tokio::test]
    async fn test_other_error_statuses_pass_through() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
            .mount(&mock_server)
            .await;

        let url = format!("{}/gone", mock_server.uri());
        let response = transport().request(TransportRequest::get(&url)).await.unwrap();
        assert_eq!(response.status(), 404);
        assert_eq!(response.text().await.unwrap(), "missing");
    }

    #[tokio::test]
    async fn test_post_sends_json_body() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        let body = serde_json::json!({"continuation": "tok"});
        Mock::given(method("POST"))
            .and(path("/browse"))
            .and(body_json(body.clone()))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let url = format!("{}/browse", mock_server.uri());
        let text = transport()
            .request(TransportRequest::post_json(&url, body))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(text, "{}");
    }

    #[tokio::test]
    async fn test_slow_response_maps_to_timeout() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&mock_server)
            .await;

        let config = TransportConfig {
            request_timeout_secs: 1,
            ..TransportConfig::default()
        };
        let transport = HttpTransport::new(&config).unwrap();
        let url = format!("{}/slow", mock_server.uri());
        let result = transport.request(TransportRequest::get(&url)).await;

        assert!(
            matches!(result, Err(TransportError::Timeout { .. })),
            "Expected Timeout, got: {result:?}"
        );
    }
}
