//! Page source -- the locating API and image host behind one testable trait.

use crate::transport::TransportClient;
use crate::types::{FetchOutcome, PageResolution};
use reqwest::Method;
use serde::Deserialize;

/// Path of the page-locating endpoint on the portal
pub const LOCATE_PATH: &str = "/api/baseQuery/completeProjectReport";

/// Application-level success code in locating-API payloads
const SUCCESS_CODE: i64 = 200;

/// How chatty a resolve call should be
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeMode {
    /// Real fetch; outcomes are logged at info/warn
    Fetch,
    /// Locator probe; outcomes are logged at debug only
    Check,
}

/// Result of a lightweight existence check against a resolved image URL
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceCheck {
    /// The resource answered with success
    Exists,
    /// The resource answered 404
    Missing,
    /// Anything else, including transport failure
    Inconclusive,
}

/// Abstraction over the portal's page endpoints, enabling testability.
#[async_trait::async_trait]
pub trait PageSource: Send + Sync {
    /// Establish whatever session the source needs. Best-effort.
    async fn init_session(&self) {}

    /// Ask where page `index` of `project_id` lives
    async fn resolve(&self, project_id: &str, index: u32, mode: ProbeMode) -> PageResolution;

    /// Download a resolved page image
    async fn download(&self, url: &str) -> FetchOutcome;

    /// Cheap existence check used by the locator to catch URLs handed out for absent pages
    async fn verify(&self, _url: &str) -> ResourceCheck {
        ResourceCheck::Inconclusive
    }
}

#[derive(Debug, Deserialize)]
struct LocateResponse {
    #[serde(default)]
    code: serde_json::Value,
    #[serde(default)]
    data: Option<LocateData>,
}

#[derive(Debug, Deserialize)]
struct LocateData {
    #[serde(default)]
    url: Option<String>,
}

impl LocateResponse {
    fn is_success(&self) -> bool {
        match &self.code {
            serde_json::Value::Number(n) => n.as_i64() == Some(SUCCESS_CODE),
            serde_json::Value::String(s) => s.trim().parse::<i64>().ok() == Some(SUCCESS_CODE),
            _ => false,
        }
    }

    fn image_path(&self) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|d| d.url.as_deref())
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }
}

/// Production [`PageSource`] talking to the portal over a [`TransportClient`]
pub struct HttpPageSource {
    transport: TransportClient,
}

impl HttpPageSource {
    /// Wrap a transport session
    pub fn new(transport: TransportClient) -> Self {
        Self { transport }
    }

    fn absolute(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            self.transport.url(path)
        }
    }
}

#[async_trait::async_trait]
impl PageSource for HttpPageSource {
    async fn init_session(&self) {
        self.transport.init_session().await;
    }

    async fn resolve(&self, project_id: &str, index: u32, mode: ProbeMode) -> PageResolution {
        let url = self.transport.url(LOCATE_PATH);
        let index_str = index.to_string();
        let form = [("id", project_id), ("index", index_str.as_str())];
        let timeout = self.transport.config().request_timeout;

        let response = match self
            .transport
            .send(Method::POST, &url, Some(&form), timeout)
            .await
        {
            Ok(r) => r,
            Err(e) => {
                log_transient(mode, index, &e.to_string());
                return PageResolution::Transient;
            }
        };

        let status = response.status();
        if !status.is_success() {
            log_transient(mode, index, &format!("HTTP {}", status.as_u16()));
            return PageResolution::Transient;
        }

        let body: LocateResponse = match response.json().await {
            Ok(b) => b,
            Err(e) => {
                log_transient(mode, index, &format!("unreadable payload: {}", e));
                return PageResolution::Transient;
            }
        };

        match (body.is_success(), body.image_path()) {
            (true, Some(path)) => {
                let image_url = self.absolute(path);
                if mode == ProbeMode::Fetch {
                    tracing::info!(project_id, index, url = %image_url, "page resolved");
                } else {
                    tracing::debug!(project_id, index, "probe found page");
                }
                PageResolution::Found(image_url)
            }
            _ => {
                if mode == ProbeMode::Fetch {
                    tracing::info!(project_id, index, code = %body.code, "no page at index");
                } else {
                    tracing::debug!(project_id, index, "probe found no page");
                }
                PageResolution::NotFound
            }
        }
    }

    async fn download(&self, url: &str) -> FetchOutcome {
        let timeout = self.transport.config().download_timeout;
        let response = match self.transport.send(Method::GET, url, None, timeout).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(url, error = %e, "page download failed");
                return FetchOutcome::Transient;
            }
        };

        match response.status().as_u16() {
            404 => {
                tracing::info!(url, "page image returned 404");
                FetchOutcome::NotFound
            }
            200 => match response.bytes().await {
                Ok(bytes) => {
                    tracing::debug!(url, size = bytes.len(), "page downloaded");
                    FetchOutcome::Bytes(bytes.to_vec())
                }
                Err(e) => {
                    tracing::warn!(url, error = %e, "page body read failed");
                    FetchOutcome::Transient
                }
            },
            status => {
                tracing::warn!(url, status, "unexpected page download status");
                FetchOutcome::Transient
            }
        }
    }

    async fn verify(&self, url: &str) -> ResourceCheck {
        let timeout = self.transport.config().request_timeout;
        match self.transport.send(Method::HEAD, url, None, timeout).await {
            Ok(r) if r.status().as_u16() == 404 => ResourceCheck::Missing,
            Ok(r) if r.status().is_success() => ResourceCheck::Exists,
            Ok(_) | Err(_) => ResourceCheck::Inconclusive,
        }
    }
}

fn log_transient(mode: ProbeMode, index: u32, reason: &str) {
    match mode {
        ProbeMode::Fetch => tracing::warn!(index, reason, "page resolve failed transiently"),
        ProbeMode::Check => tracing::debug!(index, reason, "probe failed transiently"),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RetryConfig, TransportConfig};
    use std::time::Duration;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source_for(server: &MockServer) -> HttpPageSource {
        let config = TransportConfig {
            origin: server.uri(),
            retry: RetryConfig {
                max_attempts: 1,
                initial_delay: Duration::from_millis(1),
                jitter: false,
                ..RetryConfig::default()
            },
            ..TransportConfig::default()
        };
        HttpPageSource::new(TransportClient::new(&config).unwrap())
    }

    async fn mount_locate(server: &MockServer, index: u32, template: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path(LOCATE_PATH))
            .and(body_string_contains(format!("index={index}").as_str()))
            .respond_with(template)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn resolve_found_joins_origin_and_path() {
        let server = MockServer::start().await;
        mount_locate(
            &server,
            1,
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 200,
                "data": { "url": "/report/abc/1.png" }
            })),
        )
        .await;

        let source = source_for(&server);
        assert_eq!(
            source.resolve("abc", 1, ProbeMode::Fetch).await,
            PageResolution::Found(format!("{}/report/abc/1.png", server.uri()))
        );
    }

    #[tokio::test]
    async fn resolve_empty_url_or_bad_code_is_not_found() {
        let server = MockServer::start().await;
        mount_locate(
            &server,
            2,
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "code": 200, "data": { "url": "" } })),
        )
        .await;
        mount_locate(
            &server,
            3,
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "code": 500, "data": { "url": "/x.png" } })),
        )
        .await;
        mount_locate(
            &server,
            4,
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "code": 200, "data": null })),
        )
        .await;

        let source = source_for(&server);
        for index in [2, 3, 4] {
            assert_eq!(
                source.resolve("abc", index, ProbeMode::Check).await,
                PageResolution::NotFound,
                "index {index}"
            );
        }
    }

    #[tokio::test]
    async fn resolve_http_failure_is_transient() {
        let server = MockServer::start().await;
        mount_locate(&server, 5, ResponseTemplate::new(503)).await;
        mount_locate(&server, 6, ResponseTemplate::new(403)).await;
        mount_locate(&server, 7, ResponseTemplate::new(200).set_body_string("<html>")).await;

        let source = source_for(&server);
        for index in [5, 6, 7] {
            assert_eq!(
                source.resolve("abc", index, ProbeMode::Fetch).await,
                PageResolution::Transient,
                "index {index}"
            );
        }
    }

    #[tokio::test]
    async fn download_classifies_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gone.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/forbidden.png"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let source = source_for(&server);
        let base = server.uri();
        assert_eq!(
            source.download(&format!("{base}/ok.png")).await,
            FetchOutcome::Bytes(vec![1, 2, 3])
        );
        assert_eq!(
            source.download(&format!("{base}/gone.png")).await,
            FetchOutcome::NotFound
        );
        assert_eq!(
            source.download(&format!("{base}/forbidden.png")).await,
            FetchOutcome::Transient
        );
    }

    #[tokio::test]
    async fn verify_distinguishes_missing_from_inconclusive() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/gone.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/odd.png"))
            .respond_with(ResponseTemplate::new(405))
            .mount(&server)
            .await;

        let source = source_for(&server);
        let base = server.uri();
        assert_eq!(source.verify(&format!("{base}/gone.png")).await, ResourceCheck::Missing);
        assert_eq!(
            source.verify(&format!("{base}/odd.png")).await,
            ResourceCheck::Inconclusive
        );
    }
}
