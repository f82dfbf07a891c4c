//! Outbound HTTP client for the portal
//!
//! One [`TransportClient`] is one session: it owns a cookie jar seeded by
//! [`init_session`](TransportClient::init_session), sends a fixed browser-like
//! header set with every request, and retries rate-limit and server-error
//! responses with exponential backoff before handing the response back.

use crate::config::TransportConfig;
use crate::error::{Error, Result};
use crate::retry::{IsRetryable, with_retry_if};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, ORIGIN, REFERER};
use reqwest::{Client, Method, Response};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Session-scoped HTTP client
#[derive(Clone, Debug)]
pub struct TransportClient {
    client: Client,
    config: TransportConfig,
    /// Set once the handshake has been attempted; shared by clones
    session: Arc<OnceCell<()>>,
}

impl TransportClient {
    /// Build a client with a fresh cookie jar
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let origin = config.origin.trim_end_matches('/');

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(ACCEPT_LANGUAGE, header_value("accept_language", &config.accept_language)?);
        headers.insert(ORIGIN, header_value("origin", origin)?);
        headers.insert(REFERER, header_value("origin", &format!("{}/", origin))?);

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            config: config.clone(),
            session: Arc::new(OnceCell::new()),
        })
    }

    /// Portal origin without a trailing slash
    pub fn origin(&self) -> &str {
        self.config.origin.trim_end_matches('/')
    }

    /// Absolute URL for a path on the origin
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.origin(), path)
        } else {
            format!("{}/{}", self.origin(), path)
        }
    }

    /// Transport settings this session was built with
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// GET the origin once to pick up session cookies
    ///
    /// Best-effort: several endpoints answer without the cookies, so failure
    /// is logged and swallowed. Only the first call per session (clones
    /// included) talks to the portal.
    pub async fn init_session(&self) {
        self.session.get_or_init(|| self.handshake()).await;
    }

    async fn handshake(&self) {
        let result = self
            .client
            .get(format!("{}/", self.origin()))
            .timeout(self.config.handshake_timeout)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!(origin = %self.origin(), "session established");
            }
            Ok(resp) => {
                tracing::warn!(
                    origin = %self.origin(),
                    status = resp.status().as_u16(),
                    "session handshake returned non-success status, continuing"
                );
            }
            Err(e) => {
                tracing::warn!(origin = %self.origin(), error = %e, "session handshake failed, continuing");
            }
        }
    }

    /// Send a request, retrying configured transient statuses and connection failures
    ///
    /// Any other status is returned as-is for the caller to interpret. When
    /// retries are exhausted on a transient status the result is
    /// [`Error::HttpStatus`].
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        form: Option<&[(&str, &str)]>,
        timeout: Duration,
    ) -> Result<Response> {
        let retry = &self.config.retry;

        with_retry_if(
            retry,
            |e: &Error| match e {
                Error::HttpStatus { status, .. } => retry.is_retry_status(*status),
                other => other.is_retryable(),
            },
            || async {
                let mut request = self.client.request(method.clone(), url).timeout(timeout);
                if let Some(form) = form {
                    request = request.form(form);
                }
                let response = request.send().await?;
                let status = response.status().as_u16();
                if retry.is_retry_status(status) {
                    return Err(Error::HttpStatus {
                        status,
                        url: url.to_string(),
                    });
                }
                Ok(response)
            },
        )
        .await
    }
}

fn header_value(key: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| Error::Config {
        message: format!("invalid header value: {}", e),
        key: Some(format!("transport.{}", key)),
    })
}
