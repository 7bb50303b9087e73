use crate::config::FetchConfig;
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::AcquireError;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub source_url: Url,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed with status {status}")]
    Status { url: String, status: u16 },
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request limiter closed")]
    Limiter(#[from] AcquireError),
}

pub trait Fetcher: Send + Sync + 'static {
    fn fetch(&self, url: &Url) -> impl Future<Output = Result<FetchedDocument, FetchError>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    retry_attempts: u8,
    retry_backoff: Duration,
}

impl HttpFetcher {
    pub fn from_config(config: &FetchConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (k, v) in &config.headers {
            let name = HeaderName::from_bytes(k.as_bytes())
                .with_context(|| format!("invalid header name {k}"))?;
            let value = HeaderValue::from_str(v)
                .with_context(|| format!("invalid header value for {k}"))?;
            headers.insert(name, value);
        }

        if let Some(user_agent) = &config.user_agent {
            headers.insert(USER_AGENT, HeaderValue::from_str(user_agent)?);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            client,
            retry_attempts: config.retry_attempts,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedDocument, FetchError> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.client.get(url.clone()).send().await {
                Ok(resp) if resp.status().is_success() => {
                    let source_url = resp.url().clone();
                    let body = resp.text().await.map_err(|source| FetchError::Transport {
                        url: url.to_string(),
                        source,
                    })?;
                    debug!(%url, bytes = body.len(), attempt, "fetched page");
                    return Ok(FetchedDocument { source_url, body });
                }
                Ok(resp) => {
                    let status = resp.status();
                    if !should_retry(Some(status), attempt, self.retry_attempts) {
                        return Err(FetchError::Status {
                            url: url.to_string(),
                            status: status.as_u16(),
                        });
                    }
                    warn!(%url, %status, attempt, "request failed; retrying");
                }
                Err(err) => {
                    if !should_retry(None, attempt, self.retry_attempts) {
                        return Err(FetchError::Transport {
                            url: url.to_string(),
                            source: err,
                        });
                    }
                    warn!(%url, attempt, error = %err, "request errored; retrying");
                }
            }

            tokio::time::sleep(self.retry_backoff).await;
        }
    }
}

/// Decides whether failed attempt number `attempt` (1-based) is followed by
/// another one. `status` is `None` for transport errors.
pub fn should_retry(status: Option<StatusCode>, attempt: u32, retry_attempts: u8) -> bool {
    attempt <= u32::from(retry_attempts) && status.is_none_or(is_retryable)
}

pub fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
}

#[derive(Debug, Clone)]
enum StaticPage {
    Body { body: String, delay: Duration },
    Status(u16),
}

/// Serves registered pages from memory. Unregistered URLs answer 404.
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    pages: HashMap<String, StaticPage>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, body: impl Into<String>) -> Self {
        self.with_delayed_page(url, body, Duration::ZERO)
    }

    pub fn with_delayed_page(
        mut self,
        url: &str,
        body: impl Into<String>,
        delay: Duration,
    ) -> Self {
        self.pages.insert(
            url.to_string(),
            StaticPage::Body {
                body: body.into(),
                delay,
            },
        );
        self
    }

    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.pages.insert(url.to_string(), StaticPage::Status(status));
        self
    }
}

impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedDocument, FetchError> {
        match self.pages.get(url.as_str()) {
            Some(StaticPage::Body { body, delay }) => {
                if !delay.is_zero() {
                    tokio::time::sleep(*delay).await;
                }
                Ok(FetchedDocument {
                    source_url: url.clone(),
                    body: body.clone(),
                })
            }
            Some(StaticPage::Status(status)) => Err(FetchError::Status {
                url: url.to_string(),
                status: *status,
            }),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}
