use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, REFERER, RETRY_AFTER};
use thiserror::Error;
use url::Url;

use super::config::ScrapeConfig;
use super::error::{Result, StatsError};
use super::types::ListingKind;

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
    pub retry_after: Option<Duration>,
}

/// The request never produced a status line (timeout, reset, DNS, body read).
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError(err.to_string())
    }
}

/// One worker's HTTP handle. A 200 here does not guarantee the page is real
/// content; rate-limited responses can look like success.
#[async_trait]
pub trait Session: Send + Sync {
    async fn get(&self, url: &str) -> std::result::Result<HttpResponse, TransportError>;
}

/// Hands out independent sessions, one per worker.
pub trait SessionProvider: Send + Sync {
    type Session: Session + 'static;

    fn session(&self) -> Result<Self::Session>;
}

/// Builds browser-like reqwest clients.
#[derive(Debug, Clone)]
pub struct BrowserSessions {
    timeout: Duration,
    user_agent: String,
    referer: String,
}

impl BrowserSessions {
    pub fn new(config: &ScrapeConfig) -> Self {
        Self {
            timeout: config.timeout,
            user_agent: config.user_agent.clone(),
            referer: format!("{}/", config.base_url.trim_end_matches('/')),
        }
    }

    fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
        let referer = HeaderValue::from_str(&self.referer)
            .map_err(|err| StatsError::Client(format!("invalid referer: {err}")))?;
        headers.insert(REFERER, referer);
        Ok(headers)
    }
}

impl SessionProvider for BrowserSessions {
    type Session = BrowserSession;

    fn session(&self) -> Result<BrowserSession> {
        let client = reqwest::Client::builder()
            .user_agent(self.user_agent.as_str())
            .default_headers(self.default_headers()?)
            .connect_timeout(Duration::from_secs(10).min(self.timeout))
            .timeout(self.timeout)
            .build()?;
        Ok(BrowserSession { client })
    }
}

pub struct BrowserSession {
    client: reqwest::Client,
}

#[async_trait]
impl Session for BrowserSession {
    async fn get(&self, url: &str) -> std::result::Result<HttpResponse, TransportError> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_retry_after);
        let body = response.text().await?;
        Ok(HttpResponse {
            status,
            body,
            retry_after,
        })
    }
}

/// Only the delta-seconds form is honored; HTTP dates fall back to backoff.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Fetch targets for one user, derived from the base origin.
#[derive(Debug, Clone)]
pub struct ProfileUrls {
    username: String,
    user_root: Url,
}

impl ProfileUrls {
    pub fn new(base_url: &str, username: &str) -> Result<Self> {
        let username = username.trim();
        if username.is_empty() || username.contains('/') {
            return Err(StatsError::InvalidUsername(username.to_string()));
        }
        let mut user_root =
            Url::parse(base_url).map_err(|_| StatsError::InvalidBaseUrl(base_url.to_string()))?;
        user_root.set_query(None);
        user_root.set_fragment(None);
        user_root
            .path_segments_mut()
            .map_err(|_| StatsError::InvalidBaseUrl(base_url.to_string()))?
            .pop_if_empty()
            .push("users")
            .push(username);
        Ok(Self {
            username: username.to_string(),
            user_root,
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn dashboard(&self) -> Url {
        self.user_root.clone()
    }

    pub fn profile(&self) -> Url {
        self.child("profile")
    }

    pub fn listing(&self, kind: ListingKind, page: u32) -> Url {
        let mut url = self.child(kind.path_segment());
        url.query_pairs_mut()
            .append_pair("page", &page.max(1).to_string());
        url
    }

    fn child(&self, segment: &str) -> Url {
        let mut url = self.user_root.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(segment);
        }
        url
    }
}
