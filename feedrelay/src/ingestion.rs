use common::FetchConfig;
use reqwest::Client;
use std::time::Duration;

use crate::error::FetchError;
use crate::feed::FeedDocument;

/// Turns a feed URL into a parsed document. No filtering, no caching.
#[async_trait::async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FeedDocument, FetchError>;
}

/// Fetches feeds over HTTP and parses them with `feed-rs` on the blocking pool.
pub struct HttpFeedFetcher {
    client: Client,
}

impl HttpFeedFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, url: &str) -> Result<FeedDocument, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Request {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| FetchError::Request {
            url: url.to_string(),
            reason: format!("failed to read response body: {e}"),
        })?;

        let owned_url = url.to_string();
        let document = tokio::task::spawn_blocking(move || parse_feed(&owned_url, &bytes))
            .await
            .map_err(|e| FetchError::Task {
                url: url.to_string(),
                reason: e.to_string(),
            })??;

        tracing::info!("[{}] Fetched feed", url);
        Ok(document)
    }
}

/// Parse raw feed bytes (RSS, Atom or JSON Feed) into a typed document.
pub fn parse_feed(url: &str, bytes: &[u8]) -> Result<FeedDocument, FetchError> {
    let feed = feed_rs::parser::parse(bytes).map_err(|e| FetchError::Parse {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    FeedDocument::from_feed(url, feed)
}
