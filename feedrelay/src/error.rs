//! Error types for feedrelay.

use std::time::Duration;

pub use common::ConfigError;

/// Top-level error: startup failures, plus a failed cycle when running a single cycle.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Chat error: {0}")]
    Chat(#[from] ChatError),

    #[error("Channel resolution error: {0}")]
    ChannelResolution(#[from] ChannelResolutionError),

    #[error("Cycle error: {0}")]
    Cycle(#[from] CycleError),
}

/// Chat platform request failures, tagged with the API operation that failed.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("{operation} request failed: {reason}")]
    Request { operation: String, reason: String },

    #[error("{operation} returned HTTP {status}: {body}")]
    Status {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("{operation} rate limited, retry after {retry_after:?}")]
    RateLimited {
        operation: String,
        retry_after: Option<Duration>,
    },

    #[error("{operation} returned an unreadable response: {reason}")]
    Decode { operation: String, reason: String },

    #[error("Authentication failed: {reason}")]
    AuthFailed { reason: String },
}

/// Failure to enumerate or create a destination channel at startup.
#[derive(Debug, thiserror::Error)]
pub enum ChannelResolutionError {
    #[error("failed to list joined spaces: {0}")]
    ListSpaces(#[source] ChatError),

    #[error("failed to list channels of space {space}: {source}")]
    ListChannels {
        space: String,
        #[source]
        source: ChatError,
    },

    #[error("failed to create channel #{topic} in space {space}: {source}")]
    Create {
        space: String,
        topic: String,
        #[source]
        source: ChatError,
    },
}

/// Failure to fetch or parse one feed URL. Always recovered inside the cycle.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("[{url}] request failed: {reason}")]
    Request { url: String, reason: String },

    #[error("[{url}] HTTP status {status}")]
    Status { url: String, status: u16 },

    #[error("[{url}] failed to parse feed: {reason}")]
    Parse { url: String, reason: String },

    #[error("[{url}] feed is missing {field}")]
    MissingField { url: String, field: &'static str },

    #[error("[{url}] parser task failed: {reason}")]
    Task { url: String, reason: String },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            FetchError::Request { url, .. }
            | FetchError::Status { url, .. }
            | FetchError::Parse { url, .. }
            | FetchError::MissingField { url, .. }
            | FetchError::Task { url, .. } => url,
        }
    }
}

/// Failure to deliver one message to one channel.
#[derive(Debug, thiserror::Error)]
#[error("failed to deliver to #{channel} ({space}) for topic {topic}: {source}")]
pub struct DeliveryError {
    pub topic: String,
    pub channel: String,
    pub space: String,
    #[source]
    pub source: ChatError,
}

/// Anything that ends one dispatch cycle early. The scheduler logs it and keeps polling.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error("cycle task panicked: {0}")]
    Panicked(String),
}
