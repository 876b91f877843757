#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use feedrelay::chat::{BotUser, ChannelHandle, ChatPlatform, Space};
use feedrelay::error::{ChatError, FetchError};
use feedrelay::feed::{FeedDocument, FeedEntry};
use feedrelay::formatter::OutgoingMessage;
use feedrelay::ingestion::FeedFetcher;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Ordered record of what the fakes saw, shared between fetcher and chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Fetched(String),
    FetchFailed(String),
    Sent { channel: String, title: String },
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

pub fn entry(title: &str, published: DateTime<Utc>) -> FeedEntry {
    FeedEntry {
        published: Some(published),
        title: title.to_string(),
        link: format!("https://a.example/{title}"),
        summary: format!("summary of {title}"),
    }
}

pub fn document(site: &str, entries: Vec<FeedEntry>) -> FeedDocument {
    FeedDocument {
        site_name: site.to_string(),
        entries,
    }
}

pub fn ago(now: DateTime<Utc>, secs: i64) -> DateTime<Utc> {
    now - Duration::seconds(secs)
}

enum FakeFeed {
    Ok(FeedDocument),
    Fail,
}

pub struct FakeFetcher {
    feeds: HashMap<String, FakeFeed>,
    delay: std::time::Duration,
    panic_pending: AtomicBool,
    log: EventLog,
}

impl FakeFetcher {
    pub fn new(log: EventLog) -> Self {
        Self {
            feeds: HashMap::new(),
            delay: std::time::Duration::ZERO,
            panic_pending: AtomicBool::new(false),
            log,
        }
    }

    /// The first fetch panics; later ones behave normally.
    pub fn panicking_once(self) -> Self {
        self.panic_pending.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_feed(mut self, url: &str, doc: FeedDocument) -> Self {
        self.feeds.insert(url.to_string(), FakeFeed::Ok(doc));
        self
    }

    pub fn with_failure(mut self, url: &str) -> Self {
        self.feeds.insert(url.to_string(), FakeFeed::Fail);
        self
    }

    /// Every fetch sleeps this long before answering.
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait::async_trait]
impl FeedFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<FeedDocument, FetchError> {
        if self.panic_pending.swap(false, Ordering::SeqCst) {
            panic!("fetcher blew up on {url}");
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.feeds.get(url) {
            Some(FakeFeed::Ok(doc)) => {
                self.log.lock().unwrap().push(Event::Fetched(url.to_string()));
                Ok(doc.clone())
            }
            _ => {
                self.log
                    .lock()
                    .unwrap()
                    .push(Event::FetchFailed(url.to_string()));
                Err(FetchError::Request {
                    url: url.to_string(),
                    reason: "connection refused".into(),
                })
            }
        }
    }
}

#[derive(Default)]
struct ChatState {
    channels: HashMap<String, Vec<ChannelHandle>>,
    created: Vec<ChannelHandle>,
    sent: Vec<(ChannelHandle, OutgoingMessage)>,
    next_id: u64,
    failing_sends: usize,
}

/// In-memory chat platform with a configurable set of spaces.
pub struct FakeChat {
    spaces: Vec<Space>,
    state: Mutex<ChatState>,
    log: EventLog,
    fail_connect: bool,
    fail_create: bool,
}

impl FakeChat {
    pub fn new(log: EventLog) -> Self {
        Self {
            spaces: Vec::new(),
            state: Mutex::new(ChatState {
                next_id: 1000,
                ..ChatState::default()
            }),
            log,
            fail_connect: false,
            fail_create: false,
        }
    }

    pub fn with_space(mut self, id: &str, name: &str, existing_channels: &[&str]) -> Self {
        let space = Space {
            id: id.to_string(),
            name: name.to_string(),
        };
        {
            let mut state = self.state.lock().unwrap();
            let mut handles = Vec::new();
            for channel in existing_channels {
                state.next_id += 1;
                handles.push(ChannelHandle {
                    id: state.next_id.to_string(),
                    name: channel.to_string(),
                    space_id: space.id.clone(),
                    space_name: space.name.clone(),
                });
            }
            state.channels.insert(space.id.clone(), handles);
        }
        self.spaces.push(space);
        self
    }

    /// The next `n` sends fail with HTTP 500.
    pub fn failing_sends(self, n: usize) -> Self {
        self.state.lock().unwrap().failing_sends = n;
        self
    }

    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub fn created(&self) -> Vec<ChannelHandle> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn sent(&self) -> Vec<(ChannelHandle, OutgoingMessage)> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn channels_in(&self, space_id: &str) -> Vec<ChannelHandle> {
        self.state
            .lock()
            .unwrap()
            .channels
            .get(space_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl ChatPlatform for FakeChat {
    async fn connect(&self) -> Result<BotUser, ChatError> {
        if self.fail_connect {
            return Err(ChatError::AuthFailed {
                reason: "401: Unauthorized".into(),
            });
        }
        Ok(BotUser {
            id: "42".into(),
            name: "relay-bot".into(),
        })
    }

    async fn spaces(&self) -> Result<Vec<Space>, ChatError> {
        Ok(self.spaces.clone())
    }

    async fn text_channels(&self, space: &Space) -> Result<Vec<ChannelHandle>, ChatError> {
        Ok(self.channels_in(&space.id))
    }

    async fn create_text_channel(
        &self,
        space: &Space,
        name: &str,
    ) -> Result<ChannelHandle, ChatError> {
        if self.fail_create {
            return Err(ChatError::Status {
                operation: "create channel".into(),
                status: 403,
                body: "Missing Permissions".into(),
            });
        }
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let handle = ChannelHandle {
            id: state.next_id.to_string(),
            name: name.to_string(),
            space_id: space.id.clone(),
            space_name: space.name.clone(),
        };
        state
            .channels
            .entry(space.id.clone())
            .or_default()
            .push(handle.clone());
        state.created.push(handle.clone());
        Ok(handle)
    }

    async fn send(
        &self,
        channel: &ChannelHandle,
        message: &OutgoingMessage,
    ) -> Result<(), ChatError> {
        let mut state = self.state.lock().unwrap();
        if state.failing_sends > 0 {
            state.failing_sends -= 1;
            return Err(ChatError::Status {
                operation: "send message".into(),
                status: 500,
                body: "boom".into(),
            });
        }
        state.sent.push((channel.clone(), message.clone()));
        self.log.lock().unwrap().push(Event::Sent {
            channel: format!("{}/{}", channel.space_name, channel.name),
            title: message.title.clone(),
        });
        Ok(())
    }
}
