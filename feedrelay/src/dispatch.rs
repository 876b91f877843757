use common::FeedSource;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};

use crate::channels::ChannelBinding;
use crate::chat::ChatPlatform;
use crate::error::{CycleError, DeliveryError, FetchError};
use crate::filter::{filter_entries, Window};
use crate::formatter::{format_entry, OutgoingMessage};
use crate::ingestion::FeedFetcher;

/// Counters for one polling round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub feeds_fetched: usize,
    pub feeds_failed: usize,
    pub entries_seen: usize,
    pub entries_matched: usize,
    pub messages_delivered: usize,
}

struct FeedOutcome {
    total: usize,
    messages: Vec<OutgoingMessage>,
}

/// One polling round over every configured topic.
///
/// Per topic: fetch all URLs concurrently, wait for every one of them, then send
/// the collected messages to each bound channel in order. A failed fetch only
/// loses that URL's messages; a failed send ends the round.
pub struct DispatchCycle {
    sources: Vec<FeedSource>,
    binding: ChannelBinding,
    fetcher: Arc<dyn FeedFetcher>,
    chat: Arc<dyn ChatPlatform>,
}

impl DispatchCycle {
    pub fn new(
        sources: Vec<FeedSource>,
        binding: ChannelBinding,
        fetcher: Arc<dyn FeedFetcher>,
        chat: Arc<dyn ChatPlatform>,
    ) -> Self {
        Self {
            sources,
            binding,
            fetcher,
            chat,
        }
    }

    pub async fn run(&self, window: Window) -> Result<CycleReport, CycleError> {
        let mut report = CycleReport::default();

        for source in &self.sources {
            let messages = self.gather(source, &window, &mut report).await;
            report.entries_matched += messages.len();
            self.deliver(&source.topic, &messages, &mut report).await?;
        }

        info!(
            after = %window.after.to_rfc3339(),
            until = ?window.until.map(|u| u.to_rfc3339()),
            fetched = report.feeds_fetched,
            failed = report.feeds_failed,
            matched = report.entries_matched,
            delivered = report.messages_delivered,
            "dispatch cycle finished"
        );
        Ok(report)
    }

    /// Fan out over the topic's URLs and join. Results keep URL order.
    async fn gather(
        &self,
        source: &FeedSource,
        window: &Window,
        report: &mut CycleReport,
    ) -> Vec<OutgoingMessage> {
        let results = join_all(source.urls.iter().map(|url| self.collect(url, window))).await;

        let mut messages = Vec::new();
        for result in results {
            match result {
                Ok(outcome) => {
                    report.feeds_fetched += 1;
                    report.entries_seen += outcome.total;
                    messages.extend(outcome.messages);
                }
                Err(e) => {
                    report.feeds_failed += 1;
                    warn!(topic = %source.topic, url = %e.url(), error = %e, "feed fetch failed");
                }
            }
        }
        messages
    }

    async fn collect(&self, url: &str, window: &Window) -> Result<FeedOutcome, FetchError> {
        let document = self.fetcher.fetch(url).await?;
        let entries = filter_entries(&document, window);

        info!(
            "[{}] Filtered {} of {} \"{}\" entries",
            url,
            entries.len(),
            document.entries.len(),
            document.site_name
        );

        Ok(FeedOutcome {
            total: document.entries.len(),
            messages: entries
                .iter()
                .map(|e| format_entry(e, &document.site_name))
                .collect(),
        })
    }

    async fn deliver(
        &self,
        topic: &str,
        messages: &[OutgoingMessage],
        report: &mut CycleReport,
    ) -> Result<(), DeliveryError> {
        if messages.is_empty() {
            return Ok(());
        }

        for channel in self.binding.channels_for(topic) {
            for message in messages {
                self.chat
                    .send(channel, message)
                    .await
                    .map_err(|source| DeliveryError {
                        topic: topic.to_string(),
                        channel: channel.name.clone(),
                        space: channel.space_name.clone(),
                        source,
                    })?;
                report.messages_delivered += 1;
            }
        }
        Ok(())
    }
}
