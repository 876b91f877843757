use std::collections::HashMap;

use crate::chat::{ChannelHandle, ChatPlatform, Space};
use crate::error::ChannelResolutionError;

/// Topic name -> destination channels, one per joined space. Built once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelBinding {
    channels: HashMap<String, Vec<ChannelHandle>>,
}

impl ChannelBinding {
    pub fn channels_for(&self, topic: &str) -> &[ChannelHandle] {
        self.channels.get(topic).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of (space, topic) handles.
    pub fn len(&self) -> usize {
        self.channels.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn insert(&mut self, topic: &str, channel: ChannelHandle) {
        self.channels
            .entry(topic.to_string())
            .or_default()
            .push(channel);
    }
}

/// For every space and topic, find the text channel named exactly like the topic,
/// creating it when missing. Any failure aborts resolution.
pub async fn resolve_channels(
    chat: &dyn ChatPlatform,
    spaces: &[Space],
    topics: &[String],
) -> Result<ChannelBinding, ChannelResolutionError> {
    let mut binding = ChannelBinding::default();

    for space in spaces {
        let existing = chat
            .text_channels(space)
            .await
            .map_err(|source| ChannelResolutionError::ListChannels {
                space: space.name.clone(),
                source,
            })?;

        for topic in topics {
            let channel = match existing.iter().find(|c| c.name == *topic) {
                Some(c) => {
                    tracing::debug!(space = %space.name, channel = %c.name, "using existing channel");
                    c.clone()
                }
                None => {
                    let created = chat.create_text_channel(space, topic).await.map_err(|source| {
                        ChannelResolutionError::Create {
                            space: space.name.clone(),
                            topic: topic.clone(),
                            source,
                        }
                    })?;
                    tracing::info!(space = %space.name, channel = %created.name, "created channel");
                    created
                }
            };
            binding.insert(topic, channel);
        }
    }

    for topic in topics {
        if binding.channels_for(topic).is_empty() {
            tracing::warn!(topic = %topic, "topic has no destination channel");
        }
    }

    Ok(binding)
}

/// List joined spaces and resolve channels in all of them.
pub async fn resolve_all(
    chat: &dyn ChatPlatform,
    topics: &[String],
) -> Result<ChannelBinding, ChannelResolutionError> {
    let spaces = chat
        .spaces()
        .await
        .map_err(ChannelResolutionError::ListSpaces)?;
    tracing::info!("resolving {} topic(s) across {} space(s)", topics.len(), spaces.len());
    resolve_channels(chat, &spaces, topics).await
}
