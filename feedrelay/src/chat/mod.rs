//! Chat platform boundary: session, spaces, channels, message delivery.

pub mod discord;

use crate::error::ChatError;
use crate::formatter::OutgoingMessage;

pub use discord::DiscordClient;

/// The authenticated session user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotUser {
    pub id: String,
    pub name: String,
}

/// A joined chat space (a Discord guild)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Space {
    pub id: String,
    pub name: String,
}

/// A text channel inside a space that messages can be sent to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelHandle {
    pub id: String,
    pub name: String,
    pub space_id: String,
    pub space_name: String,
}

#[async_trait::async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Authenticate and return the session user. Completing this is "session ready".
    async fn connect(&self) -> Result<BotUser, ChatError>;

    async fn spaces(&self) -> Result<Vec<Space>, ChatError>;

    /// Text channels only; voice channels and categories are left out.
    async fn text_channels(&self, space: &Space) -> Result<Vec<ChannelHandle>, ChatError>;

    async fn create_text_channel(&self, space: &Space, name: &str)
        -> Result<ChannelHandle, ChatError>;

    async fn send(&self, channel: &ChannelHandle, message: &OutgoingMessage)
        -> Result<(), ChatError>;
}
