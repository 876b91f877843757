use common::DiscordConfig;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{BotUser, ChannelHandle, ChatPlatform, Space};
use crate::error::ChatError;
use crate::formatter::OutgoingMessage;

/// Discord embed limits, in characters.
const EMBED_TITLE_MAX: usize = 256;
const EMBED_DESCRIPTION_MAX: usize = 4096;
const EMBED_AUTHOR_MAX: usize = 256;

/// Discord channel type for guild text channels.
const GUILD_TEXT: u8 = 0;

/// Largest page `GET /users/@me/guilds` returns.
const GUILD_PAGE_SIZE: usize = 200;

/// Resends of one request after HTTP 429 before giving up.
const MAX_RATE_LIMIT_RETRIES: u32 = 5;
/// Wait used when a 429 carries no usable `retry_after`.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Discord rejects requests without a `DiscordBot (url, version)` agent.
const USER_AGENT: &str = concat!(
    "DiscordBot (https://github.com/taophp/feedrelay, ",
    env!("CARGO_PKG_VERSION"),
    ")"
);

/// Discord REST client authenticated as a bot.
///
/// Rate-limited requests (HTTP 429) are resent after the advertised delay, up to
/// `MAX_RATE_LIMIT_RETRIES` times, so a burst of messages to one channel is slowed
/// down rather than dropped.
#[derive(Clone)]
pub struct DiscordClient {
    api_base: String,
    token: String,
    client: Client,
    timeout: Duration,
}

impl DiscordClient {
    pub fn new(api_base: impl Into<String>, token: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
            client,
            timeout: Duration::from_secs(10),
        })
    }

    pub fn from_config(config: &DiscordConfig, token: impl Into<String>) -> Result<Self, reqwest::Error> {
        Ok(Self::new(config.api_base.clone(), token)?.with_timeout(config.request_timeout_seconds))
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    /// Send the request built by `build`, waiting out 429 responses.
    async fn execute<F>(&self, operation: &str, build: F) -> Result<Response, ChatError>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let mut retries = 0;
        loop {
            let response = build()
                .header("Authorization", format!("Bot {}", self.token))
                .timeout(self.timeout)
                .send()
                .await
                .map_err(|e| request_error(operation, e))?;

            match check_status(operation, response).await {
                Err(ChatError::RateLimited { retry_after, .. }) if retries < MAX_RATE_LIMIT_RETRIES => {
                    retries += 1;
                    let wait = retry_after.unwrap_or(DEFAULT_RETRY_AFTER).min(MAX_RETRY_AFTER);
                    tracing::warn!(
                        operation,
                        retries,
                        wait_ms = wait.as_millis() as u64,
                        "rate limited by Discord, waiting"
                    );
                    tokio::time::sleep(wait).await;
                }
                other => return other,
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, operation: &str, path: &str) -> Result<T, ChatError> {
        let url = self.url(path);
        let response = self.execute(operation, || self.client.get(&url)).await?;
        decode(operation, response).await
    }

    async fn post_json<B: Serialize + Sync + ?Sized>(
        &self,
        operation: &str,
        path: &str,
        body: &B,
    ) -> Result<Response, ChatError> {
        let url = self.url(path);
        self.execute(operation, || self.client.post(&url).json(body))
            .await
    }
}

#[async_trait::async_trait]
impl ChatPlatform for DiscordClient {
    async fn connect(&self) -> Result<BotUser, ChatError> {
        let user: DiscordUser = self
            .get_json("get current user", "/users/@me")
            .await
            .map_err(|e| match e {
                ChatError::Status { status: 401, body, .. } => ChatError::AuthFailed { reason: body },
                other => other,
            })?;
        Ok(BotUser {
            id: user.id,
            name: user.username,
        })
    }

    /// All joined guilds, following `after=` pagination.
    async fn spaces(&self) -> Result<Vec<Space>, ChatError> {
        let mut spaces = Vec::new();
        let mut after: Option<String> = None;
        loop {
            let path = match &after {
                Some(id) => format!("/users/@me/guilds?limit={GUILD_PAGE_SIZE}&after={id}"),
                None => format!("/users/@me/guilds?limit={GUILD_PAGE_SIZE}"),
            };
            let page: Vec<DiscordGuild> = self.get_json("list guilds", &path).await?;
            let full = page.len() == GUILD_PAGE_SIZE;
            after = page.last().map(|g| g.id.clone());
            spaces.extend(page.into_iter().map(|g| Space {
                id: g.id,
                name: g.name,
            }));
            if !full {
                break;
            }
        }
        Ok(spaces)
    }

    async fn text_channels(&self, space: &Space) -> Result<Vec<ChannelHandle>, ChatError> {
        let channels: Vec<DiscordChannel> = self
            .get_json("list channels", &format!("/guilds/{}/channels", space.id))
            .await?;
        Ok(channels
            .into_iter()
            .filter(|c| c.kind == GUILD_TEXT)
            .filter_map(|c| {
                c.name.map(|name| ChannelHandle {
                    id: c.id,
                    name,
                    space_id: space.id.clone(),
                    space_name: space.name.clone(),
                })
            })
            .collect())
    }

    async fn create_text_channel(
        &self,
        space: &Space,
        name: &str,
    ) -> Result<ChannelHandle, ChatError> {
        let operation = "create channel";
        let body = serde_json::json!({ "name": name, "type": GUILD_TEXT });
        let response = self
            .post_json(operation, &format!("/guilds/{}/channels", space.id), &body)
            .await?;
        let created: DiscordChannel = decode(operation, response).await?;
        Ok(ChannelHandle {
            id: created.id,
            name: created.name.unwrap_or_else(|| name.to_string()),
            space_id: space.id.clone(),
            space_name: space.name.clone(),
        })
    }

    async fn send(&self, channel: &ChannelHandle, message: &OutgoingMessage) -> Result<(), ChatError> {
        let payload = MessagePayload {
            embeds: vec![Embed::from_message(message)],
        };
        self.post_json(
            "send message",
            &format!("/channels/{}/messages", channel.id),
            &payload,
        )
        .await?;
        Ok(())
    }
}

fn request_error(operation: &str, e: reqwest::Error) -> ChatError {
    ChatError::Request {
        operation: operation.to_string(),
        reason: e.to_string(),
    }
}

async fn check_status(operation: &str, response: Response) -> Result<Response, ChatError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        let header = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<f64>().ok());
        let body: Option<RateLimitBody> = response.json().await.ok();
        // Prefer the body's fractional seconds over the header.
        let seconds = body.and_then(|b| b.retry_after).or(header);
        return Err(ChatError::RateLimited {
            operation: operation.to_string(),
            retry_after: seconds.and_then(|s| Duration::try_from_secs_f64(s).ok()),
        });
    }
    let body = response.text().await.unwrap_or_default();
    Err(ChatError::Status {
        operation: operation.to_string(),
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: DeserializeOwned>(operation: &str, response: Response) -> Result<T, ChatError> {
    response.json().await.map_err(|e| ChatError::Decode {
        operation: operation.to_string(),
        reason: e.to_string(),
    })
}

/// Cut `s` to at most `max` characters, marking the cut with an ellipsis.
fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[derive(Deserialize)]
struct RateLimitBody {
    retry_after: Option<f64>,
}

#[derive(Deserialize)]
struct DiscordUser {
    id: String,
    username: String,
}

#[derive(Deserialize)]
struct DiscordGuild {
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct DiscordChannel {
    id: String,
    #[serde(rename = "type")]
    kind: u8,
    name: Option<String>,
}

#[derive(Serialize)]
struct MessagePayload {
    embeds: Vec<Embed>,
}

#[derive(Debug, Serialize)]
struct Embed {
    #[serde(rename = "type")]
    kind: &'static str,
    title: String,
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    author: EmbedAuthor,
}

#[derive(Debug, Serialize)]
struct EmbedAuthor {
    name: String,
}

impl Embed {
    fn from_message(message: &OutgoingMessage) -> Self {
        let description = (!message.summary.trim().is_empty())
            .then(|| truncate_chars(&message.summary, EMBED_DESCRIPTION_MAX));
        Self {
            kind: "rich",
            title: truncate_chars(&message.title, EMBED_TITLE_MAX),
            url: message.link.clone(),
            description,
            author: EmbedAuthor {
                name: truncate_chars(&message.site_name, EMBED_AUTHOR_MAX),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_counts_characters_not_bytes() {
        assert_eq!(truncate_chars("héllo", 5), "héllo");
        assert_eq!(truncate_chars("héllo wörld", 6), "héllo…");
        assert_eq!(truncate_chars("ab", 0), "…");
    }

    #[test]
    fn embed_respects_limits_and_skips_empty_description() {
        let msg = OutgoingMessage {
            site_name: "S".repeat(300),
            title: "T".repeat(300),
            link: "https://a.example/1".into(),
            summary: "   ".into(),
        };
        let embed = Embed::from_message(&msg);
        assert_eq!(embed.title.chars().count(), EMBED_TITLE_MAX);
        assert_eq!(embed.author.name.chars().count(), EMBED_AUTHOR_MAX);
        assert!(embed.description.is_none());

        let json = serde_json::to_value(&embed).unwrap();
        assert_eq!(json["type"], "rich");
        assert!(json.get("description").is_none());
    }

    #[test]
    fn long_summary_is_cut_to_description_limit() {
        let msg = OutgoingMessage {
            site_name: "Site".into(),
            title: "Title".into(),
            link: "https://a.example/1".into(),
            summary: "x".repeat(5000),
        };
        let embed = Embed::from_message(&msg);
        assert_eq!(
            embed.description.map(|d| d.chars().count()),
            Some(EMBED_DESCRIPTION_MAX)
        );
    }
}
