/*!
common/src/lib.rs

Shared configuration types for feedrelay.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader that merges an optional default file with an override file
- Validation of the `[sites]` table into ordered `FeedSource`s
*/

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Polling interval used when `[scheduler] interval_seconds` is not set.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 180;

/// Upper bound for `[scheduler] interval_seconds` (one week).
pub const MAX_POLL_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

/// Environment variable holding the chat bot token unless overridden.
pub const DEFAULT_TOKEN_ENV: &str = "TOKEN";

pub const DEFAULT_DISCORD_API_BASE: &str = "https://discord.com/api/v10";

const MAX_CHANNEL_NAME_LEN: usize = 100;

/// Errors raised while loading or validating configuration. All of them are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
}

/// Chat platform (Discord) connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    /// Name of the environment variable that holds the bot token
    pub token_env: String,
    /// REST API base URL, without trailing slash
    pub api_base: String,
    pub request_timeout_seconds: u64,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token_env: DEFAULT_TOKEN_ENV.to_string(),
            api_base: DEFAULT_DISCORD_API_BASE.to_string(),
            request_timeout_seconds: 10,
        }
    }
}

/// How the recency threshold of each cycle is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowMode {
    /// `now - interval`, recomputed every cycle
    #[default]
    Fixed,
    /// The previous cycle's start instant, so windows neither overlap nor leave gaps
    Contiguous,
}

/// Polling loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub interval_seconds: u64,
    pub window: WindowMode,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_seconds: DEFAULT_POLL_INTERVAL_SECS,
            window: WindowMode::Fixed,
        }
    }
}

/// Feed fetching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 10,
            user_agent: "feedrelay/0.1.0".to_string(),
        }
    }
}

/// One topic and the feeds mirrored into it, in configuration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSource {
    pub topic: String,
    pub urls: Vec<String>,
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Topic name -> list of feed URLs. Table order is preserved.
    #[serde(default)]
    pub sites: toml::Table,
}

impl Config {
    /// Load configuration from a TOML file asynchronously.
    ///
    /// Example:
    ///   let cfg = Config::from_file("config.toml").await?;
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let data = read_file(path.as_ref()).await?;
        Self::from_toml_str(&data)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(
        default_path: Option<&Path>,
        override_path: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        for path in [default_path, override_path].into_iter().flatten() {
            if path.exists() {
                let data = read_file(path).await?;
                let val: toml::Value = toml::from_str(&data)?;
                merge_toml(&mut config_value, val);
            }
        }

        Ok(config_value.try_into()?)
    }

    /// Validated feed sources, in the order topics appear in `[sites]`.
    pub fn feed_sources(&self) -> Result<Vec<FeedSource>, ConfigError> {
        if self.sites.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "sites".into(),
                message: "no topics configured".into(),
            });
        }

        let mut sources = Vec::with_capacity(self.sites.len());
        for (topic, value) in &self.sites {
            validate_topic(topic)?;
            let key = format!("sites.{topic}");

            let urls: Vec<String> =
                value
                    .clone()
                    .try_into()
                    .map_err(|e: toml::de::Error| ConfigError::InvalidValue {
                        key: key.clone(),
                        message: format!("expected a list of URLs ({e})"),
                    })?;
            if urls.is_empty() {
                return Err(ConfigError::InvalidValue {
                    key,
                    message: "at least one feed URL is required".into(),
                });
            }
            for u in &urls {
                validate_url(&key, u)?;
            }

            sources.push(FeedSource {
                topic: topic.clone(),
                urls,
            });
        }
        Ok(sources)
    }

    pub fn poll_interval(&self) -> Result<Duration, ConfigError> {
        if self.scheduler.interval_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                key: "scheduler.interval_seconds".into(),
                message: "must be greater than zero".into(),
            });
        }
        if self.scheduler.interval_seconds > MAX_POLL_INTERVAL_SECS {
            return Err(ConfigError::InvalidValue {
                key: "scheduler.interval_seconds".into(),
                message: format!("must be at most {MAX_POLL_INTERVAL_SECS} seconds"),
            });
        }
        Ok(Duration::from_secs(self.scheduler.interval_seconds))
    }

    /// Read the bot token from the environment variable named by `discord.token_env`.
    pub fn bot_token(&self) -> Result<String, ConfigError> {
        match std::env::var(&self.discord.token_env) {
            Ok(t) if !t.trim().is_empty() => Ok(t.trim().to_string()),
            _ => Err(ConfigError::MissingEnvVar(self.discord.token_env.clone())),
        }
    }

    /// Check everything that can be checked without touching the environment.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.feed_sources()?;
        self.poll_interval()?;
        if self.discord.api_base.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "discord.api_base".into(),
                message: "must not be empty".into(),
            });
        }
        Ok(())
    }
}

async fn read_file(path: &Path) -> Result<String, ConfigError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}

/// Topics double as chat channel names, and channels are matched by exact name on
/// every start. Names the platform would rewrite (case, whitespace) are rejected here.
fn validate_topic(topic: &str) -> Result<(), ConfigError> {
    let problem = if topic.is_empty() {
        Some("topic name must not be empty")
    } else if topic.chars().count() > MAX_CHANNEL_NAME_LEN {
        Some("topic name is longer than 100 characters")
    } else if topic.chars().any(char::is_whitespace) {
        Some("topic name must not contain whitespace")
    } else if topic.chars().any(char::is_uppercase) {
        Some("topic name must be lowercase")
    } else {
        None
    };

    match problem {
        Some(message) => Err(ConfigError::InvalidValue {
            key: format!("sites.{topic}"),
            message: message.into(),
        }),
        None => Ok(()),
    }
}

fn validate_url(key: &str, raw: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(raw).map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("invalid feed URL {raw:?}: {e}"),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("unsupported URL scheme in {raw:?}"),
        });
    }
    Ok(())
}
