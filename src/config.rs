//! Runtime configuration, read from the environment (and `.env` via dotenv).

use std::num::ParseIntError;
use std::time::Duration;

use humantime_serde::re::humantime;
use serde::Serialize;
use thiserror::Error;
use url::Url;

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_CLIP_BYTES: usize = 8 * 1024 * 1024;
pub const DEFAULT_INSTANTS_BASE_URL: &str = "https://www.myinstants.com";
pub const DEFAULT_INSTANTS_LOCALE: &str = "pt";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing DISCORD_TOKEN")]
    MissingToken,

    #[error("Invalid duration in {key}: {source}")]
    InvalidDuration {
        key: &'static str,
        source: humantime::DurationError,
    },

    #[error("Invalid number in {key}: {source}")]
    InvalidNumber {
        key: &'static str,
        source: ParseIntError,
    },

    #[error("Invalid URL in {key}: {source}")]
    InvalidUrl {
        key: &'static str,
        source: url::ParseError,
    },
}

/// Timing and size limits for the playback queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlaybackSettings {
    /// How long a guild may sit idle with an empty queue before disconnecting.
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,
    /// How long to wait for a voice connection to become ready.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Timeout for pulling a clip's bytes before falling back to the URL.
    #[serde(with = "humantime_serde")]
    pub fetch_timeout: Duration,
    pub max_clip_bytes: usize,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            max_clip_bytes: DEFAULT_MAX_CLIP_BYTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchSettings {
    pub base_url: String,
    pub locale: String,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_INSTANTS_BASE_URL.to_string(),
            locale: DEFAULT_INSTANTS_LOCALE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    #[serde(skip_serializing)]
    pub discord_token: String,
    pub playback: PlaybackSettings,
    pub search: SearchSettings,
}

impl Config {
    /// Load the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load the configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let discord_token = lookup("DISCORD_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .ok_or(ConfigError::MissingToken)?;

        let duration = |key: &'static str, default: Duration| match lookup(key) {
            Some(raw) if !raw.trim().is_empty() => humantime::parse_duration(raw.trim())
                .map_err(|source| ConfigError::InvalidDuration { key, source }),
            _ => Ok(default),
        };

        let max_clip_bytes = match lookup("SOUNDCLIP_MAX_CLIP_BYTES") {
            Some(raw) if !raw.trim().is_empty() => {
                raw.trim()
                    .parse()
                    .map_err(|source| ConfigError::InvalidNumber {
                        key: "SOUNDCLIP_MAX_CLIP_BYTES",
                        source,
                    })?
            }
            _ => DEFAULT_MAX_CLIP_BYTES,
        };

        let playback = PlaybackSettings {
            idle_timeout: duration("SOUNDCLIP_IDLE_TIMEOUT", DEFAULT_IDLE_TIMEOUT)?,
            connect_timeout: duration("SOUNDCLIP_CONNECT_TIMEOUT", DEFAULT_CONNECT_TIMEOUT)?,
            fetch_timeout: duration("SOUNDCLIP_FETCH_TIMEOUT", DEFAULT_FETCH_TIMEOUT)?,
            max_clip_bytes,
        };

        let base_url = lookup("INSTANTS_BASE_URL")
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_INSTANTS_BASE_URL.to_string());
        Url::parse(&base_url).map_err(|source| ConfigError::InvalidUrl {
            key: "INSTANTS_BASE_URL",
            source,
        })?;

        let locale = lookup("INSTANTS_LOCALE")
            .filter(|locale| !locale.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_INSTANTS_LOCALE.to_string());

        Ok(Self {
            discord_token,
            playback,
            search: SearchSettings {
                base_url: base_url.trim_end_matches('/').to_string(),
                locale,
            },
        })
    }

    /// JSON rendering of the effective configuration, without the token.
    pub fn redacted_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("<unserializable config: {}>", e))
    }
}
