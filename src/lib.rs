//! soundclip: a Discord soundboard bot.
//!
//! Searches a sound-clip site for a clip, resolves its audio URL and plays it
//! in the caller's voice channel through a per-guild serial queue.

use std::sync::{Arc, LazyLock};

pub mod commands;
pub mod config;

use commands::music::utils::{instants::InstantsClient, queue_manager::AudioQueueManager};

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
pub type CommandResult = Result<(), Error>;

/// Browser-like User-Agent; the clip site rejects obvious bot agents.
pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko)";

/// Shared HTTP client used for clip downloads, URL-fallback streaming and search.
pub static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_default()
});

/// User data, stored and accessible in all command invocations
pub struct Data {
    pub audio_queue: Arc<AudioQueueManager>,
    pub instants: InstantsClient,
}
