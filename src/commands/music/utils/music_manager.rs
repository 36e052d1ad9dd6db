use serenity::client::Context;
use serenity::model::id::{ChannelId, GuildId, UserId};
use songbird::Songbird;
use std::sync::Arc;
use thiserror::Error;

use super::voice::ConnectionStatus;

/// Errors that can occur during music operations
#[derive(Error, Debug)]
pub enum MusicError {
    #[error("Not in a guild")]
    NotInGuild,

    #[error("User is not in a voice channel")]
    UserNotInVoiceChannel,

    #[error("Failed to get voice manager")]
    NoVoiceManager,

    #[error("Voice adapter is not available, the bot may not be fully connected to Discord")]
    AdapterUnavailable,

    #[error("Failed to join voice channel: {0}")]
    JoinError(String),

    #[error("Voice connection is not ready")]
    ConnectionNotReady,

    #[error("Timeout connecting to voice channel, final state: {status}")]
    ConnectionTimeout { status: ConnectionStatus },

    #[error("Connection lost before it was ready, check the bot's permissions on the voice channel")]
    DisconnectedBeforeReady,

    #[error("No permissions to join the voice channel")]
    PermissionDenied,

    #[error("Voice connection error: {0}")]
    ConnectionError(String),

    #[error("Audio player error: {0}")]
    PlayerError(String),
}

impl MusicError {
    /// Classify an error reported by the voice connection.
    pub fn from_connection_error(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.to_lowercase().contains("permission") || message.contains("Missing") {
            MusicError::PermissionDenied
        } else {
            MusicError::ConnectionError(message)
        }
    }

    /// Failures a user can usually fix by adjusting the bot's channel permissions.
    pub fn is_permission_related(&self) -> bool {
        matches!(
            self,
            MusicError::PermissionDenied
                | MusicError::DisconnectedBeforeReady
                | MusicError::ConnectionTimeout { .. }
        )
    }
}

/// Result type for music operations
pub type MusicResult<T> = Result<T, MusicError>;

/// Songbird and cache lookups used by the command layer
pub struct MusicManager;

impl MusicManager {
    /// Get the Songbird voice client from the context
    pub async fn get_songbird(ctx: &Context) -> MusicResult<Arc<Songbird>> {
        songbird::get(ctx).await.ok_or(MusicError::NoVoiceManager)
    }

    /// Get the voice channel ID that the user is currently in
    pub fn get_user_voice_channel(
        ctx: &Context,
        guild_id: GuildId,
        user_id: UserId,
    ) -> MusicResult<ChannelId> {
        // Get the guild
        let guild = ctx.cache.guild(guild_id).ok_or(MusicError::NotInGuild)?;

        // Get the voice state of the user
        let voice_state = guild
            .voice_states
            .get(&user_id)
            .ok_or(MusicError::UserNotInVoiceChannel)?;

        voice_state
            .channel_id
            .ok_or(MusicError::UserNotInVoiceChannel)
    }
}
