use super::*;
use crate::commands::music::utils::{embedded_messages, music_manager::MusicError};

/// Show the audio queue for this server
#[poise::command(slash_command, category = "Music")]
pub async fn queue(ctx: Context<'_>) -> CommandResult {
    let guild_id = ctx.guild_id().ok_or_else(|| {
        Box::new(MusicError::NotInGuild) as Box<dyn std::error::Error + Send + Sync>
    })?;

    let audio_queue = &ctx.data().audio_queue;
    let reply = embedded_messages::queue_status(
        audio_queue.queue_size(guild_id).await,
        audio_queue.is_currently_playing(guild_id).await,
        audio_queue.has_connection(guild_id).await,
        audio_queue.has_pending_disconnect(guild_id).await,
    );
    ctx.send(reply.ephemeral(true)).await?;

    Ok(())
}
