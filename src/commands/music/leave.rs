use super::*;
use crate::commands::music::utils::{embedded_messages, music_manager::MusicError};

/// Leave the voice channel
#[poise::command(slash_command, category = "Music")]
pub async fn leave(ctx: Context<'_>) -> CommandResult {
    let guild_id = ctx.guild_id().ok_or_else(|| {
        Box::new(MusicError::NotInGuild) as Box<dyn std::error::Error + Send + Sync>
    })?;

    ctx.data().audio_queue.disconnect(guild_id).await;
    ctx.send(embedded_messages::left_voice_channel()).await?;

    Ok(())
}
