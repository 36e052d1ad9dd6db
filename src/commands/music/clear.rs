use super::*;
use crate::commands::music::utils::{embedded_messages, music_manager::MusicError};

/// Clear the audio queue and stop the current clip
#[poise::command(slash_command, category = "Music")]
pub async fn clear(ctx: Context<'_>) -> CommandResult {
    let guild_id = ctx.guild_id().ok_or_else(|| {
        Box::new(MusicError::NotInGuild) as Box<dyn std::error::Error + Send + Sync>
    })?;

    ctx.data().audio_queue.stop(guild_id).await;
    ctx.send(embedded_messages::queue_cleared()).await?;

    Ok(())
}
