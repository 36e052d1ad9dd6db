use super::*;
use crate::commands::music::utils::{
    embedded_messages,
    music_manager::{MusicError, MusicManager},
    queue_manager::{PlayOutcome, QueueItem, VoiceChannelRef},
};
use tracing::{error, info, warn};

/// Search myinstants and play the first clip in your voice channel
#[poise::command(slash_command, category = "Music")]
pub async fn mi(
    ctx: Context<'_>,
    #[description = "The search query for the myinstants audio"] input: String,
) -> CommandResult {
    info!("Received mi command with query: {}", input);
    let guild_id = ctx.guild_id().ok_or_else(|| {
        Box::new(MusicError::NotInGuild) as Box<dyn std::error::Error + Send + Sync>
    })?;

    // Get the user's voice channel
    let user_id = ctx.author().id;
    let channel_id =
        match MusicManager::get_user_voice_channel(ctx.serenity_context(), guild_id, user_id) {
            Ok(channel_id) => channel_id,
            Err(err) => {
                ctx.send(embedded_messages::user_not_in_voice_channel(err))
                    .await?;
                return Ok(());
            }
        };

    // Searching and scraping the clip page can take a while
    ctx.defer().await?;

    let instants = &ctx.data().instants;
    let hit = match instants.search(&input).await {
        Ok(Some(hit)) => hit,
        Ok(None) => {
            ctx.send(embedded_messages::no_results(&input)).await?;
            return Ok(());
        }
        Err(err) => {
            error!("Search failed for \"{}\": {}", input, err);
            ctx.send(embedded_messages::search_failed(&err)).await?;
            return Ok(());
        }
    };

    let audio_url = match instants.resolve_audio_url(&hit.page_url).await {
        Ok(Some(url)) => url,
        Ok(None) => {
            ctx.send(embedded_messages::no_audio_found(&hit.name)).await?;
            return Ok(());
        }
        Err(err) => {
            error!("Could not load clip page {}: {}", hit.page_url, err);
            ctx.send(embedded_messages::search_failed(&err)).await?;
            return Ok(());
        }
    };
    info!("Resolved \"{}\" to {}", hit.name, audio_url);

    let item = QueueItem::new(
        hit.name.clone(),
        audio_url,
        VoiceChannelRef::new(guild_id, channel_id),
    );
    let ticket = ctx.data().audio_queue.enqueue(guild_id, item).await;

    let announcement = if ticket.starts_now() {
        embedded_messages::now_playing(&hit.name, &hit.page_url)
    } else {
        embedded_messages::added_to_queue(&hit.name, &hit.page_url, ticket.position())
    };
    let reply = ctx.send(announcement).await?;

    let result = match ticket.wait().await {
        Some(PlayOutcome::Finished) => embedded_messages::played(&hit.name, &hit.page_url),
        Some(PlayOutcome::Failed(err)) => embedded_messages::playback_failed(&hit.name, &err),
        None => embedded_messages::removed_from_queue(&hit.name),
    };
    // The interaction token expires after 15 minutes; a long queue can outlive it
    if let Err(err) = reply.edit(ctx, result).await {
        warn!("Could not update the reply for \"{}\": {}", hit.name, err);
    }

    Ok(())
}
