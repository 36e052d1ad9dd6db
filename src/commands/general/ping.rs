use poise::CreateReply;
use serenity::all::{CreateEmbed, ShardId};
use std::time::Duration;

use crate::{CommandResult, Context};

/// Ping the bot to check its gateway latency
#[poise::command(slash_command, category = "General")]
pub async fn ping(ctx: Context<'_>) -> CommandResult {
    let latency = match get_shard_latency(&ctx).await {
        Some(latency) => format!("{} ms", latency.as_millis()),
        None => "Not measured yet".to_string(),
    };

    let embed = CreateEmbed::new()
        .title("Pong!")
        .field("Gateway Latency", latency, false);

    ctx.send(CreateReply::default().embed(embed)).await?;

    Ok(())
}

async fn get_shard_latency(ctx: &Context<'_>) -> Option<Duration> {
    let shard_manager = ctx.framework().shard_manager();
    let runners = shard_manager.runners.lock().await;

    // Latency is tracked per shard runner; use the one this command came in on
    let runner = runners.get(&ShardId(ctx.serenity_context().shard_id.0))?;

    runner.latency
}
