//! Ids and queue items used across the integration tests.

use serenity::model::id::{ChannelId, GuildId};
use soundclip::commands::music::utils::queue_manager::{QueueItem, VoiceChannelRef};

pub const GUILD: GuildId = GuildId::new(1001);
pub const OTHER_GUILD: GuildId = GuildId::new(2002);
pub const LOBBY: ChannelId = ChannelId::new(11);
pub const STAGE: ChannelId = ChannelId::new(12);

/// The URL the fake transport records when `label` is played.
pub fn clip_url(label: &str) -> String {
    format!("https://clips.test/media/sounds/{}.mp3", label)
}

pub fn clip(label: &str, channel: ChannelId) -> QueueItem {
    clip_in(GUILD, label, channel)
}

pub fn clip_in(guild_id: GuildId, label: &str, channel: ChannelId) -> QueueItem {
    QueueItem::new(label, clip_url(label), VoiceChannelRef::new(guild_id, channel))
}
