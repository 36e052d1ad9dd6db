use poise::CreateReply;
use serenity::all::CreateEmbed;

use super::{instants::SearchError, music_manager::MusicError};

const SUCCESS_COLOR: u32 = 0x00ff00;
const ERROR_COLOR: u32 = 0xff0000;

fn error_embed(description: impl Into<String>) -> CreateEmbed {
    CreateEmbed::new()
        .title("❌ Error")
        .description(description)
        .color(ERROR_COLOR)
}

/// Create an embed for a clip that starts right away
pub fn now_playing(name: &str, page_url: &str) -> CreateReply {
    CreateReply::default().embed(
        CreateEmbed::new()
            .title("🎵 Now Playing")
            .description(format!("[{}]({})", name, page_url))
            .color(SUCCESS_COLOR),
    )
}

/// Create an embed for a clip queued behind others
pub fn added_to_queue(name: &str, page_url: &str, position: usize) -> CreateReply {
    CreateReply::default().embed(
        CreateEmbed::new()
            .title("🎵 Added to Queue")
            .description(format!("[{}]({})", name, page_url))
            .field("Position", format!("`#{}`", position), true)
            .color(SUCCESS_COLOR),
    )
}

pub fn played(name: &str, page_url: &str) -> CreateReply {
    CreateReply::default().embed(
        CreateEmbed::new()
            .title("✅ Played")
            .description(format!("[{}]({}) played successfully", name, page_url))
            .color(SUCCESS_COLOR),
    )
}

/// Create an embed for a clip whose playback failed
pub fn playback_failed(name: &str, err: &MusicError) -> CreateReply {
    let description = if err.is_permission_related() {
        format!(
            "Could not connect to the voice channel to play **{}**.\n\n\
             Make sure the bot can **Connect** and **Speak** in the channel and that the channel isn't full.",
            name
        )
    } else {
        format!("Failed to play **{}**: {}", name, err)
    };
    CreateReply::default().embed(error_embed(description))
}

pub fn removed_from_queue(name: &str) -> CreateReply {
    CreateReply::default().embed(
        CreateEmbed::new()
            .title("🗑️ Removed")
            .description(format!("**{}** was cleared from the queue", name))
            .color(ERROR_COLOR),
    )
}

pub fn no_results(query: &str) -> CreateReply {
    CreateReply::default().embed(error_embed(format!("No results found for: **{}**", query)))
}

pub fn no_audio_found(name: &str) -> CreateReply {
    CreateReply::default().embed(error_embed(format!(
        "Could not find the audio file for: **{}**",
        name
    )))
}

pub fn search_failed(err: &SearchError) -> CreateReply {
    CreateReply::default().embed(error_embed(format!(
        "Search failed, try again later: {}",
        err
    )))
}

/// Create an embed for when a user is not connected to a voice channel
pub fn user_not_in_voice_channel(err: MusicError) -> CreateReply {
    CreateReply::default()
        .embed(error_embed(format!(
            "You need to be in a voice channel: {}",
            err
        )))
        .ephemeral(true)
}

pub fn queue_cleared() -> CreateReply {
    CreateReply::default().embed(
        CreateEmbed::new()
            .title("⏹️ Cleared")
            .description("Audio queue cleared")
            .color(SUCCESS_COLOR),
    )
}

/// Create an embed summarising the guild's playback state
pub fn queue_status(
    pending: usize,
    playing: bool,
    connected: bool,
    idle_disconnect: bool,
) -> CreateReply {
    let playing_text = if playing { "Yes" } else { "No" };
    let connection_text = match (connected, idle_disconnect) {
        (false, _) => "Not connected",
        (true, true) => "Connected (leaving soon if idle)",
        (true, false) => "Connected",
    };

    CreateReply::default().embed(
        CreateEmbed::new()
            .title("📋 Queue")
            .field("Pending", format!("`{}`", pending), true)
            .field("Playing", playing_text, true)
            .field("Voice", connection_text, true)
            .color(SUCCESS_COLOR),
    )
}

/// Create an embed for when the bot leaves the voice channel
pub fn left_voice_channel() -> CreateReply {
    CreateReply::default().embed(
        CreateEmbed::new()
            .title("👋 Left Voice Channel")
            .description("Queue cleared and voice channel left")
            .color(SUCCESS_COLOR),
    )
}
