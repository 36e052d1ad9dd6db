//! Voice transport seam.
//!
//! The queue engine talks to voice connections and players only through these
//! traits. [`super::songbird_transport`] implements them on top of songbird.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

use super::music_manager::MusicResult;

/// Linear volume applied to every clip.
pub const FULL_VOLUME: f32 = 1.0;

/// Lifecycle state of a voice connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Ready,
    Disconnected,
    Destroyed,
}

impl ConnectionStatus {
    /// A connection in this state can't be reused for playback.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ConnectionStatus::Disconnected | ConnectionStatus::Destroyed
        )
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Ready => "ready",
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}

/// Events published by a voice connection, in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    StateChange {
        old: ConnectionStatus,
        new: ConnectionStatus,
    },
    Error(String),
}

/// Events published by a single player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    Playing,
    /// The track reached its end (or was stopped).
    Idle,
    Error(String),
}

/// What the decoder is handed: pulled bytes, or the URL to stream itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioInput {
    Bytes(Vec<u8>),
    Url(String),
}

impl AudioInput {
    pub fn kind(&self) -> &'static str {
        match self {
            AudioInput::Bytes(_) => "stream",
            AudioInput::Url(_) => "url",
        }
    }
}

/// A playable resource: input plus its linear volume.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioResource {
    pub input: AudioInput,
    pub volume: f32,
}

impl AudioResource {
    pub fn new(input: AudioInput) -> Self {
        Self {
            input,
            volume: FULL_VOLUME,
        }
    }
}

/// Handle to a player created for one track.
pub trait AudioPlayer: Send + Sync {
    fn stop(&self);
}

/// A freshly started player together with its event stream. The receiver is
/// created before playback starts so no event can be missed.
pub struct PlayerSubscription {
    pub player: Arc<dyn AudioPlayer>,
    pub events: mpsc::UnboundedReceiver<PlayerEvent>,
}

#[async_trait]
pub trait VoiceConnection: Send + Sync {
    fn guild_id(&self) -> GuildId;

    fn channel_id(&self) -> ChannelId;

    fn status(&self) -> ConnectionStatus;

    /// Subscribe to state changes and errors from this point on.
    fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent>;

    /// Stop and unsubscribe whatever player is currently subscribed.
    async fn stop_subscribed(&self);

    /// Create a player for `resource`, start it and subscribe it to this connection.
    async fn play(&self, resource: AudioResource) -> MusicResult<PlayerSubscription>;

    /// Leave the channel. Further use of the connection is invalid.
    async fn destroy(&self);
}

#[async_trait]
pub trait VoiceTransport: Send + Sync {
    /// Whether voice signalling is available for the guild.
    fn has_voice_adapter(&self, guild_id: GuildId) -> bool;

    /// Start joining `channel_id`. Returns as soon as the connection exists;
    /// readiness is reported through [`VoiceConnection::subscribe`].
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> MusicResult<Arc<dyn VoiceConnection>>;
}

/// Identity comparison for connection handles.
pub fn same_connection(a: &Arc<dyn VoiceConnection>, b: &Arc<dyn VoiceConnection>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
