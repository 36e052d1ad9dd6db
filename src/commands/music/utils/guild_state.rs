//! Per-guild audio state and the single teardown routine every failure path
//! converges on.

use serenity::model::id::GuildId;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify, oneshot};
use tracing::{debug, info};

use super::inactivity_reaper::{InactivityReaper, InactivityTimer};
use super::queue_manager::{PlayOutcome, QueueItem};
use super::voice::{AudioPlayer, VoiceConnection};

/// A pending request plus the channel its outcome is reported on.
pub struct QueuedTrack {
    pub item: QueueItem,
    pub completion: Option<oneshot::Sender<PlayOutcome>>,
}

/// Mutable per-guild state, always accessed through [`GuildAudioState::lock`].
#[derive(Default)]
pub struct GuildInner {
    pub pending: VecDeque<QueuedTrack>,
    pub connection: Option<Arc<dyn VoiceConnection>>,
    pub active_player: Option<Arc<dyn AudioPlayer>>,
    pub is_playing: bool,
    pub inactivity_timer: Option<InactivityTimer>,
    /// Bumped by every stop request.
    pub stop_generation: u64,
}

impl GuildInner {
    /// Whether a stop was requested after `generation` was read.
    pub fn stopped_since(&self, generation: u64) -> bool {
        self.stop_generation != generation
    }

    pub fn request_stop(&mut self) {
        self.stop_generation = self.stop_generation.wrapping_add(1);
    }

    /// Cancel timer, destroy connection, stop player, clear the playing flag.
    /// The pending queue is left untouched.
    pub async fn release_resources(&mut self) {
        if InactivityReaper::cancel(self) {
            debug!("Canceled inactivity timer during cleanup");
        }

        if let Some(connection) = self.connection.take() {
            connection.destroy().await;
        }

        if let Some(player) = self.active_player.take() {
            player.stop();
        }

        self.is_playing = false;
    }
}

pub struct GuildAudioState {
    guild_id: GuildId,
    inner: Mutex<GuildInner>,
    wakeup: Notify,
}

impl GuildAudioState {
    pub fn new(guild_id: GuildId) -> Self {
        Self {
            guild_id,
            inner: Mutex::new(GuildInner::default()),
            wakeup: Notify::new(),
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, GuildInner> {
        self.inner.lock().await
    }

    /// Wake the guild's consumer; the permit is kept if it isn't waiting yet.
    pub fn wake(&self) {
        self.wakeup.notify_one();
    }

    pub async fn wait_for_work(&self) {
        self.wakeup.notified().await;
    }

    /// Idempotent teardown of the guild's voice resources.
    pub async fn cleanup(self: &Arc<Self>) {
        let mut inner = self.lock().await;
        let had_resources = inner.connection.is_some()
            || inner.active_player.is_some()
            || inner.inactivity_timer.is_some();
        inner.release_resources().await;
        if had_resources {
            info!("Cleaned up voice resources for guild {}", self.guild_id);
        }
    }
}
