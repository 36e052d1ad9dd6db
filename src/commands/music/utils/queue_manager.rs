use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serenity::model::id::{ChannelId, GuildId};
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::PlaybackSettings;

use super::audio_fetcher::AudioFetcher;
use super::connection_registry::ConnectionRegistry;
use super::guild_state::{GuildAudioState, QueuedTrack};
use super::inactivity_reaper::InactivityReaper;
use super::music_manager::MusicError;
use super::player_controller::PlayerController;
use super::voice::VoiceTransport;

/// The voice channel a request should be played in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceChannelRef {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
}

impl VoiceChannelRef {
    pub fn new(guild_id: GuildId, channel_id: ChannelId) -> Self {
        Self {
            guild_id,
            channel_id,
        }
    }
}

impl fmt::Display for VoiceChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.guild_id, self.channel_id)
    }
}

/// One playback request. Immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    pub display_name: String,
    pub audio_source_url: String,
    pub target_channel: VoiceChannelRef,
}

impl QueueItem {
    pub fn new(
        display_name: impl Into<String>,
        audio_source_url: impl Into<String>,
        target_channel: VoiceChannelRef,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            audio_source_url: audio_source_url.into(),
            target_channel,
        }
    }
}

/// How a queued track's playback attempt ended.
#[derive(Debug)]
pub enum PlayOutcome {
    Finished,
    Failed(MusicError),
}

/// Returned by [`AudioQueueManager::enqueue`]. Dropping it is fine; awaiting
/// [`TrackTicket::wait`] yields the outcome once the track has been played.
#[derive(Debug)]
pub struct TrackTicket {
    position: usize,
    starts_now: bool,
    receiver: oneshot::Receiver<PlayOutcome>,
}

impl TrackTicket {
    /// 1-based position among the pending items at enqueue time.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Whether the track was enqueued onto an idle guild.
    pub fn starts_now(&self) -> bool {
        self.starts_now
    }

    /// `None` when the track was cleared from the queue before playing.
    pub async fn wait(self) -> Option<PlayOutcome> {
        self.receiver.await.ok()
    }
}

/// Owns every guild's queue, connection and player.
pub struct AudioQueueManager {
    guilds: DashMap<GuildId, Arc<GuildAudioState>>,
    registry: ConnectionRegistry,
    controller: PlayerController,
}

impl AudioQueueManager {
    pub fn new(
        transport: Arc<dyn VoiceTransport>,
        fetcher: Arc<dyn AudioFetcher>,
        settings: PlaybackSettings,
    ) -> Arc<Self> {
        let reaper = InactivityReaper::new(settings.idle_timeout);
        Arc::new(Self {
            guilds: DashMap::new(),
            registry: ConnectionRegistry::new(transport),
            controller: PlayerController::new(fetcher, reaper, settings.connect_timeout),
        })
    }

    /// Get the guild's state, creating it and its consumer task on first use.
    fn guild_state(self: &Arc<Self>, guild_id: GuildId) -> Arc<GuildAudioState> {
        match self.guilds.entry(guild_id) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let state = Arc::new(GuildAudioState::new(guild_id));
                entry.insert(state.clone());
                debug!("Starting queue consumer for guild {}", guild_id);
                tokio::spawn(Self::consume(Arc::downgrade(self), state.clone()));
                state
            }
        }
    }

    fn existing_state(&self, guild_id: GuildId) -> Option<Arc<GuildAudioState>> {
        self.guilds.get(&guild_id).map(|entry| entry.value().clone())
    }

    /// Add a track to the guild's queue and wake its consumer.
    pub async fn enqueue(self: &Arc<Self>, guild_id: GuildId, item: QueueItem) -> TrackTicket {
        let state = self.guild_state(guild_id);
        let (sender, receiver) = oneshot::channel();

        let name = item.display_name.clone();
        let (position, starts_now) = {
            let mut inner = state.lock().await;
            if InactivityReaper::cancel(&mut inner) {
                info!("Canceling disconnect timer - new item enqueued");
            }
            inner.pending.push_back(QueuedTrack {
                item,
                completion: Some(sender),
            });
            let position = inner.pending.len();
            (position, !inner.is_playing && position == 1)
        };

        info!("Item added to queue: \"{}\" (Position: {})", name, position);
        state.wake();

        TrackTicket {
            position,
            starts_now,
            receiver,
        }
    }

    /// Pending items, not counting the one currently playing.
    pub async fn queue_size(&self, guild_id: GuildId) -> usize {
        match self.existing_state(guild_id) {
            Some(state) => state.lock().await.pending.len(),
            None => 0,
        }
    }

    pub async fn is_currently_playing(&self, guild_id: GuildId) -> bool {
        match self.existing_state(guild_id) {
            Some(state) => state.lock().await.is_playing,
            None => false,
        }
    }

    pub async fn has_connection(&self, guild_id: GuildId) -> bool {
        match self.existing_state(guild_id) {
            Some(state) => state.lock().await.connection.is_some(),
            None => false,
        }
    }

    /// Whether an inactivity disconnect is scheduled.
    pub async fn has_pending_disconnect(&self, guild_id: GuildId) -> bool {
        match self.existing_state(guild_id) {
            Some(state) => state.lock().await.inactivity_timer.is_some(),
            None => false,
        }
    }

    /// Empty the pending queue; the track in flight keeps playing.
    pub async fn clear(&self, guild_id: GuildId) {
        if let Some(state) = self.existing_state(guild_id) {
            let removed = {
                let mut inner = state.lock().await;
                let removed = inner.pending.len();
                inner.pending.clear();
                removed
            };
            info!("Queue cleared for guild {} ({} item(s))", guild_id, removed);
        }
    }

    /// Clear the queue and stop the track in flight, including one that is
    /// still connecting or being fetched. The connection is kept.
    ///
    /// `is_currently_playing` stays true until the consumer sees that track end.
    pub async fn stop(&self, guild_id: GuildId) {
        let Some(state) = self.existing_state(guild_id) else {
            return;
        };

        let mut inner = state.lock().await;
        inner.pending.clear();
        inner.request_stop();
        if let Some(player) = &inner.active_player {
            player.stop();
        }
        info!("Playback stopped for guild {}", guild_id);
    }

    /// Tear down the guild's voice resources. Safe to call repeatedly.
    pub async fn cleanup(&self, guild_id: GuildId) {
        if let Some(state) = self.existing_state(guild_id) {
            state.cleanup().await;
        }
    }

    /// Stop everything and leave the voice channel.
    pub async fn disconnect(&self, guild_id: GuildId) {
        self.stop(guild_id).await;
        self.cleanup(guild_id).await;
    }

    /// The guild's consumer: plays pending items one at a time, forever.
    async fn consume(manager: Weak<Self>, state: Arc<GuildAudioState>) {
        let guild_id = state.guild_id();
        loop {
            let next = {
                let mut inner = state.lock().await;
                match inner.pending.pop_front() {
                    Some(track) => {
                        inner.is_playing = true;
                        Some((track, inner.pending.len(), inner.stop_generation))
                    }
                    None => {
                        inner.is_playing = false;
                        None
                    }
                }
            };

            let Some((track, remaining, generation)) = next else {
                state.wait_for_work().await;
                continue;
            };

            let Some(manager) = manager.upgrade() else {
                return;
            };

            let QueuedTrack { item, completion } = track;
            info!(
                "Playing from queue: \"{}\" ({} item(s) remaining)",
                item.display_name, remaining
            );

            let outcome = manager.play_item(&state, &item, generation).await;
            if let PlayOutcome::Failed(err) = &outcome {
                warn!(
                    "Skipping \"{}\" in guild {} after failure: {}",
                    item.display_name, guild_id, err
                );
            }

            state.lock().await.is_playing = false;
            if let Some(completion) = completion {
                let _ = completion.send(outcome);
            }
        }
    }

    async fn play_item(
        &self,
        state: &Arc<GuildAudioState>,
        item: &QueueItem,
        generation: u64,
    ) -> PlayOutcome {
        let connection = match self.registry.acquire(state, &item.target_channel).await {
            Ok(connection) => connection,
            Err(err) => return PlayOutcome::Failed(err),
        };
        self.controller
            .play_track(state, connection, item, generation)
            .await
    }
}
