//! songbird-backed implementation of the voice seam.

use async_trait::async_trait;
use serenity::cache::Cache;
use serenity::model::id::{ChannelId, GuildId};
use songbird::input::{HttpRequest, Input};
use songbird::tracks::{PlayMode, Track, TrackHandle};
use songbird::{Call, CoreEvent, Event, EventContext, EventHandler, Songbird, TrackEvent};
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tracing::{debug, error, info};

use crate::HTTP_CLIENT;

use super::music_manager::{MusicError, MusicResult};
use super::voice::{
    AudioInput, AudioPlayer, AudioResource, ConnectionEvent, ConnectionStatus, PlayerEvent,
    PlayerSubscription, VoiceConnection, VoiceTransport,
};

const CONNECTION_EVENT_CAPACITY: usize = 32;

pub struct SongbirdTransport {
    songbird: Arc<Songbird>,
    cache: Arc<Cache>,
}

impl SongbirdTransport {
    pub fn new(songbird: Arc<Songbird>, cache: Arc<Cache>) -> Self {
        Self { songbird, cache }
    }
}

#[async_trait]
impl VoiceTransport for SongbirdTransport {
    fn has_voice_adapter(&self, guild_id: GuildId) -> bool {
        self.cache.guild(guild_id).is_some()
    }

    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> MusicResult<Arc<dyn VoiceConnection>> {
        let call = self.songbird.get_or_insert(guild_id);
        let shared = Arc::new(ConnectionShared::new());

        {
            let mut handler = call.lock().await;
            // A reused Call still carries the previous connection's handlers
            handler.remove_all_global_events();
            let forwarder = DriverStateForwarder {
                shared: shared.clone(),
            };
            handler.add_global_event(Event::Core(CoreEvent::DriverConnect), forwarder.clone());
            handler.add_global_event(Event::Core(CoreEvent::DriverReconnect), forwarder.clone());
            handler.add_global_event(Event::Core(CoreEvent::DriverDisconnect), forwarder);
        }

        let join_call = call.clone();
        let join_shared = shared.clone();
        tokio::spawn(async move {
            let join = join_call.lock().await.join(channel_id).await;
            let result = match join {
                Ok(join) => join.await,
                Err(err) => Err(err),
            };
            if let Err(err) = result {
                error!("Failed to join voice channel {}: {}", channel_id, err);
                join_shared.report_error(err.to_string());
            }
        });

        Ok(Arc::new(SongbirdConnection {
            guild_id,
            channel_id,
            songbird: self.songbird.clone(),
            call,
            shared,
        }))
    }
}

/// State shared between a connection handle and its driver event handlers.
struct ConnectionShared {
    status: watch::Sender<ConnectionStatus>,
    events: broadcast::Sender<ConnectionEvent>,
}

impl ConnectionShared {
    fn new() -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Connecting);
        let (events, _) = broadcast::channel(CONNECTION_EVENT_CAPACITY);
        Self { status, events }
    }

    fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Move to `new` and publish the change. Destroyed is final.
    fn transition(&self, new: ConnectionStatus) {
        let mut old = new;
        let changed = self.status.send_if_modified(|current| {
            if *current == new || *current == ConnectionStatus::Destroyed {
                return false;
            }
            old = std::mem::replace(current, new);
            true
        });
        if changed {
            let _ = self.events.send(ConnectionEvent::StateChange { old, new });
        }
    }

    fn report_error(&self, message: String) {
        let _ = self.events.send(ConnectionEvent::Error(message));
    }
}

#[derive(Clone)]
struct DriverStateForwarder {
    shared: Arc<ConnectionShared>,
}

#[async_trait]
impl EventHandler for DriverStateForwarder {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        match ctx {
            EventContext::DriverConnect(_) | EventContext::DriverReconnect(_) => {
                self.shared.transition(ConnectionStatus::Ready);
            }
            EventContext::DriverDisconnect(data) => {
                if let Some(reason) = &data.reason {
                    debug!("Voice driver disconnected: {:?}", reason);
                }
                self.shared.transition(ConnectionStatus::Disconnected);
            }
            _ => {}
        }
        None
    }
}

pub struct SongbirdConnection {
    guild_id: GuildId,
    channel_id: ChannelId,
    songbird: Arc<Songbird>,
    call: Arc<Mutex<Call>>,
    shared: Arc<ConnectionShared>,
}

#[async_trait]
impl VoiceConnection for SongbirdConnection {
    fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    fn status(&self) -> ConnectionStatus {
        self.shared.status()
    }

    fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.shared.events.subscribe()
    }

    async fn stop_subscribed(&self) {
        self.call.lock().await.stop();
    }

    async fn play(&self, resource: AudioResource) -> MusicResult<PlayerSubscription> {
        let input: Input = match resource.input {
            AudioInput::Bytes(bytes) => bytes.into(),
            AudioInput::Url(url) => HttpRequest::new(HTTP_CLIENT.clone(), url).into(),
        };
        let track = Track::from(input).volume(resource.volume);

        let handle = self.call.lock().await.play(track);

        let (sender, events) = mpsc::unbounded_channel();
        let forwarder = PlayerEventForwarder { sender };
        for event in [TrackEvent::Play, TrackEvent::End, TrackEvent::Error] {
            handle
                .add_event(Event::Track(event), forwarder.clone())
                .map_err(|err| MusicError::PlayerError(err.to_string()))?;
        }

        Ok(PlayerSubscription {
            player: Arc::new(SongbirdPlayer { handle }),
            events,
        })
    }

    async fn destroy(&self) {
        self.shared.transition(ConnectionStatus::Destroyed);
        match self.songbird.remove(self.guild_id).await {
            Ok(()) => info!("Left voice channel {}", self.channel_id),
            Err(err) => debug!("Voice connection already gone: {}", err),
        }
    }
}

#[derive(Clone)]
struct PlayerEventForwarder {
    sender: mpsc::UnboundedSender<PlayerEvent>,
}

#[async_trait]
impl EventHandler for PlayerEventForwarder {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(tracks) = ctx {
            for (state, _) in tracks.iter() {
                let event = match &state.playing {
                    PlayMode::Play => PlayerEvent::Playing,
                    PlayMode::End | PlayMode::Stop => PlayerEvent::Idle,
                    PlayMode::Errored(err) => PlayerEvent::Error(format!("{:?}", err)),
                    _ => continue,
                };
                let _ = self.sender.send(event);
            }
        }
        None
    }
}

struct SongbirdPlayer {
    handle: TrackHandle,
}

impl AudioPlayer for SongbirdPlayer {
    fn stop(&self) {
        if let Err(err) = self.handle.stop() {
            debug!("Track already stopped: {}", err);
        }
    }
}
