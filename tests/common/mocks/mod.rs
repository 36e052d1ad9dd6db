//! Scripted stand-ins for the voice transport and the clip fetcher.
//!
//! Clip URLs drive the fake player: a URL containing `broken` fails shortly
//! after starting, one containing `endless` plays until stopped, anything else
//! finishes after [`CLIP_LENGTH`].

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use soundclip::commands::music::utils::{
    audio_fetcher::{AudioFetcher, FetchError},
    music_manager::MusicResult,
    voice::{
        AudioInput, AudioPlayer, AudioResource, ConnectionEvent, ConnectionStatus, PlayerEvent,
        PlayerSubscription, VoiceConnection, VoiceTransport,
    },
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

pub const CLIP_LENGTH: Duration = Duration::from_secs(1);
const HANDSHAKE_DELAY: Duration = Duration::from_millis(10);

/// How new connections behave after `join`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinMode {
    /// Becomes Ready shortly after joining.
    AutoReady,
    /// Stays Connecting forever.
    NeverReady,
    /// Reports a permissions error instead of becoming Ready.
    DenyPermission,
}

/// What was played, across every connection of a transport.
#[derive(Default)]
pub struct PlayLog {
    played: Mutex<Vec<String>>,
    overlaps: AtomicUsize,
}

impl PlayLog {
    pub fn played(&self) -> Vec<String> {
        self.played.lock().unwrap().clone()
    }

    /// Times a player was started while another was still subscribed.
    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }
}

pub struct FakeTransport {
    adapter_available: AtomicBool,
    mode: Mutex<JoinMode>,
    connections: Mutex<Vec<Arc<FakeConnection>>>,
    log: Arc<PlayLog>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            adapter_available: AtomicBool::new(true),
            mode: Mutex::new(JoinMode::AutoReady),
            connections: Mutex::new(Vec::new()),
            log: Arc::new(PlayLog::default()),
        })
    }

    pub fn set_adapter_available(&self, available: bool) {
        self.adapter_available.store(available, Ordering::SeqCst);
    }

    pub fn set_join_mode(&self, mode: JoinMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn log(&self) -> &PlayLog {
        &self.log
    }

    pub fn joined_channels(&self) -> Vec<ChannelId> {
        self.connections
            .lock()
            .unwrap()
            .iter()
            .map(|connection| connection.channel_id)
            .collect()
    }

    pub fn connection(&self, index: usize) -> Arc<FakeConnection> {
        self.connections.lock().unwrap()[index].clone()
    }

    pub fn last_connection(&self) -> Arc<FakeConnection> {
        self.connections
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no connection was joined")
    }
}

#[async_trait]
impl VoiceTransport for FakeTransport {
    fn has_voice_adapter(&self, _guild_id: GuildId) -> bool {
        self.adapter_available.load(Ordering::SeqCst)
    }

    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> MusicResult<Arc<dyn VoiceConnection>> {
        let connection = Arc::new(FakeConnection::new(guild_id, channel_id, self.log.clone()));
        self.connections.lock().unwrap().push(connection.clone());

        let mode = *self.mode.lock().unwrap();
        let handshake = connection.clone();
        tokio::spawn(async move {
            tokio::time::sleep(HANDSHAKE_DELAY).await;
            match mode {
                JoinMode::AutoReady => handshake.transition(ConnectionStatus::Ready),
                JoinMode::NeverReady => {}
                JoinMode::DenyPermission => {
                    let _ = handshake
                        .events
                        .send(ConnectionEvent::Error("Missing Permissions".to_string()));
                }
            }
        });

        Ok(connection)
    }
}

pub struct FakeConnection {
    guild_id: GuildId,
    channel_id: ChannelId,
    status: Mutex<ConnectionStatus>,
    events: broadcast::Sender<ConnectionEvent>,
    current: Mutex<Option<Arc<FakePlayer>>>,
    destroy_calls: AtomicUsize,
    log: Arc<PlayLog>,
}

impl FakeConnection {
    fn new(guild_id: GuildId, channel_id: ChannelId, log: Arc<PlayLog>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            guild_id,
            channel_id,
            status: Mutex::new(ConnectionStatus::Connecting),
            events,
            current: Mutex::new(None),
            destroy_calls: AtomicUsize::new(0),
            log,
        }
    }

    pub fn transition(&self, new: ConnectionStatus) {
        let old = {
            let mut status = self.status.lock().unwrap();
            let old = *status;
            if old == new || old == ConnectionStatus::Destroyed {
                return;
            }
            *status = new;
            old
        };
        let _ = self.events.send(ConnectionEvent::StateChange { old, new });
    }

    /// Simulate the bot being kicked from the channel.
    pub fn drop_connection(&self) {
        self.transition(ConnectionStatus::Disconnected);
    }

    pub fn destroy_calls(&self) -> usize {
        self.destroy_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VoiceConnection for FakeConnection {
    fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    fn status(&self) -> ConnectionStatus {
        *self.status.lock().unwrap()
    }

    fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    async fn stop_subscribed(&self) {
        if let Some(previous) = self.current.lock().unwrap().take() {
            previous.stop();
        }
    }

    async fn play(&self, resource: AudioResource) -> MusicResult<PlayerSubscription> {
        let url = match &resource.input {
            AudioInput::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            AudioInput::Url(url) => url.clone(),
        };
        self.log.played.lock().unwrap().push(url.clone());

        let (sender, events) = mpsc::unbounded_channel();
        let player = Arc::new(FakePlayer {
            finished: AtomicBool::new(false),
            sender,
        });
        {
            let mut current = self.current.lock().unwrap();
            if current.as_ref().is_some_and(|previous| !previous.is_finished()) {
                self.log.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            *current = Some(player.clone());
        }

        let _ = player.sender.send(PlayerEvent::Playing);
        if !url.contains("endless") {
            let script = player.clone();
            let broken = url.contains("broken");
            tokio::spawn(async move {
                if broken {
                    tokio::time::sleep(HANDSHAKE_DELAY).await;
                    script.finish(PlayerEvent::Error("corrupt mp3 frame".to_string()));
                } else {
                    tokio::time::sleep(CLIP_LENGTH).await;
                    script.finish(PlayerEvent::Idle);
                }
            });
        }

        Ok(PlayerSubscription { player, events })
    }

    async fn destroy(&self) {
        self.destroy_calls.fetch_add(1, Ordering::SeqCst);
        self.transition(ConnectionStatus::Destroyed);
        if let Some(player) = self.current.lock().unwrap().take() {
            player.finished.store(true, Ordering::SeqCst);
        }
    }
}

pub struct FakePlayer {
    finished: AtomicBool,
    sender: mpsc::UnboundedSender<PlayerEvent>,
}

impl FakePlayer {
    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Report the final event, unless the player already ended.
    fn finish(&self, event: PlayerEvent) {
        if !self.finished.swap(true, Ordering::SeqCst) {
            let _ = self.sender.send(event);
        }
    }
}

impl AudioPlayer for FakePlayer {
    fn stop(&self) {
        self.finish(PlayerEvent::Idle);
    }
}

type FetchHook = Box<dyn FnOnce() + Send>;

/// Serves a clip's URL back as its bytes; URLs containing `unreachable` fail.
#[derive(Default)]
pub struct StaticFetcher {
    fetches: AtomicUsize,
    on_next_fetch: Mutex<Option<FetchHook>>,
}

impl StaticFetcher {
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Run `hook` while the next clip is being fetched.
    pub fn on_next_fetch(&self, hook: impl FnOnce() + Send + 'static) {
        *self.on_next_fetch.lock().unwrap() = Some(Box::new(hook));
    }
}

#[async_trait]
impl AudioFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let hook = self.on_next_fetch.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }
        if url.contains("unreachable") {
            return Err(FetchError::TooLarge { limit: 0 });
        }
        Ok(url.as_bytes().to_vec())
    }
}
