use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio::time;
use tracing::{debug, error, info, warn};

use super::audio_fetcher::AudioFetcher;
use super::guild_state::GuildAudioState;
use super::inactivity_reaper::InactivityReaper;
use super::music_manager::{MusicError, MusicResult};
use super::queue_manager::{PlayOutcome, QueueItem};
use super::voice::{
    AudioInput, AudioResource, ConnectionEvent, ConnectionStatus, PlayerEvent,
    PlayerSubscription, VoiceConnection, same_connection,
};

/// Phases of a single playback attempt. Each attempt is single-use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    AwaitingConnection,
    Preparing,
    Playing,
    Finished,
    Failed,
}

impl PlaybackPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, PlaybackPhase::Finished | PlaybackPhase::Failed)
    }

    pub fn can_advance_to(self, next: PlaybackPhase) -> bool {
        use PlaybackPhase::*;
        matches!(
            (self, next),
            (AwaitingConnection, Preparing)
                | (Preparing, Playing)
                | (AwaitingConnection | Preparing | Playing, Finished | Failed)
        )
    }
}

struct PlaybackAttempt<'a> {
    track: &'a str,
    phase: PlaybackPhase,
}

impl<'a> PlaybackAttempt<'a> {
    fn new(track: &'a str) -> Self {
        Self {
            track,
            phase: PlaybackPhase::AwaitingConnection,
        }
    }

    fn advance(&mut self, next: PlaybackPhase) {
        if !self.phase.can_advance_to(next) {
            warn!(
                "Ignoring playback transition {:?} -> {:?} for \"{}\"",
                self.phase, next, self.track
            );
            return;
        }
        debug!(
            "Playback state change: {:?} -> {:?} ({})",
            self.phase, next, self.track
        );
        self.phase = next;
    }
}

/// How a successful attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackEnd {
    /// The player went idle after playing.
    Natural,
    /// The connection went away after being ready; not treated as an error.
    ConnectionClosed,
    /// A stop request ended the attempt before the clip reached the player.
    Stopped,
}

/// Runs one track on one connection and reports how it ended.
pub struct PlayerController {
    fetcher: Arc<dyn AudioFetcher>,
    reaper: InactivityReaper,
    connect_timeout: Duration,
}

impl PlayerController {
    pub fn new(
        fetcher: Arc<dyn AudioFetcher>,
        reaper: InactivityReaper,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            reaper,
            connect_timeout,
        }
    }

    /// Play `item` on `connection`. Every failure path tears the guild's
    /// resources down before returning.
    ///
    /// `generation` is the guild's stop generation read when `item` was
    /// dequeued; a later stop request ends the attempt.
    pub async fn play_track(
        &self,
        state: &Arc<GuildAudioState>,
        connection: Arc<dyn VoiceConnection>,
        item: &QueueItem,
        generation: u64,
    ) -> PlayOutcome {
        let mut attempt = PlaybackAttempt::new(&item.display_name);

        match self
            .run(&mut attempt, state, &connection, item, generation)
            .await
        {
            Ok(end @ (TrackEnd::Natural | TrackEnd::Stopped)) => {
                attempt.advance(PlaybackPhase::Finished);

                let mut inner = state.lock().await;
                if end == TrackEnd::Stopped || inner.stopped_since(generation) {
                    info!("Audio stopped: \"{}\"", item.display_name);
                } else {
                    info!("Audio finished: \"{}\"", item.display_name);
                }
                inner.active_player = None;
                // Nothing to reap if the connection was torn down while the track ended
                let still_connected = inner
                    .connection
                    .as_ref()
                    .is_some_and(|current| same_connection(current, &connection));
                if inner.pending.is_empty() && still_connected {
                    self.reaper.arm(state, &mut inner);
                }
                PlayOutcome::Finished
            }
            Ok(TrackEnd::ConnectionClosed) => {
                attempt.advance(PlaybackPhase::Finished);
                info!(
                    "Voice connection closed while playing \"{}\"",
                    item.display_name
                );

                let mut inner = state.lock().await;
                InactivityReaper::cancel(&mut inner);
                if inner
                    .connection
                    .as_ref()
                    .is_some_and(|current| same_connection(current, &connection))
                {
                    inner.connection = None;
                }
                if let Some(player) = inner.active_player.take() {
                    player.stop();
                }
                PlayOutcome::Finished
            }
            Err(err) => {
                attempt.advance(PlaybackPhase::Failed);
                error!("Error playing \"{}\": {}", item.display_name, err);
                state.cleanup().await;
                PlayOutcome::Failed(err)
            }
        }
    }

    async fn run(
        &self,
        attempt: &mut PlaybackAttempt<'_>,
        state: &Arc<GuildAudioState>,
        connection: &Arc<dyn VoiceConnection>,
        item: &QueueItem,
        generation: u64,
    ) -> MusicResult<TrackEnd> {
        if InactivityReaper::cancel(&mut *state.lock().await) {
            info!("Canceling disconnect timer - new playback started");
        }

        // Subscribe before reading the status so no transition slips between the two
        let mut connection_events = connection.subscribe();
        self.await_ready(connection.as_ref(), &mut connection_events)
            .await?;
        if state.lock().await.stopped_since(generation) {
            info!("\"{}\" was stopped while connecting", item.display_name);
            return Ok(TrackEnd::Stopped);
        }
        attempt.advance(PlaybackPhase::Preparing);

        connection.stop_subscribed().await;

        let input = self.prepare_input(&item.audio_source_url).await;
        let resource = AudioResource::new(input);
        debug!(
            "Audio resource created (type: {}) for \"{}\"",
            resource.input.kind(),
            item.display_name
        );

        let mut player_events = {
            // Held until the player is stored, so a stop either sees it or prevents it
            let mut inner = state.lock().await;
            if inner.stopped_since(generation) {
                info!("\"{}\" was stopped before playing", item.display_name);
                return Ok(TrackEnd::Stopped);
            }

            // The connection may have dropped while the clip was being fetched
            let status = connection.status();
            if status != ConnectionStatus::Ready {
                error!("Connection is not ready! State: {}", status);
                return Err(MusicError::ConnectionNotReady);
            }

            let PlayerSubscription { player, events } = connection.play(resource).await?;
            inner.active_player = Some(player);
            events
        };
        attempt.advance(PlaybackPhase::Playing);
        info!("Audio started: \"{}\"", item.display_name);

        Self::await_terminal(&item.display_name, &mut player_events, &mut connection_events).await
    }

    /// Wait until the connection is ready, bounded by the connect timeout.
    async fn await_ready(
        &self,
        connection: &dyn VoiceConnection,
        events: &mut broadcast::Receiver<ConnectionEvent>,
    ) -> MusicResult<()> {
        if connection.status() == ConnectionStatus::Ready {
            return Ok(());
        }

        match time::timeout(self.connect_timeout, Self::wait_for_ready(events)).await {
            Ok(result) => result,
            Err(_) => {
                let status = connection.status();
                if status == ConnectionStatus::Ready {
                    return Ok(());
                }
                error!(
                    "Timeout connecting to voice channel. Current state: {}",
                    status
                );
                Err(MusicError::ConnectionTimeout { status })
            }
        }
    }

    async fn wait_for_ready(events: &mut broadcast::Receiver<ConnectionEvent>) -> MusicResult<()> {
        loop {
            match events.recv().await {
                Ok(ConnectionEvent::StateChange { new, old }) => match new {
                    ConnectionStatus::Ready => return Ok(()),
                    ConnectionStatus::Connecting => debug!("Connecting to voice channel..."),
                    ConnectionStatus::Disconnected if old != ConnectionStatus::Ready => {
                        error!("Connection disconnected before being ready");
                        return Err(MusicError::DisconnectedBeforeReady);
                    }
                    ConnectionStatus::Disconnected => {}
                    ConnectionStatus::Destroyed => return Err(MusicError::ConnectionNotReady),
                },
                Ok(ConnectionEvent::Error(message)) => {
                    error!("Error in voice connection: {}", message);
                    return Err(MusicError::from_connection_error(message));
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Missed {} voice connection events", skipped);
                }
                Err(RecvError::Closed) => return Err(MusicError::ConnectionNotReady),
            }
        }
    }

    /// Pull the clip's bytes, falling back to letting the decoder stream the URL.
    async fn prepare_input(&self, url: &str) -> AudioInput {
        match self.fetcher.fetch(url).await {
            Ok(bytes) => {
                debug!("Audio stream obtained successfully ({} bytes)", bytes.len());
                AudioInput::Bytes(bytes)
            }
            Err(err) => {
                warn!("Could not get stream, using URL directly: {}", err);
                AudioInput::Url(url.to_string())
            }
        }
    }

    async fn await_terminal(
        track: &str,
        player_events: &mut mpsc::UnboundedReceiver<PlayerEvent>,
        connection_events: &mut broadcast::Receiver<ConnectionEvent>,
    ) -> MusicResult<TrackEnd> {
        loop {
            tokio::select! {
                biased;

                event = player_events.recv() => match event {
                    Some(PlayerEvent::Playing) => debug!("Playing: \"{}\"", track),
                    Some(PlayerEvent::Idle) => return Ok(TrackEnd::Natural),
                    Some(PlayerEvent::Error(reason)) => {
                        error!("Error in audio player for \"{}\": {}", track, reason);
                        return Err(MusicError::PlayerError(reason));
                    }
                    // The transport dropped the player without reporting an end
                    None => return Ok(TrackEnd::ConnectionClosed),
                },

                event = connection_events.recv() => match event {
                    Ok(ConnectionEvent::StateChange { old, new }) => {
                        debug!("Connection state change: {} -> {}", old, new);
                        if new == ConnectionStatus::Destroyed
                            || (new == ConnectionStatus::Disconnected
                                && old == ConnectionStatus::Ready)
                        {
                            return Ok(TrackEnd::ConnectionClosed);
                        }
                    }
                    Ok(ConnectionEvent::Error(message)) => {
                        error!("Error in voice connection: {}", message);
                        return Err(MusicError::from_connection_error(message));
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Missed {} voice connection events", skipped);
                    }
                    Err(RecvError::Closed) => return Ok(TrackEnd::ConnectionClosed),
                },
            }
        }
    }
}
