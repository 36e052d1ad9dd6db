use std::sync::{Arc, Weak};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use super::guild_state::GuildAudioState;
use super::inactivity_reaper::InactivityReaper;
use super::music_manager::{MusicError, MusicResult};
use super::queue_manager::VoiceChannelRef;
use super::voice::{ConnectionEvent, ConnectionStatus, VoiceConnection, VoiceTransport};

/// Hands out the guild's voice connection, joining or switching channels as needed.
pub struct ConnectionRegistry {
    transport: Arc<dyn VoiceTransport>,
}

impl ConnectionRegistry {
    pub fn new(transport: Arc<dyn VoiceTransport>) -> Self {
        Self { transport }
    }

    /// Return a connection bound to `target`, reusing the stored one when it
    /// is live and already in that channel.
    pub async fn acquire(
        &self,
        state: &Arc<GuildAudioState>,
        target: &VoiceChannelRef,
    ) -> MusicResult<Arc<dyn VoiceConnection>> {
        let guild_id = state.guild_id();
        if !self.transport.has_voice_adapter(guild_id) {
            error!("Voice adapter is not available for guild {}", guild_id);
            return Err(MusicError::AdapterUnavailable);
        }

        let mut inner = state.lock().await;
        if let Some(existing) = inner.connection.take() {
            let status = existing.status();
            if status.is_terminal() {
                debug!("Stored connection is {}, joining again", status);
                existing.destroy().await;
            } else if existing.channel_id() == target.channel_id {
                debug!("Reusing existing connection for guild {}", guild_id);
                inner.connection = Some(existing.clone());
                return Ok(existing);
            } else {
                info!(
                    "Switching voice channel from {} to {}",
                    existing.channel_id(),
                    target.channel_id
                );
                existing.destroy().await;
            }
        }

        info!("Joining voice channel {}", target);
        let connection = self.transport.join(guild_id, target.channel_id).await?;
        inner.connection = Some(connection.clone());
        Self::watch(state, &connection);

        Ok(connection)
    }

    /// Log the connection's transitions and forget it if it drops after being ready.
    fn watch(state: &Arc<GuildAudioState>, connection: &Arc<dyn VoiceConnection>) {
        let mut events = connection.subscribe();
        let weak_state = Arc::downgrade(state);
        let weak_connection: Weak<dyn VoiceConnection> = Arc::downgrade(connection);
        let guild_id = state.guild_id();

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(ConnectionEvent::StateChange { old, new }) => {
                        debug!("Connection state change: {} -> {}", old, new);
                        match new {
                            ConnectionStatus::Destroyed => return,
                            ConnectionStatus::Disconnected if old == ConnectionStatus::Ready => {
                                warn!("Voice connection lost in guild {}", guild_id);
                                let Some(state) = weak_state.upgrade() else {
                                    return;
                                };
                                let mut inner = state.lock().await;
                                let is_current = inner.connection.as_ref().is_some_and(|current| {
                                    std::ptr::addr_eq(Arc::as_ptr(current), weak_connection.as_ptr())
                                });
                                if is_current {
                                    inner.connection = None;
                                    InactivityReaper::cancel(&mut inner);
                                }
                                return;
                            }
                            _ => {}
                        }
                    }
                    Ok(ConnectionEvent::Error(message)) => {
                        error!("Error in voice connection: {}", message);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Connection watcher missed {} events", skipped);
                    }
                    Err(RecvError::Closed) => return,
                }
            }
        });
    }
}
