use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::guild_state::{GuildAudioState, GuildInner};

static NEXT_TIMER_ID: AtomicU64 = AtomicU64::new(1);

/// A scheduled teardown. The id lets the firing task confirm it is still the
/// armed timer before tearing anything down.
pub struct InactivityTimer {
    id: u64,
    handle: JoinHandle<()>,
}

/// Disconnects a guild after it has sat idle with an empty queue.
#[derive(Debug, Clone, Copy)]
pub struct InactivityReaper {
    idle_timeout: Duration,
}

impl InactivityReaper {
    pub fn new(idle_timeout: Duration) -> Self {
        Self { idle_timeout }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Schedule cleanup for the guild, replacing any timer already armed.
    /// Must be called with the guild lock held (`inner`).
    pub fn arm(&self, state: &Arc<GuildAudioState>, inner: &mut GuildInner) {
        Self::cancel(inner);

        let id = NEXT_TIMER_ID.fetch_add(1, Ordering::Relaxed);
        let idle_timeout = self.idle_timeout;
        let weak_state = Arc::downgrade(state);
        let guild_id = state.guild_id();

        info!(
            "Scheduling disconnect for guild {} in {:?}",
            guild_id, idle_timeout
        );

        let handle = tokio::spawn(async move {
            tokio::time::sleep(idle_timeout).await;

            let Some(state) = weak_state.upgrade() else {
                return;
            };
            let mut inner = state.lock().await;
            let still_armed = inner
                .inactivity_timer
                .as_ref()
                .is_some_and(|timer| timer.id == id);
            if !still_armed {
                return;
            }
            // Dropping our own handle detaches the task instead of aborting it
            inner.inactivity_timer = None;

            info!(
                "Disconnecting from voice channel after {:?} of inactivity (guild {})",
                idle_timeout, guild_id
            );
            inner.release_resources().await;
        });

        inner.inactivity_timer = Some(InactivityTimer { id, handle });
    }

    /// Cancel the guild's pending timer. Returns whether one was armed.
    pub fn cancel(inner: &mut GuildInner) -> bool {
        match inner.inactivity_timer.take() {
            Some(timer) => {
                timer.handle.abort();
                debug!("Canceled inactivity timer {}", timer.id);
                true
            }
            None => false,
        }
    }
}
