// Export music utilities
pub mod audio_fetcher;
pub mod connection_registry;
pub mod embedded_messages;
pub mod guild_state;
pub mod inactivity_reaper;
pub mod instants;
pub mod music_manager;
pub mod player_controller;
pub mod queue_manager;
pub mod songbird_transport;
pub mod voice;
