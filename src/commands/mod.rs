//! This module aggregates all the command modules for the bot.

/// General purpose commands (e.g., ping).
pub mod general;

/// Commands for searching and playing sound clips.
pub mod music;
