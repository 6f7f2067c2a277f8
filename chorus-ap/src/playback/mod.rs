//! Mixing engine: player, real-time mixer and lifecycle callbacks

pub mod callbacks;
pub mod mixer;
pub mod player;

pub use callbacks::{AudioCallbacks, ErrorKind, NoopCallbacks};
pub use mixer::Mixer;
pub use player::{AudioPlayer, OfflineMixer, PlayerControl, PlayerOptions, DEFAULT_BLOCK_FRAMES};
