//! # Chorus Audio Player Library (chorus-ap)
//!
//! Real-time decoding and mixing of PCM audio.
//!
//! **Purpose:** Turn in-memory encoded audio (WAV, Ogg/Vorbis, or any
//! caller-supplied frame source) into a single stereo float stream, mixing any
//! number of independently started and stopped streams into one output device.
//!
//! **Architecture:** decoders (symphonia for Vorbis) -> lock-free command queue
//! -> real-time mixer on the cpal callback thread -> lifecycle events delivered
//! on a dispatch thread.

pub mod audio;
pub mod error;
pub mod playback;

pub use audio::{AudioDecoder, AudioFormat, AudioFrame, Blob, DecoderHandle, FrameSource};
pub use error::{Error, Result};
pub use playback::{AudioCallbacks, AudioPlayer, ErrorKind, PlayerControl, PlayerOptions};
