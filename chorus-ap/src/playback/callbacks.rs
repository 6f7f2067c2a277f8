//! Lifecycle callbacks and their dispatch thread
//!
//! The mixing context never calls user code. It posts [`PlayerEvent`]s to a
//! channel; a dedicated thread (`chorus-callbacks`) turns them into
//! [`AudioCallbacks`] calls. Callbacks therefore run on that thread, after the
//! mixer has already moved on, and at most once per stream per transition.

use crate::audio::DecoderHandle;
use crate::playback::mixer::PlayingStream;
use crossbeam_channel::Receiver;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Device-level failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No output device could be opened; the player is silent
    NoDevice,

    /// The device stream reported an error after it started
    StreamFailure,
}

/// Receiver of player lifecycle notifications.
///
/// All methods default to no-ops. They are invoked from the player's
/// dispatch thread, never from the caller's thread and never from the
/// real-time mixing thread.
pub trait AudioCallbacks: Send + Sync {
    /// Device-level error
    fn on_playback_error(&self, _kind: ErrorKind) {}

    /// Per-stream decode failure; the stream has been removed
    fn on_playback_error_message(&self, _message: &str) {}

    /// A stream was pulled from for the first time
    fn on_playback_started(&self) {}

    /// A stream left the active set (finished, stopped or errored)
    fn on_playback_stopped(&self) {}
}

/// Callbacks that ignore everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCallbacks;

impl AudioCallbacks for NoopCallbacks {}

/// Messages from the mixer (and device) to the dispatch thread
pub(crate) enum PlayerEvent {
    Device(ErrorKind),
    Started,
    /// Stream failed while decoding; a `Stopped` for it follows
    StreamError(String),
    /// Stream removed from the active set. Carries the stream so its
    /// decoder and buffers are released off the mixing thread.
    Stopped(PlayingStream),
    /// Admission refused (decoder already active); no callback
    Rejected(PlayingStream),
    /// Handle carried by a stop command, dropped here
    Release(DecoderHandle),
}

/// Start the dispatch thread.
///
/// The thread exits once every sender of `events` has been dropped.
pub(crate) fn spawn_dispatcher(
    callbacks: Arc<dyn AudioCallbacks>,
    events: Receiver<PlayerEvent>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("chorus-callbacks".to_string())
        .spawn(move || {
            for event in events.iter() {
                match event {
                    PlayerEvent::Device(kind) => callbacks.on_playback_error(kind),
                    PlayerEvent::Started => callbacks.on_playback_started(),
                    PlayerEvent::StreamError(message) => {
                        warn!("Stream error: {}", message);
                        callbacks.on_playback_error_message(&message);
                    }
                    PlayerEvent::Stopped(stream) => {
                        debug!("Stream stopped: {:?}", stream.decoder());
                        callbacks.on_playback_stopped();
                    }
                    PlayerEvent::Rejected(stream) => {
                        warn!("Decoder {:?} is already playing; ignoring play()", stream.decoder());
                    }
                    PlayerEvent::Release(_) => {}
                }
            }
            debug!("Callback dispatcher exiting");
        })
}
