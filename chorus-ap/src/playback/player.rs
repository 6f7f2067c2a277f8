//! Audio player
//!
//! Binds one output device to a [`Mixer`] and exposes the control surface.
//!
//! `AudioPlayer` owns the cpal stream, which is not `Send`, so it stays on
//! the thread that created it. [`PlayerControl`] is the cloneable handle for
//! every other thread.

use crate::audio::{AudioOutput, DecoderHandle};
use crate::error::{Error, Result};
use crate::playback::callbacks::{spawn_dispatcher, AudioCallbacks, ErrorKind, PlayerEvent};
use crate::playback::mixer::{Command, Mixer, PlayingStream};
use chorus_common::{TomlConfig, MAX_SAMPLING_RATE, MIN_SAMPLING_RATE};
use crossbeam_channel::{unbounded, Sender};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// Default frames pulled from a decoder per read
pub const DEFAULT_BLOCK_FRAMES: usize = 1024;

/// The mixer handed out by [`AudioPlayer::offline`]; drive it with
/// [`Mixer::mix`] to render frames without a device.
pub type OfflineMixer = Mixer;

/// Device and mixing options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerOptions {
    /// Output device name (None = default device)
    pub device: Option<String>,
    /// Device buffer size in frames (None = device default)
    pub buffer_size: Option<u32>,
    /// Frames pulled from each decoder per read
    pub block_frames: usize,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            device: None,
            buffer_size: None,
            block_frames: DEFAULT_BLOCK_FRAMES,
        }
    }
}

impl From<&TomlConfig> for PlayerOptions {
    fn from(config: &TomlConfig) -> Self {
        Self {
            device: config.device.clone(),
            buffer_size: config.buffer_size,
            block_frames: config.block_frames,
        }
    }
}

/// Cross-thread control surface of an [`AudioPlayer`]
#[derive(Clone)]
pub struct PlayerControl {
    /// None when the player has no device
    commands: Option<Sender<Command>>,
    sampling_rate: u32,
    block_frames: usize,
    active_count: Arc<AtomicUsize>,
}

impl PlayerControl {
    /// Queue `decoder` for admission at the next buffer boundary.
    ///
    /// The player keeps its own reference until the stream is removed.
    /// Playing a decoder that is already active is logged and ignored.
    pub fn play(&self, decoder: &DecoderHandle) {
        let Some(commands) = &self.commands else {
            debug!("play() ignored: no output device");
            return;
        };

        let rate = decoder.format().sampling_rate();
        if rate != self.sampling_rate {
            warn!(
                "Decoder rate {} Hz differs from output rate {} Hz; playing without resampling",
                rate, self.sampling_rate
            );
        }

        // Block buffers are allocated here, not on the mixing thread.
        let stream = PlayingStream::new(decoder.clone(), self.block_frames);
        if commands.send(Command::Play(stream)).is_err() {
            debug!("play() ignored: mixer is gone");
        }
    }

    /// Request removal of `decoder`. Idempotent; a decoder that is not
    /// active is ignored.
    pub fn stop(&self, decoder: &DecoderHandle) {
        if let Some(commands) = &self.commands {
            let _ = commands.send(Command::Stop(decoder.clone()));
        }
    }

    /// Request removal of every active stream
    pub fn stop_all(&self) {
        if let Some(commands) = &self.commands {
            let _ = commands.send(Command::StopAll);
        }
    }

    /// Streams in the mix as of the last completed buffer
    pub fn active_streams(&self) -> usize {
        self.active_count.load(Ordering::Acquire)
    }

    /// Output sampling rate in Hz
    pub fn sampling_rate(&self) -> u32 {
        self.sampling_rate
    }
}

/// Real-time mixing player bound to one output device
pub struct AudioPlayer {
    control: PlayerControl,
    output: Option<AudioOutput>,
    device_name: Option<String>,
    /// Kept for device error reports; dropped on shutdown so the
    /// dispatcher can finish.
    events: Option<Sender<PlayerEvent>>,
    dispatcher: Option<JoinHandle<()>>,
}

impl AudioPlayer {
    /// Open the output device and start mixing.
    ///
    /// If no device can be opened, `on_playback_error(NoDevice)` is delivered
    /// and a silent player is returned whose control calls do nothing.
    ///
    /// # Errors
    /// - `block_frames` is zero (checked before the device is opened)
    /// - the callback dispatch thread cannot be spawned
    pub fn new(
        callbacks: Arc<dyn AudioCallbacks>,
        preferred_sampling_rate: u32,
        options: PlayerOptions,
    ) -> Result<Self> {
        validate_block_frames(options.block_frames)?;

        let (event_tx, event_rx) = unbounded();
        let dispatcher = spawn_dispatcher(callbacks, event_rx)?;

        let (command_tx, command_rx) = unbounded();
        let active_count = Arc::new(AtomicUsize::new(0));

        let opened = AudioOutput::new(
            options.device.as_deref(),
            preferred_sampling_rate,
            options.buffer_size,
        )
        .and_then(|mut output| {
            let mut mixer = Mixer::new(command_rx, event_tx.clone(), Arc::clone(&active_count));
            let reported = Arc::new(AtomicBool::new(false));
            let error_events = event_tx.clone();
            output.start(
                move |block| mixer.mix(block),
                move |_message| {
                    // One report per player; the device keeps calling back.
                    if !reported.swap(true, Ordering::SeqCst) {
                        let _ = error_events.send(PlayerEvent::Device(ErrorKind::StreamFailure));
                    }
                },
            )?;
            Ok(output)
        });

        match opened {
            Ok(output) => {
                let device_name = output.device_name();
                info!(
                    "Audio player started on '{}' at {} Hz",
                    device_name,
                    output.sample_rate()
                );
                Ok(Self {
                    control: PlayerControl {
                        commands: Some(command_tx),
                        sampling_rate: output.sample_rate(),
                        block_frames: options.block_frames,
                        active_count,
                    },
                    output: Some(output),
                    device_name: Some(device_name),
                    events: Some(event_tx),
                    dispatcher: Some(dispatcher),
                })
            }
            Err(e) => {
                warn!("No audio output available, player is silent: {}", e);
                let _ = event_tx.send(PlayerEvent::Device(ErrorKind::NoDevice));
                Ok(Self {
                    control: PlayerControl {
                        commands: None,
                        sampling_rate: preferred_sampling_rate,
                        block_frames: options.block_frames,
                        active_count,
                    },
                    output: None,
                    device_name: None,
                    events: Some(event_tx),
                    dispatcher: Some(dispatcher),
                })
            }
        }
    }

    /// Build a device-less player and the mixer that renders for it.
    ///
    /// The caller drives the returned mixer; commands issued through the
    /// player are applied at each `mix()` call. Drop the mixer before
    /// [`AudioPlayer::shutdown`] or the dispatcher will wait for it.
    ///
    /// # Errors
    /// - `sampling_rate` outside 8000..=48000
    /// - `block_frames` is zero
    pub fn offline(
        callbacks: Arc<dyn AudioCallbacks>,
        sampling_rate: u32,
        options: PlayerOptions,
    ) -> Result<(Self, OfflineMixer)> {
        if !(MIN_SAMPLING_RATE..=MAX_SAMPLING_RATE).contains(&sampling_rate) {
            return Err(Error::InvalidFormat(format!(
                "sampling rate {} outside {}..={}",
                sampling_rate, MIN_SAMPLING_RATE, MAX_SAMPLING_RATE
            )));
        }
        validate_block_frames(options.block_frames)?;

        let (event_tx, event_rx) = unbounded();
        let dispatcher = spawn_dispatcher(callbacks, event_rx)?;
        let (command_tx, command_rx) = unbounded();
        let active_count = Arc::new(AtomicUsize::new(0));

        // The mixer holds the only event sender, so dropping it lets the
        // dispatcher finish.
        let mixer = Mixer::new(command_rx, event_tx, Arc::clone(&active_count));
        debug!("Offline player at {} Hz", sampling_rate);

        let player = Self {
            control: PlayerControl {
                commands: Some(command_tx),
                sampling_rate,
                block_frames: options.block_frames,
                active_count,
            },
            output: None,
            device_name: None,
            events: None,
            dispatcher: Some(dispatcher),
        };
        Ok((player, mixer))
    }

    /// Cloneable control handle usable from any thread
    pub fn control(&self) -> PlayerControl {
        self.control.clone()
    }

    pub fn play(&self, decoder: &DecoderHandle) {
        self.control.play(decoder);
    }

    pub fn stop(&self, decoder: &DecoderHandle) {
        self.control.stop(decoder);
    }

    pub fn stop_all(&self) {
        self.control.stop_all();
    }

    /// Output sampling rate (the preferred rate when there is no device)
    pub fn sampling_rate(&self) -> u32 {
        self.control.sampling_rate()
    }

    /// True if the player is bound to a running output device
    pub fn has_device(&self) -> bool {
        self.output.is_some()
    }

    pub fn device_name(&self) -> Option<&str> {
        self.device_name.as_deref()
    }

    pub fn active_streams(&self) -> usize {
        self.control.active_streams()
    }

    /// Stop the device and wait for every pending callback.
    ///
    /// Streams still in the mix are dropped without a stop callback.
    /// Control handles cloned from this player become inert.
    pub fn shutdown(mut self) {
        self.stop_output();
        self.events = None;
        if let Some(dispatcher) = self.dispatcher.take() {
            if dispatcher.join().is_err() {
                warn!("Callback dispatcher panicked");
            }
        }
        info!("Audio player shut down");
    }

    fn stop_output(&mut self) {
        // Dropping the output drops the device callback and its mixer,
        // which releases the last event sender held by the audio thread.
        if let Some(mut output) = self.output.take() {
            if let Err(e) = output.stop() {
                warn!("Failed to stop audio output: {}", e);
            }
        }
    }
}

fn validate_block_frames(block_frames: usize) -> Result<()> {
    if block_frames == 0 {
        return Err(Error::InvalidFormat("block_frames must be non-zero".to_string()));
    }
    Ok(())
}

impl Drop for AudioPlayer {
    fn drop(&mut self) {
        // The dispatcher is detached here; use shutdown() to wait for it.
        self.stop_output();
    }
}
