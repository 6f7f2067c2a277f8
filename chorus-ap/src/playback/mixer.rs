//! Real-time mixer
//!
//! Runs once per device buffer on the audio thread:
//!
//! 1. Drain pending control commands (admit, stop, stop all)
//! 2. Zero the output block
//! 3. For every active stream, pull frames from its decoder a block at a time
//!    and add them slot by slot into the output
//! 4. Retire finished, errored and stopped streams and post their events
//!
//! The active set is owned by the mixer alone. Control threads reach it only
//! through the command channel, so nothing here waits on a lock held by
//! another thread. Each decoder's own mutex is only taken by this thread
//! while the stream is active.
//!
//! Output is not clipped: summing several full-scale streams can exceed 1.0.

use crate::audio::{AudioFormat, AudioFrame, DecoderHandle};
use crate::playback::callbacks::PlayerEvent;
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Initial capacity of the active set; admission beyond it reallocates
const INITIAL_STREAM_CAPACITY: usize = 32;

/// Control messages from [`PlayerControl`](crate::playback::PlayerControl)
pub(crate) enum Command {
    Play(PlayingStream),
    Stop(DecoderHandle),
    StopAll,
}

/// Lifecycle state of one stream inside the mixer
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum StreamState {
    Active,
    /// Decoder returned 0 frames
    Finished,
    /// Decoder returned an error
    Errored(String),
}

/// One admitted decoder plus its block buffers.
///
/// Built on the control thread so the buffers are allocated there.
pub(crate) struct PlayingStream {
    decoder: DecoderHandle,
    format: AudioFormat,
    state: StreamState,
    started: bool,
    stop_requested: bool,
    block_frames: usize,
    /// Raw bytes from the last decoder read
    raw: Vec<u8>,
    /// Frames converted from `raw`, consumed from `frames_pos`
    frames: Vec<AudioFrame>,
    frames_pos: usize,
    frames_len: usize,
}

impl PlayingStream {
    pub(crate) fn new(decoder: DecoderHandle, block_frames: usize) -> Self {
        let format = decoder.format();
        Self {
            decoder,
            format,
            state: StreamState::Active,
            started: false,
            stop_requested: false,
            block_frames,
            raw: vec![0; block_frames * format.bytes_per_frame()],
            frames: vec![AudioFrame::zero(); block_frames],
            frames_pos: 0,
            frames_len: 0,
        }
    }

    pub(crate) fn decoder(&self) -> &DecoderHandle {
        &self.decoder
    }

    fn is_mixing(&self) -> bool {
        self.state == StreamState::Active && !self.stop_requested
    }

    /// Add this stream's next frames into `out`.
    fn mix_into(&mut self, out: &mut [AudioFrame], events: &Sender<PlayerEvent>) {
        let mut slot = 0;
        while slot < out.len() {
            if self.frames_pos == self.frames_len && !self.refill(events) {
                return;
            }

            let count = (self.frames_len - self.frames_pos).min(out.len() - slot);
            let source = &self.frames[self.frames_pos..self.frames_pos + count];
            for (acc, frame) in out[slot..slot + count].iter_mut().zip(source) {
                *acc += *frame;
            }
            self.frames_pos += count;
            slot += count;
        }
    }

    /// Read the next block from the decoder. False when the stream ended.
    fn refill(&mut self, events: &Sender<PlayerEvent>) -> bool {
        let result = self.decoder.lock().read(&mut self.raw, self.block_frames);

        if !self.started {
            self.started = true;
            let _ = events.send(PlayerEvent::Started);
        }

        match result {
            Ok(0) => {
                self.state = StreamState::Finished;
                false
            }
            Ok(count) => {
                // Never trust a count beyond the block we handed out.
                let count = count.min(self.block_frames);
                let frame_size = self.format.bytes_per_frame();
                for (frame, bytes) in self.frames[..count]
                    .iter_mut()
                    .zip(self.raw.chunks_exact(frame_size))
                {
                    *frame = AudioFrame::decode(&self.format, bytes);
                }
                self.frames_pos = 0;
                self.frames_len = count;
                true
            }
            Err(e) => {
                self.state = StreamState::Errored(format!("{:?} decoder: {}", self.decoder.kind(), e));
                false
            }
        }
    }
}

/// The mixing context.
///
/// Owned by the audio device callback, or by the caller for offline
/// rendering (see [`AudioPlayer::offline`](crate::playback::AudioPlayer::offline)).
pub struct Mixer {
    commands: Receiver<Command>,
    events: Sender<PlayerEvent>,
    streams: Vec<PlayingStream>,
    active_count: Arc<AtomicUsize>,
    frames_mixed: u64,
}

impl Mixer {
    pub(crate) fn new(
        commands: Receiver<Command>,
        events: Sender<PlayerEvent>,
        active_count: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            commands,
            events,
            streams: Vec::with_capacity(INITIAL_STREAM_CAPACITY),
            active_count,
            frames_mixed: 0,
        }
    }

    /// Produce the next `out.len()` frames of the mix.
    pub fn mix(&mut self, out: &mut [AudioFrame]) {
        self.apply_commands();

        out.fill(AudioFrame::zero());
        for stream in self.streams.iter_mut().filter(|s| s.is_mixing()) {
            stream.mix_into(out, &self.events);
        }

        self.retire_streams();
        self.frames_mixed += out.len() as u64;
        self.active_count.store(self.streams.len(), Ordering::Release);
    }

    /// Number of streams currently in the active set
    pub fn active_streams(&self) -> usize {
        self.streams.len()
    }

    /// Total frames produced since creation
    pub fn frames_mixed(&self) -> u64 {
        self.frames_mixed
    }

    /// Apply everything queued since the previous buffer.
    fn apply_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                Command::Play(stream) => {
                    if self.streams.iter().any(|s| s.decoder.ptr_eq(&stream.decoder)) {
                        let _ = self.events.send(PlayerEvent::Rejected(stream));
                    } else {
                        self.streams.push(stream);
                    }
                }
                Command::Stop(decoder) => {
                    if let Some(stream) = self.streams.iter_mut().find(|s| s.decoder.ptr_eq(&decoder)) {
                        stream.stop_requested = true;
                    }
                    // May be the last reference; release it off this thread.
                    let _ = self.events.send(PlayerEvent::Release(decoder));
                }
                Command::StopAll => {
                    for stream in &mut self.streams {
                        stream.stop_requested = true;
                    }
                }
            }
        }
    }

    /// Remove streams that are done and post their events in order.
    fn retire_streams(&mut self) {
        let mut index = 0;
        while index < self.streams.len() {
            if self.streams[index].is_mixing() {
                index += 1;
                continue;
            }

            let stream = self.streams.remove(index);
            if let StreamState::Errored(message) = &stream.state {
                let _ = self.events.send(PlayerEvent::StreamError(message.clone()));
            }
            let _ = self.events.send(PlayerEvent::Stopped(stream));
        }
    }
}
