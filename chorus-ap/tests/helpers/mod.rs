//! Shared fixtures for chorus-ap integration tests
//!
//! - `WavBuilder`: byte-level WAV construction, including malformed layouts
//! - `ConstantSource`: frame source emitting one fixed stereo frame
//! - `FailingSource`, `OverReportingSource`: misbehaving frame sources
//! - `Recorder`: `AudioCallbacks` implementation that records every call

#![allow(dead_code)]

use chorus_ap::audio::{ChannelLayout, SampleType};
use chorus_ap::{AudioCallbacks, AudioFormat, ErrorKind, Error, FrameSource, Result};
use std::sync::Mutex;

/// Byte-level WAV writer.
///
/// Unlike hound, it can emit odd-sized chunks, unknown chunks, truncated
/// chunks and arbitrary format fields.
pub struct WavBuilder {
    chunks: Vec<u8>,
}

impl WavBuilder {
    pub fn new() -> Self {
        Self { chunks: Vec::new() }
    }

    /// Append a `fmt ` chunk.
    pub fn fmt(self, format_tag: u16, channels: u16, rate: u32, bits: u16) -> Self {
        let block_align = channels * bits / 8;
        let mut body = Vec::with_capacity(16);
        body.extend_from_slice(&format_tag.to_le_bytes());
        body.extend_from_slice(&channels.to_le_bytes());
        body.extend_from_slice(&rate.to_le_bytes());
        body.extend_from_slice(&(rate * block_align as u32).to_le_bytes());
        body.extend_from_slice(&block_align.to_le_bytes());
        body.extend_from_slice(&bits.to_le_bytes());
        self.chunk(b"fmt ", &body)
    }

    /// Append a `data` chunk.
    pub fn data(self, payload: &[u8]) -> Self {
        self.chunk(b"data", payload)
    }

    /// Append any chunk, padded to even length.
    pub fn chunk(mut self, tag: &[u8; 4], body: &[u8]) -> Self {
        self.chunks.extend_from_slice(tag);
        self.chunks.extend_from_slice(&(body.len() as u32).to_le_bytes());
        self.chunks.extend_from_slice(body);
        if body.len() % 2 == 1 {
            self.chunks.push(0);
        }
        self
    }

    /// Append a chunk header claiming `claimed` bytes but carrying `body`.
    pub fn truncated_chunk(mut self, tag: &[u8; 4], claimed: u32, body: &[u8]) -> Self {
        self.chunks.extend_from_slice(tag);
        self.chunks.extend_from_slice(&claimed.to_le_bytes());
        self.chunks.extend_from_slice(body);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(12 + self.chunks.len());
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(4 + self.chunks.len() as u32).to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(&self.chunks);
        bytes
    }
}

/// Interleaved little-endian f32 payload
pub fn f32_payload(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Interleaved little-endian i16 payload
pub fn i16_payload(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Stereo float source repeating one frame, finite or endless
pub struct ConstantSource {
    format: AudioFormat,
    left: f32,
    right: f32,
    remaining: Option<u64>,
}

impl ConstantSource {
    pub fn new(left: f32, right: f32, rate: u32, frames: Option<u64>) -> Self {
        Self {
            format: AudioFormat::new(SampleType::Float32, ChannelLayout::Stereo, rate).unwrap(),
            left,
            right,
            remaining: frames,
        }
    }
}

impl FrameSource for ConstantSource {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn read(&mut self, buffer: &mut [u8], max_frames: usize) -> Result<usize> {
        let mut frames = max_frames.min(buffer.len() / 8);
        if let Some(remaining) = &mut self.remaining {
            frames = frames.min(*remaining as usize);
            *remaining -= frames as u64;
        }
        for out in buffer.chunks_exact_mut(8).take(frames) {
            out[..4].copy_from_slice(&self.left.to_le_bytes());
            out[4..].copy_from_slice(&self.right.to_le_bytes());
        }
        Ok(frames)
    }
}

/// Source that yields `good_frames` of silence and then fails every read
pub struct FailingSource {
    format: AudioFormat,
    good_frames: u64,
}

impl FailingSource {
    pub fn new(rate: u32, good_frames: u64) -> Self {
        Self {
            format: AudioFormat::new(SampleType::Float32, ChannelLayout::Stereo, rate).unwrap(),
            good_frames,
        }
    }
}

impl FrameSource for FailingSource {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn read(&mut self, buffer: &mut [u8], max_frames: usize) -> Result<usize> {
        if self.good_frames == 0 {
            return Err(Error::Decode("corrupt packet".to_string()));
        }
        let frames = max_frames.min(buffer.len() / 8).min(self.good_frames as usize);
        buffer[..frames * 8].fill(0);
        self.good_frames -= frames as u64;
        Ok(frames)
    }
}

/// Source that claims one frame more than each read allows
pub struct OverReportingSource {
    format: AudioFormat,
}

impl OverReportingSource {
    pub fn new(rate: u32) -> Self {
        Self {
            format: AudioFormat::new(SampleType::Float32, ChannelLayout::Stereo, rate).unwrap(),
        }
    }
}

impl FrameSource for OverReportingSource {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn read(&mut self, _buffer: &mut [u8], max_frames: usize) -> Result<usize> {
        Ok(max_frames + 1)
    }
}

/// One recorded callback
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Error(ErrorKind),
    ErrorMessage(String),
    Started,
    Stopped,
}

/// Callbacks that remember what they were told, in order
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event: &Event) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::ErrorMessage(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl AudioCallbacks for Recorder {
    fn on_playback_error(&self, kind: ErrorKind) {
        self.push(Event::Error(kind));
    }

    fn on_playback_error_message(&self, message: &str) {
        self.push(Event::ErrorMessage(message.to_string()));
    }

    fn on_playback_started(&self) {
        self.push(Event::Started);
    }

    fn on_playback_stopped(&self) {
        self.push(Event::Stopped);
    }
}
