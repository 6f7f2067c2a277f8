//! Core audio data types
//!
//! Defines the format descriptor shared by every decoder and the stereo
//! frame used as the mixing unit.

use crate::error::{Error, Result};
use chorus_common::{MAX_SAMPLING_RATE, MIN_SAMPLING_RATE};
use std::ops::AddAssign;
use std::time::Duration;

/// Sample encoding of a decoded stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleType {
    /// Signed 16-bit little-endian integer
    Int16,

    /// 32-bit little-endian IEEE float
    Float32,
}

impl SampleType {
    /// Size of one sample in bytes
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            SampleType::Int16 => 2,
            SampleType::Float32 => 4,
        }
    }
}

/// Channel layout (mono or stereo only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelLayout {
    Mono = 1,
    Stereo = 2,
}

impl ChannelLayout {
    /// Number of interleaved channels
    pub const fn channels(self) -> usize {
        self as usize
    }

    /// Map a channel count from a container header
    pub fn from_count(count: u16) -> Option<Self> {
        match count {
            1 => Some(ChannelLayout::Mono),
            2 => Some(ChannelLayout::Stereo),
            _ => None,
        }
    }
}

/// Description of a decoded PCM stream.
///
/// The sampling rate is always within `[8000, 48000]`; [`AudioFormat::new`]
/// rejects anything else rather than clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioFormat {
    sample_type: SampleType,
    channel_layout: ChannelLayout,
    sampling_rate: u32,
}

impl AudioFormat {
    /// Create a format, validating the sampling rate.
    ///
    /// # Errors
    /// `Error::InvalidFormat` if `sampling_rate` is outside `[8000, 48000]`.
    pub fn new(
        sample_type: SampleType,
        channel_layout: ChannelLayout,
        sampling_rate: u32,
    ) -> Result<Self> {
        if !(MIN_SAMPLING_RATE..=MAX_SAMPLING_RATE).contains(&sampling_rate) {
            return Err(Error::InvalidFormat(format!(
                "sampling rate {} Hz outside [{}, {}]",
                sampling_rate, MIN_SAMPLING_RATE, MAX_SAMPLING_RATE
            )));
        }

        Ok(Self {
            sample_type,
            channel_layout,
            sampling_rate,
        })
    }

    pub fn sample_type(&self) -> SampleType {
        self.sample_type
    }

    pub fn channel_layout(&self) -> ChannelLayout {
        self.channel_layout
    }

    pub fn sampling_rate(&self) -> u32 {
        self.sampling_rate
    }

    pub fn channels(&self) -> usize {
        self.channel_layout.channels()
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.sample_type.bytes_per_sample()
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.bytes_per_sample() * self.channels()
    }

    pub fn bytes_per_second(&self) -> usize {
        self.bytes_per_frame() * self.sampling_rate as usize
    }

    /// Playback duration of `frames` frames at this format's rate
    pub fn frames_to_duration(&self, frames: u64) -> Duration {
        Duration::from_secs_f64(frames as f64 / self.sampling_rate as f64)
    }
}

/// AudioFrame represents a single stereo sample (one frame of audio).
///
/// Used as the accumulator in the mixer and for passing audio to the
/// output device.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AudioFrame {
    /// Left channel sample
    pub left: f32,

    /// Right channel sample
    pub right: f32,
}

impl AudioFrame {
    /// Create a silent frame (0.0, 0.0)
    pub const fn zero() -> Self {
        AudioFrame { left: 0.0, right: 0.0 }
    }

    /// Create a frame from mono sample (duplicate to both channels)
    pub const fn from_mono(sample: f32) -> Self {
        AudioFrame { left: sample, right: sample }
    }

    /// Create a frame from left and right samples
    pub const fn from_stereo(left: f32, right: f32) -> Self {
        AudioFrame { left, right }
    }

    /// Decode one raw interleaved frame.
    ///
    /// `bytes` must hold at least `format.bytes_per_frame()` bytes; mono
    /// input is expanded into both channels.
    pub fn decode(format: &AudioFormat, bytes: &[u8]) -> Self {
        let sample = |index: usize| -> f32 {
            match format.sample_type() {
                SampleType::Int16 => {
                    let at = index * 2;
                    i16::from_le_bytes([bytes[at], bytes[at + 1]]) as f32 / 32768.0
                }
                SampleType::Float32 => {
                    let at = index * 4;
                    f32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
                }
            }
        };

        match format.channel_layout() {
            ChannelLayout::Mono => AudioFrame::from_mono(sample(0)),
            ChannelLayout::Stereo => AudioFrame::from_stereo(sample(0), sample(1)),
        }
    }
}

impl AddAssign for AudioFrame {
    fn add_assign(&mut self, other: AudioFrame) {
        self.left += other.left;
        self.right += other.right;
    }
}
