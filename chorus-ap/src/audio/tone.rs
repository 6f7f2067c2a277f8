//! Sine tone generator
//!
//! A minimal live frame source: stands in for a synthesizer renderer in the
//! player harness and exercises the custom decoder path.

use crate::audio::decoder::FrameSource;
use crate::audio::types::{AudioFormat, ChannelLayout, SampleType};
use crate::error::{Error, Result};
use std::f64::consts::TAU;

/// Mono float32 sine wave, finite or endless
pub struct ToneSource {
    format: AudioFormat,
    amplitude: f32,
    /// Cycles advanced per frame
    step: f64,
    /// Position within the current cycle, in [0, 1)
    phase: f64,
    /// Total frames to produce (None = endless)
    length: Option<u64>,
    produced: u64,
}

impl ToneSource {
    /// # Arguments
    /// - `frequency_hz`: tone frequency, must be below Nyquist
    /// - `amplitude`: peak amplitude (0.0-1.0 recommended)
    /// - `sampling_rate`: output rate in Hz
    /// - `length`: number of frames, or None for an endless tone
    pub fn new(
        frequency_hz: f32,
        amplitude: f32,
        sampling_rate: u32,
        length: Option<u64>,
    ) -> Result<Self> {
        let format = AudioFormat::new(SampleType::Float32, ChannelLayout::Mono, sampling_rate)?;
        if !(frequency_hz > 0.0 && frequency_hz < sampling_rate as f32 / 2.0) {
            return Err(Error::InvalidFormat(format!(
                "tone frequency {} Hz not below Nyquist for {} Hz",
                frequency_hz, sampling_rate
            )));
        }

        Ok(Self {
            format,
            amplitude,
            step: frequency_hz as f64 / sampling_rate as f64,
            phase: 0.0,
            length,
            produced: 0,
        })
    }

    fn next_sample(&mut self) -> f32 {
        let sample = self.amplitude * (TAU * self.phase).sin() as f32;
        self.phase += self.step;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        sample
    }
}

impl FrameSource for ToneSource {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn read(&mut self, buffer: &mut [u8], max_frames: usize) -> Result<usize> {
        let mut frames = max_frames.min(buffer.len() / 4);
        if let Some(length) = self.length {
            frames = frames.min((length - self.produced) as usize);
        }

        for out in buffer.chunks_exact_mut(4).take(frames) {
            let sample = self.next_sample();
            out.copy_from_slice(&sample.to_le_bytes());
        }
        self.produced += frames as u64;
        Ok(frames)
    }

    fn seek(&mut self, frame: u64) -> bool {
        match self.length {
            Some(length) if frame > length => false,
            _ => {
                self.produced = frame;
                self.phase = (frame as f64 * self.step).fract();
                true
            }
        }
    }

    fn total_frames(&self) -> Option<u64> {
        self.length
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finite_tone_ends() {
        let mut tone = ToneSource::new(1000.0, 1.0, 8000, Some(100)).unwrap();
        let mut buffer = vec![0u8; 4 * 64];
        assert_eq!(tone.read(&mut buffer, 64).unwrap(), 64);
        assert_eq!(tone.read(&mut buffer, 64).unwrap(), 36);
        assert_eq!(tone.read(&mut buffer, 64).unwrap(), 0);
    }

    #[test]
    fn test_first_samples_follow_sine() {
        let mut tone = ToneSource::new(2000.0, 0.5, 8000, None).unwrap();
        let mut buffer = vec![0u8; 4 * 4];
        tone.read(&mut buffer, 4).unwrap();
        let samples: Vec<f32> = buffer
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        // 2000 Hz at 8000 Hz: quarter period per frame
        assert!(samples[0].abs() < 1e-6);
        assert!((samples[1] - 0.5).abs() < 1e-5);
        assert!(samples[2].abs() < 1e-5);
        assert!((samples[3] + 0.5).abs() < 1e-5);
    }

    fn samples(tone: &mut ToneSource, frames: usize) -> Vec<f32> {
        let mut buffer = vec![0u8; 4 * frames];
        let read = tone.read(&mut buffer, frames).unwrap();
        buffer[..4 * read]
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()
    }

    #[test]
    fn test_fractional_frequency_is_continuous_past_one_second() {
        let mut tone = ToneSource::new(440.5, 1.0, 8000, None).unwrap();
        let played = samples(&mut tone, 8002);
        let expected = |frame: u64| (TAU * 440.5 * frame as f64 / 8000.0).sin() as f32;
        for frame in [7999, 8000, 8001] {
            assert!((played[frame as usize] - expected(frame)).abs() < 1e-4, "frame {}", frame);
        }

        // Seeking restores the same phase
        assert!(tone.seek(8001));
        assert!((samples(&mut tone, 1)[0] - expected(8001)).abs() < 1e-4);
    }

    #[test]
    fn test_rejects_frequency_above_nyquist() {
        assert!(ToneSource::new(5000.0, 0.5, 8000, None).is_err());
    }

    #[test]
    fn test_seek_past_end_fails() {
        let mut tone = ToneSource::new(440.0, 0.5, 8000, Some(10)).unwrap();
        assert!(tone.seek(10));
        assert!(!tone.seek(11));
    }
}
