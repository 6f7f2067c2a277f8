//! Audio output using cpal
//!
//! Opens an output device, negotiates the stream configuration closest to the
//! requested sampling rate, and drives a render callback once per device
//! buffer. The callback fills a block of [`AudioFrame`]s; this module converts
//! them to whatever sample format and channel count the device uses.

use crate::audio::AudioFrame;
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use tracing::{debug, error, info, warn};

/// Audio output manager using cpal
pub struct AudioOutput {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    stream: Option<Stream>,
}

impl AudioOutput {
    /// List available audio output devices.
    ///
    /// # Returns
    /// Vector of device names
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();

        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }

    /// Open an audio device for output.
    ///
    /// # Arguments
    /// - `device_name`: Optional device name (None = default device)
    /// - `preferred_rate`: Sampling rate to request; the closest supported
    ///   rate is used
    /// - `buffer_size`: Optional buffer size in frames (None = device default)
    ///
    /// # Errors
    /// - No default device available
    /// - Device exposes no usable stream configuration
    ///
    /// # Fallback Behavior
    /// If the requested device is not found, the default device is used.
    pub fn new(
        device_name: Option<&str>,
        preferred_rate: u32,
        buffer_size: Option<u32>,
    ) -> Result<Self> {
        let host = cpal::default_host();

        let device = match device_name {
            Some(name) => {
                let mut devices = host.output_devices().map_err(|e| {
                    Error::AudioOutput(format!("Failed to enumerate devices: {}", e))
                })?;

                match devices.find(|d| d.name().ok().as_deref() == Some(name)) {
                    Some(dev) => {
                        info!("Found requested audio device: {}", name);
                        dev
                    }
                    None => {
                        warn!("Requested device '{}' not found, falling back to default device", name);
                        host.default_output_device().ok_or_else(|| {
                            Error::AudioOutput(format!(
                                "Device '{}' not found and no default device available",
                                name
                            ))
                        })?
                    }
                }
            }
            None => host
                .default_output_device()
                .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?,
        };

        info!(
            "Using audio device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        let (mut config, sample_format) = Self::negotiate_config(&device, preferred_rate)?;

        if let Some(size) = buffer_size {
            config.buffer_size = cpal::BufferSize::Fixed(size);
            debug!("Using requested buffer size: {} frames", size);
        }

        info!(
            "Audio config: sample_rate={} (requested {}), channels={}, format={:?}",
            config.sample_rate.0, preferred_rate, config.channels, sample_format
        );

        Ok(Self {
            device,
            config,
            sample_format,
            stream: None,
        })
    }

    /// Pick the supported configuration closest to `preferred_rate`.
    ///
    /// Ties are broken by sample format (f32, then i16, then u16) and by
    /// closeness to two channels.
    fn negotiate_config(device: &Device, preferred_rate: u32) -> Result<(StreamConfig, SampleFormat)> {
        let supported_configs = device
            .supported_output_configs()
            .map_err(|e| Error::AudioOutput(format!("Failed to get device configs: {}", e)))?;

        let best = supported_configs
            .filter_map(|range| {
                let format_rank = match range.sample_format() {
                    SampleFormat::F32 => 0,
                    SampleFormat::I16 => 1,
                    SampleFormat::U16 => 2,
                    _ => return None,
                };
                let rate = preferred_rate.clamp(range.min_sample_rate().0, range.max_sample_rate().0);
                let distance = rate.abs_diff(preferred_rate);
                let channel_rank = range.channels().abs_diff(2);
                Some(((distance, format_rank, channel_rank), range, rate))
            })
            .min_by_key(|(rank, _, _)| *rank);

        if let Some((_, range, rate)) = best {
            let sample_format = range.sample_format();
            let config = range.with_sample_rate(cpal::SampleRate(rate)).config();
            return Ok((config, sample_format));
        }

        // Fallback: use default config
        let supported_config = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;

        let sample_format = supported_config.sample_format();
        Ok((supported_config.config(), sample_format))
    }

    /// Start audio playback.
    ///
    /// # Arguments
    /// - `render`: called on the audio thread once per device buffer with a
    ///   block of frames to fill (one frame per device frame)
    /// - `on_error`: called from the device's error callback
    ///
    /// # Notes
    /// - `render` runs on a real-time audio thread (avoid blocking operations)
    /// - Samples are not clamped for float devices; integer conversion saturates
    pub fn start<F, E>(&mut self, render: F, on_error: E) -> Result<()>
    where
        F: FnMut(&mut [AudioFrame]) + Send + 'static,
        E: FnMut(String) + Send + 'static,
    {
        info!("Starting audio stream");

        let stream = match self.sample_format {
            SampleFormat::F32 => self.build_stream::<f32, _, _>(render, on_error)?,
            SampleFormat::I16 => self.build_stream::<i16, _, _>(render, on_error)?,
            SampleFormat::U16 => self.build_stream::<u16, _, _>(render, on_error)?,
            sample_format => {
                return Err(Error::AudioOutput(format!(
                    "Unsupported sample format: {:?}",
                    sample_format
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;

        self.stream = Some(stream);

        info!("Audio stream started successfully");
        Ok(())
    }

    fn build_stream<T, F, E>(&self, mut render: F, mut on_error: E) -> Result<Stream>
    where
        T: SizedSample + FromSample<f32>,
        F: FnMut(&mut [AudioFrame]) + Send + 'static,
        E: FnMut(String) + Send + 'static,
    {
        let channels = self.config.channels as usize;
        let mut block: Vec<AudioFrame> = Vec::new();

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let frames = data.len() / channels;
                    if block.len() < frames {
                        block.resize(frames, AudioFrame::zero());
                    }
                    let mix = &mut block[..frames];
                    render(mix);

                    for (out, frame) in data.chunks_mut(channels).zip(mix.iter()) {
                        write_frame(out, frame);
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    on_error(err.to_string());
                },
                None, // No timeout
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))?;

        Ok(stream)
    }

    /// Stop audio playback.
    ///
    /// Pauses the stream and drops the stream reference.
    pub fn stop(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            info!("Stopping audio stream");
            stream
                .pause()
                .map_err(|e| Error::AudioOutput(format!("Failed to pause stream: {}", e)))?;
        }

        Ok(())
    }

    /// Get device name.
    pub fn device_name(&self) -> String {
        self.device
            .name()
            .unwrap_or_else(|_| "Unknown".to_string())
    }

    /// Negotiated sample rate
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        // Ensure stream is stopped on drop
        let _ = self.stop();
    }
}

/// Write one mixed frame into an interleaved device frame.
///
/// Mono devices get the average of both channels; channels beyond the
/// second are silenced.
fn write_frame<T>(out: &mut [T], frame: &AudioFrame)
where
    T: SizedSample + FromSample<f32>,
{
    match out.len() {
        0 => {}
        1 => out[0] = T::from_sample(0.5 * (frame.left + frame.right)),
        _ => {
            out[0] = T::from_sample(frame.left);
            out[1] = T::from_sample(frame.right);
            for extra in &mut out[2..] {
                *extra = T::EQUILIBRIUM;
            }
        }
    }
}
