//! Ogg/Vorbis container decoder using symphonia
//!
//! Unlike WAV, the payload is compressed, so frames are produced packet by
//! packet as `read` asks for them. Decoded samples wait in a small byte queue
//! until the caller drains them.
//!
//! The preferred format chooses the output encoding: Float32 unless Int16 is
//! asked for.
//!
//! A reset Vorbis decoder needs one packet of overlap before it emits audio,
//! so `seek` lands the demuxer up to one packet early and discards the
//! surplus frames.

use crate::audio::blob::Blob;
use crate::audio::types::{AudioFormat, ChannelLayout, SampleType};
use crate::error::{Error, Result};
use std::io::Cursor;
use symphonia::core::audio::{AudioBufferRef, SampleBuffer};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_VORBIS};
use symphonia::core::conv::ConvertibleSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Largest Vorbis block size; bounds the pre-roll when the ident header is
/// not available
const MAX_BLOCK_SIZE: u64 = 8192;

/// Offset of the packed block size byte in the identification header
const IDENT_BLOCK_SIZES_OFFSET: usize = 28;

/// Streaming Vorbis decoder over an Ogg blob
pub struct VorbisDecoder {
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    format: AudioFormat,
    total_frames: Option<u64>,
    /// Frames decoded to prime a reset decoder, at most one packet's worth
    preroll: u64,
    /// Frame position of the next frame handed out by `read`
    cursor: u64,
    /// Decoded, encoded-as-output bytes not yet read
    pending: Vec<u8>,
    pending_offset: usize,
    /// Frames before this timestamp are dropped (set by `seek`)
    skip_until: Option<u64>,
    end_of_stream: bool,
    /// Failure met after frames were already copied out; returned by the
    /// next `read`
    deferred_error: Option<Error>,
    f32_buffer: Option<SampleBuffer<f32>>,
    i16_buffer: Option<SampleBuffer<i16>>,
}

impl VorbisDecoder {
    /// Open an Ogg/Vorbis blob.
    ///
    /// # Errors
    /// - `InvalidContainer`: the Ogg demuxer cannot probe the blob
    /// - `UnsupportedFormat`: default track is not Vorbis or has more than
    ///   two channels
    /// - `InvalidFormat`: sampling rate outside the accepted range
    pub fn new(blob: Blob, preferred: Option<&AudioFormat>) -> Result<Self> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(blob)), Default::default());

        let mut hint = Hint::new();
        hint.with_extension("ogg");

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| Error::InvalidContainer(format!("Failed to probe Ogg stream: {}", e)))?;
        let reader = probed.format;

        let track = reader
            .default_track()
            .ok_or_else(|| Error::InvalidContainer("No audio track found".to_string()))?;
        let params = track.codec_params.clone();
        let track_id = track.id;

        if params.codec != CODEC_TYPE_VORBIS {
            return Err(Error::UnsupportedFormat("Ogg track is not Vorbis".to_string()));
        }

        let channel_count = params
            .channels
            .map(|c| c.count())
            .ok_or_else(|| Error::UnsupportedFormat("Channel count not found".to_string()))?;
        let channel_layout = u16::try_from(channel_count)
            .ok()
            .and_then(ChannelLayout::from_count)
            .ok_or_else(|| Error::UnsupportedFormat(format!("{} channels", channel_count)))?;
        let sampling_rate = params
            .sample_rate
            .ok_or_else(|| Error::UnsupportedFormat("Sample rate not found".to_string()))?;

        let sample_type = match preferred.map(|f| f.sample_type()) {
            Some(SampleType::Int16) => SampleType::Int16,
            _ => SampleType::Float32,
        };
        let format = AudioFormat::new(sample_type, channel_layout, sampling_rate)?;

        // Longest packet: two long blocks overlapping by half.
        let preroll = params
            .extra_data
            .as_deref()
            .and_then(|ident| ident.get(IDENT_BLOCK_SIZES_OFFSET))
            .map(|sizes| 1u64 << (sizes >> 4))
            .unwrap_or(MAX_BLOCK_SIZE)
            / 2;

        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to create decoder: {}", e)))?;

        debug!(
            "Vorbis: {:?} {} Hz, {:?} frames, output {:?}",
            channel_layout, sampling_rate, params.n_frames, sample_type
        );

        Ok(Self {
            reader,
            decoder,
            track_id,
            format,
            total_frames: params.n_frames,
            preroll,
            cursor: 0,
            pending: Vec::new(),
            pending_offset: 0,
            skip_until: None,
            end_of_stream: false,
            deferred_error: None,
            f32_buffer: None,
            i16_buffer: None,
        })
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn total_frames(&self) -> Option<u64> {
        self.total_frames
    }

    pub fn position(&self) -> u64 {
        self.cursor
    }

    /// Copy up to `max_frames` decoded frames into `buffer`.
    ///
    /// A failure after some frames were copied is held back: this call
    /// returns those frames and the next call returns the error.
    ///
    /// # Errors
    /// `Error::Decode` when the demuxer or codec fails for a reason other than
    /// end of stream or a single corrupt packet.
    pub fn read(&mut self, buffer: &mut [u8], max_frames: usize) -> Result<usize> {
        if let Some(e) = self.deferred_error.take() {
            return Err(e);
        }

        let frame_size = self.format.bytes_per_frame();
        let wanted = max_frames.min(buffer.len() / frame_size);
        let mut written = 0;

        while written < wanted {
            if self.pending_offset == self.pending.len() {
                if self.end_of_stream {
                    break;
                }
                match self.decode_next_packet() {
                    Ok(true) => continue,
                    Ok(false) => break,
                    Err(e) if written > 0 => {
                        debug!("Vorbis read stopped after {} frames: {}", written, e);
                        self.deferred_error = Some(e);
                        break;
                    }
                    Err(e) => return Err(e),
                }
            }

            let available = (self.pending.len() - self.pending_offset) / frame_size;
            let frames = available.min(wanted - written);
            let src = &self.pending[self.pending_offset..self.pending_offset + frames * frame_size];
            buffer[written * frame_size..(written + frames) * frame_size].copy_from_slice(src);
            self.pending_offset += frames * frame_size;
            written += frames;
        }

        self.cursor += written as u64;
        Ok(written)
    }

    /// Reposition to `frame`.
    ///
    /// Fails when `frame` is past the known end of the stream or when the
    /// demuxer cannot seek; the cursor is unchanged on failure.
    pub fn seek(&mut self, frame: u64) -> bool {
        if let Some(total) = self.total_frames {
            if frame > total {
                return false;
            }
            if frame == total {
                self.clear_pending();
                self.deferred_error = None;
                self.end_of_stream = true;
                self.cursor = total;
                return true;
            }
        }

        let seek_to = SeekTo::TimeStamp {
            ts: frame.saturating_sub(self.preroll),
            track_id: self.track_id,
        };
        match self.reader.seek(SeekMode::Accurate, seek_to) {
            Ok(seeked) => {
                debug!(
                    "Vorbis seek: required_ts={} actual_ts={}",
                    seeked.required_ts, seeked.actual_ts
                );
                self.decoder.reset();
                self.clear_pending();
                self.skip_until = Some(frame);
                self.deferred_error = None;
                self.end_of_stream = false;
                self.cursor = frame;
                true
            }
            Err(e) => {
                debug!("Vorbis seek to frame {} failed: {}", frame, e);
                false
            }
        }
    }

    fn clear_pending(&mut self) {
        self.pending.clear();
        self.pending_offset = 0;
    }

    /// Decode the next packet of our track into `pending`.
    ///
    /// Returns false at end of stream.
    fn decode_next_packet(&mut self) -> Result<bool> {
        self.clear_pending();
        loop {
            let packet = match self.reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    debug!("Reached end of Ogg stream");
                    self.end_of_stream = true;
                    return Ok(false);
                }
                Err(SymphoniaError::ResetRequired) => {
                    // Chained streams with a new header are not followed.
                    debug!("Ogg stream reset required, treating as end of stream");
                    self.end_of_stream = true;
                    return Ok(false);
                }
                Err(e) => return Err(Error::Decode(format!("Error reading packet: {}", e))),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let packet_ts = packet.ts();
            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("Skipping corrupt Vorbis packet: {}", e);
                    continue;
                }
                Err(e) => return Err(Error::Decode(format!("Decode error: {}", e))),
            };

            if decoded.spec().channels.count() != self.format.channels() {
                return Err(Error::Decode(format!(
                    "Channel count changed mid-stream to {}",
                    decoded.spec().channels.count()
                )));
            }

            let skip = match self.skip_until {
                Some(target) if packet_ts < target => (target - packet_ts) as usize,
                _ => 0,
            };

            let appended = match self.format.sample_type() {
                SampleType::Float32 => {
                    let samples = interleave(&mut self.f32_buffer, decoded);
                    append_frames(&mut self.pending, samples, self.format.channels(), skip, |s| {
                        s.to_le_bytes()
                    })
                }
                SampleType::Int16 => {
                    let samples = interleave(&mut self.i16_buffer, decoded);
                    append_frames(&mut self.pending, samples, self.format.channels(), skip, |s| {
                        s.to_le_bytes()
                    })
                }
            };

            if skip > 0 && appended == 0 {
                // Whole packet lies before the seek target.
                continue;
            }
            self.skip_until = None;
            if appended > 0 {
                return Ok(true);
            }
        }
    }
}

/// Convert a decoded packet into interleaved samples, reusing `slot`.
fn interleave<'a, S>(slot: &'a mut Option<SampleBuffer<S>>, decoded: AudioBufferRef<'_>) -> &'a [S]
where
    S: ConvertibleSample,
{
    let capacity = decoded.capacity() as u64;
    let spec = *decoded.spec();
    let needs_new = match slot {
        Some(buffer) => (buffer.capacity() as u64) < capacity * spec.channels.count() as u64,
        None => true,
    };
    if needs_new {
        *slot = Some(SampleBuffer::new(capacity, spec));
    }

    match slot {
        Some(buffer) => {
            buffer.copy_interleaved_ref(decoded);
            buffer.samples()
        }
        None => &[],
    }
}

/// Append interleaved samples as little-endian bytes, dropping `skip` leading
/// frames. Returns the number of frames appended.
fn append_frames<S: Copy, const N: usize>(
    out: &mut Vec<u8>,
    samples: &[S],
    channels: usize,
    skip: usize,
    to_bytes: impl Fn(S) -> [u8; N],
) -> usize {
    let frames = samples.len() / channels;
    if skip >= frames {
        return 0;
    }
    for sample in &samples[skip * channels..frames * channels] {
        out.extend_from_slice(&to_bytes(*sample));
    }
    frames - skip
}
