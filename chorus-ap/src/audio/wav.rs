//! RIFF/WAVE container decoder
//!
//! Parses the chunk list of an in-memory WAV blob and exposes the `data`
//! payload as whole frames. Samples are copied verbatim; no conversion.
//!
//! Accepted payloads: 16-bit PCM or 32-bit IEEE float, mono or stereo,
//! 8000-48000 Hz. Everything else is rejected at construction.

use crate::audio::blob::Blob;
use crate::audio::types::{AudioFormat, ChannelLayout, SampleType};
use crate::error::{Error, Result};
use std::ops::Range;
use tracing::{debug, trace};

/// Size of the `RIFF <size> WAVE` header
pub const RIFF_HEADER_SIZE: usize = 12;

const CHUNK_HEADER_SIZE: usize = 8;
const FMT_CHUNK_MIN_SIZE: usize = 16;

const WAVE_FORMAT_PCM: u16 = 0x0001;
const WAVE_FORMAT_IEEE_FLOAT: u16 = 0x0003;

/// Decoder over the `data` chunk of a WAV blob
pub struct WavDecoder {
    blob: Blob,
    format: AudioFormat,
    /// Byte range of the payload, trimmed to whole frames
    payload: Range<usize>,
    total_frames: u64,
    cursor: u64,
}

impl WavDecoder {
    /// Parse a WAV blob.
    ///
    /// The preferred format is ignored: WAV payloads are exposed exactly as
    /// stored.
    ///
    /// # Errors
    /// - `InvalidContainer`: missing RIFF/WAVE magic, truncated or
    ///   self-inconsistent chunks, missing `fmt ` or `data`
    /// - `UnsupportedFormat`: format tag, channel count or bit depth not handled
    /// - `InvalidFormat`: sampling rate outside the accepted range
    pub fn new(blob: Blob, _preferred: Option<&AudioFormat>) -> Result<Self> {
        if blob.size() < RIFF_HEADER_SIZE {
            return Err(Error::InvalidContainer(format!(
                "blob of {} bytes is smaller than the RIFF header",
                blob.size()
            )));
        }
        if blob.tag(0) != Some(*b"RIFF") || blob.tag(8) != Some(*b"WAVE") {
            return Err(Error::InvalidContainer("missing RIFF/WAVE magic".to_string()));
        }

        let mut format = None;
        let mut data = None;
        let mut offset = RIFF_HEADER_SIZE;

        while offset + CHUNK_HEADER_SIZE <= blob.size() {
            let (Some(tag), Some(size)) = (blob.tag(offset), blob.u32_le(offset + 4)) else {
                break;
            };
            let body_start = offset + CHUNK_HEADER_SIZE;
            let size = size as usize;
            let remaining = blob.size() - body_start;
            if size > remaining {
                return Err(Error::InvalidContainer(format!(
                    "chunk '{}' claims {} bytes but only {} remain",
                    String::from_utf8_lossy(&tag),
                    size,
                    remaining
                )));
            }
            let body = body_start..body_start + size;

            match &tag {
                b"fmt " => format = Some(parse_fmt(&blob, body)?),
                b"data" => data = Some(body),
                _ => trace!("Skipping chunk '{}' ({} bytes)", String::from_utf8_lossy(&tag), size),
            }

            // Chunk bodies are padded to an even length; the pad byte may be
            // missing on the final chunk.
            offset = body_start + size + (size & 1);
        }

        let format = format
            .ok_or_else(|| Error::InvalidContainer("no 'fmt ' chunk".to_string()))?;
        let data = data.ok_or_else(|| Error::InvalidContainer("no 'data' chunk".to_string()))?;

        let frame_size = format.bytes_per_frame();
        let total_frames = (data.len() / frame_size) as u64;
        let payload = data.start..data.start + total_frames as usize * frame_size;
        if payload.len() != data.len() {
            debug!(
                "Discarding {} trailing bytes of partial frame",
                data.len() - payload.len()
            );
        }

        debug!(
            "WAV: {:?} {:?} {} Hz, {} frames",
            format.sample_type(),
            format.channel_layout(),
            format.sampling_rate(),
            total_frames
        );

        Ok(Self {
            blob,
            format,
            payload,
            total_frames,
            cursor: 0,
        })
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn position(&self) -> u64 {
        self.cursor
    }

    /// Copy up to `max_frames` whole frames into `buffer`.
    ///
    /// The count is also limited by how many whole frames fit in `buffer`.
    /// Returns 0 once the cursor reaches the end of the payload.
    pub fn read(&mut self, buffer: &mut [u8], max_frames: usize) -> usize {
        let frame_size = self.format.bytes_per_frame();
        let remaining = self.total_frames - self.cursor;
        let frames = (max_frames as u64)
            .min((buffer.len() / frame_size) as u64)
            .min(remaining) as usize;
        if frames == 0 {
            return 0;
        }

        let start = self.payload.start + self.cursor as usize * frame_size;
        let len = frames * frame_size;
        // The payload range was validated against the blob at construction.
        if let Some(src) = self.blob.bytes(start..start + len) {
            buffer[..len].copy_from_slice(src);
            self.cursor += frames as u64;
            frames
        } else {
            0
        }
    }

    /// Move the cursor to `frame`; `frame == total_frames` is legal.
    pub fn seek(&mut self, frame: u64) -> bool {
        if frame > self.total_frames {
            return false;
        }
        self.cursor = frame;
        true
    }
}

/// Validate a `fmt ` chunk body and build the format it describes.
fn parse_fmt(blob: &Blob, body: Range<usize>) -> Result<AudioFormat> {
    if body.len() < FMT_CHUNK_MIN_SIZE {
        return Err(Error::InvalidContainer(format!(
            "'fmt ' chunk is {} bytes, need at least {}",
            body.len(),
            FMT_CHUNK_MIN_SIZE
        )));
    }

    let at = body.start;
    let field = |value: Option<u16>| {
        value.ok_or_else(|| Error::InvalidContainer("truncated 'fmt ' chunk".to_string()))
    };
    let format_tag = field(blob.u16_le(at))?;
    let channels = field(blob.u16_le(at + 2))?;
    let sampling_rate = blob
        .u32_le(at + 4)
        .ok_or_else(|| Error::InvalidContainer("truncated 'fmt ' chunk".to_string()))?;
    let bits_per_sample = field(blob.u16_le(at + 14))?;

    let sample_type = match (format_tag, bits_per_sample) {
        (WAVE_FORMAT_PCM, 16) => SampleType::Int16,
        (WAVE_FORMAT_IEEE_FLOAT, 32) => SampleType::Float32,
        (WAVE_FORMAT_PCM, bits) | (WAVE_FORMAT_IEEE_FLOAT, bits) => {
            return Err(Error::UnsupportedFormat(format!(
                "{} bits per sample for format tag {:#06x}",
                bits, format_tag
            )));
        }
        (tag, _) => {
            return Err(Error::UnsupportedFormat(format!("format tag {:#06x}", tag)));
        }
    };

    let channel_layout = ChannelLayout::from_count(channels)
        .ok_or_else(|| Error::UnsupportedFormat(format!("{} channels", channels)))?;

    AudioFormat::new(sample_type, channel_layout, sampling_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal canonical WAV: header, 16-byte fmt, data
    fn wav(format_tag: u16, channels: u16, rate: u32, bits: u16, data: &[u8]) -> Blob {
        let block_align = channels * bits / 8;
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(4 + 24 + 8 + data.len() as u32).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&format_tag.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&rate.to_le_bytes());
        out.extend_from_slice(&(rate * block_align as u32).to_le_bytes());
        out.extend_from_slice(&block_align.to_le_bytes());
        out.extend_from_slice(&bits.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(data);
        Blob::from_vec(out)
    }

    #[test]
    fn test_parses_pcm_stereo() {
        let decoder = WavDecoder::new(wav(1, 2, 44100, 16, &[0u8; 40]), None).unwrap();
        assert_eq!(decoder.format().sample_type(), SampleType::Int16);
        assert_eq!(decoder.format().channel_layout(), ChannelLayout::Stereo);
        assert_eq!(decoder.total_frames(), 10);
    }

    #[test]
    fn test_rejects_short_blob() {
        let blob = Blob::from_vec(b"RIFF\0\0\0".to_vec());
        assert!(matches!(
            WavDecoder::new(blob, None),
            Err(Error::InvalidContainer(_))
        ));
    }

    #[test]
    fn test_rejects_8_bit_pcm() {
        assert!(matches!(
            WavDecoder::new(wav(1, 1, 8000, 8, &[0u8; 8]), None),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_rejects_float_with_16_bits() {
        assert!(WavDecoder::new(wav(3, 1, 8000, 16, &[0u8; 8]), None).is_err());
    }

    #[test]
    fn test_rejects_rate_out_of_range() {
        assert!(matches!(
            WavDecoder::new(wav(1, 2, 96000, 16, &[0u8; 8]), None),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_read_limited_by_buffer() {
        let mut decoder = WavDecoder::new(wav(1, 1, 8000, 16, &[1u8; 20]), None).unwrap();
        let mut buffer = [0u8; 7];
        // 7 bytes hold 3 whole mono int16 frames
        assert_eq!(decoder.read(&mut buffer, 100), 3);
        assert_eq!(decoder.position(), 3);
    }

    #[test]
    fn test_seek_bounds() {
        let mut decoder = WavDecoder::new(wav(3, 1, 8000, 32, &[0u8; 16]), None).unwrap();
        assert!(decoder.seek(4));
        assert!(!decoder.seek(5));
        assert_eq!(decoder.position(), 4);
        assert_eq!(decoder.read(&mut [0u8; 16], 4), 0);
    }
}
