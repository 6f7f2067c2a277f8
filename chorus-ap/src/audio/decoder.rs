//! Decoder abstraction and container sniffing
//!
//! Every playable stream is an [`AudioDecoder`]: a closed set of variants
//! chosen once, when the decoder is created. File-backed variants are picked
//! by the first four bytes of the blob; anything else (a synthesizer, a test
//! signal) enters through [`AudioDecoder::custom`].
//!
//! # Contract shared by all variants
//!
//! - `format()` never changes over the decoder's lifetime
//! - `read()` copies whole frames only and returns 0 at end of data
//! - `seek(k)` succeeds iff `k <= total_frames` (when the total is known)

use crate::audio::blob::Blob;
use crate::audio::types::AudioFormat;
#[cfg(feature = "vorbis")]
use crate::audio::vorbis::VorbisDecoder;
use crate::audio::wav::WavDecoder;
use crate::error::{Error, Result};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// A caller-supplied producer of PCM frames.
///
/// Implement this to drive a live renderer through the player exactly like a
/// file. `read` follows the decoder contract: whole frames into `buffer`,
/// at most `max_frames`, 0 when finished.
pub trait FrameSource: Send {
    fn format(&self) -> AudioFormat;

    fn read(&mut self, buffer: &mut [u8], max_frames: usize) -> Result<usize>;

    /// Sources are not seekable unless they say so.
    fn seek(&mut self, _frame: u64) -> bool {
        false
    }

    fn total_frames(&self) -> Option<u64> {
        None
    }
}

/// Pure forwarding adapter around a [`FrameSource`]
pub struct CustomDecoder {
    source: Box<dyn FrameSource>,
    format: AudioFormat,
    cursor: u64,
}

impl CustomDecoder {
    pub fn new(source: Box<dyn FrameSource>) -> Self {
        let format = source.format();
        Self {
            source,
            format,
            cursor: 0,
        }
    }

    fn read(&mut self, buffer: &mut [u8], max_frames: usize) -> Result<usize> {
        let limit = max_frames.min(buffer.len() / self.format.bytes_per_frame());
        let frames = self.source.read(buffer, limit)?;
        if frames > limit {
            return Err(Error::Decode(format!(
                "frame source returned {} frames for a read of at most {}",
                frames, limit
            )));
        }
        self.cursor += frames as u64;
        Ok(frames)
    }

    fn seek(&mut self, frame: u64) -> bool {
        if self.source.seek(frame) {
            self.cursor = frame;
            true
        } else {
            false
        }
    }
}

/// Which container produced a decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderKind {
    Wav,
    Vorbis,
    Custom,
}

/// Polymorphic decoder over the supported containers
pub enum AudioDecoder {
    Wav(WavDecoder),
    #[cfg(feature = "vorbis")]
    Vorbis(VorbisDecoder),
    Custom(CustomDecoder),
}

type Constructor = fn(Blob, Option<&AudioFormat>) -> Result<AudioDecoder>;

/// Magic tag (first four bytes, big-endian) to container constructor
static CONTAINERS: &[(u32, Constructor)] = &[
    (u32::from_be_bytes(*b"RIFF"), open_wav),
    #[cfg(feature = "vorbis")]
    (u32::from_be_bytes(*b"OggS"), open_vorbis),
];

fn open_wav(blob: Blob, preferred: Option<&AudioFormat>) -> Result<AudioDecoder> {
    WavDecoder::new(blob, preferred).map(AudioDecoder::Wav)
}

#[cfg(feature = "vorbis")]
fn open_vorbis(blob: Blob, preferred: Option<&AudioFormat>) -> Result<AudioDecoder> {
    VorbisDecoder::new(blob, preferred).map(AudioDecoder::Vorbis)
}

impl AudioDecoder {
    /// Sniff the blob and build the matching decoder.
    ///
    /// Returns `None` if the blob is shorter than a tag, the tag is unknown,
    /// or the container fails validation. Use [`AudioDecoder::try_create`]
    /// to learn why.
    pub fn create(blob: Blob, preferred: Option<&AudioFormat>) -> Option<Self> {
        match Self::try_create(blob, preferred) {
            Ok(decoder) => Some(decoder),
            Err(e) => {
                debug!("Decoder creation failed: {}", e);
                None
            }
        }
    }

    /// Same as [`AudioDecoder::create`], reporting the failure reason.
    pub fn try_create(blob: Blob, preferred: Option<&AudioFormat>) -> Result<Self> {
        let tag = blob.u32_be(0).ok_or_else(|| {
            Error::InvalidContainer(format!("blob of {} bytes has no magic tag", blob.size()))
        })?;

        let constructor = CONTAINERS
            .iter()
            .find(|(magic, _)| *magic == tag)
            .map(|(_, constructor)| *constructor)
            .ok_or_else(|| {
                Error::UnsupportedFormat(format!(
                    "unrecognized magic tag {:?}",
                    String::from_utf8_lossy(&tag.to_be_bytes())
                ))
            })?;

        constructor(blob, preferred)
    }

    /// Wrap a non-file frame source so it can be played like any decoder.
    ///
    /// No resampling or format coercion happens here.
    pub fn custom(source: Box<dyn FrameSource>) -> Self {
        AudioDecoder::Custom(CustomDecoder::new(source))
    }

    pub fn kind(&self) -> DecoderKind {
        match self {
            AudioDecoder::Wav(_) => DecoderKind::Wav,
            #[cfg(feature = "vorbis")]
            AudioDecoder::Vorbis(_) => DecoderKind::Vorbis,
            AudioDecoder::Custom(_) => DecoderKind::Custom,
        }
    }

    pub fn format(&self) -> AudioFormat {
        match self {
            AudioDecoder::Wav(d) => d.format(),
            #[cfg(feature = "vorbis")]
            AudioDecoder::Vorbis(d) => d.format(),
            AudioDecoder::Custom(d) => d.format,
        }
    }

    /// Copy up to `max_frames` whole frames into `buffer`.
    ///
    /// # Returns
    /// Number of frames copied; 0 means end of data, not an error.
    ///
    /// # Errors
    /// A decode failure that is not end of data (compressed and custom
    /// sources only; WAV reads cannot fail).
    pub fn read(&mut self, buffer: &mut [u8], max_frames: usize) -> Result<usize> {
        match self {
            AudioDecoder::Wav(d) => Ok(d.read(buffer, max_frames)),
            #[cfg(feature = "vorbis")]
            AudioDecoder::Vorbis(d) => d.read(buffer, max_frames),
            AudioDecoder::Custom(d) => d.read(buffer, max_frames),
        }
    }

    /// Reposition the frame cursor; false leaves it unchanged.
    pub fn seek(&mut self, frame: u64) -> bool {
        match self {
            AudioDecoder::Wav(d) => d.seek(frame),
            #[cfg(feature = "vorbis")]
            AudioDecoder::Vorbis(d) => d.seek(frame),
            AudioDecoder::Custom(d) => d.seek(frame),
        }
    }

    /// Current frame cursor
    pub fn position(&self) -> u64 {
        match self {
            AudioDecoder::Wav(d) => d.position(),
            #[cfg(feature = "vorbis")]
            AudioDecoder::Vorbis(d) => d.position(),
            AudioDecoder::Custom(d) => d.cursor,
        }
    }

    /// Total frames, if the container knows it
    pub fn total_frames(&self) -> Option<u64> {
        match self {
            AudioDecoder::Wav(d) => Some(d.total_frames()),
            #[cfg(feature = "vorbis")]
            AudioDecoder::Vorbis(d) => d.total_frames(),
            AudioDecoder::Custom(d) => d.source.total_frames(),
        }
    }
}

impl fmt::Debug for AudioDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioDecoder")
            .field("kind", &self.kind())
            .field("format", &self.format())
            .field("position", &self.position())
            .finish()
    }
}

struct SharedDecoder {
    format: AudioFormat,
    kind: DecoderKind,
    decoder: Mutex<AudioDecoder>,
}

/// Shared, identity-compared reference to one decoder.
///
/// The player clones the handle on `play()`, so the caller may drop its own
/// copy right away. While the stream is active only the mixing context
/// locks the decoder; callers should wait for the stop callback before
/// reading or seeking it themselves.
#[derive(Clone)]
pub struct DecoderHandle {
    inner: Arc<SharedDecoder>,
}

impl DecoderHandle {
    pub fn new(decoder: AudioDecoder) -> Self {
        Self {
            inner: Arc::new(SharedDecoder {
                format: decoder.format(),
                kind: decoder.kind(),
                decoder: Mutex::new(decoder),
            }),
        }
    }

    /// Format of the wrapped decoder (no locking)
    pub fn format(&self) -> AudioFormat {
        self.inner.format
    }

    /// Container of the wrapped decoder (no locking)
    pub fn kind(&self) -> DecoderKind {
        self.inner.kind
    }

    /// Exclusive access to the decoder.
    ///
    /// A panic while the lock was held does not invalidate the decoder's
    /// state, so poisoning is ignored.
    pub fn lock(&self) -> MutexGuard<'_, AudioDecoder> {
        self.inner
            .decoder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// True if both handles refer to the same decoder
    pub fn ptr_eq(&self, other: &DecoderHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl From<AudioDecoder> for DecoderHandle {
    fn from(decoder: AudioDecoder) -> Self {
        DecoderHandle::new(decoder)
    }
}

impl fmt::Debug for DecoderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoderHandle")
            .field("ptr", &Arc::as_ptr(&self.inner))
            .field("kind", &self.inner.kind)
            .field("format", &self.inner.format)
            .finish()
    }
}
