//! Audio formats, blobs, container decoders and device output

pub mod blob;
pub mod decoder;
pub mod output;
pub mod tone;
pub mod types;
#[cfg(feature = "vorbis")]
pub mod vorbis;
pub mod wav;

pub use blob::Blob;
pub use decoder::{AudioDecoder, DecoderHandle, DecoderKind, FrameSource};
pub use output::AudioOutput;
pub use tone::ToneSource;
pub use types::{AudioFormat, AudioFrame, ChannelLayout, SampleType};
