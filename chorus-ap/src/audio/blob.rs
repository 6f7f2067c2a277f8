//! Shared immutable byte storage backing decoders
//!
//! A `Blob` is cheap to clone: clones share the same allocation, so a decoder
//! keeps its bytes alive for as long as it exists regardless of what the
//! caller does with its own copy.

use crate::error::Result;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Immutable, randomly addressable byte range with shared ownership
#[derive(Clone)]
pub struct Blob {
    data: Arc<[u8]>,
}

impl Blob {
    /// Take ownership of an in-memory buffer
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self { data: bytes.into() }
    }

    /// Copy a static byte slice (embedded assets)
    pub fn from_static(bytes: &'static [u8]) -> Self {
        Self { data: Arc::from(bytes) }
    }

    /// Read a whole file into a blob.
    ///
    /// This is the only filesystem access in the engine; decoders only ever
    /// see the resulting bytes.
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        debug!("Loaded {} bytes from {}", bytes.len(), path.display());
        Ok(Self::from_vec(bytes))
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Byte sub-range, or None if any part lies outside the blob
    pub fn bytes(&self, range: Range<usize>) -> Option<&[u8]> {
        self.data.get(range)
    }

    /// Four-character code at `offset`, e.g. `*b"RIFF"`
    pub fn tag(&self, offset: usize) -> Option<[u8; 4]> {
        self.array::<4>(offset)
    }

    /// Little-endian u16 at `offset`
    pub fn u16_le(&self, offset: usize) -> Option<u16> {
        self.array::<2>(offset).map(u16::from_le_bytes)
    }

    /// Little-endian u32 at `offset`
    pub fn u32_le(&self, offset: usize) -> Option<u32> {
        self.array::<4>(offset).map(u32::from_le_bytes)
    }

    /// Big-endian u32 at `offset` (magic numbers compared as integers)
    pub fn u32_be(&self, offset: usize) -> Option<u32> {
        self.array::<4>(offset).map(u32::from_be_bytes)
    }

    fn array<const N: usize>(&self, offset: usize) -> Option<[u8; N]> {
        let end = offset.checked_add(N)?;
        self.data.get(offset..end)?.try_into().ok()
    }
}

impl AsRef<[u8]> for Blob {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl std::fmt::Debug for Blob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blob").field("size", &self.size()).finish()
    }
}
