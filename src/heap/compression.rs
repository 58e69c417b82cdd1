//! Heap compression algorithms.
//!
//! The heap header names its compression by a numeric id. Id `0` means the chunks are
//! stored as-is; every other id is resolved through a [`CompressionRegistry`] to a
//! [`Decompressor`]. The registry created by [`CompressionRegistry::default`] knows zlib
//! (id `1`), which is what the package build tools emit. Callers can register further
//! codecs for other ids.

use std::{
    collections::HashMap,
    fmt,
    io::{ErrorKind, Read},
    sync::Arc,
};

use flate2::read::ZlibDecoder;
use strum::{Display, FromRepr};

use crate::{Error, Result};

/// Compression ids defined by the package format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, Display)]
#[repr(u16)]
pub enum HeapCompression {
    /// Chunks are stored uncompressed.
    #[strum(serialize = "none")]
    None = 0,
    /// Chunks are zlib streams.
    #[strum(serialize = "zlib")]
    Zlib = 1,
}

/// A codec able to inflate one heap chunk.
pub trait Decompressor: Send + Sync {
    /// Name used in diagnostics and [`crate::Error::Decompression`].
    fn name(&self) -> &'static str;

    /// Decompresses `input` into `output` and returns the number of bytes produced.
    ///
    /// `output` has exactly the expected uncompressed size of the chunk. Implementations
    /// must not produce more than `output.len()` bytes; the caller treats a short result
    /// as corrupt data.
    ///
    /// # Errors
    /// Returns [`crate::Error::Decompression`] if the codec rejects the input and
    /// [`crate::Error::Malformed`] if the stream inflates to more than `output.len()`
    /// bytes.
    fn decompress(&self, input: &[u8], output: &mut [u8]) -> Result<usize>;
}

/// zlib chunk decompression through `flate2`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZlibDecompressor;

impl ZlibDecompressor {
    fn codec_error(error: &std::io::Error) -> Error {
        Error::Decompression {
            algorithm: "zlib",
            message: error.to_string(),
        }
    }
}

impl Decompressor for ZlibDecompressor {
    fn name(&self) -> &'static str {
        "zlib"
    }

    fn decompress(&self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        let mut decoder = ZlibDecoder::new(input);
        let mut total = 0;

        while total < output.len() {
            match decoder.read(&mut output[total..]) {
                Ok(0) => break,
                Ok(read) => total += read,
                Err(error) if error.kind() == ErrorKind::Interrupted => {}
                Err(error) => return Err(Self::codec_error(&error)),
            }
        }

        let mut probe = [0_u8; 1];
        loop {
            match decoder.read(&mut probe) {
                Ok(0) => break,
                Ok(_) => {
                    return Err(malformed_error!(
                        "zlib chunk inflates to more than {} bytes",
                        output.len()
                    ))
                }
                Err(error) if error.kind() == ErrorKind::Interrupted => {}
                Err(error) => return Err(Self::codec_error(&error)),
            }
        }

        Ok(total)
    }
}

/// Maps heap compression ids to decompressors.
#[derive(Clone)]
pub struct CompressionRegistry {
    codecs: HashMap<u16, Arc<dyn Decompressor>>,
}

impl CompressionRegistry {
    /// A registry without any codec; only uncompressed heaps can be read.
    #[must_use]
    pub fn empty() -> Self {
        CompressionRegistry {
            codecs: HashMap::new(),
        }
    }

    /// Registers `codec` for the compression id `id`, replacing any previous entry.
    ///
    /// Id `0` always means "uncompressed" and never consults the registry.
    pub fn register<D: Decompressor + 'static>(&mut self, id: u16, codec: D) -> &mut Self {
        self.codecs.insert(id, Arc::new(codec));
        self
    }

    /// Looks up the codec for `id`.
    #[must_use]
    pub fn get(&self, id: u16) -> Option<Arc<dyn Decompressor>> {
        self.codecs.get(&id).cloned()
    }
}

impl Default for CompressionRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(HeapCompression::Zlib as u16, ZlibDecompressor);
        registry
    }
}

impl fmt::Debug for CompressionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self
            .codecs
            .iter()
            .map(|(id, codec)| (*id, codec.name()))
            .collect();
        ids.sort_unstable();
        f.debug_struct("CompressionRegistry")
            .field("codecs", &ids)
            .finish()
    }
}
