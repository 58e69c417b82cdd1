//! The package heap.
//!
//! The heap holds the bulk data of a package: file contents, large attribute payloads and
//! the table of contents. It is split into fixed-size chunks which are compressed
//! independently, so a byte range can be served by decoding only the chunks it overlaps.
//!
//! - [`raw::RawHeapReader`] - locates and decodes chunks
//! - [`cached::CachedHeapReader`] - keeps recently decoded chunks around
//! - [`compression`] - the codec registry
//! - [`HeapReaderHandle`] - the owned handle a package reader hands out on detach
//!
//! # Examples
//!
//! ```rust,no_run
//! use hpkg::{HeapReader, PackageReader, ReaderOptions};
//!
//! let mut reader = PackageReader::from_file("haiku.hpkg".as_ref(), ReaderOptions::default())?;
//! let mut heap = reader.detach_heap_reader()?;
//! drop(reader);
//!
//! let mut head = [0_u8; 16];
//! heap.read_data(0, &mut head)?;
//! # Ok::<(), hpkg::Error>(())
//! ```

pub mod cached;
pub mod compression;
pub mod raw;

use crate::{file::File, Error, Result};
use cached::CachedHeapReader;
use raw::RawHeapReader;

/// Random access to the uncompressed content of a heap.
pub trait HeapReader {
    /// Logical size of the heap.
    fn uncompressed_size(&self) -> u64;

    /// Fills `buffer` with the heap bytes starting at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the range exceeds the heap, and any error
    /// raised while locating or decoding the chunks involved.
    fn read_data(&mut self, offset: u64, buffer: &mut [u8]) -> Result<()>;

    /// Reads the range described by `data` into a new buffer.
    ///
    /// # Errors
    /// Same as [`HeapReader::read_data`]; [`crate::Error::NoMemory`] if the buffer cannot
    /// be allocated.
    fn read_ref(&mut self, data: HeapRef) -> Result<Vec<u8>> {
        if !matches!(
            data.offset.checked_add(data.size),
            Some(end) if end <= self.uncompressed_size()
        ) {
            return Err(malformed_error!(
                "Heap reference {}+{} exceeds heap size {}",
                data.offset,
                data.size,
                self.uncompressed_size()
            ));
        }

        let size = usize::try_from(data.size).map_err(|_| Error::NoMemory)?;
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(size).map_err(|_| Error::NoMemory)?;
        buffer.resize(size, 0);

        self.read_data(data.offset, &mut buffer)?;
        Ok(buffer)
    }
}

/// A lazily resolved range of heap bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HeapRef {
    /// Offset into the uncompressed heap.
    pub offset: u64,
    /// Length in bytes.
    pub size: u64,
}

impl HeapRef {
    /// Creates a reference to `size` bytes at `offset`.
    #[must_use]
    pub fn new(offset: u64, size: u64) -> Self {
        HeapRef { offset, size }
    }
}

/// An owned heap reader, with or without chunk cache.
///
/// Obtained from [`crate::PackageReader::detach_heap_reader`]. The handle keeps its byte
/// source alive; [`HeapReaderHandle::detach_source`] releases it and reads then fail with
/// [`crate::Error::NoSource`] until a source is attached again.
#[derive(Debug)]
pub enum HeapReaderHandle {
    /// A reader without cache.
    Raw(RawHeapReader),
    /// A caching reader wrapping the raw one.
    Cached(CachedHeapReader),
}

impl HeapReaderHandle {
    /// The raw reader, also when wrapped by a cache.
    #[must_use]
    pub fn raw(&self) -> &RawHeapReader {
        match self {
            HeapReaderHandle::Raw(raw) => raw,
            HeapReaderHandle::Cached(cached) => cached.raw(),
        }
    }

    /// Unwraps the raw reader, dropping any cache.
    #[must_use]
    pub fn into_raw(self) -> RawHeapReader {
        match self {
            HeapReaderHandle::Raw(raw) => raw,
            HeapReaderHandle::Cached(cached) => cached.into_raw(),
        }
    }

    /// Returns `true` if the handle carries a chunk cache.
    #[must_use]
    pub fn is_cached(&self) -> bool {
        matches!(self, HeapReaderHandle::Cached(_))
    }

    /// Associates the reader with a live byte source.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the heap does not fit into `source`.
    pub fn attach_source(&mut self, source: File) -> Result<()> {
        match self {
            HeapReaderHandle::Raw(raw) => raw.attach_source(source),
            HeapReaderHandle::Cached(cached) => cached.attach_source(source),
        }
    }

    /// Releases the byte source.
    pub fn detach_source(&mut self) -> Option<File> {
        match self {
            HeapReaderHandle::Raw(raw) => raw.detach_source(),
            HeapReaderHandle::Cached(cached) => cached.detach_source(),
        }
    }

    /// Returns `true` if a byte source is attached.
    #[must_use]
    pub fn has_source(&self) -> bool {
        self.raw().has_source()
    }
}

impl HeapReader for HeapReaderHandle {
    fn uncompressed_size(&self) -> u64 {
        self.raw().uncompressed_size()
    }

    fn read_data(&mut self, offset: u64, buffer: &mut [u8]) -> Result<()> {
        match self {
            HeapReaderHandle::Raw(raw) => raw.read_data(offset, buffer),
            HeapReaderHandle::Cached(cached) => cached.read_data(offset, buffer),
        }
    }
}
