//! Chunked heap reader without caching.
//!
//! The heap is a sequence of chunks of `chunk_size` uncompressed bytes (the last one may be
//! shorter). With compression, each chunk is stored at a variable length and a table of
//! big-endian `u16` values (`stored_length - 1`) for all but the last chunk follows the
//! chunk data. The table is decoded once on construction into absolute chunk offsets, so
//! any chunk can be located without touching the chunks before it. A chunk whose stored
//! length equals its uncompressed length was not worth compressing and is stored raw.

use std::sync::Arc;

use log::{debug, trace};

use crate::{
    file::{io::read_be_at, File},
    heap::{
        compression::{CompressionRegistry, Decompressor, HeapCompression},
        HeapReader,
    },
    Error, Result,
};

/// Largest chunk size the format allows.
pub const MAX_CHUNK_SIZE: u32 = 64 * 1024;

/// Reads byte ranges of a heap, decompressing the chunks they touch on every call.
pub struct RawHeapReader {
    source: Option<File>,
    compression: u16,
    decompressor: Option<Arc<dyn Decompressor>>,
    chunk_size: u32,
    heap_offset: u64,
    compressed_size: u64,
    uncompressed_size: u64,
    /// Start of every chunk relative to `heap_offset`, plus the end of the chunk data.
    /// Empty for uncompressed heaps, where chunk `i` starts at `i * chunk_size`.
    chunk_offsets: Vec<u64>,
}

impl RawHeapReader {
    /// Creates a reader for the heap stored at `heap_offset` in `source`.
    ///
    /// # Arguments
    /// * `source` - The package byte source.
    /// * `compression` - Compression id from the file header.
    /// * `chunk_size` - Uncompressed size of every chunk but the last.
    /// * `heap_offset` - Absolute file offset of the heap.
    /// * `compressed_size` - Stored heap size, including the chunk table.
    /// * `uncompressed_size` - Logical heap size.
    /// * `registry` - Codecs available for compressed heaps.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the sizes or the chunk table are inconsistent,
    /// [`crate::Error::NotSupported`] for a compression id without codec,
    /// [`crate::Error::OutOfBounds`] if the heap does not fit into `source` and
    /// [`crate::Error::NoMemory`] if the chunk table cannot be allocated.
    pub fn new(
        source: File,
        compression: u16,
        chunk_size: u32,
        heap_offset: u64,
        compressed_size: u64,
        uncompressed_size: u64,
        registry: &CompressionRegistry,
    ) -> Result<RawHeapReader> {
        if chunk_size == 0 || chunk_size > MAX_CHUNK_SIZE {
            return Err(malformed_error!("Invalid heap chunk size {}", chunk_size));
        }

        let chunk_count = uncompressed_size.div_ceil(u64::from(chunk_size));

        let mut reader = RawHeapReader {
            source: None,
            compression,
            decompressor: None,
            chunk_size,
            heap_offset,
            compressed_size,
            uncompressed_size,
            chunk_offsets: Vec::new(),
        };
        reader.attach_source(source)?;

        if compression == HeapCompression::None as u16 {
            if compressed_size != uncompressed_size {
                return Err(malformed_error!(
                    "Uncompressed heap size mismatch - stored {}, logical {}",
                    compressed_size,
                    uncompressed_size
                ));
            }
        } else {
            let Some(decompressor) = registry.get(compression) else {
                return Err(Error::NotSupported(format!(
                    "heap compression {compression}"
                )));
            };
            reader.decompressor = Some(decompressor);
            reader.read_chunk_table(chunk_count)?;
        }

        debug!(
            "heap: {} chunks of {} bytes, compression {}, {} -> {} bytes",
            chunk_count,
            chunk_size,
            HeapCompression::from_repr(compression)
                .map_or_else(|| compression.to_string(), |c| c.to_string()),
            compressed_size,
            uncompressed_size
        );

        Ok(reader)
    }

    fn read_chunk_table(&mut self, chunk_count: u64) -> Result<()> {
        let table_size = chunk_count.saturating_sub(1).saturating_mul(2);
        if table_size > self.compressed_size {
            return Err(malformed_error!(
                "Heap chunk table ({} bytes) exceeds the compressed heap ({} bytes)",
                table_size,
                self.compressed_size
            ));
        }

        let data_end = self.compressed_size - table_size;
        if chunk_count == 0 {
            if data_end != 0 {
                return Err(malformed_error!(
                    "Empty heap has {} bytes of chunk data",
                    data_end
                ));
            }
            return Ok(());
        }

        let table = self.source()?.data_slice_u64(
            self.heap_offset + data_end,
            table_size,
        )?;

        let count = usize::try_from(chunk_count).map_err(|_| Error::NoMemory)?;
        let mut offsets = Vec::new();
        offsets
            .try_reserve_exact(count + 1)
            .map_err(|_| Error::NoMemory)?;

        let mut position = 0_u64;
        let mut table_offset = 0_usize;
        for index in 0..chunk_count {
            offsets.push(position);

            let length = if index + 1 < chunk_count {
                u64::from(read_be_at::<u16>(table, &mut table_offset)?) + 1
            } else {
                data_end.checked_sub(position).ok_or_else(|| {
                    malformed_error!("Heap chunk table exceeds the chunk data")
                })?
            };

            if length == 0 || length > self.chunk_uncompressed_size(index) {
                return Err(malformed_error!(
                    "Invalid stored size {} for heap chunk {}",
                    length,
                    index
                ));
            }

            position += length;
            if position > data_end {
                return Err(malformed_error!(
                    "Heap chunk {} extends past the compressed heap",
                    index
                ));
            }
        }
        offsets.push(position);

        self.chunk_offsets = offsets;
        Ok(())
    }

    /// Re-associates the reader with a byte source.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the heap does not fit into `source`.
    pub fn attach_source(&mut self, source: File) -> Result<()> {
        let end = self
            .heap_offset
            .checked_add(self.compressed_size)
            .ok_or(out_of_bounds_error!())?;
        if end > source.len() as u64 {
            return Err(out_of_bounds_error!());
        }

        self.source = Some(source);
        Ok(())
    }

    /// Releases the byte source; reads fail with [`crate::Error::NoSource`] until
    /// [`RawHeapReader::attach_source`] is called again.
    pub fn detach_source(&mut self) -> Option<File> {
        self.source.take()
    }

    /// Returns `true` if a byte source is attached.
    #[must_use]
    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    fn source(&self) -> Result<&File> {
        self.source.as_ref().ok_or(Error::NoSource)
    }

    /// The compression id of the heap.
    #[must_use]
    pub fn compression(&self) -> u16 {
        self.compression
    }

    /// The uncompressed size of a full chunk.
    #[must_use]
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Number of chunks in the heap.
    #[must_use]
    pub fn chunk_count(&self) -> u64 {
        self.uncompressed_size.div_ceil(u64::from(self.chunk_size))
    }

    /// Absolute file offset of the heap.
    #[must_use]
    pub fn heap_offset(&self) -> u64 {
        self.heap_offset
    }

    /// Stored size of the heap.
    #[must_use]
    pub fn compressed_size(&self) -> u64 {
        self.compressed_size
    }

    /// Uncompressed size of chunk `index`.
    #[must_use]
    pub fn chunk_uncompressed_size(&self, index: u64) -> u64 {
        let start = index.saturating_mul(u64::from(self.chunk_size));
        self.uncompressed_size
            .saturating_sub(start)
            .min(u64::from(self.chunk_size))
    }

    /// Validates that `[offset, offset + size)` lies within the heap.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] otherwise.
    pub fn check_range(&self, offset: u64, size: u64) -> Result<()> {
        match offset.checked_add(size) {
            Some(end) if end <= self.uncompressed_size => Ok(()),
            _ => Err(malformed_error!(
                "Heap range {}+{} exceeds heap size {}",
                offset,
                size,
                self.uncompressed_size
            )),
        }
    }

    fn stored_range(&self, index: u64) -> Result<(u64, u64)> {
        if self.chunk_offsets.is_empty() {
            let start = index * u64::from(self.chunk_size);
            return Ok((start, self.chunk_uncompressed_size(index)));
        }

        let slot = usize::try_from(index).map_err(|_| out_of_bounds_error!())?;
        match (self.chunk_offsets.get(slot), self.chunk_offsets.get(slot + 1)) {
            (Some(start), Some(end)) => Ok((*start, end - start)),
            _ => Err(out_of_bounds_error!()),
        }
    }

    /// Decodes chunk `index` into `output`, replacing its content.
    ///
    /// # Errors
    /// Returns [`crate::Error::NoSource`] if detached, [`crate::Error::Decompression`] if
    /// the codec fails and [`crate::Error::Malformed`] if the chunk does not inflate to its
    /// expected size.
    pub fn read_chunk(&self, index: u64, output: &mut Vec<u8>) -> Result<()> {
        if index >= self.chunk_count() {
            return Err(malformed_error!("Heap chunk {} does not exist", index));
        }

        let expected = self.chunk_uncompressed_size(index);
        let (offset, stored) = self.stored_range(index)?;
        let data = self
            .source()?
            .data_slice_u64(self.heap_offset + offset, stored)?;

        let expected_len = usize::try_from(expected).map_err(|_| Error::NoMemory)?;
        output.clear();
        output
            .try_reserve_exact(expected_len)
            .map_err(|_| Error::NoMemory)?;

        match &self.decompressor {
            Some(decompressor) if stored < expected => {
                output.resize(expected_len, 0);
                let produced = decompressor.decompress(data, output)?;
                if produced != expected_len {
                    return Err(malformed_error!(
                        "Heap chunk {} inflated to {} bytes, expected {}",
                        index,
                        produced,
                        expected
                    ));
                }
                trace!(
                    "heap: inflated chunk {} ({} -> {} bytes) with {}",
                    index,
                    stored,
                    expected,
                    decompressor.name()
                );
            }
            _ => output.extend_from_slice(data),
        }

        Ok(())
    }

    /// Copies `buffer.len()` bytes starting at `offset` out of the chunks, obtaining
    /// each chunk through `chunk`.
    pub(crate) fn copy_range<F>(&self, offset: u64, buffer: &mut [u8], mut chunk: F) -> Result<()>
    where
        F: FnMut(u64, &mut dyn FnMut(&[u8])) -> Result<()>,
    {
        self.check_range(offset, buffer.len() as u64)?;

        let chunk_size = u64::from(self.chunk_size);
        let mut position = offset;
        let mut written = 0_usize;

        while written < buffer.len() {
            let index = position / chunk_size;
            let in_chunk = usize::try_from(position % chunk_size).map_err(|_| Error::NoMemory)?;
            let mut copied = 0_usize;

            chunk(index, &mut |data: &[u8]| {
                let available = data.len().saturating_sub(in_chunk);
                copied = available.min(buffer.len() - written);
                buffer[written..written + copied]
                    .copy_from_slice(&data[in_chunk..in_chunk + copied]);
            })?;

            if copied == 0 {
                return Err(malformed_error!("Heap chunk {} is truncated", index));
            }

            written += copied;
            position += copied as u64;
        }

        Ok(())
    }
}

impl HeapReader for RawHeapReader {
    fn uncompressed_size(&self) -> u64 {
        self.uncompressed_size
    }

    fn read_data(&mut self, offset: u64, buffer: &mut [u8]) -> Result<()> {
        let mut scratch = Vec::new();
        self.copy_range(offset, buffer, |index, sink| {
            self.read_chunk(index, &mut scratch)?;
            sink(scratch.as_slice());
            Ok(())
        })
    }
}

impl std::fmt::Debug for RawHeapReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawHeapReader")
            .field("attached", &self.source.is_some())
            .field("compression", &self.compression)
            .field("chunk_size", &self.chunk_size)
            .field("heap_offset", &self.heap_offset)
            .field("compressed_size", &self.compressed_size)
            .field("uncompressed_size", &self.uncompressed_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{build_heap, pattern};

    fn reader(image: Vec<u8>, compression: u16, chunk: u32, plain: usize) -> Result<RawHeapReader> {
        let size = image.len() as u64;
        RawHeapReader::new(
            File::from_mem(image)?,
            compression,
            chunk,
            0,
            size,
            plain as u64,
            &CompressionRegistry::default(),
        )
    }

    #[test]
    fn uncompressed() {
        let data = pattern(1000);
        let mut heap = reader(data.clone(), 0, 256, 1000).unwrap();

        assert_eq!(heap.chunk_count(), 4);
        assert_eq!(heap.chunk_uncompressed_size(3), 232);

        let mut buffer = vec![0; 600];
        heap.read_data(200, &mut buffer).unwrap();
        assert_eq!(buffer, &data[200..800]);

        let mut empty = [0_u8; 0];
        heap.read_data(1000, &mut empty).unwrap();
    }

    #[test]
    fn zlib_chunks() {
        let data = pattern(5000);
        let image = build_heap(&data, 1024, true);
        let mut heap = reader(image, 1, 1024, 5000).unwrap();

        assert_eq!(heap.chunk_count(), 5);

        let mut buffer = vec![0; 5000];
        heap.read_data(0, &mut buffer).unwrap();
        assert_eq!(buffer, data);

        let mut buffer = vec![0; 10];
        heap.read_data(1020, &mut buffer).unwrap();
        assert_eq!(buffer, &data[1020..1030]);
    }

    #[test]
    fn range_exceeds_heap() {
        let mut heap = reader(pattern(100), 0, 64, 100).unwrap();
        let mut buffer = vec![0; 10];

        assert!(matches!(
            heap.read_data(95, &mut buffer),
            Err(Error::Malformed { .. })
        ));
        assert!(matches!(
            heap.read_data(u64::MAX, &mut buffer),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn inconsistent_sizes() {
        assert!(matches!(
            reader(pattern(100), 0, 64, 99),
            Err(Error::Malformed { .. })
        ));
        assert!(matches!(
            reader(pattern(100), 0, 0, 100),
            Err(Error::Malformed { .. })
        ));
        assert!(matches!(
            reader(pattern(100), 0, MAX_CHUNK_SIZE + 1, 100),
            Err(Error::Malformed { .. })
        ));
        assert!(matches!(
            reader(pattern(100), 7, 64, 200),
            Err(Error::NotSupported(_))
        ));
    }

    #[test]
    fn corrupt_chunk_table() {
        let data = pattern(3000);
        let mut image = build_heap(&data, 1024, true);
        let len = image.len();

        // First table entry claims a chunk longer than its uncompressed size
        image[len - 4] = 0x7F;
        image[len - 3] = 0xFF;
        assert!(matches!(
            reader(image, 1, 1024, 3000),
            Err(Error::Malformed { .. })
        ));

        // Table larger than the whole heap
        assert!(matches!(
            reader(vec![0; 4], 1, 1, 100),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn corrupt_chunk_data() {
        let data = pattern(2048);
        let mut image = build_heap(&data, 1024, true);
        image[0] ^= 0xFF;

        let mut heap = reader(image, 1, 1024, 2048).unwrap();
        let mut buffer = vec![0; 16];
        let error = heap.read_data(0, &mut buffer).unwrap_err();
        assert!(error.is_io_error() || error.is_bad_data());

        // The second chunk is unaffected
        heap.read_data(1024, &mut buffer).unwrap();
        assert_eq!(buffer, &data[1024..1040]);
    }

    #[test]
    fn detached() {
        let mut heap = reader(pattern(64), 0, 64, 64).unwrap();
        let source = heap.detach_source().unwrap();
        assert!(!heap.has_source());

        let mut buffer = vec![0; 4];
        assert!(matches!(heap.read_data(0, &mut buffer), Err(Error::NoSource)));

        assert!(matches!(
            heap.attach_source(File::from_mem(vec![1; 8]).unwrap()),
            Err(Error::OutOfBounds)
        ));

        heap.attach_source(source).unwrap();
        heap.read_data(0, &mut buffer).unwrap();
        assert_eq!(buffer, &pattern(64)[..4]);
    }
}
