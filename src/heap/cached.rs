//! Chunk cache in front of a [`RawHeapReader`].
//!
//! Attribute data and small files tend to be read in many short, neighbouring requests.
//! [`CachedHeapReader`] keeps the most recently decoded chunks so those requests only
//! inflate each chunk once.

use std::collections::VecDeque;

use crate::{
    file::File,
    heap::{raw::RawHeapReader, HeapReader},
    Result,
};

/// A heap reader remembering the last `capacity` decoded chunks.
#[derive(Debug)]
pub struct CachedHeapReader {
    inner: RawHeapReader,
    capacity: usize,
    /// Most recently used chunk first.
    chunks: VecDeque<(u64, Vec<u8>)>,
}

impl CachedHeapReader {
    /// Wraps `inner`, caching up to `capacity` chunks (at least one).
    #[must_use]
    pub fn new(inner: RawHeapReader, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        CachedHeapReader {
            inner,
            capacity,
            chunks: VecDeque::with_capacity(capacity),
        }
    }

    /// The wrapped reader.
    #[must_use]
    pub fn raw(&self) -> &RawHeapReader {
        &self.inner
    }

    /// Drops the cache and returns the wrapped reader.
    #[must_use]
    pub fn into_raw(self) -> RawHeapReader {
        self.inner
    }

    /// Number of chunks currently cached.
    #[must_use]
    pub fn cached_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Re-attaches the byte source of the wrapped reader.
    ///
    /// # Errors
    /// See [`RawHeapReader::attach_source`].
    pub fn attach_source(&mut self, source: File) -> Result<()> {
        self.chunks.clear();
        self.inner.attach_source(source)
    }

    /// Detaches the byte source of the wrapped reader and empties the cache.
    pub fn detach_source(&mut self) -> Option<File> {
        self.chunks.clear();
        self.inner.detach_source()
    }

    fn load(
        inner: &RawHeapReader,
        chunks: &mut VecDeque<(u64, Vec<u8>)>,
        capacity: usize,
        index: u64,
    ) -> Result<()> {
        if let Some(slot) = chunks.iter().position(|(cached, _)| *cached == index) {
            if slot != 0 {
                if let Some(entry) = chunks.remove(slot) {
                    chunks.push_front(entry);
                }
            }
            return Ok(());
        }

        let mut data = if chunks.len() >= capacity {
            chunks.pop_back().map(|(_, data)| data).unwrap_or_default()
        } else {
            Vec::new()
        };

        inner.read_chunk(index, &mut data)?;
        chunks.push_front((index, data));
        Ok(())
    }
}

impl HeapReader for CachedHeapReader {
    fn uncompressed_size(&self) -> u64 {
        self.inner.uncompressed_size()
    }

    fn read_data(&mut self, offset: u64, buffer: &mut [u8]) -> Result<()> {
        let CachedHeapReader {
            inner,
            capacity,
            chunks,
        } = self;
        let inner = &*inner;

        inner.copy_range(offset, buffer, |index, sink| {
            Self::load(inner, chunks, *capacity, index)?;
            if let Some((_, data)) = chunks.front() {
                sink(data.as_slice());
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        heap::compression::CompressionRegistry,
        test::{build_heap, pattern},
    };

    fn cached(data: &[u8], chunk: u32, capacity: usize) -> CachedHeapReader {
        let image = build_heap(data, chunk, true);
        let size = image.len() as u64;
        let raw = RawHeapReader::new(
            File::from_mem(image).unwrap(),
            1,
            chunk,
            0,
            size,
            data.len() as u64,
            &CompressionRegistry::default(),
        )
        .unwrap();
        CachedHeapReader::new(raw, capacity)
    }

    #[test]
    fn matches_raw() {
        let data = pattern(10_000);
        let mut heap = cached(&data, 512, 2);

        for (offset, len) in [(0, 10), (505, 20), (9_990, 10), (100, 4_000), (0, 10_000)] {
            let mut buffer = vec![0; len];
            heap.read_data(offset as u64, &mut buffer).unwrap();
            assert_eq!(buffer, &data[offset..offset + len]);
            assert!(heap.cached_chunks() <= 2);
        }
    }

    #[test]
    fn reuses_chunks() {
        let data = pattern(4096);
        let mut heap = cached(&data, 1024, 4);
        let mut buffer = vec![0; 8];

        heap.read_data(10, &mut buffer).unwrap();
        heap.read_data(20, &mut buffer).unwrap();
        assert_eq!(heap.cached_chunks(), 1);

        // Detaching drops the cache as well
        let source = heap.detach_source().unwrap();
        assert_eq!(heap.cached_chunks(), 0);
        assert!(heap.read_data(20, &mut buffer).is_err());

        heap.attach_source(source).unwrap();
        heap.read_data(3000, &mut buffer).unwrap();
        assert_eq!(buffer, &data[3000..3008]);
        assert_eq!(heap.cached_chunks(), 1);
        assert!(heap.into_raw().has_source());
    }
}
