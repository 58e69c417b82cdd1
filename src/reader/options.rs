//! Reader configuration.

use bitflags::bitflags;

use crate::{format::TagLayout, heap::compression::CompressionRegistry};

bitflags! {
    /// Flags changing how a reader reports problems.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ReaderFlags: u32 {
        /// Do not print a diagnostic when the format version does not match. The error is
        /// returned all the same.
        const DONT_PRINT_VERSION_MISMATCH_MESSAGE = 0x1;
    }
}

/// Options for opening and parsing a package file.
///
/// ```rust
/// use hpkg::{ReaderFlags, ReaderOptions};
///
/// let options = ReaderOptions::default()
///     .with_flags(ReaderFlags::DONT_PRINT_VERSION_MISMATCH_MESSAGE)
///     .with_cache_chunks(0)
///     .with_ignore_unknown_attributes(true);
/// assert_eq!(options.cache_chunks, 0);
/// ```
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// Reporting flags.
    pub flags: ReaderFlags,
    /// Bit layout of attribute tags.
    pub tag_layout: TagLayout,
    /// Number of decompressed heap chunks to keep; 0 disables the cache.
    pub cache_chunks: usize,
    /// Skip attributes no handler understands. `None` skips them only for files written
    /// with a newer minor format version than this reader supports.
    pub ignore_unknown_attributes: Option<bool>,
    /// Side table for table-encoded integer values.
    pub integer_table: Vec<u64>,
    /// Codecs for compressed heaps.
    pub decompressors: CompressionRegistry,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        ReaderOptions {
            flags: ReaderFlags::empty(),
            tag_layout: TagLayout::default(),
            cache_chunks: 8,
            ignore_unknown_attributes: None,
            integer_table: Vec::new(),
            decompressors: CompressionRegistry::default(),
        }
    }
}

impl ReaderOptions {
    /// Sets the reporting flags.
    #[must_use]
    pub fn with_flags(mut self, flags: ReaderFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Sets the attribute tag layout.
    #[must_use]
    pub fn with_tag_layout(mut self, layout: TagLayout) -> Self {
        self.tag_layout = layout;
        self
    }

    /// Sets the number of cached heap chunks.
    #[must_use]
    pub fn with_cache_chunks(mut self, chunks: usize) -> Self {
        self.cache_chunks = chunks;
        self
    }

    /// Forces lenient (`true`) or strict (`false`) handling of unknown attributes.
    #[must_use]
    pub fn with_ignore_unknown_attributes(mut self, ignore: bool) -> Self {
        self.ignore_unknown_attributes = Some(ignore);
        self
    }

    /// Sets the integer side table.
    #[must_use]
    pub fn with_integer_table(mut self, table: Vec<u64>) -> Self {
        self.integer_table = table;
        self
    }

    /// Replaces the codec registry.
    #[must_use]
    pub fn with_decompressors(mut self, registry: CompressionRegistry) -> Self {
        self.decompressors = registry;
        self
    }
}
