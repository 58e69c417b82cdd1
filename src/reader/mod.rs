//! Reader core shared by all HPKG file kinds.
//!
//! [`ReaderImplBase`] owns everything a parse needs: the byte source, the validated
//! header, the heap reader, the package attributes section and the attribute handler
//! stack. It is generic over the header layout, so package and repository files share the
//! validation, heap setup and tree walk. File-kind specific readers such as
//! [`crate::PackageReader`] decide which sections to parse and with which root handler.
//!
//! # Lifecycle
//!
//! A reader moves through [`ReaderState`] in one direction only:
//!
//! ```text
//! Unopened -> HeaderValidated -> HeapReady -> SectionLoaded -> AttributesParsed
//! ```
//!
//! Any failure ends in [`ReaderState::Failed`]. A failed reader reports every further
//! operation as [`Error::InvalidState`]. Calling an operation in the wrong state is a usage
//! error and leaves the state untouched.
//!
//! # Diagnostics
//!
//! Each failure is printed exactly once to the reader's [`ErrorOutput`]. The content
//! handler of an aborted walk is told through `handle_error_occurred`.

pub mod context;
pub mod handlers;
pub mod options;
pub mod section;
pub mod strings;
pub mod value;
pub mod walker;

use log::{debug, warn};
use strum::Display;

use crate::{
    file::File,
    format::{CommonHeader, FileHeader, SectionId},
    heap::{cached::CachedHeapReader, raw::RawHeapReader, HeapReader, HeapReaderHandle, HeapRef},
    reader::{
        context::{AttributeHandlerContext, ContentHandlerRef, ErrorOutput, LogErrorOutput},
        handlers::AttributeHandler,
        options::{ReaderFlags, ReaderOptions},
        section::{init_section, Section},
        walker::parse_attribute_tree,
    },
    Error, Result,
};

/// Upper bound for the package attributes section.
pub const MAX_PACKAGE_ATTRIBUTES_LENGTH: u64 = 1024 * 1024;
/// Upper bound for the TOC section.
pub const MAX_TOC_LENGTH: u64 = 64 * 1024 * 1024;

/// Progress of a reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ReaderState {
    /// No file yet.
    Unopened,
    /// Header read and checked.
    HeaderValidated,
    /// Heap reader set up.
    HeapReady,
    /// Package attributes section loaded.
    SectionLoaded,
    /// Package attributes parsed.
    AttributesParsed,
    /// An operation failed; the reader cannot be used any more.
    Failed,
}

/// Shared reader core, generic over the header layout `H`.
pub struct ReaderImplBase<H: FileHeader> {
    options: ReaderOptions,
    error_output: Box<dyn ErrorOutput>,
    state: ReaderState,
    file: Option<File>,
    header: Option<H>,
    heap: Option<HeapReaderHandle>,
    heap_detached: bool,
    package_attributes: Section,
    handler_stack: Vec<AttributeHandler>,
}

impl<H: FileHeader> ReaderImplBase<H> {
    /// Creates an unopened reader reporting diagnostics through `log`.
    #[must_use]
    pub fn new(options: ReaderOptions) -> Self {
        Self::with_error_output(options, Box::new(LogErrorOutput))
    }

    /// Creates an unopened reader reporting diagnostics to `error_output`.
    #[must_use]
    pub fn with_error_output(options: ReaderOptions, error_output: Box<dyn ErrorOutput>) -> Self {
        ReaderImplBase {
            options,
            error_output,
            state: ReaderState::Unopened,
            file: None,
            header: None,
            heap: None,
            heap_detached: false,
            package_attributes: Section::default(),
            handler_stack: Vec::new(),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// The validated header, once [`ReaderImplBase::init`] succeeded.
    #[must_use]
    pub fn header(&self) -> Option<&H> {
        self.header.as_ref()
    }

    /// The byte source.
    #[must_use]
    pub fn file(&self) -> Option<&File> {
        self.file.as_ref()
    }

    /// The options the reader was created with.
    #[must_use]
    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// The heap reader, unless detached.
    #[must_use]
    pub fn heap_reader(&self) -> Option<&HeapReaderHandle> {
        self.heap.as_ref()
    }

    /// The loaded package attributes section.
    #[must_use]
    pub fn package_attributes_section(&self) -> &Section {
        &self.package_attributes
    }

    /// Number of handlers currently on the attribute handler stack.
    #[must_use]
    pub fn attribute_handler_depth(&self) -> usize {
        self.handler_stack.len()
    }

    /// Drops all handlers left on the stack by an aborted walk, without finishing them.
    pub fn clear_attribute_handler_stack(&mut self) {
        self.handler_stack.clear();
    }

    /// Whether unknown attributes are skipped for the opened file.
    #[must_use]
    pub fn ignore_unknown_attributes(&self) -> bool {
        self.options.ignore_unknown_attributes.unwrap_or_else(|| {
            self.header
                .as_ref()
                .is_some_and(|header| header.common().minor_version > H::MINOR_VERSION)
        })
    }

    /// Fails with [`Error::InvalidState`] unless the reader is in one of `allowed`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidState`] naming `operation` and the current state.
    pub fn expect_state(&self, allowed: &[ReaderState], operation: &str) -> Result<()> {
        if allowed.contains(&self.state) {
            return Ok(());
        }

        Err(Error::InvalidState(format!(
            "{operation} is not possible in state {}",
            self.state
        )))
    }

    /// Records a failed operation: prints one diagnostic, moves to
    /// [`ReaderState::Failed`], drops the handler stack and notifies `handler`.
    ///
    /// Returns `error` for propagation.
    pub fn report_error(&mut self, error: Error, handler: Option<&mut ContentHandlerRef<'_>>) -> Error {
        let suppressed = matches!(error, Error::MismatchedVersion { .. })
            && self
                .options
                .flags
                .contains(ReaderFlags::DONT_PRINT_VERSION_MISMATCH_MESSAGE);
        if !suppressed {
            self.error_output
                .print_error(&format!("Error: Failed to read {} file: {}", H::FILE_TYPE, error));
        }

        self.state = ReaderState::Failed;
        self.clear_attribute_handler_stack();
        if let Some(handler) = handler {
            handler.error_occurred();
        }
        error
    }

    /// Reads and validates the header of `file` and sets up the heap reader.
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] if the file is too small, has the wrong magic, an
    /// invalid header size, a total size not matching the file length or a heap outside
    /// the file, [`Error::MismatchedVersion`] for a different major format version, and
    /// any error of [`RawHeapReader::new`].
    pub fn init(&mut self, file: File) -> Result<()> {
        self.expect_state(&[ReaderState::Unopened], "init")?;

        match self.init_impl(file) {
            Ok(()) => Ok(()),
            Err(error) => Err(self.report_error(error, None)),
        }
    }

    fn init_impl(&mut self, file: File) -> Result<()> {
        let length = file.len() as u64;
        if file.len() < H::SIZE {
            return Err(malformed_error!(
                "{} file too small ({} bytes) for its {} byte header",
                H::FILE_TYPE,
                length,
                H::SIZE
            ));
        }

        let header = H::read(file.data_slice(0, H::SIZE)?)?;
        let common = *header.common();

        if common.magic != H::MAGIC {
            return Err(malformed_error!(
                "Invalid {} file magic {:#010x}",
                H::FILE_TYPE,
                common.magic
            ));
        }

        if common.version != H::VERSION {
            return Err(Error::MismatchedVersion {
                file_type: H::FILE_TYPE,
                expected: H::VERSION,
                found: common.version,
            });
        }

        if usize::from(common.header_size) < H::SIZE {
            return Err(malformed_error!(
                "Header size {} is smaller than the {} byte header",
                common.header_size,
                H::SIZE
            ));
        }

        if common.total_size != length {
            return Err(malformed_error!(
                "Total size {} in header does not match the file size {}",
                common.total_size,
                length
            ));
        }

        if !matches!(
            common.heap_offset().checked_add(common.heap_size_compressed),
            Some(end) if end <= common.total_size
        ) {
            return Err(malformed_error!(
                "Heap at {} with {} bytes exceeds the file size {}",
                common.heap_offset(),
                common.heap_size_compressed,
                common.total_size
            ));
        }

        if common.minor_version > H::MINOR_VERSION {
            warn!(
                "{} file has minor version {}, newest known is {}",
                H::FILE_TYPE,
                common.minor_version,
                H::MINOR_VERSION
            );
        }

        debug!(
            "{} header: version {}.{}, {} bytes, heap at {}",
            H::FILE_TYPE,
            common.version,
            common.minor_version,
            common.total_size,
            common.heap_offset()
        );

        self.file = Some(file.clone());
        self.header = Some(header);
        self.state = ReaderState::HeaderValidated;

        self.heap = Some(self.init_heap_reader(file, &common)?);
        self.state = ReaderState::HeapReady;
        Ok(())
    }

    fn init_heap_reader(&self, file: File, common: &CommonHeader) -> Result<HeapReaderHandle> {
        let raw = RawHeapReader::new(
            file,
            common.heap_compression,
            common.heap_chunk_size,
            common.heap_offset(),
            common.heap_size_compressed,
            common.heap_size_uncompressed,
            &self.options.decompressors,
        )?;

        Ok(if self.options.cache_chunks > 0 {
            HeapReaderHandle::Cached(CachedHeapReader::new(raw, self.options.cache_chunks))
        } else {
            HeapReaderHandle::Raw(raw)
        })
    }

    /// Validates and loads the package attributes section, which is stored at the end of
    /// the file after the heap.
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] if the section violates its bounds, overlaps the heap
    /// or has a broken string table, and [`Error::NoMemory`] if it cannot be allocated.
    pub fn init_package_attributes_section(
        &mut self,
        length: u64,
        strings_length: u64,
        strings_count: u64,
    ) -> Result<()> {
        self.expect_state(&[ReaderState::HeapReady], "loading the package attributes")?;

        match self.load_package_attributes(length, strings_length, strings_count) {
            Ok(()) => {
                self.state = ReaderState::SectionLoaded;
                Ok(())
            }
            Err(error) => Err(self.report_error(error, None)),
        }
    }

    fn load_package_attributes(
        &mut self,
        length: u64,
        strings_length: u64,
        strings_count: u64,
    ) -> Result<()> {
        let (Some(header), Some(file)) = (self.header.as_ref(), self.file.as_ref()) else {
            return Err(Error::InvalidState("no file opened".to_string()));
        };
        let common = header.common();

        let mut section = init_section(
            "package attributes",
            common.total_size,
            length,
            MAX_PACKAGE_ATTRIBUTES_LENGTH,
            strings_length,
            strings_count,
        )?;

        let heap_end = common.heap_offset() + common.heap_size_compressed;
        if section.offset < heap_end {
            return Err(malformed_error!(
                "Package attributes section at {} starts inside the heap ending at {}",
                section.offset,
                heap_end
            ));
        }

        section.load_from_file(file)?;
        self.package_attributes = section;
        Ok(())
    }

    /// Marks the package attributes as handled without walking them.
    ///
    /// # Errors
    /// Returns [`Error::InvalidState`] unless the section is loaded and not parsed yet.
    pub fn skip_package_attributes_section(&mut self) -> Result<()> {
        self.expect_state(&[ReaderState::SectionLoaded], "skipping the package attributes")?;
        self.state = ReaderState::AttributesParsed;
        Ok(())
    }

    /// Walks the package attributes section with `root` as root handler.
    ///
    /// # Errors
    /// Returns any error of the tree walk. The reader is failed afterwards.
    pub fn parse_package_attributes_section(
        &mut self,
        handler: &mut ContentHandlerRef<'_>,
        root: AttributeHandler,
    ) -> Result<()> {
        self.expect_state(&[ReaderState::SectionLoaded], "parsing the package attributes")?;

        let mut section = std::mem::take(&mut self.package_attributes);
        section.current_offset = 0;
        let result = self.walk(&mut section, SectionId::PackageAttributes, handler, root);
        self.package_attributes = section;

        match result {
            Ok(()) => {
                self.state = ReaderState::AttributesParsed;
                Ok(())
            }
            Err(error) => Err(self.report_error(error, Some(handler))),
        }
    }

    /// Validates and loads a heap-backed section ending at the end of the heap.
    ///
    /// # Arguments
    /// * `name` - Label for diagnostics
    /// * `length` - Declared section length
    /// * `max_sane_length` - Upper bound for `length`
    /// * `strings_length` - Size of the trailing string table
    /// * `strings_count` - Number of strings in that table
    ///
    /// # Errors
    /// Returns [`Error::InvalidState`] if the heap reader is detached, and any error of
    /// [`init_section`] and [`Section::load_from_heap`]. Data errors fail the reader.
    pub fn prepare_heap_section(
        &mut self,
        name: &'static str,
        length: u64,
        max_sane_length: u64,
        strings_length: u64,
        strings_count: u64,
    ) -> Result<Section> {
        self.expect_state(
            &[
                ReaderState::HeapReady,
                ReaderState::SectionLoaded,
                ReaderState::AttributesParsed,
            ],
            "loading a heap section",
        )?;
        let heap = self.attached_heap()?;

        let result = init_section(
            name,
            heap.uncompressed_size(),
            length,
            max_sane_length,
            strings_length,
            strings_count,
        )
        .and_then(|mut section| {
            section.load_from_heap(heap)?;
            Ok(section)
        });

        result.map_err(|error| self.report_error(error, None))
    }

    /// Walks `section` with `root` as root handler. Does not change the reader state on
    /// success.
    ///
    /// # Errors
    /// Returns any error of the tree walk. The reader is failed afterwards.
    pub fn parse_section(
        &mut self,
        section: &mut Section,
        section_id: SectionId,
        handler: &mut ContentHandlerRef<'_>,
        root: AttributeHandler,
    ) -> Result<()> {
        if self.state == ReaderState::Failed {
            return Err(Error::InvalidState(format!(
                "parsing the {section_id} section is not possible in state {}",
                self.state
            )));
        }

        self.walk(section, section_id, handler, root)
            .map_err(|error| self.report_error(error, Some(handler)))
    }

    fn walk(
        &mut self,
        section: &mut Section,
        section_id: SectionId,
        handler: &mut ContentHandlerRef<'_>,
        root: AttributeHandler,
    ) -> Result<()> {
        let ignore_unknown_attributes = self.ignore_unknown_attributes();
        let ReaderImplBase {
            options,
            heap,
            handler_stack,
            ..
        } = self;

        handler_stack.clear();
        handler_stack.push(root);

        let mut context = AttributeHandlerContext {
            handler: handler.reborrow(),
            section: section_id,
            ignore_unknown_attributes,
            integer_table: &options.integer_table,
            heap: heap.as_mut().map(|heap| heap as &mut dyn HeapReader),
        };

        parse_attribute_tree(section, &mut context, options.tag_layout, handler_stack)
    }

    fn attached_heap(&mut self) -> Result<&mut HeapReaderHandle> {
        let detached = self.heap_detached;
        self.heap.as_mut().ok_or_else(|| missing_heap(detached))
    }

    /// Reads `range` from the heap.
    ///
    /// # Errors
    /// Returns [`Error::InvalidState`] if the reader failed or the heap reader is detached,
    /// and any error of [`HeapReader::read_ref`].
    pub fn read_heap_data(&mut self, range: HeapRef) -> Result<Vec<u8>> {
        self.expect_state(
            &[
                ReaderState::HeapReady,
                ReaderState::SectionLoaded,
                ReaderState::AttributesParsed,
            ],
            "reading heap data",
        )?;
        self.attached_heap()?.read_ref(range)
    }

    /// Hands the heap reader to the caller. Later heap access through this reader fails
    /// with [`Error::InvalidState`].
    ///
    /// # Errors
    /// Returns [`Error::InvalidState`] if there is no heap reader to detach.
    pub fn detach_heap_reader(&mut self) -> Result<HeapReaderHandle> {
        match self.heap.take() {
            Some(heap) => {
                self.heap_detached = true;
                Ok(heap)
            }
            None => Err(missing_heap(self.heap_detached)),
        }
    }
}

fn missing_heap(detached: bool) -> Error {
    Error::InvalidState(if detached {
        "heap reader has been detached".to_string()
    } else {
        "heap reader not initialized".to_string()
    })
}

impl<H: FileHeader> std::fmt::Debug for ReaderImplBase<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderImplBase")
            .field("state", &self.state)
            .field("header", &self.header)
            .field("heap", &self.heap)
            .field("package_attributes", &self.package_attributes)
            .field("handler_stack", &self.handler_stack.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        format::{PackageHeader, RepositoryHeader},
        reader::context::CollectingErrorOutput,
        test::HeaderFields,
    };

    fn reader(options: ReaderOptions) -> (ReaderImplBase<PackageHeader>, CollectingErrorOutput) {
        let output = CollectingErrorOutput::default();
        (
            ReaderImplBase::with_error_output(options, Box::new(output.clone())),
            output,
        )
    }

    fn image(fields: &HeaderFields, heap: &[u8]) -> Vec<u8> {
        let mut data = fields.to_bytes();
        data.extend(heap);
        data
    }

    fn empty_heap_fields() -> HeaderFields {
        HeaderFields {
            total_size: 80,
            heap_chunk_size: 64 * 1024,
            ..HeaderFields::default()
        }
    }

    #[test]
    fn init_valid() {
        let (mut base, output) = reader(ReaderOptions::default());
        base.init(File::from_mem(image(&empty_heap_fields(), &[])).unwrap())
            .unwrap();

        assert_eq!(base.state(), ReaderState::HeapReady);
        assert_eq!(base.header().unwrap().common.version, 2);
        assert!(base.heap_reader().unwrap().is_cached());
        assert!(!base.ignore_unknown_attributes());
        assert!(output.messages().is_empty());

        // Second init is a usage error and keeps the state
        let error = base
            .init(File::from_mem(image(&empty_heap_fields(), &[])).unwrap())
            .unwrap_err();
        assert!(matches!(error, Error::InvalidState(_)));
        assert_eq!(base.state(), ReaderState::HeapReady);
    }

    #[test]
    fn init_rejects() {
        let cases = [
            HeaderFields {
                magic: 0x6870_6B72,
                ..empty_heap_fields()
            },
            HeaderFields {
                header_size: 40,
                ..empty_heap_fields()
            },
            HeaderFields {
                total_size: 81,
                ..empty_heap_fields()
            },
            HeaderFields {
                heap_size_compressed: 1,
                heap_size_uncompressed: 1,
                ..empty_heap_fields()
            },
        ];

        for fields in cases {
            let (mut base, output) = reader(ReaderOptions::default());
            let error = base
                .init(File::from_mem(image(&fields, &[])).unwrap())
                .unwrap_err();
            assert!(error.is_bad_data(), "{fields:?}: {error}");
            assert_eq!(base.state(), ReaderState::Failed);
            assert_eq!(output.messages().len(), 1);
        }

        let (mut base, _) = reader(ReaderOptions::default());
        let error = base.init(File::from_mem(vec![0; 40]).unwrap()).unwrap_err();
        assert!(error.is_bad_data());
    }

    #[test]
    fn version_mismatch() {
        let fields = HeaderFields {
            version: 1,
            ..empty_heap_fields()
        };

        let (mut base, output) = reader(ReaderOptions::default());
        let error = base
            .init(File::from_mem(image(&fields, &[])).unwrap())
            .unwrap_err();
        assert!(matches!(
            error,
            Error::MismatchedVersion {
                expected: 2,
                found: 1,
                ..
            }
        ));
        assert_eq!(output.messages().len(), 1);

        let (mut base, output) = reader(
            ReaderOptions::default().with_flags(ReaderFlags::DONT_PRINT_VERSION_MISMATCH_MESSAGE),
        );
        let error = base
            .init(File::from_mem(image(&fields, &[])).unwrap())
            .unwrap_err();
        assert!(error.is_version_mismatch());
        assert!(output.messages().is_empty());
        assert_eq!(base.state(), ReaderState::Failed);
    }

    #[test]
    fn newer_minor_is_lenient() {
        let fields = HeaderFields {
            minor_version: 7,
            ..empty_heap_fields()
        };
        let (mut base, _) = reader(ReaderOptions::default().with_cache_chunks(0));
        base.init(File::from_mem(image(&fields, &[])).unwrap())
            .unwrap();
        assert!(base.ignore_unknown_attributes());
        assert!(!base.heap_reader().unwrap().is_cached());

        let (mut base, _) = reader(ReaderOptions::default().with_ignore_unknown_attributes(false));
        base.init(File::from_mem(image(&fields, &[])).unwrap())
            .unwrap();
        assert!(!base.ignore_unknown_attributes());
    }

    #[test]
    fn attributes_inside_heap() {
        let heap = vec![0u8; 16];
        let fields = HeaderFields {
            total_size: 96,
            heap_chunk_size: 1024,
            heap_size_compressed: 16,
            heap_size_uncompressed: 16,
            ..HeaderFields::default()
        };
        let (mut base, output) = reader(ReaderOptions::default());
        base.init(File::from_mem(image(&fields, &heap)).unwrap())
            .unwrap();

        let error = base.init_package_attributes_section(8, 0, 0).unwrap_err();
        assert!(error.is_bad_data());
        assert_eq!(base.state(), ReaderState::Failed);
        assert_eq!(output.messages().len(), 1);

        // Failed readers refuse further work without another diagnostic
        assert!(matches!(
            base.read_heap_data(HeapRef::new(0, 1)),
            Err(Error::InvalidState(_))
        ));
        assert!(base.skip_package_attributes_section().is_err());
        assert_eq!(output.messages().len(), 1);
    }

    #[test]
    fn detach() {
        let heap = (0u8..16).collect::<Vec<_>>();
        let fields = HeaderFields {
            total_size: 96,
            heap_chunk_size: 1024,
            heap_size_compressed: 16,
            heap_size_uncompressed: 16,
            ..HeaderFields::default()
        };
        let (mut base, _) = reader(ReaderOptions::default());
        base.init(File::from_mem(image(&fields, &heap)).unwrap())
            .unwrap();

        assert_eq!(base.read_heap_data(HeapRef::new(4, 3)).unwrap(), vec![4, 5, 6]);

        let mut handle = base.detach_heap_reader().unwrap();
        assert!(base.heap_reader().is_none());
        assert!(matches!(
            base.read_heap_data(HeapRef::new(0, 1)),
            Err(Error::InvalidState(_))
        ));
        assert!(matches!(
            base.detach_heap_reader(),
            Err(Error::InvalidState(_))
        ));

        assert_eq!(handle.read_ref(HeapRef::new(14, 2)).unwrap(), vec![14, 15]);
    }

    #[test]
    fn repository_header() {
        let mut data = vec![0u8; 72];
        data[0..4].copy_from_slice(&0x6870_6B72u32.to_be_bytes());
        data[4..6].copy_from_slice(&72u16.to_be_bytes());
        data[6..8].copy_from_slice(&2u16.to_be_bytes());
        data[8..16].copy_from_slice(&72u64.to_be_bytes());
        data[20..24].copy_from_slice(&1024u32.to_be_bytes());

        let mut base: ReaderImplBase<RepositoryHeader> = ReaderImplBase::new(ReaderOptions::default());
        base.init(File::from_mem(data).unwrap()).unwrap();
        assert_eq!(base.state(), ReaderState::HeapReady);
        assert_eq!(base.header().unwrap().common.header_size, 72);
    }
}
