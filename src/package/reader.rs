//! Reader for `.hpkg` package files.

use std::path::Path;

use crate::{
    file::File,
    format::{PackageHeader, SectionId},
    heap::{HeapReaderHandle, HeapRef},
    package::{
        content::{LowLevelPackageHandler, PackageContentHandler, PackageInfo},
        entry::DataRef,
    },
    reader::{
        context::{ContentHandlerRef, ErrorOutput},
        handlers::AttributeHandler,
        options::ReaderOptions,
        ReaderImplBase, ReaderState, MAX_TOC_LENGTH,
    },
    Result,
};

/// Reads the package attributes and the TOC of a package file.
///
/// # Examples
///
/// ```rust,no_run
/// use hpkg::{PackageReader, ReaderOptions};
///
/// let mut reader = PackageReader::from_file("haiku.hpkg".as_ref(), ReaderOptions::default())?;
/// let info = reader.read_package_info()?;
/// println!("{} {}", info.name, info.version.map(|v| v.to_string()).unwrap_or_default());
/// # Ok::<(), hpkg::Error>(())
/// ```
#[derive(Debug)]
pub struct PackageReader {
    base: ReaderImplBase<PackageHeader>,
}

impl PackageReader {
    /// Creates an unopened reader.
    #[must_use]
    pub fn new(options: ReaderOptions) -> Self {
        PackageReader {
            base: ReaderImplBase::new(options),
        }
    }

    /// Creates an unopened reader printing diagnostics to `error_output`.
    #[must_use]
    pub fn with_error_output(options: ReaderOptions, error_output: Box<dyn ErrorOutput>) -> Self {
        PackageReader {
            base: ReaderImplBase::with_error_output(options, error_output),
        }
    }

    /// Opens the package at `path`.
    ///
    /// # Errors
    /// Returns any error of [`PackageReader::open`].
    pub fn from_file(path: &Path, options: ReaderOptions) -> Result<Self> {
        let mut reader = PackageReader::new(options);
        reader.open(path)?;
        Ok(reader)
    }

    /// Opens a package held in memory.
    ///
    /// # Errors
    /// Returns [`crate::Error::Empty`] for empty input and any error of
    /// [`PackageReader::init`].
    pub fn from_mem(data: Vec<u8>, options: ReaderOptions) -> Result<Self> {
        let mut reader = PackageReader::new(options);
        reader.init(File::from_mem(data)?)?;
        Ok(reader)
    }

    /// Memory-maps the file at `path` and initializes the reader with it.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened and any error of
    /// [`PackageReader::init`].
    pub fn open(&mut self, path: &Path) -> Result<()> {
        self.base.expect_state(&[ReaderState::Unopened], "open")?;

        match File::from_file(path) {
            Ok(file) => self.init(file),
            Err(error) => Err(self.base.report_error(error, None)),
        }
    }

    /// Validates the header of `file`, sets up the heap reader and loads the package
    /// attributes section.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for a corrupt header or attributes section,
    /// [`crate::Error::MismatchedVersion`] for a different major format version and any
    /// error of the heap setup.
    pub fn init(&mut self, file: File) -> Result<()> {
        self.base.init(file)?;

        let Some(header) = self.base.header().copied() else {
            return Ok(());
        };
        self.base.init_package_attributes_section(
            u64::from(header.attributes_length),
            u64::from(header.attributes_strings_length),
            u64::from(header.attributes_strings_count),
        )
    }

    /// The validated header.
    #[must_use]
    pub fn header(&self) -> Option<&PackageHeader> {
        self.base.header()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ReaderState {
        self.base.state()
    }

    /// The shared reader core.
    #[must_use]
    pub fn base(&self) -> &ReaderImplBase<PackageHeader> {
        &self.base
    }

    /// Number of handlers left on the attribute handler stack.
    #[must_use]
    pub fn attribute_handler_depth(&self) -> usize {
        self.base.attribute_handler_depth()
    }

    /// Reports the package attributes to `handler`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for a corrupt attribute tree, and any error of
    /// `handler`.
    pub fn parse_package_attributes(
        &mut self,
        handler: &mut dyn PackageContentHandler,
    ) -> Result<()> {
        let mut handler = ContentHandlerRef::Package(handler);
        self.base
            .parse_package_attributes_section(&mut handler, AttributeHandler::PackageAttributes)
    }

    /// Reports the package attributes and then every TOC entry to `handler`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for a corrupt attribute tree, any heap error
    /// while loading the TOC, and any error of `handler`.
    pub fn parse_content(&mut self, handler: &mut dyn PackageContentHandler) -> Result<()> {
        let mut handler = ContentHandlerRef::Package(handler);
        self.base
            .parse_package_attributes_section(&mut handler, AttributeHandler::PackageAttributes)?;
        self.parse_toc(&mut handler, AttributeHandler::Toc)
    }

    /// Reports the raw attribute trees of the package attributes and the TOC to
    /// `handler`. Sections for which `handle_section_start` returns `true` are skipped.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for a corrupt attribute tree, any heap error
    /// while loading the TOC, and any error of `handler`.
    pub fn parse_content_low_level(
        &mut self,
        handler: &mut dyn LowLevelPackageHandler,
    ) -> Result<()> {
        let mut handler = ContentHandlerRef::LowLevel(handler);

        if self.section_start(&mut handler, SectionId::PackageAttributes)? {
            self.base.skip_package_attributes_section()?;
        } else {
            self.base
                .parse_package_attributes_section(&mut handler, AttributeHandler::low_level())?;
            self.section_end(&mut handler, SectionId::PackageAttributes)?;
        }

        if !self.section_start(&mut handler, SectionId::Toc)? {
            self.parse_toc(&mut handler, AttributeHandler::low_level())?;
            self.section_end(&mut handler, SectionId::Toc)?;
        }
        Ok(())
    }

    fn section_start(&mut self, handler: &mut ContentHandlerRef<'_>, section: SectionId) -> Result<bool> {
        let result = match handler {
            ContentHandlerRef::LowLevel(low_level) => low_level.handle_section_start(section),
            ContentHandlerRef::Package(_) => Ok(false),
        };
        result.map_err(|error| self.base.report_error(error, Some(handler)))
    }

    fn section_end(&mut self, handler: &mut ContentHandlerRef<'_>, section: SectionId) -> Result<()> {
        let result = match handler {
            ContentHandlerRef::LowLevel(low_level) => low_level.handle_section_end(section),
            ContentHandlerRef::Package(_) => Ok(()),
        };
        result.map_err(|error| self.base.report_error(error, Some(handler)))
    }

    fn parse_toc(&mut self, handler: &mut ContentHandlerRef<'_>, root: AttributeHandler) -> Result<()> {
        let Some(header) = self.base.header().copied() else {
            return Ok(());
        };
        if header.toc_length == 0 {
            return Ok(());
        }

        let mut section = self.base.prepare_heap_section(
            "TOC",
            header.toc_length,
            MAX_TOC_LENGTH,
            header.toc_strings_length,
            header.toc_strings_count,
        )?;
        self.base
            .parse_section(&mut section, SectionId::Toc, handler, root)
    }

    /// Collects the package attributes into a [`PackageInfo`].
    ///
    /// # Errors
    /// Returns any error of [`PackageReader::parse_package_attributes`].
    pub fn read_package_info(&mut self) -> Result<PackageInfo> {
        let mut info = PackageInfo::default();
        self.parse_package_attributes(&mut info)?;
        Ok(info)
    }

    /// Reads `range` from the heap.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidState`] if the heap reader is detached or the reader
    /// failed, and any heap error.
    pub fn read_heap_data(&mut self, range: HeapRef) -> Result<Vec<u8>> {
        self.base.read_heap_data(range)
    }

    /// Materialises the content of an entry or extended attribute.
    ///
    /// # Errors
    /// Returns any error of [`PackageReader::read_heap_data`] for heap-stored data.
    pub fn read_data(&mut self, data: &DataRef) -> Result<Vec<u8>> {
        match data {
            DataRef::Inline(bytes) => Ok(bytes.clone()),
            DataRef::Heap(range) => self.read_heap_data(*range),
        }
    }

    /// Hands the heap reader to the caller, e.g. to extract file data after the reader is
    /// gone. The handle keeps the byte source alive until its source is detached.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidState`] if there is no heap reader to detach.
    pub fn detach_heap_reader(&mut self) -> Result<HeapReaderHandle> {
        self.base.detach_heap_reader()
    }
}
