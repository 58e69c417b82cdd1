//! Loaded sections.
//!
//! A section is an attribute stream followed by its string table. [`init_section`]
//! validates the declared sizes before anything is allocated; [`Section::load_from_file`]
//! and [`Section::load_from_heap`] then materialise the bytes and index the strings.

use std::ops::Range;

use log::debug;

use crate::{
    file::File,
    heap::HeapReader,
    reader::strings::parse_strings,
    Error, Result,
};

/// A section of a package file, validated and optionally loaded.
#[derive(Debug, Default)]
pub struct Section {
    /// Label used in diagnostics.
    pub name: &'static str,
    /// Start of the section in the file or heap.
    pub offset: u64,
    /// Size of the section, attribute stream plus string table.
    pub uncompressed_length: u64,
    /// The section bytes, empty until loaded.
    pub data: Vec<u8>,
    /// Number of attribute stream bytes consumed so far.
    pub current_offset: usize,
    /// Size of the trailing string table.
    pub strings_length: u64,
    /// Number of strings in the table.
    pub strings_count: u64,
    /// Ranges of the strings within `data`.
    pub strings: Vec<Range<usize>>,
    pub(crate) loaded: bool,
}

/// Validates the sizes of a section ending at `end_offset`.
///
/// # Arguments
/// * `name` - Label for diagnostics
/// * `end_offset` - Offset just past the section, in the file or heap
/// * `length` - Declared section length
/// * `max_sane_length` - Upper bound for `length`
/// * `strings_length` - Size of the trailing string table
/// * `strings_count` - Number of strings in that table
///
/// # Errors
/// Returns [`crate::Error::Malformed`] naming the violated bound.
pub fn init_section(
    name: &'static str,
    end_offset: u64,
    length: u64,
    max_sane_length: u64,
    strings_length: u64,
    strings_count: u64,
) -> Result<Section> {
    if length > max_sane_length {
        return Err(malformed_error!(
            "{} section length {} exceeds the maximum of {}",
            name,
            length,
            max_sane_length
        ));
    }

    if strings_length > length {
        return Err(malformed_error!(
            "{} string table length {} exceeds the section length {}",
            name,
            strings_length,
            length
        ));
    }

    if strings_count > strings_length {
        return Err(malformed_error!(
            "{} string table of {} bytes cannot hold {} strings",
            name,
            strings_length,
            strings_count
        ));
    }

    let Some(offset) = end_offset.checked_sub(length) else {
        return Err(malformed_error!(
            "{} section of {} bytes starts before offset 0 (ends at {})",
            name,
            length,
            end_offset
        ));
    };

    Ok(Section {
        name,
        offset,
        uncompressed_length: length,
        strings_length,
        strings_count,
        ..Section::default()
    })
}

impl Section {
    /// Returns `true` once the section bytes are loaded and indexed.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Length of the attribute stream preceding the string table.
    #[must_use]
    pub fn attributes_length(&self) -> usize {
        self.data
            .len()
            .saturating_sub(self.strings_length as usize)
    }

    /// The attribute stream.
    #[must_use]
    pub fn attributes(&self) -> &[u8] {
        &self.data[..self.attributes_length()]
    }

    /// The string at 0-based `index` of the string table.
    #[must_use]
    pub fn string(&self, index: usize) -> Option<&str> {
        let range = self.strings.get(index)?;
        std::str::from_utf8(self.data.get(range.clone())?).ok()
    }

    fn allocate(&mut self) -> Result<usize> {
        let length = usize::try_from(self.uncompressed_length).map_err(|_| Error::NoMemory)?;
        let mut data = Vec::new();
        data.try_reserve_exact(length)
            .map_err(|_| Error::NoMemory)?;
        data.resize(length, 0);
        self.data = data;
        Ok(length)
    }

    /// Copies the section out of the file.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the file is too short,
    /// [`crate::Error::NoMemory`] if the buffer cannot be allocated and
    /// [`crate::Error::Malformed`] for a broken string table.
    pub fn load_from_file(&mut self, file: &File) -> Result<()> {
        let source = file.data_slice_u64(self.offset, self.uncompressed_length)?;
        self.allocate()?;
        self.data.copy_from_slice(source);
        self.index_strings()
    }

    /// Reads the section out of the heap.
    ///
    /// # Errors
    /// Any error of [`HeapReader::read_data`], [`crate::Error::NoMemory`] if the buffer
    /// cannot be allocated and [`crate::Error::Malformed`] for a broken string table.
    pub fn load_from_heap(&mut self, heap: &mut dyn HeapReader) -> Result<()> {
        if !matches!(
            self.offset.checked_add(self.uncompressed_length),
            Some(end) if end <= heap.uncompressed_size()
        ) {
            return Err(malformed_error!(
                "{} section {}+{} exceeds the heap size {}",
                self.name,
                self.offset,
                self.uncompressed_length,
                heap.uncompressed_size()
            ));
        }

        self.allocate()?;
        heap.read_data(self.offset, &mut self.data)?;
        self.index_strings()
    }

    fn index_strings(&mut self) -> Result<()> {
        let base = self.attributes_length();
        self.strings = parse_strings(&self.data[base..], self.strings_count, base)
            .map_err(|error| match error {
                Error::Malformed { message, file, line } => Error::Malformed {
                    message: format!("{} section: {}", self.name, message),
                    file,
                    line,
                },
                other => other,
            })?;
        self.current_offset = 0;
        self.loaded = true;

        debug!(
            "{} section: {} bytes at {}, {} strings",
            self.name,
            self.uncompressed_length,
            self.offset,
            self.strings.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        heap::{compression::CompressionRegistry, raw::RawHeapReader},
        test::pattern,
    };

    #[test]
    fn bounds() {
        let section = init_section("test", 100, 40, 64, 10, 2).unwrap();
        assert_eq!(section.offset, 60);
        assert_eq!(section.current_offset, 0);
        assert!(!section.is_loaded());

        assert!(init_section("test", 100, 65, 64, 10, 2).unwrap_err().is_bad_data());
        assert!(init_section("test", 100, 40, 64, 41, 2).unwrap_err().is_bad_data());
        assert!(init_section("test", 100, 40, 64, 10, 11).unwrap_err().is_bad_data());
        assert!(init_section("test", 30, 40, 64, 10, 2).unwrap_err().is_bad_data());
    }

    #[test]
    fn load_file() {
        let mut data = vec![0xAA; 16];
        data.extend(b"\x05\x06ab\0cd\0");
        let file = File::from_mem(data).unwrap();

        let mut section = init_section("test", 24, 8, 64, 5, 2).unwrap();
        section.load_from_file(&file).unwrap();

        assert!(section.is_loaded());
        assert_eq!(section.attributes(), &[0x05, 0x06, 0x61]);
        assert_eq!(section.string(0), Some("b"));
        assert_eq!(section.string(1), Some("cd"));
        assert_eq!(section.string(2), None);
    }

    #[test]
    fn load_file_bad_strings() {
        let file = File::from_mem(b"\x01\x02abc".to_vec()).unwrap();

        let mut section = init_section("test", 5, 5, 64, 3, 1).unwrap();
        let error = section.load_from_file(&file).unwrap_err();
        assert!(error.is_bad_data());
        assert!(error.to_string().contains("test section"));
    }

    #[test]
    fn load_file_truncated() {
        let file = File::from_mem(vec![0; 8]).unwrap();
        let mut section = init_section("test", 16, 8, 64, 0, 0).unwrap();
        assert!(matches!(
            section.load_from_file(&file),
            Err(Error::OutOfBounds)
        ));
    }

    #[test]
    fn load_heap() {
        let mut data = pattern(200);
        data.extend(b"\x01\x02x\0");
        let size = data.len() as u64;
        let mut heap = RawHeapReader::new(
            File::from_mem(data).unwrap(),
            0,
            64,
            0,
            size,
            size,
            &CompressionRegistry::empty(),
        )
        .unwrap();

        let mut section = init_section("TOC", size, 4, 1024, 2, 1).unwrap();
        section.load_from_heap(&mut heap).unwrap();
        assert_eq!(section.attributes(), &[0x01, 0x02]);
        assert_eq!(section.string(0), Some("x"));

        let mut section = init_section("TOC", size + 1, 4, 1024, 2, 1).unwrap();
        assert!(section.load_from_heap(&mut heap).unwrap_err().is_bad_data());
    }
}
