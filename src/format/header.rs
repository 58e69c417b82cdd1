//! Fixed file headers.
//!
//! Package (`hpkg`) and repository (`hpkr`) files start with a big-endian header sharing
//! a common prefix: magic, header size, version, total size, minor version and the heap
//! description. [`FileHeader`] abstracts over the two layouts so the reader core can
//! validate either one.
//!
//! # Package header layout
//!
//! | Offset | Field                        | Type  |
//! |--------|------------------------------|-------|
//! | 0      | magic (`hpkg`)               | `u32` |
//! | 4      | header size                  | `u16` |
//! | 6      | version                      | `u16` |
//! | 8      | total size                   | `u64` |
//! | 16     | minor version                | `u16` |
//! | 18     | heap compression             | `u16` |
//! | 20     | heap chunk size              | `u32` |
//! | 24     | heap size (compressed)       | `u64` |
//! | 32     | heap size (uncompressed)     | `u64` |
//! | 40     | attributes length            | `u32` |
//! | 44     | attributes strings length    | `u32` |
//! | 48     | attributes strings count     | `u32` |
//! | 52     | reserved                     | `u32` |
//! | 56     | TOC length                   | `u64` |
//! | 64     | TOC strings length           | `u64` |
//! | 72     | TOC strings count            | `u64` |

use std::fmt;

use crate::{file::io::read_be_at, Result};

/// Header layout of a file type the reader core can open.
pub trait FileHeader: Sized + fmt::Debug {
    /// Size of the header structure in bytes.
    const SIZE: usize;
    /// Magic number at offset 0.
    const MAGIC: u32;
    /// The major version this reader understands.
    const VERSION: u16;
    /// The newest minor version this reader knows about.
    const MINOR_VERSION: u16;
    /// Name used in diagnostics.
    const FILE_TYPE: &'static str;

    /// Decodes the header from the first [`FileHeader::SIZE`] bytes of `data`.
    ///
    /// No validation beyond the length of `data` happens here.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `data` is too short.
    fn read(data: &[u8]) -> Result<Self>;

    /// The fields shared by all layouts.
    fn common(&self) -> &CommonHeader;
}

/// Fields at the start of every header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommonHeader {
    /// Magic number.
    pub magic: u32,
    /// Size of the header; the heap starts right after it.
    pub header_size: u16,
    /// Major format version.
    pub version: u16,
    /// Size of the whole file.
    pub total_size: u64,
    /// Minor format version.
    pub minor_version: u16,
    /// Heap compression id.
    pub heap_compression: u16,
    /// Uncompressed size of a heap chunk.
    pub heap_chunk_size: u32,
    /// Stored size of the heap.
    pub heap_size_compressed: u64,
    /// Logical size of the heap.
    pub heap_size_uncompressed: u64,
}

impl CommonHeader {
    /// Size of the common prefix.
    pub const SIZE: usize = 40;

    fn read(data: &[u8], offset: &mut usize) -> Result<Self> {
        Ok(CommonHeader {
            magic: read_be_at(data, offset)?,
            header_size: read_be_at(data, offset)?,
            version: read_be_at(data, offset)?,
            total_size: read_be_at(data, offset)?,
            minor_version: read_be_at(data, offset)?,
            heap_compression: read_be_at(data, offset)?,
            heap_chunk_size: read_be_at(data, offset)?,
            heap_size_compressed: read_be_at(data, offset)?,
            heap_size_uncompressed: read_be_at(data, offset)?,
        })
    }

    /// Absolute offset of the heap.
    #[must_use]
    pub fn heap_offset(&self) -> u64 {
        u64::from(self.header_size)
    }
}

/// Header of a package file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PackageHeader {
    /// Shared prefix.
    pub common: CommonHeader,
    /// Length of the package attributes section.
    pub attributes_length: u32,
    /// Length of the string table trailing the package attributes.
    pub attributes_strings_length: u32,
    /// Number of strings in that table.
    pub attributes_strings_count: u32,
    /// Length of the TOC section at the end of the heap.
    pub toc_length: u64,
    /// Length of the string table trailing the TOC.
    pub toc_strings_length: u64,
    /// Number of strings in that table.
    pub toc_strings_count: u64,
}

impl FileHeader for PackageHeader {
    const SIZE: usize = 80;
    const MAGIC: u32 = 0x6870_6B67;
    const VERSION: u16 = 2;
    const MINOR_VERSION: u16 = 1;
    const FILE_TYPE: &'static str = "package";

    fn read(data: &[u8]) -> Result<Self> {
        let mut offset = 0;
        let common = CommonHeader::read(data, &mut offset)?;

        let attributes_length = read_be_at(data, &mut offset)?;
        let attributes_strings_length = read_be_at(data, &mut offset)?;
        let attributes_strings_count = read_be_at(data, &mut offset)?;
        let _reserved: u32 = read_be_at(data, &mut offset)?;

        Ok(PackageHeader {
            common,
            attributes_length,
            attributes_strings_length,
            attributes_strings_count,
            toc_length: read_be_at(data, &mut offset)?,
            toc_strings_length: read_be_at(data, &mut offset)?,
            toc_strings_count: read_be_at(data, &mut offset)?,
        })
    }

    fn common(&self) -> &CommonHeader {
        &self.common
    }
}

/// Header of a repository file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RepositoryHeader {
    /// Shared prefix.
    pub common: CommonHeader,
    /// Length of the repository info section.
    pub info_length: u32,
    /// Length of the packages section.
    pub packages_length: u64,
    /// Length of the string table trailing the packages section.
    pub packages_strings_length: u64,
    /// Number of strings in that table.
    pub packages_strings_count: u64,
}

impl FileHeader for RepositoryHeader {
    const SIZE: usize = 72;
    const MAGIC: u32 = 0x6870_6B72;
    const VERSION: u16 = 2;
    const MINOR_VERSION: u16 = 0;
    const FILE_TYPE: &'static str = "repository";

    fn read(data: &[u8]) -> Result<Self> {
        let mut offset = 0;
        let common = CommonHeader::read(data, &mut offset)?;

        let info_length = read_be_at(data, &mut offset)?;
        let _reserved: u32 = read_be_at(data, &mut offset)?;

        Ok(RepositoryHeader {
            common,
            info_length,
            packages_length: read_be_at(data, &mut offset)?,
            packages_strings_length: read_be_at(data, &mut offset)?,
            packages_strings_count: read_be_at(data, &mut offset)?,
        })
    }

    fn common(&self) -> &CommonHeader {
        &self.common
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{test::HeaderFields, Error};

    #[test]
    fn package_header() {
        let fields = HeaderFields {
            header_size: 80,
            total_size: 0x1234,
            heap_compression: 1,
            heap_chunk_size: 0x1_0000,
            heap_size_compressed: 0x100,
            heap_size_uncompressed: 0x200,
            attributes_length: 33,
            attributes_strings_length: 8,
            attributes_strings_count: 2,
            toc_length: 0x40,
            toc_strings_length: 5,
            toc_strings_count: 1,
            ..HeaderFields::default()
        };
        let bytes = fields.to_bytes();
        assert_eq!(bytes.len(), PackageHeader::SIZE);

        let header = PackageHeader::read(&bytes).unwrap();
        assert_eq!(header.common.magic, PackageHeader::MAGIC);
        assert_eq!(header.common.version, 2);
        assert_eq!(header.common.minor_version, 1);
        assert_eq!(header.common.header_size, 80);
        assert_eq!(header.common.total_size, 0x1234);
        assert_eq!(header.common.heap_compression, 1);
        assert_eq!(header.common.heap_chunk_size, 0x1_0000);
        assert_eq!(header.common.heap_size_compressed, 0x100);
        assert_eq!(header.common.heap_size_uncompressed, 0x200);
        assert_eq!(header.common().heap_offset(), 80);
        assert_eq!(header.attributes_length, 33);
        assert_eq!(header.attributes_strings_length, 8);
        assert_eq!(header.attributes_strings_count, 2);
        assert_eq!(header.toc_length, 0x40);
        assert_eq!(header.toc_strings_length, 5);
        assert_eq!(header.toc_strings_count, 1);
    }

    #[test]
    fn repository_header() {
        let mut bytes = vec![0_u8; RepositoryHeader::SIZE];
        bytes[0..4].copy_from_slice(b"hpkr");
        bytes[4..6].copy_from_slice(&72_u16.to_be_bytes());
        bytes[6..8].copy_from_slice(&2_u16.to_be_bytes());
        bytes[40..44].copy_from_slice(&17_u32.to_be_bytes());
        bytes[48..56].copy_from_slice(&99_u64.to_be_bytes());
        bytes[64..72].copy_from_slice(&3_u64.to_be_bytes());

        let header = RepositoryHeader::read(&bytes).unwrap();
        assert_eq!(header.common.magic, RepositoryHeader::MAGIC);
        assert_eq!(header.common.header_size, 72);
        assert_eq!(header.info_length, 17);
        assert_eq!(header.packages_length, 99);
        assert_eq!(header.packages_strings_count, 3);
    }

    #[test]
    fn truncated() {
        let bytes = HeaderFields::default().to_bytes();
        assert!(matches!(
            PackageHeader::read(&bytes[..79]),
            Err(Error::OutOfBounds)
        ));
        assert!(matches!(
            RepositoryHeader::read(&bytes[..CommonHeader::SIZE]),
            Err(Error::OutOfBounds)
        ));
    }
}
