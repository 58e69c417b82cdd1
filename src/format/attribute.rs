//! Attribute ids, value types and tag layouts.
//!
//! Every section is a tree of attributes. Each attribute starts with a tag carrying its id,
//! its value type, the encoding of the value and whether child attributes follow. How
//! these are packed is described by a [`TagLayout`]:
//!
//! - [`TagLayout::Composed`] packs everything into one LEB128 value:
//!   `tag = ((encoding << 11) | (has_children << 10) | (type << 7) | id) + 1`, with a 3 bit
//!   encoding field and `0` closing the current level.
//! - [`TagLayout::Split`] stores `((id << 1) | has_children) + 2` as LEB128 followed by the
//!   type and encoding bytes; `0` closes the current level and `1` ends the stream.

use strum::{Display, EnumCount, EnumIter, FromRepr};

use crate::{file::parser::Parser, Result};

/// Attribute ids known to the format.
#[allow(missing_docs)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, FromRepr, Display, EnumIter, EnumCount,
)]
#[repr(u8)]
pub enum AttributeId {
    #[strum(serialize = "dir:entry")]
    DirectoryEntry = 0,
    #[strum(serialize = "file:type")]
    FileType = 1,
    #[strum(serialize = "file:permissions")]
    FilePermissions = 2,
    #[strum(serialize = "file:user")]
    FileUser = 3,
    #[strum(serialize = "file:group")]
    FileGroup = 4,
    #[strum(serialize = "file:atime")]
    FileAtime = 5,
    #[strum(serialize = "file:mtime")]
    FileMtime = 6,
    #[strum(serialize = "file:crtime")]
    FileCrtime = 7,
    #[strum(serialize = "file:atime:nanos")]
    FileAtimeNanos = 8,
    #[strum(serialize = "file:mtime:nanos")]
    FileMtimeNanos = 9,
    #[strum(serialize = "file:crtime:nanos")]
    FileCrtimeNanos = 10,
    #[strum(serialize = "file:attribute")]
    FileAttribute = 11,
    #[strum(serialize = "file:attribute:type")]
    FileAttributeType = 12,
    #[strum(serialize = "data")]
    Data = 13,
    #[strum(serialize = "symlink:path")]
    SymlinkPath = 14,
    #[strum(serialize = "package:name")]
    PackageName = 15,
    #[strum(serialize = "package:summary")]
    PackageSummary = 16,
    #[strum(serialize = "package:description")]
    PackageDescription = 17,
    #[strum(serialize = "package:vendor")]
    PackageVendor = 18,
    #[strum(serialize = "package:packager")]
    PackagePackager = 19,
    #[strum(serialize = "package:flags")]
    PackageFlags = 20,
    #[strum(serialize = "package:architecture")]
    PackageArchitecture = 21,
    #[strum(serialize = "package:version.major")]
    PackageVersionMajor = 22,
    #[strum(serialize = "package:version.minor")]
    PackageVersionMinor = 23,
    #[strum(serialize = "package:version.micro")]
    PackageVersionMicro = 24,
    #[strum(serialize = "package:version.revision")]
    PackageVersionRevision = 25,
    #[strum(serialize = "package:copyright")]
    PackageCopyright = 26,
    #[strum(serialize = "package:license")]
    PackageLicense = 27,
    #[strum(serialize = "package:provides")]
    PackageProvides = 28,
    #[strum(serialize = "package:requires")]
    PackageRequires = 29,
    #[strum(serialize = "package:supplements")]
    PackageSupplements = 30,
    #[strum(serialize = "package:conflicts")]
    PackageConflicts = 31,
    #[strum(serialize = "package:freshens")]
    PackageFreshens = 32,
    #[strum(serialize = "package:replaces")]
    PackageReplaces = 33,
    #[strum(serialize = "package:resolvable.operator")]
    PackageResolvableOperator = 34,
    #[strum(serialize = "package:checksum")]
    PackageChecksum = 35,
    #[strum(serialize = "package:version.prerelease")]
    PackageVersionPreRelease = 36,
    #[strum(serialize = "package:provides.compatible")]
    PackageProvidesCompatible = 37,
    #[strum(serialize = "package:url")]
    PackageUrl = 38,
    #[strum(serialize = "package:source-url")]
    PackageSourceUrl = 39,
    #[strum(serialize = "package:install-path")]
    PackageInstallPath = 40,
    #[strum(serialize = "package:base-package")]
    PackageBasePackage = 41,
    #[strum(serialize = "package:global-writable-file")]
    PackageGlobalWritableFile = 42,
    #[strum(serialize = "package:user-settings-file")]
    PackageUserSettingsFile = 43,
    #[strum(serialize = "package:writable-file-update-type")]
    PackageWritableFileUpdateType = 44,
    #[strum(serialize = "package:settings-file-template")]
    PackageSettingsFileTemplate = 45,
    #[strum(serialize = "package:user")]
    PackageUser = 46,
    #[strum(serialize = "package:user.real-name")]
    PackageUserRealName = 47,
    #[strum(serialize = "package:user.home")]
    PackageUserHome = 48,
    #[strum(serialize = "package:user.shell")]
    PackageUserShell = 49,
    #[strum(serialize = "package:user.group")]
    PackageUserGroup = 50,
    #[strum(serialize = "package:group")]
    PackageGroup = 51,
    #[strum(serialize = "package:post-install-script")]
    PackagePostInstallScript = 52,
    #[strum(serialize = "package:is-writable-directory")]
    PackageIsWritableDirectory = 53,
    #[strum(serialize = "package")]
    Package = 54,
    #[strum(serialize = "package:pre-uninstall-script")]
    PackagePreUninstallScript = 55,
}

/// Value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, Display)]
#[repr(u8)]
pub enum AttributeType {
    /// Signed integer.
    #[strum(serialize = "int")]
    Int = 1,
    /// Unsigned integer.
    #[strum(serialize = "uint")]
    Uint = 2,
    /// UTF-8 string.
    #[strum(serialize = "string")]
    String = 3,
    /// Opaque bytes.
    #[strum(serialize = "raw")]
    Raw = 4,
}

/// How a value of a given [`AttributeType`] is stored in the attribute stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueEncoding {
    /// Big-endian integer of the given width in bytes (1, 2, 4 or 8).
    Fixed(u8),
    /// LEB128 integer.
    Varint,
    /// LEB128 index into the integer side table.
    IntegerTable,
    /// LEB128 length followed by the bytes.
    Inline,
    /// LEB128 1-based string table index; `0` means an inline payload follows.
    StringTable,
    /// LEB128 heap offset followed by LEB128 length.
    Heap,
}

impl ValueEncoding {
    /// Resolves the raw encoding byte for a value type.
    ///
    /// Returns `None` for combinations the format does not define.
    #[must_use]
    pub fn resolve(value_type: AttributeType, encoding: u8) -> Option<ValueEncoding> {
        match (value_type, encoding) {
            (AttributeType::Int | AttributeType::Uint, 0..=3) => {
                Some(ValueEncoding::Fixed(1 << encoding))
            }
            (AttributeType::Int | AttributeType::Uint, 4) => Some(ValueEncoding::Varint),
            (AttributeType::Int | AttributeType::Uint, 5) => Some(ValueEncoding::IntegerTable),
            (AttributeType::String, 0) | (AttributeType::Raw, 0) => Some(ValueEncoding::Inline),
            (AttributeType::String, 1) | (AttributeType::Raw, 2) => {
                Some(ValueEncoding::StringTable)
            }
            (AttributeType::String, 2) | (AttributeType::Raw, 1) => Some(ValueEncoding::Heap),
            _ => None,
        }
    }
}

/// The attribute sections of a package file, as reported to low-level handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, Display)]
#[repr(u8)]
pub enum SectionId {
    /// The table of contents.
    #[strum(serialize = "TOC")]
    Toc = 2,
    /// The package attributes.
    #[strum(serialize = "package attributes")]
    PackageAttributes = 3,
}

/// One decoded attribute tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// The current level ends.
    EndOfLevel,
    /// The attribute stream ends.
    EndOfStream,
    /// An attribute follows.
    Attribute {
        /// Raw attribute id.
        id: u8,
        /// Raw value type.
        value_type: u8,
        /// Raw value encoding.
        encoding: u8,
        /// Whether child attributes follow the value.
        has_children: bool,
    },
}

/// Bit layout of attribute tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TagLayout {
    /// A single LEB128 value per tag.
    #[default]
    Composed,
    /// A LEB128 id/children value followed by type and encoding bytes.
    Split,
}

impl TagLayout {
    /// Reads the next tag from `parser`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] on truncated input and
    /// [`crate::Error::Malformed`] if the tag carries bits the layout does not define.
    pub fn read_tag(self, parser: &mut Parser<'_>) -> Result<Tag> {
        let start = parser.pos();
        let value = parser.read_unsigned_leb128()?;

        match self {
            TagLayout::Composed => {
                if value == 0 {
                    return Ok(Tag::EndOfLevel);
                }

                let tag = value - 1;
                if tag >> 14 != 0 {
                    return Err(malformed_error!(
                        "Invalid attribute tag {:#x} at offset {}",
                        value,
                        start
                    ));
                }

                Ok(Tag::Attribute {
                    id: (tag & 0x7F) as u8,
                    value_type: ((tag >> 7) & 0x7) as u8,
                    encoding: ((tag >> 11) & 0x7) as u8,
                    has_children: (tag >> 10) & 0x1 != 0,
                })
            }
            TagLayout::Split => match value {
                0 => Ok(Tag::EndOfLevel),
                1 => Ok(Tag::EndOfStream),
                _ => {
                    let tag = value - 2;
                    let Ok(id) = u8::try_from(tag >> 1) else {
                        return Err(malformed_error!(
                            "Invalid attribute tag {:#x} at offset {}",
                            value,
                            start
                        ));
                    };
                    let value_type = parser.read_u8()?;
                    let encoding = parser.read_u8()?;

                    Ok(Tag::Attribute {
                        id,
                        value_type,
                        encoding,
                        has_children: tag & 0x1 != 0,
                    })
                }
            },
        }
    }
}
