//! File system entries of the table of contents.

use strum::{Display, FromRepr};

use crate::heap::HeapRef;

/// Kind of a package entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, Display, Default)]
#[repr(u8)]
pub enum FileType {
    /// Regular file.
    #[default]
    #[strum(serialize = "file")]
    File = 0,
    /// Directory.
    #[strum(serialize = "directory")]
    Directory = 1,
    /// Symbolic link.
    #[strum(serialize = "symlink")]
    Symlink = 2,
}

impl FileType {
    /// Permissions an entry of this type gets when the package does not specify any.
    #[must_use]
    pub fn default_permissions(self) -> u32 {
        match self {
            FileType::File => 0o644,
            FileType::Directory => 0o755,
            FileType::Symlink => 0o777,
        }
    }
}

/// A point in time, seconds and nanoseconds since the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Timespec {
    /// Whole seconds.
    pub seconds: u64,
    /// Nanoseconds within the second.
    pub nanos: u32,
}

/// Where the content of an entry or attribute lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataRef {
    /// Stored within the attribute stream.
    Inline(Vec<u8>),
    /// Stored in the heap; read it with [`crate::PackageReader::read_heap_data`].
    Heap(HeapRef),
}

impl DataRef {
    /// Size of the data in bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        match self {
            DataRef::Inline(data) => data.len() as u64,
            DataRef::Heap(heap) => heap.size,
        }
    }

    /// Returns `true` if there is no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A file, directory or symlink in the package.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackageEntry {
    /// Path relative to the package root, `/` separated.
    pub path: String,
    /// Last path component.
    pub name: String,
    /// Entry kind.
    pub file_type: FileType,
    /// Permission bits.
    pub permissions: u32,
    /// Owning user name, if not the default.
    pub user: Option<String>,
    /// Owning group name, if not the default.
    pub group: Option<String>,
    /// Last access time.
    pub access_time: Timespec,
    /// Last modification time.
    pub modified_time: Timespec,
    /// Creation time.
    pub creation_time: Timespec,
    /// File content.
    pub data: Option<DataRef>,
    /// Target of a symlink.
    pub symlink_path: Option<String>,
}

impl PackageEntry {
    /// Returns `true` for directories.
    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.file_type == FileType::Directory
    }
}

/// An extended attribute attached to a package entry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackageEntryAttribute {
    /// Attribute name.
    pub name: String,
    /// Attribute type code.
    pub attribute_type: u32,
    /// Attribute content.
    pub data: Option<DataRef>,
}
