//! Byte sources for package files.
//!
//! The reader never talks to the filesystem directly. Everything goes through the
//! [`Backend`] trait, which exposes bounds-checked random access to an immutable byte
//! region. Two backends are provided:
//!
//! - [`memory::Memory`] - an owned buffer (downloaded packages, tests, fuzzing)
//! - [`physical::Physical`] - a read-only memory mapping of a file on disk
//!
//! [`File`] is a cheap-to-clone handle around a backend. Cloning it shares the
//! underlying mapping, which is what allows a detached heap reader to be re-attached to
//! the same bytes after the reader that created it is gone.
//!
//! # Examples
//!
//! ```rust,no_run
//! use hpkg::File;
//! use std::path::Path;
//!
//! let file = File::from_file(Path::new("haiku.hpkg"))?;
//! let magic = file.data_slice(0, 4)?;
//! assert_eq!(magic, b"hpkg");
//! # Ok::<(), hpkg::Error>(())
//! ```

pub mod io;
pub mod memory;
pub mod parser;
pub mod physical;

use std::{fmt, path::Path, sync::Arc};

use crate::{Error::Empty, Result};
use memory::Memory;
use physical::Physical;

/// Backend trait for file data sources.
///
/// This trait abstracts over the source of package data, allowing for both in-memory and
/// on-disk representations. All implementations must be thread-safe, so that independent
/// readers on different threads can share one source.
pub trait Backend: Send + Sync {
    /// Returns a slice of the data at the given offset and length.
    ///
    /// # Arguments
    ///
    /// * `offset` - The starting offset within the data.
    /// * `len` - The length of the slice in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the requested range is not fully
    /// contained in the source, including when `offset + len` overflows.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]>;

    /// Returns the total length of the data in bytes.
    fn len(&self) -> usize;
}

/// A shared handle to a package byte source.
///
/// # Examples
///
/// ```rust
/// use hpkg::File;
///
/// let file = File::from_mem(b"hpkg\0\0".to_vec())?;
/// assert_eq!(file.len(), 6);
/// assert_eq!(file.data_slice(0, 4)?, b"hpkg");
/// assert!(file.data_slice(4, 8).is_err());
/// # Ok::<(), hpkg::Error>(())
/// ```
#[derive(Clone)]
pub struct File {
    /// The underlying data source (memory or file).
    backend: Arc<dyn Backend>,
}

impl File {
    /// Memory-maps the file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileError`] if the file cannot be opened, or
    /// [`crate::Error::Empty`] if it has no content.
    pub fn from_file(file: &Path) -> Result<File> {
        let input = Physical::new(file)?;

        Self::from_backend(input)
    }

    /// Wraps an in-memory buffer.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Empty`] if the buffer is empty.
    pub fn from_mem(data: Vec<u8>) -> Result<File> {
        let input = Memory::new(data);

        Self::from_backend(input)
    }

    /// Wraps a caller-provided backend.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Empty`] if the backend has no content.
    pub fn from_backend<T: Backend + 'static>(data: T) -> Result<File> {
        if data.len() == 0 {
            return Err(Empty);
        }

        Ok(File {
            backend: Arc::new(data),
        })
    }

    /// Returns the total size of the source in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.backend.len()
    }

    /// Returns `true` if the source has a length of zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.backend.len() == 0
    }

    /// Returns a bounds-checked view into the source.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the range exceeds the source.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.backend.data_slice(offset, len)
    }

    /// Same as [`File::data_slice`], for 64-bit file offsets.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the range exceeds the source or does not
    /// fit into the address space.
    pub fn data_slice_u64(&self, offset: u64, len: u64) -> Result<&[u8]> {
        let offset = usize::try_from(offset).map_err(|_| out_of_bounds_error!())?;
        let len = usize::try_from(len).map_err(|_| out_of_bounds_error!())?;
        self.backend.data_slice(offset, len)
    }
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("File").field("len", &self.len()).finish()
    }
}
