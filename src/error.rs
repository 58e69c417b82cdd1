use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// The variants fall into three groups which callers usually want to tell apart:
///
/// ## Structural errors (the file is corrupt)
/// - [`Error::Malformed`] - bad magic, size-accounting mismatches, overlong varints,
///   unterminated string tables, unknown `(type, encoding)` pairs, unexpected attribute ids
/// - [`Error::MismatchedVersion`] - the file uses a different major format version;
///   this is recoverable in the sense that another reader might understand the file
///
/// ## I/O errors (the source failed)
/// - [`Error::OutOfBounds`] - the byte source ended before the requested data
/// - [`Error::FileError`] - filesystem I/O errors
/// - [`Error::Decompression`] - a heap chunk could not be decompressed
///
/// ## Usage errors
/// - [`Error::InvalidState`] - an operation was called in the wrong reader state
/// - [`Error::NoSource`] - a detached heap reader was used before re-attaching a source
///
/// # Examples
///
/// ```rust,no_run
/// use hpkg::{Error, PackageReader, ReaderOptions};
///
/// match PackageReader::from_file("haiku.hpkg".as_ref(), ReaderOptions::default()) {
///     Ok(_) => println!("Package opened"),
///     Err(e) if e.is_version_mismatch() => println!("Written by a different format version"),
///     Err(Error::Malformed { message, file, line }) => {
///         eprintln!("Corrupt package: {} ({}:{})", message, file, line)
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The file is damaged and could not be parsed.
    ///
    /// The error includes the source location where the malformation was
    /// detected for debugging purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// The file carries a major format version this reader does not understand.
    #[error("Mismatched {file_type} format version - expected {expected}, found {found}")]
    MismatchedVersion {
        /// Kind of file being read ("package", "repository")
        file_type: &'static str,
        /// The version this reader supports
        expected: u16,
        /// The version found in the header
        found: u16,
    },

    /// An out of bound access was attempted while parsing the file.
    ///
    /// Raised whenever a read needs more bytes than the source provides,
    /// including varints that are missing their terminating byte.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// A heap chunk could not be decompressed.
    #[error("Failed to decompress heap chunk with {algorithm}: {message}")]
    Decompression {
        /// Name of the compression algorithm
        algorithm: &'static str,
        /// Message reported by the codec
        message: String,
    },

    /// The requested feature (e.g. a heap compression id) is not supported.
    #[error("Not supported - {0}")]
    NotSupported(String),

    /// An allocation for file-controlled data could not be satisfied.
    #[error("Failed to allocate memory")]
    NoMemory,

    /// A heap reader was used while it had no byte source attached.
    #[error("Heap reader has no attached byte source")]
    NoSource,

    /// The reader is in a state which does not permit this operation.
    #[error("Invalid reader state - {0}")]
    InvalidState(String),

    /// Generic error for miscellaneous failures.
    ///
    /// Content handlers use this to abort a parse with their own message.
    #[error("{0}")]
    Error(String),
}

impl Error {
    /// Returns `true` for structural errors, i.e. the input is corrupt.
    #[must_use]
    pub fn is_bad_data(&self) -> bool {
        matches!(self, Error::Malformed { .. })
    }

    /// Returns `true` if the error was caused by the byte source or a codec,
    /// rather than by the content of the file.
    #[must_use]
    pub fn is_io_error(&self) -> bool {
        matches!(
            self,
            Error::OutOfBounds | Error::FileError(_) | Error::Decompression { .. } | Error::NoSource
        )
    }

    /// Returns `true` if the file uses a different major format version.
    #[must_use]
    pub fn is_version_mismatch(&self) -> bool {
        matches!(self, Error::MismatchedVersion { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let bad = malformed_error!("broken - {}", 42);
        assert!(bad.is_bad_data());
        assert!(!bad.is_io_error());
        assert!(bad.to_string().contains("broken - 42"));

        assert!(out_of_bounds_error!().is_io_error());
        assert!(Error::NoSource.is_io_error());

        let version = Error::MismatchedVersion {
            file_type: "package",
            expected: 2,
            found: 1,
        };
        assert!(version.is_version_mismatch());
        assert!(!version.is_bad_data());
        assert!(!version.is_io_error());
    }
}
