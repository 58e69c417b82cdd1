// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
//#![deny(unsafe_code)]
// - 'file/physical.rs' uses mmap to map a file into memory

//! # hpkg
//!
//! [![Crates.io](https://img.shields.io/crates/v/hpkg.svg)](https://crates.io/crates/hpkg)
//! [![Documentation](https://docs.rs/hpkg/badge.svg)](https://docs.rs/hpkg)
//! [![License](https://img.shields.io/badge/license-Apache--2.0-blue.svg)](https://github.com/BinFlip/hpkg/blob/main/LICENSE-APACHE)
//!
//! A strict, streaming reader for Haiku's `.hpkg` package container format, written in pure
//! Rust. `hpkg` validates the file header, serves byte ranges out of the chunked and
//! independently compressed heap, and walks the attribute trees of the package attributes
//! and TOC sections, reporting what it finds to a content handler of your choice.
//!
//! ## Features
//!
//! - **Efficient memory access** - Memory-mapped files, chunk-wise heap decompression
//! - **Strict validation** - Every size, offset, varint and string table is checked
//!   before it is trusted
//! - **Two handler flavours** - Interpreted callbacks ([`PackageContentHandler`]) or raw
//!   attribute events with parent tokens ([`LowLevelPackageHandler`])
//! - **Forward compatible** - Unknown attributes of newer files can be skipped
//! - **Pluggable codecs** - zlib is built in, other heap codecs can be registered
//!
//! ## Quick Start
//!
//! Add `hpkg` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! hpkg = "0.1"
//! ```
//!
//! ### Using the Prelude
//!
//! ```rust,no_run
//! use hpkg::prelude::*;
//!
//! let mut reader = PackageReader::from_file("haiku.hpkg".as_ref(), ReaderOptions::default())?;
//! let info = reader.read_package_info()?;
//! println!("{} ({} requirements)", info.name, info.requires.len());
//! # Ok::<(), hpkg::Error>(())
//! ```
//!
//! ### Walking the Table of Contents
//!
//! ```rust,no_run
//! use hpkg::{PackageContentHandler, PackageEntry, PackageInfoAttribute, PackageReader, ReaderOptions};
//!
//! #[derive(Default)]
//! struct Lister {
//!     paths: Vec<String>,
//! }
//!
//! impl PackageContentHandler for Lister {
//!     fn handle_entry(&mut self, entry: &PackageEntry) -> hpkg::Result<()> {
//!         self.paths.push(entry.path.clone());
//!         Ok(())
//!     }
//!
//!     fn handle_package_attribute(&mut self, _attribute: PackageInfoAttribute) -> hpkg::Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! let mut reader = PackageReader::from_file("haiku.hpkg".as_ref(), ReaderOptions::default())?;
//! let mut lister = Lister::default();
//! reader.parse_content(&mut lister)?;
//! for path in lister.paths {
//!     println!("{path}");
//! }
//! # Ok::<(), hpkg::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`format`] - headers, attribute ids, tag layouts
//! - [`heap`] - chunked heap access, caching and codecs
//! - [`reader`] - the generic reader core: sections, string tables, value decoding and
//!   the attribute tree walk
//! - [`package`] - the package content model, handler interfaces and [`PackageReader`]
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T>`]. Corrupt input surfaces as
//! [`Error::Malformed`], a different major format version as
//! [`Error::MismatchedVersion`] and a failing byte source or codec as one of the I/O
//! flavoured variants; see [`Error`] for the full taxonomy.

#[macro_use]
pub(crate) mod error;
pub(crate) mod file;

/// Shared functionality which is used in unit-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust,no_run
/// use hpkg::prelude::*;
///
/// let mut reader = PackageReader::from_file("haiku.hpkg".as_ref(), ReaderOptions::default())?;
/// let info: PackageInfo = reader.read_package_info()?;
/// # Ok::<(), hpkg::Error>(())
/// ```
pub mod prelude;

/// On-disk format definitions
///
/// - [`format::PackageHeader`] / [`format::RepositoryHeader`] - the fixed file headers
/// - [`format::AttributeId`] - the attribute id catalogue
/// - [`format::TagLayout`] - how attribute tags are packed into the stream
pub mod format;

/// Access to the package heap
///
/// The heap is split into chunks of at most 64 KiB which are compressed independently.
/// [`heap::HeapReader`] serves arbitrary byte ranges, decoding only the chunks involved.
pub mod heap;

/// The generic reader core
///
/// Shared by all file kinds: header validation, section loading, string tables, value
/// decoding, the attribute handler stack and the tree walk.
pub mod reader;

/// Package files
///
/// The content model ([`package::PackageEntry`], [`package::PackageInfoAttribute`]), the
/// handler interfaces and [`PackageReader`].
pub mod package;

/// `hpkg` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `hpkg` Error type
///
/// The main error type for all operations in this crate.
pub use error::Error;

/// Byte sources and the cursor parser
pub use file::{io::BeIO, parser::Parser, Backend, File};

/// Heap access
pub use heap::{
    compression::{CompressionRegistry, Decompressor, HeapCompression},
    HeapReader, HeapReaderHandle, HeapRef,
};

/// Reader configuration and diagnostics
pub use reader::{
    context::{CollectingErrorOutput, ErrorOutput, LogErrorOutput},
    options::{ReaderFlags, ReaderOptions},
    ReaderImplBase, ReaderState,
};

/// Package reading
pub use package::{
    DataRef, FileType, LowLevelPackageHandler, LowLevelToken, PackageContentHandler,
    PackageEntry, PackageEntryAttribute, PackageInfo, PackageInfoAttribute, PackageReader,
    PackageVersion,
};
