//! # hpkg Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the hpkg library. Import this module to get quick access to the essential types
//! for reading package files.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all hpkg operations
pub use crate::Error;

/// The result type used throughout hpkg
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Reader for package files and its configuration
pub use crate::{PackageReader, ReaderFlags, ReaderOptions, ReaderState};

/// Low-level file parsing utilities
pub use crate::{File, Parser};

// ================================================================================================
// Content Handlers
// ================================================================================================

/// Handler interfaces and the ready-made package info collector
pub use crate::package::{
    LowLevelPackageHandler, LowLevelToken, PackageContentHandler, PackageInfo,
};

/// Raw attribute values delivered to low-level handlers
pub use crate::reader::value::{AttributeData, AttributeValue};

/// Diagnostic sinks
pub use crate::reader::context::{CollectingErrorOutput, ErrorOutput, LogErrorOutput};

// ================================================================================================
// Package Content Model
// ================================================================================================

/// File system entries
pub use crate::package::{DataRef, FileType, PackageEntry, PackageEntryAttribute, Timespec};

/// Package metadata
pub use crate::package::{
    GlobalWritableFileInfo, PackageArchitecture, PackageFlags, PackageInfoAttribute,
    PackageVersion, Resolvable, ResolvableExpression, ResolvableOperator, UserInfo,
    UserSettingsFileInfo, WritableFileUpdateType,
};

// ================================================================================================
// Format and Heap
// ================================================================================================

/// Format definitions
pub use crate::format::{AttributeId, PackageHeader, SectionId, TagLayout};

/// Heap access
pub use crate::{CompressionRegistry, HeapReader, HeapReaderHandle, HeapRef};
