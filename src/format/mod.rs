//! Definitions of the on-disk format: headers, attribute ids and tag layouts.

pub mod attribute;
pub mod header;

pub use attribute::{AttributeId, AttributeType, SectionId, Tag, TagLayout, ValueEncoding};
pub use header::{CommonHeader, FileHeader, PackageHeader, RepositoryHeader};
