//! Package files: the content model, the handler interfaces and the reader.

pub mod content;
pub mod entry;
pub mod info;
pub mod reader;

pub use content::{LowLevelPackageHandler, LowLevelToken, PackageContentHandler, PackageInfo};
pub use entry::{DataRef, FileType, PackageEntry, PackageEntryAttribute, Timespec};
pub use info::{
    GlobalWritableFileInfo, PackageArchitecture, PackageFlags, PackageInfoAttribute,
    PackageVersion, Resolvable, ResolvableExpression, ResolvableOperator, UserInfo,
    UserSettingsFileInfo, WritableFileUpdateType,
};
pub use reader::PackageReader;
