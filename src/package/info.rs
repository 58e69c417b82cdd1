//! Package metadata as stored in the package attributes section.
//!
//! Every top-level attribute of that section is reported to a content handler as one
//! [`PackageInfoAttribute`]. Compound attributes (versions, resolvables, users, writable
//! file declarations) arrive fully assembled, after all their child attributes have been
//! read.

use std::fmt;

use bitflags::bitflags;
use strum::{Display, FromRepr};

/// A package version: `major[.minor[.micro]][~pre_release][-revision]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct PackageVersion {
    /// Major part.
    pub major: String,
    /// Minor part, may be empty.
    pub minor: String,
    /// Micro part, may be empty.
    pub micro: String,
    /// Pre-release tag, may be empty.
    pub pre_release: String,
    /// Package revision, `0` if not set.
    pub revision: u32,
}

impl PackageVersion {
    /// Creates a version with only the major part set.
    #[must_use]
    pub fn new(major: impl Into<String>) -> Self {
        PackageVersion {
            major: major.into(),
            ..PackageVersion::default()
        }
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.major)?;
        if !self.minor.is_empty() {
            write!(f, ".{}", self.minor)?;
            if !self.micro.is_empty() {
                write!(f, ".{}", self.micro)?;
            }
        }
        if !self.pre_release.is_empty() {
            write!(f, "~{}", self.pre_release)?;
        }
        if self.revision > 0 {
            write!(f, "-{}", self.revision)?;
        }
        Ok(())
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Package flags
    pub struct PackageFlags: u32 {
        /// The user has to approve the license before installation
        const APPROVE_LICENSE = 0x0001;
        /// The package belongs to the system
        const SYSTEM_PACKAGE = 0x0002;
    }
}

/// Target architecture of a package.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, Display)]
#[repr(u8)]
pub enum PackageArchitecture {
    #[strum(serialize = "any")]
    Any = 0,
    #[strum(serialize = "x86")]
    X86 = 1,
    #[strum(serialize = "x86_gcc2")]
    X86Gcc2 = 2,
    #[strum(serialize = "source")]
    Source = 3,
    #[strum(serialize = "x86_64")]
    X86_64 = 4,
    #[strum(serialize = "ppc")]
    Ppc = 5,
    #[strum(serialize = "arm")]
    Arm = 6,
    #[strum(serialize = "m68k")]
    M68k = 7,
    #[strum(serialize = "sparc")]
    Sparc = 8,
    #[strum(serialize = "arm64")]
    Arm64 = 9,
    #[strum(serialize = "riscv64")]
    Riscv64 = 10,
}

/// Comparison operator of a resolvable expression.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, Display)]
#[repr(u8)]
pub enum ResolvableOperator {
    #[strum(serialize = "<")]
    Less = 0,
    #[strum(serialize = "<=")]
    LessEqual = 1,
    #[strum(serialize = "==")]
    Equal = 2,
    #[strum(serialize = "!=")]
    NotEqual = 3,
    #[strum(serialize = ">=")]
    GreaterEqual = 4,
    #[strum(serialize = ">")]
    Greater = 5,
}

/// Something a package provides.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Resolvable {
    /// Name of the resolvable.
    pub name: String,
    /// Provided version.
    pub version: Option<PackageVersion>,
    /// Oldest version the provided one is compatible with.
    pub compatible_version: Option<PackageVersion>,
}

/// A versioned reference to a resolvable (requires, supplements, conflicts, freshens).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvableExpression {
    /// Name of the resolvable.
    pub name: String,
    /// Version comparison, if versioned.
    pub operator: Option<ResolvableOperator>,
    /// Version to compare with, if versioned.
    pub version: Option<PackageVersion>,
}

impl fmt::Display for ResolvableExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let (Some(operator), Some(version)) = (&self.operator, &self.version) {
            write!(f, " {} {}", operator, version)?;
        }
        Ok(())
    }
}

/// What happens to a modified writable file on package update.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, Display)]
#[repr(u8)]
pub enum WritableFileUpdateType {
    #[strum(serialize = "keep-old")]
    KeepOld = 0,
    #[strum(serialize = "manual")]
    Manual = 1,
    #[strum(serialize = "auto-merge")]
    AutoMerge = 2,
}

/// A writable file or directory the package installs system-wide.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GlobalWritableFileInfo {
    /// Installation-relative path.
    pub path: String,
    /// Update policy; `None` if the file is not included in the package.
    pub update_type: Option<WritableFileUpdateType>,
    /// Whether the path denotes a directory.
    pub is_directory: bool,
}

/// A per-user settings file the package uses.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserSettingsFileInfo {
    /// Settings-relative path.
    pub path: String,
    /// Template to create the file from.
    pub template_path: Option<String>,
    /// Whether the path denotes a directory.
    pub is_directory: bool,
}

/// A user account the package needs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserInfo {
    /// Login name.
    pub name: String,
    /// Full name.
    pub real_name: Option<String>,
    /// Home directory.
    pub home: Option<String>,
    /// Login shell.
    pub shell: Option<String>,
    /// Supplementary groups.
    pub groups: Vec<String>,
}

/// One top-level attribute of the package attributes section.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageInfoAttribute {
    Name(String),
    Summary(String),
    Description(String),
    Vendor(String),
    Packager(String),
    BasePackage(String),
    Flags(PackageFlags),
    Architecture(PackageArchitecture),
    Version(PackageVersion),
    Copyright(String),
    License(String),
    Url(String),
    SourceUrl(String),
    Provides(Resolvable),
    Requires(ResolvableExpression),
    Supplements(ResolvableExpression),
    Conflicts(ResolvableExpression),
    Freshens(ResolvableExpression),
    Replaces(String),
    Checksum(String),
    InstallPath(String),
    GlobalWritableFile(GlobalWritableFileInfo),
    UserSettingsFile(UserSettingsFileInfo),
    User(UserInfo),
    Group(String),
    PostInstallScript(String),
    PreUninstallScript(String),
}
