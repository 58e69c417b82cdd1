//! Content handler interfaces.
//!
//! A [`PackageReader`](crate::PackageReader) does not build a model of the package. It
//! walks the attribute trees and reports what it finds to a handler:
//!
//! - [`PackageContentHandler`] receives interpreted events: entries with their metadata,
//!   extended attributes and assembled [`PackageInfoAttribute`]s.
//! - [`LowLevelPackageHandler`] receives every attribute as-is, together with opaque tokens
//!   linking children to their parents, and reconstructs whatever it needs.
//!
//! [`PackageInfo`] is a ready-made content handler collecting the package attributes.

use crate::{
    format::SectionId,
    package::{
        entry::{PackageEntry, PackageEntryAttribute},
        info::{
            GlobalWritableFileInfo, PackageArchitecture, PackageFlags, PackageInfoAttribute,
            PackageVersion, Resolvable, ResolvableExpression, UserInfo, UserSettingsFileInfo,
        },
    },
    reader::value::AttributeValue,
    Result,
};

/// Receives the interpreted content of a package.
///
/// Returning an error from any callback aborts the parse with that error.
pub trait PackageContentHandler {
    /// A TOC entry, after its own attributes and before its children.
    fn handle_entry(&mut self, _entry: &PackageEntry) -> Result<()> {
        Ok(())
    }

    /// An extended attribute of `entry`.
    fn handle_entry_attribute(
        &mut self,
        _entry: &PackageEntry,
        _attribute: &PackageEntryAttribute,
    ) -> Result<()> {
        Ok(())
    }

    /// All children and attributes of `entry` have been reported.
    fn handle_entry_done(&mut self, _entry: &PackageEntry) -> Result<()> {
        Ok(())
    }

    /// A top-level attribute of the package attributes section.
    fn handle_package_attribute(&mut self, attribute: PackageInfoAttribute) -> Result<()>;

    /// The parse was aborted; no further events follow.
    fn handle_error_occurred(&mut self) {}
}

/// Caller-chosen identifier of an attribute reported to a [`LowLevelPackageHandler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct LowLevelToken(pub u64);

/// Receives the raw attribute trees of a package.
pub trait LowLevelPackageHandler {
    /// A section is about to be parsed; return `true` to skip it.
    fn handle_section_start(&mut self, _section: SectionId) -> Result<bool> {
        Ok(false)
    }

    /// A section has been parsed completely.
    fn handle_section_end(&mut self, _section: SectionId) -> Result<()> {
        Ok(())
    }

    /// An attribute was read. `parent` is the token of the enclosing attribute, `None` at
    /// top level. The returned token identifies this attribute to its children.
    fn handle_attribute(
        &mut self,
        id: u8,
        value: &AttributeValue,
        parent: Option<LowLevelToken>,
    ) -> Result<LowLevelToken>;

    /// The attribute identified by `token` and all its children have been read.
    fn handle_attribute_done(
        &mut self,
        _id: u8,
        _value: &AttributeValue,
        _parent: Option<LowLevelToken>,
        _token: LowLevelToken,
    ) -> Result<()> {
        Ok(())
    }

    /// The parse was aborted; no further events follow.
    fn handle_error_occurred(&mut self) {}
}

/// Package metadata collected from the package attributes section.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackageInfo {
    /// Package name.
    pub name: String,
    /// One-line summary.
    pub summary: String,
    /// Long description.
    pub description: String,
    /// Vendor.
    pub vendor: String,
    /// Packager.
    pub packager: String,
    /// Base package, if this is an add-on.
    pub base_package: Option<String>,
    /// Flags.
    pub flags: PackageFlags,
    /// Target architecture.
    pub architecture: Option<PackageArchitecture>,
    /// Version.
    pub version: Option<PackageVersion>,
    /// Copyright notices.
    pub copyrights: Vec<String>,
    /// Licenses.
    pub licenses: Vec<String>,
    /// Home page URLs.
    pub urls: Vec<String>,
    /// Source URLs.
    pub source_urls: Vec<String>,
    /// Provided resolvables.
    pub provides: Vec<Resolvable>,
    /// Requirements.
    pub requires: Vec<ResolvableExpression>,
    /// Supplemented packages.
    pub supplements: Vec<ResolvableExpression>,
    /// Conflicting packages.
    pub conflicts: Vec<ResolvableExpression>,
    /// Packages this one freshens.
    pub freshens: Vec<ResolvableExpression>,
    /// Packages this one replaces.
    pub replaces: Vec<String>,
    /// Checksum of the package file.
    pub checksum: Option<String>,
    /// Installation path.
    pub install_path: Option<String>,
    /// Global writable files.
    pub global_writable_files: Vec<GlobalWritableFileInfo>,
    /// User settings files.
    pub user_settings_files: Vec<UserSettingsFileInfo>,
    /// Users to create.
    pub users: Vec<UserInfo>,
    /// Groups to create.
    pub groups: Vec<String>,
    /// Scripts run after installation.
    pub post_install_scripts: Vec<String>,
    /// Scripts run before removal.
    pub pre_uninstall_scripts: Vec<String>,
}

impl PackageContentHandler for PackageInfo {
    fn handle_package_attribute(&mut self, attribute: PackageInfoAttribute) -> Result<()> {
        match attribute {
            PackageInfoAttribute::Name(name) => self.name = name,
            PackageInfoAttribute::Summary(summary) => self.summary = summary,
            PackageInfoAttribute::Description(description) => self.description = description,
            PackageInfoAttribute::Vendor(vendor) => self.vendor = vendor,
            PackageInfoAttribute::Packager(packager) => self.packager = packager,
            PackageInfoAttribute::BasePackage(base) => self.base_package = Some(base),
            PackageInfoAttribute::Flags(flags) => self.flags = flags,
            PackageInfoAttribute::Architecture(arch) => self.architecture = Some(arch),
            PackageInfoAttribute::Version(version) => self.version = Some(version),
            PackageInfoAttribute::Copyright(copyright) => self.copyrights.push(copyright),
            PackageInfoAttribute::License(license) => self.licenses.push(license),
            PackageInfoAttribute::Url(url) => self.urls.push(url),
            PackageInfoAttribute::SourceUrl(url) => self.source_urls.push(url),
            PackageInfoAttribute::Provides(resolvable) => self.provides.push(resolvable),
            PackageInfoAttribute::Requires(expression) => self.requires.push(expression),
            PackageInfoAttribute::Supplements(expression) => self.supplements.push(expression),
            PackageInfoAttribute::Conflicts(expression) => self.conflicts.push(expression),
            PackageInfoAttribute::Freshens(expression) => self.freshens.push(expression),
            PackageInfoAttribute::Replaces(name) => self.replaces.push(name),
            PackageInfoAttribute::Checksum(checksum) => self.checksum = Some(checksum),
            PackageInfoAttribute::InstallPath(path) => self.install_path = Some(path),
            PackageInfoAttribute::GlobalWritableFile(file) => self.global_writable_files.push(file),
            PackageInfoAttribute::UserSettingsFile(file) => self.user_settings_files.push(file),
            PackageInfoAttribute::User(user) => self.users.push(user),
            PackageInfoAttribute::Group(group) => self.groups.push(group),
            PackageInfoAttribute::PostInstallScript(script) => {
                self.post_install_scripts.push(script);
            }
            PackageInfoAttribute::PreUninstallScript(script) => {
                self.pre_uninstall_scripts.push(script);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects() {
        let mut info = PackageInfo::default();
        info.handle_package_attribute(PackageInfoAttribute::Name("example".into()))
            .unwrap();
        info.handle_package_attribute(PackageInfoAttribute::License("MIT".into()))
            .unwrap();
        info.handle_package_attribute(PackageInfoAttribute::License("BSD".into()))
            .unwrap();
        info.handle_package_attribute(PackageInfoAttribute::Version(PackageVersion::new("2")))
            .unwrap();

        assert_eq!(info.name, "example");
        assert_eq!(info.licenses, vec!["MIT", "BSD"]);
        assert_eq!(info.version.as_ref().unwrap().major, "2");
        assert!(info.handle_entry(&PackageEntry::default()).is_ok());
    }
}
