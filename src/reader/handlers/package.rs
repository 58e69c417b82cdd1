//! Handlers for the package attributes section.
//!
//! The root handler reports simple attributes straight to the content handler. Compound
//! attributes (version, provides, requires and friends, writable files, users) get a
//! child handler which assembles the value from the child attributes and hands it back to
//! its parent once the level is closed.

use crate::{
    format::AttributeId,
    package::info::{
        GlobalWritableFileInfo, PackageArchitecture, PackageFlags, PackageInfoAttribute,
        PackageVersion, Resolvable, ResolvableExpression, ResolvableOperator, UserInfo,
        UserSettingsFileInfo, WritableFileUpdateType,
    },
    reader::{
        context::{attribute_name, AttributeHandlerContext},
        handlers::{unknown_attribute, AttributeHandler, HandlerOutput},
        value::AttributeValue,
    },
    Result,
};

fn narrow<T: TryFrom<u64>>(context: &AttributeHandlerContext<'_>, id: u8, value: &AttributeValue) -> Result<T> {
    let raw = context.unsigned(id, value)?;
    T::try_from(raw).map_err(|_| {
        malformed_error!(
            "Value {} of attribute {} is out of range",
            raw,
            attribute_name(id)
        )
    })
}

fn is_set(context: &AttributeHandlerContext<'_>, id: u8, value: &AttributeValue) -> Result<bool> {
    Ok(context.unsigned(id, value)? != 0)
}

pub(crate) fn handle_package_attribute(
    context: &mut AttributeHandlerContext<'_>,
    id: u8,
    value: AttributeValue,
) -> Result<Option<AttributeHandler>> {
    let Some(known) = AttributeId::from_repr(id) else {
        return unknown_attribute(context, id);
    };

    let attribute = match known {
        AttributeId::PackageName => PackageInfoAttribute::Name(context.string(id, value)?),
        AttributeId::PackageSummary => PackageInfoAttribute::Summary(context.string(id, value)?),
        AttributeId::PackageDescription => {
            PackageInfoAttribute::Description(context.string(id, value)?)
        }
        AttributeId::PackageVendor => PackageInfoAttribute::Vendor(context.string(id, value)?),
        AttributeId::PackagePackager => {
            PackageInfoAttribute::Packager(context.string(id, value)?)
        }
        AttributeId::PackageBasePackage => {
            PackageInfoAttribute::BasePackage(context.string(id, value)?)
        }
        AttributeId::PackageFlags => {
            PackageInfoAttribute::Flags(PackageFlags::from_bits_retain(narrow(context, id, &value)?))
        }
        AttributeId::PackageArchitecture => {
            let raw = context.unsigned(id, &value)?;
            let Some(architecture) = u8::try_from(raw)
                .ok()
                .and_then(PackageArchitecture::from_repr)
            else {
                return Err(malformed_error!("Invalid package architecture {}", raw));
            };
            PackageInfoAttribute::Architecture(architecture)
        }
        AttributeId::PackageVersionMajor => {
            return Ok(Some(AttributeHandler::Version(VersionHandler::new(
                known,
                context.string(id, value)?,
            ))))
        }
        AttributeId::PackageCopyright => {
            PackageInfoAttribute::Copyright(context.string(id, value)?)
        }
        AttributeId::PackageLicense => PackageInfoAttribute::License(context.string(id, value)?),
        AttributeId::PackageUrl => PackageInfoAttribute::Url(context.string(id, value)?),
        AttributeId::PackageSourceUrl => {
            PackageInfoAttribute::SourceUrl(context.string(id, value)?)
        }
        AttributeId::PackageProvides => {
            return Ok(Some(AttributeHandler::Resolvable(ResolvableHandler {
                resolvable: Resolvable {
                    name: context.string(id, value)?,
                    ..Resolvable::default()
                },
            })))
        }
        AttributeId::PackageRequires
        | AttributeId::PackageSupplements
        | AttributeId::PackageConflicts
        | AttributeId::PackageFreshens => {
            return Ok(Some(AttributeHandler::ResolvableExpression(
                ResolvableExpressionHandler {
                    origin: known,
                    expression: ResolvableExpression {
                        name: context.string(id, value)?,
                        ..ResolvableExpression::default()
                    },
                },
            )))
        }
        AttributeId::PackageReplaces => PackageInfoAttribute::Replaces(context.string(id, value)?),
        AttributeId::PackageChecksum => PackageInfoAttribute::Checksum(context.string(id, value)?),
        AttributeId::PackageInstallPath => {
            PackageInfoAttribute::InstallPath(context.string(id, value)?)
        }
        AttributeId::PackageGlobalWritableFile => {
            return Ok(Some(AttributeHandler::GlobalWritableFileInfo(
                GlobalWritableFileInfo {
                    path: context.string(id, value)?,
                    ..GlobalWritableFileInfo::default()
                },
            )))
        }
        AttributeId::PackageUserSettingsFile => {
            return Ok(Some(AttributeHandler::UserSettingsFileInfo(
                UserSettingsFileInfo {
                    path: context.string(id, value)?,
                    ..UserSettingsFileInfo::default()
                },
            )))
        }
        AttributeId::PackageUser => {
            return Ok(Some(AttributeHandler::User(UserInfo {
                name: context.string(id, value)?,
                ..UserInfo::default()
            })))
        }
        AttributeId::PackageGroup => PackageInfoAttribute::Group(context.string(id, value)?),
        AttributeId::PackagePostInstallScript => {
            PackageInfoAttribute::PostInstallScript(context.string(id, value)?)
        }
        AttributeId::PackagePreUninstallScript => {
            PackageInfoAttribute::PreUninstallScript(context.string(id, value)?)
        }
        _ => return unknown_attribute(context, id),
    };

    context.package_handler()?.handle_package_attribute(attribute)?;
    Ok(None)
}

pub(crate) fn adopt_package_attribute(
    context: &mut AttributeHandlerContext<'_>,
    output: HandlerOutput,
) -> Result<()> {
    let attribute = match output {
        HandlerOutput::Version { version, .. } => PackageInfoAttribute::Version(version),
        HandlerOutput::Resolvable(resolvable) => PackageInfoAttribute::Provides(resolvable),
        HandlerOutput::Expression { origin, expression } => match origin {
            AttributeId::PackageSupplements => PackageInfoAttribute::Supplements(expression),
            AttributeId::PackageConflicts => PackageInfoAttribute::Conflicts(expression),
            AttributeId::PackageFreshens => PackageInfoAttribute::Freshens(expression),
            _ => PackageInfoAttribute::Requires(expression),
        },
        HandlerOutput::GlobalWritableFile(info) => PackageInfoAttribute::GlobalWritableFile(info),
        HandlerOutput::UserSettingsFile(info) => PackageInfoAttribute::UserSettingsFile(info),
        HandlerOutput::User(user) => PackageInfoAttribute::User(user),
        output @ HandlerOutput::EntryAttribute(_) => {
            return Err(output.unexpected(&AttributeHandler::PackageAttributes))
        }
    };

    context.package_handler()?.handle_package_attribute(attribute)
}

/// Assembles a [`PackageVersion`] from its major part and child attributes.
#[derive(Debug)]
pub struct VersionHandler {
    origin: AttributeId,
    version: PackageVersion,
}

impl VersionHandler {
    pub(crate) fn new(origin: AttributeId, major: String) -> Self {
        VersionHandler {
            origin,
            version: PackageVersion::new(major),
        }
    }

    pub(crate) fn handle_attribute(
        &mut self,
        context: &mut AttributeHandlerContext<'_>,
        id: u8,
        value: AttributeValue,
    ) -> Result<Option<AttributeHandler>> {
        match AttributeId::from_repr(id) {
            Some(AttributeId::PackageVersionMinor) => {
                self.version.minor = context.string(id, value)?;
            }
            Some(AttributeId::PackageVersionMicro) => {
                self.version.micro = context.string(id, value)?;
            }
            Some(AttributeId::PackageVersionPreRelease) => {
                self.version.pre_release = context.string(id, value)?;
            }
            Some(AttributeId::PackageVersionRevision) => {
                self.version.revision = narrow(context, id, &value)?;
            }
            _ => return unknown_attribute(context, id),
        }
        Ok(None)
    }

    pub(crate) fn finish(self) -> HandlerOutput {
        HandlerOutput::Version {
            origin: self.origin,
            version: self.version,
        }
    }
}

/// Assembles a provided [`Resolvable`].
#[derive(Debug)]
pub struct ResolvableHandler {
    resolvable: Resolvable,
}

impl ResolvableHandler {
    pub(crate) fn handle_attribute(
        &mut self,
        context: &mut AttributeHandlerContext<'_>,
        id: u8,
        value: AttributeValue,
    ) -> Result<Option<AttributeHandler>> {
        match AttributeId::from_repr(id) {
            Some(
                origin @ (AttributeId::PackageVersionMajor
                | AttributeId::PackageProvidesCompatible),
            ) => Ok(Some(AttributeHandler::Version(VersionHandler::new(
                origin,
                context.string(id, value)?,
            )))),
            _ => unknown_attribute(context, id),
        }
    }

    pub(crate) fn adopt(&mut self, output: HandlerOutput) -> Result<()> {
        match output {
            HandlerOutput::Version {
                origin: AttributeId::PackageProvidesCompatible,
                version,
            } => self.resolvable.compatible_version = Some(version),
            HandlerOutput::Version { version, .. } => self.resolvable.version = Some(version),
            other => {
                return Err(malformed_error!(
                    "Provides \"{}\" cannot take a nested {} value",
                    self.resolvable.name,
                    other.kind()
                ))
            }
        }
        Ok(())
    }

    pub(crate) fn finish(self) -> HandlerOutput {
        HandlerOutput::Resolvable(self.resolvable)
    }
}

/// Assembles a [`ResolvableExpression`].
#[derive(Debug)]
pub struct ResolvableExpressionHandler {
    origin: AttributeId,
    expression: ResolvableExpression,
}

impl ResolvableExpressionHandler {
    pub(crate) fn handle_attribute(
        &mut self,
        context: &mut AttributeHandlerContext<'_>,
        id: u8,
        value: AttributeValue,
    ) -> Result<Option<AttributeHandler>> {
        match AttributeId::from_repr(id) {
            Some(AttributeId::PackageResolvableOperator) => {
                let raw = context.unsigned(id, &value)?;
                let Some(operator) = u8::try_from(raw)
                    .ok()
                    .and_then(ResolvableOperator::from_repr)
                else {
                    return Err(malformed_error!("Invalid package resolvable operator {}", raw));
                };
                self.expression.operator = Some(operator);
                Ok(None)
            }
            Some(origin @ AttributeId::PackageVersionMajor) => Ok(Some(
                AttributeHandler::Version(VersionHandler::new(origin, context.string(id, value)?)),
            )),
            _ => unknown_attribute(context, id),
        }
    }

    pub(crate) fn adopt(&mut self, output: HandlerOutput) -> Result<()> {
        match output {
            HandlerOutput::Version { version, .. } => {
                self.expression.version = Some(version);
                Ok(())
            }
            other => Err(malformed_error!(
                "Resolvable expression \"{}\" cannot take a nested {} value",
                self.expression.name,
                other.kind()
            )),
        }
    }

    pub(crate) fn finish(self) -> HandlerOutput {
        HandlerOutput::Expression {
            origin: self.origin,
            expression: self.expression,
        }
    }
}

pub(crate) fn handle_global_writable_file(
    info: &mut GlobalWritableFileInfo,
    context: &mut AttributeHandlerContext<'_>,
    id: u8,
    value: AttributeValue,
) -> Result<Option<AttributeHandler>> {
    match AttributeId::from_repr(id) {
        Some(AttributeId::PackageWritableFileUpdateType) => {
            let raw = context.unsigned(id, &value)?;
            let Some(update_type) = u8::try_from(raw)
                .ok()
                .and_then(WritableFileUpdateType::from_repr)
            else {
                return Err(malformed_error!(
                    "Invalid writable file update type {}",
                    raw
                ));
            };
            info.update_type = Some(update_type);
        }
        Some(AttributeId::PackageIsWritableDirectory) => {
            info.is_directory = is_set(context, id, &value)?;
        }
        _ => return unknown_attribute(context, id),
    }
    Ok(None)
}

pub(crate) fn handle_user_settings_file(
    info: &mut UserSettingsFileInfo,
    context: &mut AttributeHandlerContext<'_>,
    id: u8,
    value: AttributeValue,
) -> Result<Option<AttributeHandler>> {
    match AttributeId::from_repr(id) {
        Some(AttributeId::PackageSettingsFileTemplate) => {
            info.template_path = Some(context.string(id, value)?);
        }
        Some(AttributeId::PackageIsWritableDirectory) => {
            info.is_directory = is_set(context, id, &value)?;
        }
        _ => return unknown_attribute(context, id),
    }
    Ok(None)
}

pub(crate) fn handle_user(
    user: &mut UserInfo,
    context: &mut AttributeHandlerContext<'_>,
    id: u8,
    value: AttributeValue,
) -> Result<Option<AttributeHandler>> {
    match AttributeId::from_repr(id) {
        Some(AttributeId::PackageUserRealName) => user.real_name = Some(context.string(id, value)?),
        Some(AttributeId::PackageUserHome) => user.home = Some(context.string(id, value)?),
        Some(AttributeId::PackageUserShell) => user.shell = Some(context.string(id, value)?),
        Some(AttributeId::PackageUserGroup) => user.groups.push(context.string(id, value)?),
        _ => return unknown_attribute(context, id),
    }
    Ok(None)
}
