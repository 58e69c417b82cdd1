//! Attribute handlers.
//!
//! A tree walk keeps a stack of [`AttributeHandler`]s, one per nesting level. The handler
//! on top receives each attribute of its level and may return a child handler for the
//! attribute's children. When a level closes its handler is finished, and whatever it
//! assembled is handed to the handler below.
//!
//! Handlers form a closed set: each variant knows the grammar of one kind of attribute.

mod low_level;
mod package;
mod toc;

pub use low_level::LowLevelHandler;
pub use package::{ResolvableExpressionHandler, ResolvableHandler, VersionHandler};
pub use toc::EntryHandler;

use crate::{
    format::AttributeId,
    package::{
        entry::PackageEntryAttribute,
        info::{
            GlobalWritableFileInfo, PackageVersion, Resolvable, ResolvableExpression, UserInfo,
            UserSettingsFileInfo,
        },
    },
    reader::{context::AttributeHandlerContext, value::AttributeValue},
    Result,
};

/// A value assembled by a finished child handler.
#[derive(Debug)]
pub(crate) enum HandlerOutput {
    Version {
        origin: AttributeId,
        version: PackageVersion,
    },
    Resolvable(Resolvable),
    Expression {
        origin: AttributeId,
        expression: ResolvableExpression,
    },
    GlobalWritableFile(GlobalWritableFileInfo),
    UserSettingsFile(UserSettingsFileInfo),
    User(UserInfo),
    EntryAttribute(PackageEntryAttribute),
}

impl HandlerOutput {
    /// Short label for diagnostics.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            HandlerOutput::Version { .. } => "version",
            HandlerOutput::Resolvable(_) => "resolvable",
            HandlerOutput::Expression { .. } => "resolvable expression",
            HandlerOutput::GlobalWritableFile(_) => "global writable file",
            HandlerOutput::UserSettingsFile(_) => "user settings file",
            HandlerOutput::User(_) => "user",
            HandlerOutput::EntryAttribute(_) => "entry attribute",
        }
    }

    /// The error for an output reaching a handler that has no use for it.
    pub(crate) fn unexpected(self, handler: &AttributeHandler) -> crate::Error {
        malformed_error!(
            "The {} handler cannot take a nested {} value",
            handler.name(),
            self.kind()
        )
    }
}

/// Handler for one level of an attribute tree.
#[derive(Debug)]
pub enum AttributeHandler {
    /// Swallows a subtree.
    Ignore,
    /// Top level of the package attributes section.
    PackageAttributes,
    /// Children of a version major attribute.
    Version(VersionHandler),
    /// Children of a provides attribute.
    Resolvable(ResolvableHandler),
    /// Children of a requires, supplements, conflicts or freshens attribute.
    ResolvableExpression(ResolvableExpressionHandler),
    /// Children of a global writable file attribute.
    GlobalWritableFileInfo(GlobalWritableFileInfo),
    /// Children of a user settings file attribute.
    UserSettingsFileInfo(UserSettingsFileInfo),
    /// Children of a user attribute.
    User(UserInfo),
    /// Top level of the TOC section.
    Toc,
    /// Children of a directory entry.
    Entry(Box<EntryHandler>),
    /// Children of an entry's extended attribute.
    EntryAttribute(PackageEntryAttribute),
    /// Any level of a low-level walk.
    LowLevel(LowLevelHandler),
}

/// Reports `id` as unexpected and, if tolerated, skips its subtree.
pub(crate) fn unknown_attribute(
    context: &mut AttributeHandlerContext<'_>,
    id: u8,
) -> Result<Option<AttributeHandler>> {
    context.unexpected_attribute(id)?;
    Ok(Some(AttributeHandler::Ignore))
}

impl AttributeHandler {
    /// Root handler of a low-level walk.
    #[must_use]
    pub fn low_level() -> Self {
        AttributeHandler::LowLevel(LowLevelHandler::default())
    }

    /// Short label for diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            AttributeHandler::Ignore => "ignore",
            AttributeHandler::PackageAttributes => "package attributes",
            AttributeHandler::Version(_) => "version",
            AttributeHandler::Resolvable(_) => "resolvable",
            AttributeHandler::ResolvableExpression(_) => "resolvable expression",
            AttributeHandler::GlobalWritableFileInfo(_) => "global writable file",
            AttributeHandler::UserSettingsFileInfo(_) => "user settings file",
            AttributeHandler::User(_) => "user",
            AttributeHandler::Toc => "toc",
            AttributeHandler::Entry(_) => "entry",
            AttributeHandler::EntryAttribute(_) => "entry attribute",
            AttributeHandler::LowLevel(_) => "low level",
        }
    }

    /// Handles one attribute of this level and returns the handler for its children, if
    /// the attribute is one that has them.
    pub(crate) fn handle_attribute(
        &mut self,
        context: &mut AttributeHandlerContext<'_>,
        id: u8,
        value: AttributeValue,
    ) -> Result<Option<AttributeHandler>> {
        match self {
            AttributeHandler::Ignore => Ok(None),
            AttributeHandler::PackageAttributes => {
                package::handle_package_attribute(context, id, value)
            }
            AttributeHandler::Version(handler) => handler.handle_attribute(context, id, value),
            AttributeHandler::Resolvable(handler) => handler.handle_attribute(context, id, value),
            AttributeHandler::ResolvableExpression(handler) => {
                handler.handle_attribute(context, id, value)
            }
            AttributeHandler::GlobalWritableFileInfo(info) => {
                package::handle_global_writable_file(info, context, id, value)
            }
            AttributeHandler::UserSettingsFileInfo(info) => {
                package::handle_user_settings_file(info, context, id, value)
            }
            AttributeHandler::User(user) => package::handle_user(user, context, id, value),
            AttributeHandler::Toc => toc::handle_toc_attribute(context, id, value),
            AttributeHandler::Entry(handler) => handler.handle_attribute(context, id, value),
            AttributeHandler::EntryAttribute(attribute) => {
                toc::handle_entry_attribute(attribute, context, id, value)
            }
            AttributeHandler::LowLevel(handler) => handler.handle_attribute(context, id, value),
        }
    }

    /// Takes the output of a finished child handler.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if this handler has no use for `output`.
    pub(crate) fn adopt(
        &mut self,
        context: &mut AttributeHandlerContext<'_>,
        output: HandlerOutput,
    ) -> Result<()> {
        match self {
            AttributeHandler::PackageAttributes => package::adopt_package_attribute(context, output),
            AttributeHandler::Resolvable(handler) => handler.adopt(output),
            AttributeHandler::ResolvableExpression(handler) => handler.adopt(output),
            AttributeHandler::Entry(handler) => handler.adopt(context, output),
            AttributeHandler::Ignore
            | AttributeHandler::Version(_)
            | AttributeHandler::GlobalWritableFileInfo(_)
            | AttributeHandler::UserSettingsFileInfo(_)
            | AttributeHandler::User(_)
            | AttributeHandler::Toc
            | AttributeHandler::EntryAttribute(_)
            | AttributeHandler::LowLevel(_) => Err(output.unexpected(self)),
        }
    }

    /// Closes this level: reports completion to the content handler and yields the
    /// assembled value for the parent, if any.
    pub(crate) fn finish(
        self,
        context: &mut AttributeHandlerContext<'_>,
    ) -> Result<Option<HandlerOutput>> {
        Ok(match self {
            AttributeHandler::Ignore | AttributeHandler::PackageAttributes | AttributeHandler::Toc => {
                None
            }
            AttributeHandler::Version(handler) => Some(handler.finish()),
            AttributeHandler::Resolvable(handler) => Some(handler.finish()),
            AttributeHandler::ResolvableExpression(handler) => Some(handler.finish()),
            AttributeHandler::GlobalWritableFileInfo(info) => {
                Some(HandlerOutput::GlobalWritableFile(info))
            }
            AttributeHandler::UserSettingsFileInfo(info) => {
                Some(HandlerOutput::UserSettingsFile(info))
            }
            AttributeHandler::User(user) => Some(HandlerOutput::User(user)),
            AttributeHandler::Entry(handler) => {
                (*handler).finish(context)?;
                None
            }
            AttributeHandler::EntryAttribute(attribute) => {
                Some(HandlerOutput::EntryAttribute(attribute))
            }
            AttributeHandler::LowLevel(handler) => {
                handler.finish(context)?;
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        format::SectionId,
        package::content::PackageInfo,
        reader::context::ContentHandlerRef,
    };

    #[test]
    fn misplaced_outputs() {
        let mut info = PackageInfo::default();
        let mut context = AttributeHandlerContext {
            handler: ContentHandlerRef::Package(&mut info),
            section: SectionId::PackageAttributes,
            ignore_unknown_attributes: true,
            integer_table: &[],
            heap: None,
        };

        let version = || HandlerOutput::Version {
            origin: AttributeId::PackageVersionMajor,
            version: PackageVersion::new("1"),
        };

        let error = AttributeHandler::Toc
            .adopt(&mut context, version())
            .unwrap_err();
        assert!(error.is_bad_data());
        assert!(error.to_string().contains("toc handler cannot take a nested version"));

        assert!(AttributeHandler::User(UserInfo::default())
            .adopt(&mut context, version())
            .unwrap_err()
            .is_bad_data());
        assert!(AttributeHandler::PackageAttributes
            .adopt(
                &mut context,
                HandlerOutput::EntryAttribute(PackageEntryAttribute::default())
            )
            .unwrap_err()
            .is_bad_data());

        // The package attributes level does take a version
        AttributeHandler::PackageAttributes
            .adopt(&mut context, version())
            .unwrap();
        drop(context);
        assert_eq!(info.version, Some(PackageVersion::new("1")));
    }
}
