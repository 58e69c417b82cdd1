//! Handlers for the TOC section.
//!
//! Every directory entry gets an [`EntryHandler`]. The entry is reported to the content
//! handler once its own attributes have been read, which is when the first child entry or
//! extended attribute shows up, or when the level closes. Entries are reported
//! depth-first, children between the parent's `handle_entry` and `handle_entry_done`.

use crate::{
    format::AttributeId,
    package::entry::{DataRef, FileType, PackageEntry, PackageEntryAttribute},
    reader::{
        context::{attribute_name, AttributeHandlerContext},
        handlers::{unknown_attribute, AttributeHandler, HandlerOutput},
        value::{AttributeData, AttributeValue},
    },
    Result,
};

/// Rejects names that would escape the package root or cannot be created on disk.
fn validate_entry_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(malformed_error!("Invalid package entry name \"{}\"", name));
    }

    Ok(())
}

fn narrow_u32(context: &AttributeHandlerContext<'_>, id: u8, value: &AttributeValue) -> Result<u32> {
    let raw = context.unsigned(id, value)?;
    u32::try_from(raw).map_err(|_| {
        malformed_error!(
            "Value {} of attribute {} is out of range",
            raw,
            attribute_name(id)
        )
    })
}

fn data_ref(id: u8, value: AttributeValue) -> Result<DataRef> {
    match value.data {
        AttributeData::Raw(bytes) => Ok(DataRef::Inline(bytes)),
        AttributeData::Heap(range) => Ok(DataRef::Heap(range)),
        _ => Err(malformed_error!(
            "Attribute {} must be raw data",
            attribute_name(id)
        )),
    }
}

fn new_entry(
    context: &mut AttributeHandlerContext<'_>,
    parent_path: Option<&str>,
    id: u8,
    value: AttributeValue,
) -> Result<AttributeHandler> {
    let name = context.string(id, value)?;
    validate_entry_name(&name)?;

    let path = match parent_path {
        Some(parent) => format!("{parent}/{name}"),
        None => name.clone(),
    };

    Ok(AttributeHandler::Entry(Box::new(EntryHandler {
        entry: PackageEntry {
            path,
            name,
            ..PackageEntry::default()
        },
        permissions_set: false,
        notified: false,
    })))
}

pub(crate) fn handle_toc_attribute(
    context: &mut AttributeHandlerContext<'_>,
    id: u8,
    value: AttributeValue,
) -> Result<Option<AttributeHandler>> {
    match AttributeId::from_repr(id) {
        Some(AttributeId::DirectoryEntry) => Ok(Some(new_entry(context, None, id, value)?)),
        _ => unknown_attribute(context, id),
    }
}

/// Collects the attributes of one TOC entry.
#[derive(Debug)]
pub struct EntryHandler {
    entry: PackageEntry,
    permissions_set: bool,
    notified: bool,
}

impl EntryHandler {
    fn notify(&mut self, context: &mut AttributeHandlerContext<'_>) -> Result<()> {
        if self.notified {
            return Ok(());
        }

        if !self.permissions_set {
            self.entry.permissions = self.entry.file_type.default_permissions();
        }
        context.package_handler()?.handle_entry(&self.entry)?;
        self.notified = true;
        Ok(())
    }

    pub(crate) fn handle_attribute(
        &mut self,
        context: &mut AttributeHandlerContext<'_>,
        id: u8,
        value: AttributeValue,
    ) -> Result<Option<AttributeHandler>> {
        let Some(known) = AttributeId::from_repr(id) else {
            return unknown_attribute(context, id);
        };

        match known {
            AttributeId::DirectoryEntry => {
                if !self.entry.is_directory() {
                    return Err(malformed_error!(
                        "Package entry \"{}\" has children but is no directory",
                        self.entry.path
                    ));
                }

                self.notify(context)?;
                return Ok(Some(new_entry(context, Some(&self.entry.path), id, value)?));
            }
            AttributeId::FileType => {
                let raw = context.unsigned(id, &value)?;
                let Some(file_type) = u8::try_from(raw).ok().and_then(FileType::from_repr) else {
                    return Err(malformed_error!(
                        "Invalid file type {} for package entry \"{}\"",
                        raw,
                        self.entry.path
                    ));
                };
                self.entry.file_type = file_type;
            }
            AttributeId::FilePermissions => {
                self.entry.permissions = narrow_u32(context, id, &value)?;
                self.permissions_set = true;
            }
            AttributeId::FileUser => self.entry.user = Some(context.string(id, value)?),
            AttributeId::FileGroup => self.entry.group = Some(context.string(id, value)?),
            AttributeId::FileAtime => self.entry.access_time.seconds = context.unsigned(id, &value)?,
            AttributeId::FileMtime => {
                self.entry.modified_time.seconds = context.unsigned(id, &value)?;
            }
            AttributeId::FileCrtime => {
                self.entry.creation_time.seconds = context.unsigned(id, &value)?;
            }
            AttributeId::FileAtimeNanos => {
                self.entry.access_time.nanos = narrow_u32(context, id, &value)?;
            }
            AttributeId::FileMtimeNanos => {
                self.entry.modified_time.nanos = narrow_u32(context, id, &value)?;
            }
            AttributeId::FileCrtimeNanos => {
                self.entry.creation_time.nanos = narrow_u32(context, id, &value)?;
            }
            AttributeId::FileAttribute => {
                self.notify(context)?;
                return Ok(Some(AttributeHandler::EntryAttribute(PackageEntryAttribute {
                    name: context.string(id, value)?,
                    ..PackageEntryAttribute::default()
                })));
            }
            AttributeId::Data => self.entry.data = Some(data_ref(id, value)?),
            AttributeId::SymlinkPath => self.entry.symlink_path = Some(context.string(id, value)?),
            _ => return unknown_attribute(context, id),
        }

        Ok(None)
    }

    pub(crate) fn adopt(
        &mut self,
        context: &mut AttributeHandlerContext<'_>,
        output: HandlerOutput,
    ) -> Result<()> {
        match output {
            HandlerOutput::EntryAttribute(attribute) => context
                .package_handler()?
                .handle_entry_attribute(&self.entry, &attribute),
            other => Err(malformed_error!(
                "Package entry \"{}\" cannot take a nested {} value",
                self.entry.path,
                other.kind()
            )),
        }
    }

    pub(crate) fn finish(mut self, context: &mut AttributeHandlerContext<'_>) -> Result<()> {
        self.notify(context)?;
        context.package_handler()?.handle_entry_done(&self.entry)
    }
}

pub(crate) fn handle_entry_attribute(
    attribute: &mut PackageEntryAttribute,
    context: &mut AttributeHandlerContext<'_>,
    id: u8,
    value: AttributeValue,
) -> Result<Option<AttributeHandler>> {
    match AttributeId::from_repr(id) {
        Some(AttributeId::FileAttributeType) => {
            attribute.attribute_type = narrow_u32(context, id, &value)?;
        }
        Some(AttributeId::Data) => attribute.data = Some(data_ref(id, value)?),
        _ => return unknown_attribute(context, id),
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_names() {
        assert!(validate_entry_name("boot").is_ok());
        assert!(validate_entry_name("..hidden").is_ok());
        assert!(validate_entry_name("").unwrap_err().is_bad_data());
        assert!(validate_entry_name(".").unwrap_err().is_bad_data());
        assert!(validate_entry_name("..").unwrap_err().is_bad_data());
        assert!(validate_entry_name("a/b").unwrap_err().is_bad_data());
    }
}
