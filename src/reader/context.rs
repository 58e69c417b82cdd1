//! State shared by all attribute handlers during one tree walk.

use std::sync::{Arc, Mutex};

use log::error;

use crate::{
    format::{AttributeId, SectionId},
    heap::HeapReader,
    package::content::{LowLevelPackageHandler, PackageContentHandler},
    reader::value::{AttributeData, AttributeValue},
    Error, Result,
};

/// Sink for human-readable diagnostics.
pub trait ErrorOutput: Send {
    /// Reports one diagnostic.
    fn print_error(&mut self, message: &str);
}

/// Forwards diagnostics to `log::error!`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogErrorOutput;

impl ErrorOutput for LogErrorOutput {
    fn print_error(&mut self, message: &str) {
        error!("{}", message);
    }
}

/// Keeps diagnostics in memory. Clones share the same message list.
#[derive(Debug, Default, Clone)]
pub struct CollectingErrorOutput {
    messages: Arc<Mutex<Vec<String>>>,
}

impl CollectingErrorOutput {
    /// All diagnostics reported so far.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        match self.messages.lock() {
            Ok(messages) => messages.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ErrorOutput for CollectingErrorOutput {
    fn print_error(&mut self, message: &str) {
        let mut messages = match self.messages.lock() {
            Ok(messages) => messages,
            Err(poisoned) => poisoned.into_inner(),
        };
        messages.push(message.to_string());
    }
}

/// The external collaborator receiving the parse results.
pub enum ContentHandlerRef<'a> {
    /// Interpreted events.
    Package(&'a mut dyn PackageContentHandler),
    /// Raw attribute events.
    LowLevel(&'a mut dyn LowLevelPackageHandler),
}

impl ContentHandlerRef<'_> {
    /// Borrows the handler for a shorter lifetime.
    pub fn reborrow(&mut self) -> ContentHandlerRef<'_> {
        match self {
            ContentHandlerRef::Package(handler) => ContentHandlerRef::Package(&mut **handler),
            ContentHandlerRef::LowLevel(handler) => ContentHandlerRef::LowLevel(&mut **handler),
        }
    }

    /// Tells the handler that the parse was aborted.
    pub fn error_occurred(&mut self) {
        match self {
            ContentHandlerRef::Package(handler) => handler.handle_error_occurred(),
            ContentHandlerRef::LowLevel(handler) => handler.handle_error_occurred(),
        }
    }
}

/// Read-mostly state passed to every handler of a tree walk.
pub struct AttributeHandlerContext<'a> {
    /// Receiver of the results.
    pub handler: ContentHandlerRef<'a>,
    /// The section being walked.
    pub section: SectionId,
    /// Skip attributes with ids no handler understands instead of failing.
    pub ignore_unknown_attributes: bool,
    /// Side table for table-encoded integers.
    pub integer_table: &'a [u64],
    /// Heap for resolving heap-stored strings, if still attached.
    pub heap: Option<&'a mut dyn HeapReader>,
}

impl<'a> AttributeHandlerContext<'a> {
    /// The interpreting content handler.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidState`] for a low-level walk.
    pub fn package_handler(&mut self) -> Result<&mut (dyn PackageContentHandler + 'a)> {
        match &mut self.handler {
            ContentHandlerRef::Package(handler) => Ok(&mut **handler),
            ContentHandlerRef::LowLevel(_) => Err(Error::InvalidState(
                "package content handler required".to_string(),
            )),
        }
    }

    /// The low-level content handler.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidState`] for an interpreting walk.
    pub fn low_level_handler(&mut self) -> Result<&mut (dyn LowLevelPackageHandler + 'a)> {
        match &mut self.handler {
            ContentHandlerRef::LowLevel(handler) => Ok(&mut **handler),
            ContentHandlerRef::Package(_) => Err(Error::InvalidState(
                "low-level content handler required".to_string(),
            )),
        }
    }

    /// Produces the string of a string value, reading heap-stored strings.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `value` is no string or not valid UTF-8, and
    /// [`crate::Error::InvalidState`] for heap strings when no heap is available.
    pub fn string(&mut self, id: u8, value: AttributeValue) -> Result<String> {
        match value.data {
            AttributeData::String(string) => Ok(string),
            AttributeData::Heap(range) if value.value_type == crate::format::AttributeType::String => {
                let Some(heap) = self.heap.as_deref_mut() else {
                    return Err(Error::InvalidState(
                        "heap reader detached, cannot resolve heap string".to_string(),
                    ));
                };
                String::from_utf8(heap.read_ref(range)?).map_err(|_| {
                    malformed_error!(
                        "Heap string of attribute {} is not valid UTF-8",
                        attribute_name(id)
                    )
                })
            }
            _ => Err(malformed_error!(
                "Attribute {} in the {} section must be a string",
                attribute_name(id),
                self.section
            )),
        }
    }

    /// Produces the integer of an integer value.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `value` is no integer.
    pub fn unsigned(&self, id: u8, value: &AttributeValue) -> Result<u64> {
        value.as_u64().ok_or_else(|| {
            malformed_error!(
                "Attribute {} in the {} section must be an integer",
                attribute_name(id),
                self.section
            )
        })
    }

    /// Decides what to do with an attribute the current handler does not understand.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] unless unknown attributes are ignored.
    pub fn unexpected_attribute(&self, id: u8) -> Result<()> {
        if self.ignore_unknown_attributes {
            return Ok(());
        }

        Err(malformed_error!(
            "Unexpected attribute {} in the {} section",
            attribute_name(id),
            self.section
        ))
    }
}

/// Diagnostic name of a raw attribute id.
#[must_use]
pub fn attribute_name(id: u8) -> String {
    match AttributeId::from_repr(id) {
        Some(known) => format!("\"{known}\" ({id})"),
        None => format!("{id}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        format::{AttributeType, ValueEncoding},
        heap::HeapRef,
        package::content::PackageInfo,
    };

    #[test]
    fn collecting_output() {
        let output = CollectingErrorOutput::default();
        let mut sink: Box<dyn ErrorOutput> = Box::new(output.clone());

        sink.print_error("first");
        sink.print_error("second");
        LogErrorOutput.print_error("logged");

        assert_eq!(output.messages(), vec!["first", "second"]);
    }

    #[test]
    fn value_helpers() {
        let mut info = PackageInfo::default();
        let mut context = AttributeHandlerContext {
            handler: ContentHandlerRef::Package(&mut info),
            section: SectionId::PackageAttributes,
            ignore_unknown_attributes: false,
            integer_table: &[],
            heap: None,
        };

        let number = AttributeValue {
            value_type: AttributeType::Uint,
            encoding: ValueEncoding::Varint,
            data: AttributeData::Uint(5),
        };
        assert_eq!(context.unsigned(20, &number).unwrap(), 5);
        assert!(context.string(15, number).unwrap_err().is_bad_data());

        let heap_string = AttributeValue {
            value_type: AttributeType::String,
            encoding: ValueEncoding::Heap,
            data: AttributeData::Heap(HeapRef::new(0, 4)),
        };
        assert!(matches!(
            context.string(15, heap_string),
            Err(Error::InvalidState(_))
        ));

        let error = context.unexpected_attribute(99).unwrap_err();
        assert!(error.is_bad_data());
        context.ignore_unknown_attributes = true;
        assert!(context.unexpected_attribute(99).is_ok());

        assert!(context.package_handler().is_ok());
        assert!(context.low_level_handler().is_err());
        assert_eq!(attribute_name(15), "\"package:name\" (15)");
    }
}
