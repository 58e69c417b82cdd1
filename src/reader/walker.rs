//! The attribute tree walk.
//!
//! The walk reads tags from the attribute stream of a loaded section and drives the
//! handler stack: attributes go to the handler on top, attributes with children push the
//! child handler (or [`AttributeHandler::Ignore`] if the handler has none), and an end of
//! level tag finishes the top handler and hands its output to the one below. The walk is
//! complete once the root handler itself has been finished.

use log::trace;

use crate::{
    file::parser::Parser,
    format::{Tag, TagLayout},
    reader::{
        context::AttributeHandlerContext, handlers::AttributeHandler, section::Section,
        value::read_attribute_value,
    },
    Result,
};

/// Walks the attribute tree of `section`, starting at its current offset.
///
/// `stack` must hold the root handler. On success the stack is empty and the whole
/// attribute stream has been consumed. On failure the remaining handlers stay on the
/// stack; they are dropped without being finished.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for invalid tags, values and nesting, trailing
/// bytes and anything the handlers reject, [`crate::Error::OutOfBounds`] if the stream
/// ends before the tree is closed, and any error raised by the content handler.
pub fn parse_attribute_tree(
    section: &mut Section,
    context: &mut AttributeHandlerContext<'_>,
    layout: TagLayout,
    stack: &mut Vec<AttributeHandler>,
) -> Result<()> {
    if stack.is_empty() {
        return Err(malformed_error!(
            "No root handler for the {} section",
            section.name
        ));
    }

    let mut parser = Parser::new(section.attributes());
    parser.seek(section.current_offset)?;

    loop {
        let offset = parser.pos();
        match layout.read_tag(&mut parser)? {
            Tag::EndOfLevel => {
                let Some(handler) = stack.pop() else {
                    return Err(malformed_error!(
                        "Unbalanced end of level at offset {} of the {} section",
                        offset,
                        section.name
                    ));
                };

                let output = handler.finish(context)?;
                let Some(parent) = stack.last_mut() else {
                    break;
                };
                if let Some(output) = output {
                    parent.adopt(context, output)?;
                }
            }
            Tag::EndOfStream => {
                if stack.len() != 1 {
                    return Err(malformed_error!(
                        "End of stream while the {} handler is open at offset {} of the {} section",
                        stack.last().map_or("unknown", AttributeHandler::name),
                        offset,
                        section.name
                    ));
                }

                if let Some(root) = stack.pop() {
                    root.finish(context)?;
                }
                break;
            }
            Tag::Attribute {
                id,
                value_type,
                encoding,
                has_children,
            } => {
                let value = read_attribute_value(
                    &mut parser,
                    section,
                    context.integer_table,
                    value_type,
                    encoding,
                )?;
                let depth = stack.len();
                let Some(top) = stack.last_mut() else {
                    return Err(malformed_error!(
                        "Attribute after the end of the tree at offset {} of the {} section",
                        offset,
                        section.name
                    ));
                };
                trace!(
                    "{} section: attribute {} at offset {}, depth {}, {} handler",
                    section.name,
                    id,
                    offset,
                    depth,
                    top.name()
                );
                let child = top.handle_attribute(context, id, value)?;

                if has_children {
                    stack.push(child.unwrap_or(AttributeHandler::Ignore));
                } else if let Some(child) = child {
                    // An attribute that may have children but has none.
                    if let Some(output) = child.finish(context)? {
                        if let Some(top) = stack.last_mut() {
                            top.adopt(context, output)?;
                        }
                    }
                }
            }
        }
    }

    let consumed = parser.pos();
    let excess = parser.remaining();
    section.current_offset = consumed;

    if excess != 0 {
        return Err(malformed_error!(
            "{} excess bytes after the attribute tree of the {} section",
            excess,
            section.name
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        format::SectionId,
        package::content::{LowLevelPackageHandler, LowLevelToken, PackageInfo},
        reader::{context::ContentHandlerRef, value::AttributeValue},
        test::{composed_tag, encode_leb128, split_tag},
        Error,
    };

    fn section(stream: Vec<u8>) -> Section {
        Section {
            name: "test",
            uncompressed_length: stream.len() as u64,
            data: stream,
            ..Section::default()
        }
    }

    fn inline_string(id: u8, value: &str, children: bool) -> Vec<u8> {
        let mut data = composed_tag(id, 3, 0, children);
        data.extend(encode_leb128(value.len() as u64));
        data.extend(value.as_bytes());
        data
    }

    fn varint(id: u8, value: u64) -> Vec<u8> {
        let mut data = composed_tag(id, 2, 4, false);
        data.extend(encode_leb128(value));
        data
    }

    fn walk_info(stream: Vec<u8>, ignore_unknown: bool) -> (Result<()>, PackageInfo, usize) {
        let mut info = PackageInfo::default();
        let mut section = section(stream);
        let mut stack = vec![AttributeHandler::PackageAttributes];
        let result = {
            let mut context = AttributeHandlerContext {
                handler: ContentHandlerRef::Package(&mut info),
                section: SectionId::PackageAttributes,
                ignore_unknown_attributes: ignore_unknown,
                integer_table: &[],
                heap: None,
            };
            parse_attribute_tree(&mut section, &mut context, TagLayout::Composed, &mut stack)
        };
        (result, info, stack.len())
    }

    #[test]
    fn flat() {
        let mut stream = inline_string(15, "example", false);
        stream.extend(varint(20, 3));
        stream.push(0);

        let (result, info, depth) = walk_info(stream, false);
        result.unwrap();
        assert_eq!(info.name, "example");
        assert_eq!(info.flags.bits(), 3);
        assert_eq!(depth, 0);
    }

    #[test]
    fn nested() {
        let mut stream = inline_string(15, "example", false);
        stream.extend(inline_string(22, "1", true));
        stream.extend(inline_string(23, "2", false));
        stream.extend(varint(25, 7));
        stream.push(0);
        stream.extend(inline_string(29, "lib:libz", true));
        stream.extend(varint(34, 4));
        stream.extend(inline_string(22, "1", true));
        stream.extend(inline_string(23, "2", false));
        stream.push(0);
        stream.push(0);
        // Provides without children
        stream.extend(inline_string(28, "cmd:example", false));
        stream.push(0);

        let (result, info, depth) = walk_info(stream, false);
        result.unwrap();
        assert_eq!(depth, 0);
        assert_eq!(info.version.unwrap().to_string(), "1.2-7");
        assert_eq!(info.requires.len(), 1);
        assert_eq!(info.requires[0].to_string(), "lib:libz >= 1.2");
        assert_eq!(info.provides.len(), 1);
        assert_eq!(info.provides[0].name, "cmd:example");
    }

    #[test]
    fn unknown_attributes() {
        let mut stream = inline_string(15, "example", false);
        stream.extend(inline_string(100, "future", true));
        stream.extend(varint(101, 1));
        stream.push(0);
        stream.extend(inline_string(16, "summary", false));
        stream.push(0);

        let (result, info, _) = walk_info(stream.clone(), true);
        result.unwrap();
        assert_eq!(info.summary, "summary");

        let (result, info, _) = walk_info(stream, false);
        let error = result.unwrap_err();
        assert!(error.is_bad_data());
        assert!(error.to_string().contains("100"));
        assert!(info.summary.is_empty());
    }

    #[test]
    fn truncated() {
        let mut stream = inline_string(15, "example", false);
        stream.extend(inline_string(22, "1", true));
        stream.extend(inline_string(23, "2", false));

        let (result, info, depth) = walk_info(stream, false);
        assert!(matches!(result, Err(Error::OutOfBounds)));
        assert_eq!(info.name, "example");
        assert!(info.version.is_none());
        assert_eq!(depth, 2);
    }

    #[test]
    fn excess_bytes() {
        let mut stream = inline_string(15, "example", false);
        stream.extend([0, 0xAA]);

        let (result, _, depth) = walk_info(stream, false);
        assert!(result.unwrap_err().is_bad_data());
        assert_eq!(depth, 0);
    }

    #[test]
    fn invalid_values() {
        // Architecture out of range
        let mut stream = varint(21, 99);
        stream.push(0);
        assert!(walk_info(stream, true).0.unwrap_err().is_bad_data());

        // Name stored as integer
        let mut stream = varint(15, 1);
        stream.push(0);
        assert!(walk_info(stream, true).0.unwrap_err().is_bad_data());
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
        next: u64,
    }

    impl LowLevelPackageHandler for Recorder {
        fn handle_attribute(
            &mut self,
            id: u8,
            value: &AttributeValue,
            parent: Option<LowLevelToken>,
        ) -> Result<LowLevelToken> {
            self.next += 1;
            self.events
                .push(format!("{id}:{:?}:{:?}", value.as_str(), parent.map(|p| p.0)));
            Ok(LowLevelToken(self.next))
        }

        fn handle_attribute_done(
            &mut self,
            id: u8,
            _value: &AttributeValue,
            _parent: Option<LowLevelToken>,
            token: LowLevelToken,
        ) -> Result<()> {
            self.events.push(format!("done {id}:{}", token.0));
            Ok(())
        }
    }

    #[test]
    fn low_level_split() {
        let mut stream = split_tag(0, 3, 0, true);
        stream.extend(b"\x04boot");
        stream.extend(split_tag(1, 2, 4, false));
        stream.push(1);
        stream.push(0);
        stream.extend(split_tag(200, 3, 0, false));
        stream.extend(b"\x01x");
        stream.push(1);

        let mut recorder = Recorder::default();
        let mut section = section(stream);
        let mut stack = vec![AttributeHandler::low_level()];
        {
            let mut context = AttributeHandlerContext {
                handler: ContentHandlerRef::LowLevel(&mut recorder),
                section: SectionId::Toc,
                ignore_unknown_attributes: false,
                integer_table: &[],
                heap: None,
            };
            parse_attribute_tree(&mut section, &mut context, TagLayout::Split, &mut stack)
                .unwrap();
        }

        assert!(stack.is_empty());
        assert_eq!(
            recorder.events,
            vec![
                "0:Some(\"boot\"):None",
                "1:None:Some(1)",
                "done 1:2",
                "done 0:1",
                "200:Some(\"x\"):None",
                "done 200:3",
            ]
        );
    }

    #[test]
    fn end_of_stream_nested() {
        let mut stream = split_tag(0, 3, 0, true);
        stream.extend(b"\x01a");
        stream.push(1);

        let mut recorder = Recorder::default();
        let mut section = section(stream);
        let mut stack = vec![AttributeHandler::low_level()];
        let mut context = AttributeHandlerContext {
            handler: ContentHandlerRef::LowLevel(&mut recorder),
            section: SectionId::Toc,
            ignore_unknown_attributes: false,
            integer_table: &[],
            heap: None,
        };
        let result =
            parse_attribute_tree(&mut section, &mut context, TagLayout::Split, &mut stack);
        let error = result.unwrap_err();
        assert!(error.is_bad_data());
        assert!(error.to_string().contains("low level handler is open"), "{error}");
    }
}
