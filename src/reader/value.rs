//! Attribute values and their decoding.

use crate::{
    file::parser::Parser,
    format::{AttributeType, ValueEncoding},
    heap::HeapRef,
    reader::section::Section,
    Result,
};

/// The payload of an attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeData {
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    Uint(u64),
    /// String, resolved from the stream or the string table.
    String(String),
    /// Bytes, resolved from the stream or the string table.
    Raw(Vec<u8>),
    /// String or bytes stored in the heap, not read yet.
    Heap(HeapRef),
}

/// A decoded attribute value with its wire type and encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeValue {
    /// Declared value type.
    pub value_type: AttributeType,
    /// How the value was stored.
    pub encoding: ValueEncoding,
    /// The value itself.
    pub data: AttributeData,
}

impl AttributeValue {
    /// The value as unsigned integer; signed values are reinterpreted.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self.data {
            AttributeData::Uint(value) => Some(value),
            AttributeData::Int(value) => Some(value as u64),
            _ => None,
        }
    }

    /// The value as signed integer; unsigned values are reinterpreted.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self.data {
            AttributeData::Int(value) => Some(value),
            AttributeData::Uint(value) => Some(value as i64),
            _ => None,
        }
    }

    /// The value as string, unless it lives in the heap.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match &self.data {
            AttributeData::String(value) => Some(value),
            _ => None,
        }
    }

    /// The value as bytes, unless it lives in the heap.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.data {
            AttributeData::Raw(value) => Some(value),
            AttributeData::String(value) => Some(value.as_bytes()),
            _ => None,
        }
    }

    /// The heap range of a heap-stored value.
    #[must_use]
    pub fn heap_ref(&self) -> Option<HeapRef> {
        match self.data {
            AttributeData::Heap(heap) => Some(heap),
            _ => None,
        }
    }
}

/// Decodes one value of the raw `value_type` and `encoding` from `parser`.
///
/// # Arguments
/// * `parser` - Cursor over the attribute stream of `section`
/// * `section` - Provides the string table
/// * `integer_table` - Side table for table-encoded integers
/// * `value_type` - Raw type from the attribute tag
/// * `encoding` - Raw encoding from the attribute tag
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for undefined type/encoding pairs, invalid table
/// indices and invalid UTF-8, and [`crate::Error::OutOfBounds`] on truncated input.
pub fn read_attribute_value(
    parser: &mut Parser<'_>,
    section: &Section,
    integer_table: &[u64],
    value_type: u8,
    encoding: u8,
) -> Result<AttributeValue> {
    let start = parser.pos();
    let Some(resolved_type) = AttributeType::from_repr(value_type) else {
        return Err(malformed_error!(
            "Invalid attribute type {} at offset {} of the {} section",
            value_type,
            start,
            section.name
        ));
    };
    let Some(resolved_encoding) = ValueEncoding::resolve(resolved_type, encoding) else {
        return Err(malformed_error!(
            "Invalid encoding {} for {} attribute at offset {} of the {} section",
            encoding,
            resolved_type,
            start,
            section.name
        ));
    };

    let data = match (resolved_type, resolved_encoding) {
        (AttributeType::Int, ValueEncoding::Fixed(width)) => AttributeData::Int(match width {
            1 => i64::from(parser.read_be::<i8>()?),
            2 => i64::from(parser.read_be::<i16>()?),
            4 => i64::from(parser.read_be::<i32>()?),
            _ => parser.read_be::<i64>()?,
        }),
        (AttributeType::Uint, ValueEncoding::Fixed(width)) => AttributeData::Uint(match width {
            1 => u64::from(parser.read_be::<u8>()?),
            2 => u64::from(parser.read_be::<u16>()?),
            4 => u64::from(parser.read_be::<u32>()?),
            _ => parser.read_be::<u64>()?,
        }),
        (AttributeType::Int, ValueEncoding::Varint) => {
            AttributeData::Int(parser.read_unsigned_leb128()? as i64)
        }
        (AttributeType::Uint, ValueEncoding::Varint) => {
            AttributeData::Uint(parser.read_unsigned_leb128()?)
        }
        (AttributeType::Int | AttributeType::Uint, ValueEncoding::IntegerTable) => {
            let index = parser.read_unsigned_leb128()?;
            let Some(value) = usize::try_from(index)
                .ok()
                .and_then(|index| integer_table.get(index))
            else {
                return Err(malformed_error!(
                    "Integer table index {} out of range ({} entries) at offset {}",
                    index,
                    integer_table.len(),
                    start
                ));
            };

            if resolved_type == AttributeType::Int {
                AttributeData::Int(*value as i64)
            } else {
                AttributeData::Uint(*value)
            }
        }
        (_, ValueEncoding::Inline) => read_inline(parser, resolved_type, start)?,
        (_, ValueEncoding::StringTable) => {
            let index = parser.read_unsigned_leb128()?;
            if index == 0 {
                read_inline(parser, resolved_type, start)?
            } else {
                let Some(string) = usize::try_from(index - 1)
                    .ok()
                    .and_then(|index| section.string(index))
                else {
                    return Err(malformed_error!(
                        "String table index {} out of range ({} strings) at offset {}",
                        index,
                        section.strings.len(),
                        start
                    ));
                };

                if resolved_type == AttributeType::String {
                    AttributeData::String(string.to_string())
                } else {
                    AttributeData::Raw(string.as_bytes().to_vec())
                }
            }
        }
        (_, ValueEncoding::Heap) => {
            let offset = parser.read_unsigned_leb128()?;
            let size = parser.read_unsigned_leb128()?;
            AttributeData::Heap(HeapRef::new(offset, size))
        }
        _ => {
            return Err(malformed_error!(
                "Invalid encoding {} for {} attribute at offset {}",
                encoding,
                resolved_type,
                start
            ))
        }
    };

    Ok(AttributeValue {
        value_type: resolved_type,
        encoding: resolved_encoding,
        data,
    })
}

fn read_inline(parser: &mut Parser<'_>, value_type: AttributeType, start: usize) -> Result<AttributeData> {
    let length = parser.read_unsigned_leb128()?;
    let bytes = parser.read_bytes_u64(length)?;

    if value_type == AttributeType::String {
        match std::str::from_utf8(bytes) {
            Ok(string) => Ok(AttributeData::String(string.to_string())),
            Err(_) => Err(malformed_error!(
                "Inline string at offset {} is not valid UTF-8",
                start
            )),
        }
    } else {
        Ok(AttributeData::Raw(bytes.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{test::encode_leb128, Error};

    fn section() -> Section {
        let mut section = Section {
            name: "test",
            data: b"haiku\0gcc\0".to_vec(),
            strings_length: 10,
            strings_count: 2,
            ..Section::default()
        };
        section.strings = vec![0..5, 6..9];
        section
    }

    fn decode(data: &[u8], value_type: u8, encoding: u8) -> Result<AttributeValue> {
        let mut parser = Parser::new(data);
        let value = read_attribute_value(&mut parser, &section(), &[7, u64::MAX], value_type, encoding)?;
        assert!(!parser.has_more_data());
        Ok(value)
    }

    #[test]
    fn integers() {
        assert_eq!(decode(&[0xFF], 1, 0).unwrap().data, AttributeData::Int(-1));
        assert_eq!(decode(&[0xFF], 2, 0).unwrap().data, AttributeData::Uint(255));
        assert_eq!(
            decode(&[0x80, 0x00], 1, 1).unwrap().data,
            AttributeData::Int(-32768)
        );
        assert_eq!(
            decode(&[0, 0, 1, 0], 2, 2).unwrap().as_u64(),
            Some(256)
        );
        assert_eq!(
            decode(&u64::MAX.to_be_bytes(), 2, 3).unwrap().as_u64(),
            Some(u64::MAX)
        );
        assert_eq!(
            decode(&encode_leb128(300), 2, 4).unwrap().data,
            AttributeData::Uint(300)
        );
        assert_eq!(decode(&[1], 2, 5).unwrap().as_u64(), Some(u64::MAX));
        assert_eq!(decode(&[1], 1, 5).unwrap().as_i64(), Some(-1));
    }

    #[test]
    fn integers_truncated() {
        assert!(matches!(decode(&[0x01], 2, 2), Err(Error::OutOfBounds)));
        assert!(matches!(decode(&[0x80], 2, 4), Err(Error::OutOfBounds)));
        assert!(decode(&[2], 2, 5).unwrap_err().is_bad_data());
    }

    #[test]
    fn strings() {
        let value = decode(b"\x07example", 3, 0).unwrap();
        assert_eq!(value.as_str(), Some("example"));
        assert_eq!(value.encoding, ValueEncoding::Inline);

        let value = decode(&[2], 3, 1).unwrap();
        assert_eq!(value.as_str(), Some("gcc"));
        assert_eq!(value.encoding, ValueEncoding::StringTable);

        // Index 0 falls back to an inline payload
        let value = decode(b"\x00\x02hi", 3, 1).unwrap();
        assert_eq!(value.as_str(), Some("hi"));

        assert!(decode(&[3], 3, 1).unwrap_err().is_bad_data());
        assert!(decode(b"\x02\xFF\xFF", 3, 0).unwrap_err().is_bad_data());
        assert!(matches!(decode(b"\x05abc", 3, 0), Err(Error::OutOfBounds)));
    }

    #[test]
    fn heap_refs() {
        let mut data = encode_leb128(70_000);
        data.extend(encode_leb128(12));

        let value = decode(&data, 3, 2).unwrap();
        assert_eq!(value.heap_ref(), Some(HeapRef::new(70_000, 12)));
        assert_eq!(value.as_str(), None);

        let value = decode(&data, 4, 1).unwrap();
        assert_eq!(value.heap_ref(), Some(HeapRef::new(70_000, 12)));
    }

    #[test]
    fn raw() {
        let value = decode(&[3, 1, 2, 3], 4, 0).unwrap();
        assert_eq!(value.as_bytes(), Some(&[1_u8, 2, 3][..]));

        let value = decode(&[1], 4, 2).unwrap();
        assert_eq!(value.as_bytes(), Some(&b"haiku"[..]));
    }

    #[test]
    fn invalid_pairs() {
        assert!(decode(&[0], 0, 0).unwrap_err().is_bad_data());
        assert!(decode(&[0], 5, 0).unwrap_err().is_bad_data());
        assert!(decode(&[0], 1, 6).unwrap_err().is_bad_data());
        assert!(decode(&[0], 3, 3).unwrap_err().is_bad_data());
        assert!(decode(&[0], 4, 3).unwrap_err().is_bad_data());
    }
}
