//! Section string tables.
//!
//! A section ends with `count` NUL-terminated strings packed into exactly `length` bytes.
//! The table is indexed once when the section is loaded; attributes refer to strings by
//! index afterwards.

use std::ops::Range;

use crate::{Error, Result};

/// Splits `table` into `count` NUL-terminated strings.
///
/// Returns the byte ranges of the strings (without terminator) relative to `base`, the
/// position of `table` within its section buffer. Every string must be valid UTF-8.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if fewer than `count` terminators are found, if bytes
/// remain after the last string, or if a string is not valid UTF-8, and
/// [`crate::Error::NoMemory`] if the index cannot be allocated.
pub fn parse_strings(table: &[u8], count: u64, base: usize) -> Result<Vec<Range<usize>>> {
    if count == 0 {
        if !table.is_empty() {
            return Err(malformed_error!(
                "String table of {} bytes holds no strings",
                table.len()
            ));
        }
        return Ok(Vec::new());
    }

    if count > table.len() as u64 {
        return Err(malformed_error!(
            "String table of {} bytes cannot hold {} strings",
            table.len(),
            count
        ));
    }

    let count = usize::try_from(count).map_err(|_| Error::NoMemory)?;
    let mut strings = Vec::new();
    strings
        .try_reserve_exact(count)
        .map_err(|_| Error::NoMemory)?;

    let mut start = 0;
    for (position, byte) in table.iter().enumerate() {
        if *byte != 0 {
            continue;
        }

        if strings.len() == count {
            break;
        }

        if std::str::from_utf8(&table[start..position]).is_err() {
            return Err(malformed_error!(
                "String {} of the string table is not valid UTF-8",
                strings.len()
            ));
        }

        strings.push(base + start..base + position);
        start = position + 1;
    }

    if strings.len() < count {
        return Err(malformed_error!(
            "String table ends after {} of {} strings",
            strings.len(),
            count
        ));
    }

    if start != table.len() {
        return Err(malformed_error!(
            "{} excess bytes after the last string of the string table",
            table.len() - start
        ));
    }

    Ok(strings)
}
