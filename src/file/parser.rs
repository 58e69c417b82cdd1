//! Cursor-based byte stream parser for section and attribute decoding.
//!
//! [`Parser`] wraps a byte slice and a position. Every read is bounds checked and advances
//! the cursor only on success, so a failed read leaves the parser where it was for
//! diagnostics. The attribute stream of a section is consumed exclusively through this
//! type: tags and lengths through [`Parser::read_unsigned_leb128`], fixed-width integers
//! through [`Parser::read_be`], inline payloads through [`Parser::read_bytes`].
//!
//! # Examples
//!
//! ```rust
//! use hpkg::Parser;
//!
//! // 300 as LEB128, then a big-endian u16
//! let data = [0xAC, 0x02, 0x12, 0x34];
//! let mut parser = Parser::new(&data);
//!
//! assert_eq!(parser.read_unsigned_leb128()?, 300);
//! assert_eq!(parser.read_be::<u16>()?, 0x1234);
//! assert!(!parser.has_more_data());
//! # Ok::<(), hpkg::Error>(())
//! ```

use crate::{
    file::io::{read_be_at, BeIO},
    Result,
};

/// Maximum number of bytes an unsigned LEB128 value may occupy (ceil(64 / 7)).
const MAX_LEB128_BYTES: usize = 10;

/// A cursor over a borrowed byte slice.
pub struct Parser<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new parser positioned at the start of `data`.
    ///
    /// # Arguments
    /// * `data` - The byte slice to read from
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the parser has no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if there is more data available to parse.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Move the current position to the specified index.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if position is beyond the data length.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        self.position = pos;
        Ok(())
    }

    /// Get the current position of the parser within the data buffer.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Returns the number of bytes left after the current position.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Peek at the byte at the current position without advancing.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if at the end of the data.
    pub fn peek_byte(&self) -> Result<u8> {
        match self.data.get(self.position) {
            Some(byte) => Ok(*byte),
            None => Err(out_of_bounds_error!()),
        }
    }

    /// Read a single byte and advance.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if at the end of the data.
    pub fn read_u8(&mut self) -> Result<u8> {
        let byte = self.peek_byte()?;
        self.position += 1;
        Ok(byte)
    }

    /// Read a fixed-width big-endian value and advance past it.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `size_of::<T>()` bytes remain.
    pub fn read_be<T: BeIO>(&mut self) -> Result<T> {
        read_be_at::<T>(self.data, &mut self.position)
    }

    /// Decode an unsigned LEB128 integer.
    ///
    /// Each byte contributes its low 7 bits, least significant group first; a clear high
    /// bit terminates the value.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the data ends before the terminating byte
    /// and [`crate::Error::Malformed`] if the encoding does not fit into 64 bits (more than
    /// ten bytes, or a tenth byte carrying more than one significant bit).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hpkg::Parser;
    ///
    /// let data = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
    /// let mut parser = Parser::new(&data);
    /// assert_eq!(parser.read_unsigned_leb128()?, u64::MAX);
    /// # Ok::<(), hpkg::Error>(())
    /// ```
    pub fn read_unsigned_leb128(&mut self) -> Result<u64> {
        let start = self.position;
        let mut value = 0_u64;

        for index in 0..MAX_LEB128_BYTES {
            let Some(&byte) = self.data.get(start + index) else {
                return Err(out_of_bounds_error!());
            };

            let bits = u64::from(byte & 0x7F);
            if index == MAX_LEB128_BYTES - 1 && bits > 1 {
                return Err(malformed_error!(
                    "LEB128 value at offset {} exceeds 64 bits",
                    start
                ));
            }

            value |= bits << (7 * index);

            if byte & 0x80 == 0 {
                self.position = start + index + 1;
                return Ok(value);
            }
        }

        Err(malformed_error!(
            "LEB128 value at offset {} is longer than {} bytes",
            start,
            MAX_LEB128_BYTES
        ))
    }

    /// Computes `position + length`, checking for overflow and the data bounds.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the result would overflow or exceed the data.
    pub fn calc_end_position(&self, length: usize) -> Result<usize> {
        let end = self
            .position
            .checked_add(length)
            .ok_or(out_of_bounds_error!())?;

        if end > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        Ok(end)
    }

    /// Reads a slice of `length` bytes from the current position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading `length` bytes would exceed the data.
    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        let end = self.calc_end_position(length)?;
        let bytes = &self.data[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    /// Like [`Parser::read_bytes`], taking a length decoded from the stream.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the length does not fit or exceeds the data.
    pub fn read_bytes_u64(&mut self, length: u64) -> Result<&'a [u8]> {
        let length = usize::try_from(length).map_err(|_| out_of_bounds_error!())?;
        self.read_bytes(length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{test::encode_leb128, Error};

    #[test]
    fn test_read_unsigned_leb128() {
        let cases: [(&[u8], u64); 5] = [
            (&[0x00], 0),
            (&[0x7F], 127),
            (&[0x80, 0x01], 128),
            (&[0xE5, 0x8E, 0x26], 624_485),
            (&[0x80, 0x80, 0x80, 0x80, 0x10], 1 << 32),
        ];

        for (input, expected) in cases {
            let mut parser = Parser::new(input);
            assert_eq!(parser.read_unsigned_leb128().unwrap(), expected);
            assert_eq!(parser.pos(), input.len());
        }
    }

    #[test]
    fn test_read_unsigned_leb128_boundaries() {
        let mut values = vec![0_u64, u64::MAX, u64::MAX - 1, 1 << 63, (1 << 63) - 1];
        for shift in 0..64 {
            values.push(1 << shift);
            values.push((1_u64 << shift).wrapping_sub(1));
        }

        for value in values {
            let encoded = encode_leb128(value);
            assert!(encoded.len() <= MAX_LEB128_BYTES);

            let mut parser = Parser::new(&encoded);
            assert_eq!(parser.read_unsigned_leb128().unwrap(), value, "{value:#x}");
            assert!(!parser.has_more_data());
        }
    }

    #[test]
    fn test_read_unsigned_leb128_non_canonical() {
        // Padded zero groups are accepted
        let input = &[0x81, 0x80, 0x80, 0x00];
        let mut parser = Parser::new(input);
        assert_eq!(parser.read_unsigned_leb128().unwrap(), 1);
    }

    #[test]
    fn test_read_unsigned_leb128_truncated() {
        for input in [&[][..], &[0x80], &[0xFF, 0xFF, 0xFF]] {
            let mut parser = Parser::new(input);
            assert!(matches!(
                parser.read_unsigned_leb128(),
                Err(Error::OutOfBounds)
            ));
            assert_eq!(parser.pos(), 0);
        }
    }

    #[test]
    fn test_read_unsigned_leb128_overflow() {
        // Eleven bytes
        let input = [0x80; 11];
        let mut parser = Parser::new(&input);
        assert!(matches!(
            parser.read_unsigned_leb128(),
            Err(Error::Malformed { .. })
        ));

        // Ten bytes, but the last one carries bit 64
        let mut input = [0xFF; 10];
        input[9] = 0x02;
        let mut parser = Parser::new(&input);
        assert!(matches!(
            parser.read_unsigned_leb128(),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn test_cursor() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.len(), 5);
        assert_eq!(parser.read_u8().unwrap(), 0x01);
        assert_eq!(parser.read_be::<u16>().unwrap(), 0x0203);
        assert_eq!(parser.remaining(), 2);
        assert_eq!(parser.peek_byte().unwrap(), 0x04);
        assert_eq!(parser.read_bytes(2).unwrap(), &[0x04, 0x05]);
        assert!(parser.read_u8().is_err());
        assert!(parser.read_bytes(1).is_err());

        parser.seek(4).unwrap();
        assert_eq!(parser.pos(), 4);
        assert_eq!(parser.remaining(), 1);
        assert!(parser.seek(6).is_err());
        assert!(parser.read_bytes(usize::MAX).is_err());
        assert!(parser.read_bytes_u64(u64::MAX).is_err());
    }
}
