//! Big-endian field decoding.
//!
//! Every multi-byte integer in an HPKG file (header fields, the heap chunk-size table,
//! fixed-width attribute values) is stored in big-endian byte order. This module provides
//! the width-specific decoders used uniformly for all of them, built around the
//! [`BeIO`] trait.
//!
//! All functions are bounds checked and return [`crate::Error::OutOfBounds`] when the
//! buffer is too short; none of them panic on malformed input.
//!
//! # Examples
//!
//! ```rust,ignore
//! use hpkg::file::io::{read_be, read_be_at};
//!
//! let data = [0x68, 0x70, 0x6B, 0x67, 0x00, 0x50];
//! let magic: u32 = read_be(&data)?;
//! assert_eq!(magic, 0x6870_6B67);
//!
//! let mut offset = 4;
//! let header_size: u16 = read_be_at(&data, &mut offset)?;
//! assert_eq!(header_size, 80);
//! assert_eq!(offset, 6);
//! # Ok::<(), hpkg::Error>(())
//! ```

use crate::{Error::OutOfBounds, Result};

/// Trait for fixed-width integer types that can be decoded from big-endian bytes.
pub trait BeIO: Sized {
    /// Associated type representing the byte array type for this numeric type.
    type Bytes: Sized + for<'a> TryFrom<&'a [u8]>;

    /// Read T from a byte buffer in big-endian
    fn from_be_bytes(bytes: Self::Bytes) -> Self;
}

macro_rules! impl_be_io {
    ($($ty:ty),*) => {
        $(
            impl BeIO for $ty {
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                fn from_be_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_be_bytes(bytes)
                }
            }
        )*
    };
}

impl_be_io!(u8, i8, u16, i16, u32, i32, u64, i64);

/// Safely reads a value of type `T` in big-endian byte order from the start of a buffer.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_be<T: BeIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_be_at(data, &mut offset)
}

/// Safely reads a value of type `T` in big-endian byte order at a specific offset.
///
/// The offset is advanced by the number of bytes read.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_be_at<T: BeIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(OutOfBounds);
    };
    if end > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(OutOfBounds);
    };

    *offset = end;

    Ok(T::from_be_bytes(read))
}
