use super::Backend;
use crate::{Error::OutOfBounds, Result};

/// A package image held in memory, e.g. downloaded or extracted from another container.
#[derive(Debug)]
pub struct Memory {
    data: Vec<u8>,
}

impl Memory {
    /// Takes ownership of `data`.
    #[must_use]
    pub fn new(data: Vec<u8>) -> Memory {
        Memory { data }
    }
}

impl Backend for Memory {
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        match offset.checked_add(len) {
            Some(end) if end <= self.data.len() => Ok(&self.data[offset..end]),
            _ => Err(OutOfBounds),
        }
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}
