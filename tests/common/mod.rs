//! Helpers shared by the integration tests.

#![allow(dead_code)]

#[path = "../../src/test/builder.rs"]
mod builder;

pub use builder::*;

use hpkg::{CollectingErrorOutput, PackageReader, ReaderOptions, Result};

/// An image without heap whose attributes section holds exactly `attributes`.
pub fn image_with_attributes(attributes: &[u8]) -> Vec<u8> {
    let mut image = HeaderFields {
        total_size: 80 + attributes.len() as u64,
        attributes_length: attributes.len() as u32,
        ..HeaderFields::default()
    }
    .to_bytes();
    image.extend(attributes);
    image
}

/// Opens `image` with a reader collecting its diagnostics.
pub fn open(image: Vec<u8>, options: ReaderOptions) -> Result<(PackageReader, CollectingErrorOutput)> {
    let output = CollectingErrorOutput::default();
    let mut reader = PackageReader::with_error_output(options, Box::new(output.clone()));
    reader.init(hpkg::File::from_mem(image)?)?;
    Ok((reader, output))
}
