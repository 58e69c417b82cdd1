#![no_main]

use libfuzzer_sys::fuzz_target;
use hpkg::{LowLevelPackageHandler, LowLevelToken, PackageInfo, PackageReader, ReaderOptions};
use hpkg::reader::value::AttributeValue;

struct Sink(u64);

impl LowLevelPackageHandler for Sink {
    fn handle_attribute(
        &mut self,
        _id: u8,
        _value: &AttributeValue,
        _parent: Option<LowLevelToken>,
    ) -> hpkg::Result<LowLevelToken> {
        self.0 += 1;
        Ok(LowLevelToken(self.0))
    }
}

fuzz_target!(|data: &[u8]| {
    if let Ok(mut reader) = PackageReader::from_mem(data.to_vec(), ReaderOptions::default()) {
        let mut info = PackageInfo::default();
        let _ = reader.parse_content(&mut info);
    }

    if let Ok(mut reader) = PackageReader::from_mem(data.to_vec(), ReaderOptions::default()) {
        let _ = reader.parse_content_low_level(&mut Sink(0));
    }
});
