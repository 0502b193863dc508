use flate2::Compression;
use flate2::write::ZlibEncoder;
use std::fmt::Debug;
use std::io::{self, Write};

/// A pure `bytes -> bytes` stream encoder paired with the filter name a reader
/// needs to undo it.
pub trait Compressor: Send + Sync + Debug {
    /// The `/Filter` name written into stream headers, e.g. `FlateDecode`.
    fn filter_name(&self) -> &'static str;

    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>>;
}

/// zlib/deflate compression, decoded by readers through `/FlateDecode`.
#[derive(Debug, Clone, Copy)]
pub struct FlateCompressor {
    level: Compression,
}

impl FlateCompressor {
    /// `level` is clamped to the zlib range 0-9.
    pub fn new(level: u32) -> Self {
        Self { level: Compression::new(level.min(9)) }
    }

    pub fn level(&self) -> u32 {
        self.level.level()
    }
}

impl Default for FlateCompressor {
    fn default() -> Self {
        Self { level: Compression::default() }
    }
}

impl Compressor for FlateCompressor {
    fn filter_name(&self) -> &'static str {
        "FlateDecode"
    }

    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2 + 16), self.level);
        encoder.write_all(data)?;
        encoder.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::ZlibDecoder;
    use std::io::Read;

    #[test]
    fn test_flate_output_inflates_back() {
        let data: Vec<u8> = (0..4096u32).map(|i| (i % 7) as u8).collect();
        let compressed = FlateCompressor::default().compress(&data).unwrap();
        assert!(compressed.len() < data.len());

        let mut inflated = Vec::new();
        ZlibDecoder::new(&compressed[..]).read_to_end(&mut inflated).unwrap();
        assert_eq!(inflated, data);
    }

    #[test]
    fn test_level_is_clamped() {
        assert_eq!(FlateCompressor::new(42).level(), 9);
        assert_eq!(FlateCompressor::new(0).level(), 0);
        assert_eq!(FlateCompressor::default().filter_name(), "FlateDecode");
    }
}
