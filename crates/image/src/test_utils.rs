//! Builds small PNG files for decoder and pipeline tests.

use flate2::Compression;
use flate2::write::ZlibEncoder;
use std::io::Write;

pub struct PngSpec {
    pub width: u32,
    pub height: u32,
    pub color_type: u8,
    pub bit_depth: u8,
    pub interlace: u8,
    pub palette: Option<Vec<u8>>,
    pub trns: Option<Vec<u8>>,
}

impl PngSpec {
    pub fn new(width: u32, height: u32, color_type: u8, bit_depth: u8) -> Self {
        Self { width, height, color_type, bit_depth, interlace: 0, palette: None, trns: None }
    }

    pub fn with_palette(mut self, palette: Vec<u8>) -> Self {
        self.palette = Some(palette);
        self
    }

    pub fn with_trns(mut self, trns: Vec<u8>) -> Self {
        self.trns = Some(trns);
        self
    }

    pub fn interlaced(mut self) -> Self {
        self.interlace = 1;
        self
    }

    pub fn row_bytes(&self) -> usize {
        let channels = match self.color_type {
            2 => 3,
            4 => 2,
            6 => 4,
            _ => 1,
        };
        (self.width as usize * channels * self.bit_depth as usize).div_ceil(8)
    }
}

pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Filters every row of `pixels` (packed, unfiltered scanlines) with predictor 0.
pub fn filter_rows_none(pixels: &[u8], row_bytes: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(pixels.len() + pixels.len() / row_bytes.max(1));
    for row in pixels.chunks(row_bytes) {
        out.push(0);
        out.extend_from_slice(row);
    }
    out
}

fn chunk(out: &mut Vec<u8>, kind: &[u8; 4], body: &[u8]) {
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(body);
    // The decoder does not check CRCs.
    out.extend_from_slice(&[0, 0, 0, 0]);
}

pub fn encode_png(spec: &PngSpec, pixels: &[u8]) -> Vec<u8> {
    let mut out = vec![0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'];

    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&spec.width.to_be_bytes());
    ihdr.extend_from_slice(&spec.height.to_be_bytes());
    ihdr.extend_from_slice(&[spec.bit_depth, spec.color_type, 0, 0, spec.interlace]);
    chunk(&mut out, b"IHDR", &ihdr);

    if let Some(palette) = &spec.palette {
        chunk(&mut out, b"PLTE", palette);
    }
    if let Some(trns) = &spec.trns {
        chunk(&mut out, b"tRNS", trns);
    }
    let filtered = filter_rows_none(pixels, spec.row_bytes());
    chunk(&mut out, b"IDAT", &zlib(&filtered));
    chunk(&mut out, b"IEND", &[]);
    out
}
