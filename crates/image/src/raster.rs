//! The decoded raster model shared by decoders and the embedding pipeline.

use crate::error::ImageError;
use flate2::read::ZlibDecoder;
use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    DeviceGray,
    DeviceRGB,
    DeviceCMYK,
}

impl ColorSpace {
    pub fn name(self) -> &'static str {
        match self {
            ColorSpace::DeviceGray => "DeviceGray",
            ColorSpace::DeviceRGB => "DeviceRGB",
            ColorSpace::DeviceCMYK => "DeviceCMYK",
        }
    }

    pub fn components(self) -> u8 {
        match self {
            ColorSpace::DeviceGray => 1,
            ColorSpace::DeviceRGB => 3,
            ColorSpace::DeviceCMYK => 4,
        }
    }
}

/// Where an image's transparency comes from.
///
/// Single-color keys (gray or RGB `tRNS`) have no variant: decoders drop them
/// and the image embeds as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Transparency {
    #[default]
    None,
    /// One alpha byte per palette entry. Entries past the end of the table are opaque.
    IndexedAlpha(Vec<u8>),
    /// An alpha sample interleaved after the color samples of every pixel.
    NativeAlpha,
}

#[derive(Debug, Clone)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    /// Bits per sample (per palette index for indexed images).
    pub bit_depth: u8,
    /// Color samples per pixel, alpha excluded. Indexed images have one.
    pub components: u8,
    /// The device colorspace of the samples, or of the palette entries for indexed images.
    pub color_space: ColorSpace,
    /// Packed RGB triples for indexed images.
    pub palette: Option<Vec<u8>>,
    pub transparency: Transparency,
    /// zlib data whose scanlines each start with a PNG predictor byte.
    pub data: Vec<u8>,
}

impl RasterImage {
    /// Samples per pixel as stored, alpha included.
    pub fn channels(&self) -> u8 {
        match self.transparency {
            Transparency::NativeAlpha => self.components + 1,
            _ => self.components,
        }
    }

    pub fn bits_per_pixel(&self) -> usize {
        usize::from(self.channels()) * usize::from(self.bit_depth)
    }

    /// Unfiltered bytes per scanline, predictor byte excluded.
    pub fn row_bytes(&self) -> Result<usize, ImageError> {
        (self.width as usize)
            .checked_mul(self.bits_per_pixel())
            .map(|bits| bits.div_ceil(8))
            .ok_or_else(|| ImageError::UnsupportedFormat(format!("image width {} is too large", self.width)))
    }

    pub fn pixel_count(&self) -> Result<usize, ImageError> {
        (self.width as usize)
            .checked_mul(self.height as usize)
            .ok_or_else(|| ImageError::UnsupportedFormat(format!("{}x{} image is too large", self.width, self.height)))
    }

    pub fn is_indexed(&self) -> bool {
        self.palette.is_some()
    }

    /// Number of palette entries, zero for non-indexed images.
    pub fn palette_len(&self) -> usize {
        self.palette.as_ref().map_or(0, |p| p.len() / 3)
    }

    /// Inflates `data` and reverses the per-row predictors, returning `height`
    /// rows of `row_bytes()` bytes each.
    pub fn decode_samples(&self) -> Result<Vec<u8>, ImageError> {
        let row_bytes = self.row_bytes()?;
        let rows = self.height as usize;
        let expected = row_bytes
            .checked_add(1)
            .and_then(|stride| stride.checked_mul(rows))
            .ok_or_else(|| ImageError::UnsupportedFormat("image data size overflows".into()))?;

        // Dimensions come from the file, so neither the buffer nor the inflater
        // may grow past what they can describe.
        let mut inflated = Vec::new();
        ZlibDecoder::new(&self.data[..])
            .take((expected as u64).saturating_add(1))
            .read_to_end(&mut inflated)
            .map_err(|e| ImageError::Decode(format!("cannot inflate pixel data: {}", e)))?;
        if inflated.len() < expected {
            return Err(ImageError::Decode(format!(
                "pixel data holds {} bytes, {} needed for {}x{}",
                inflated.len(),
                expected,
                self.width,
                self.height
            )));
        }
        if inflated.len() > expected {
            log::debug!("Ignoring trailing bytes of pixel data past {}", expected);
        }

        let filter_unit = (self.bits_per_pixel() / 8).max(1);
        unfilter(&inflated[..expected], rows, row_bytes, filter_unit)
    }
}

/// Reverses PNG scanline filtering. `data` holds `rows` lines of one filter-type
/// byte followed by `row_bytes` filtered bytes; `unit` is the byte distance to
/// the corresponding sample of the previous pixel.
pub(crate) fn unfilter(data: &[u8], rows: usize, row_bytes: usize, unit: usize) -> Result<Vec<u8>, ImageError> {
    let mut out = vec![0u8; rows * row_bytes];
    let zero_row = vec![0u8; row_bytes];

    for y in 0..rows {
        let line = &data[y * (row_bytes + 1)..(y + 1) * (row_bytes + 1)];
        let filter = line[0];
        let src = &line[1..];

        let (done, rest) = out.split_at_mut(y * row_bytes);
        let prev = if y == 0 { &zero_row[..] } else { &done[(y - 1) * row_bytes..] };
        let cur = &mut rest[..row_bytes];

        for x in 0..row_bytes {
            let a = if x >= unit { cur[x - unit] } else { 0 };
            let b = prev[x];
            let c = if x >= unit { prev[x - unit] } else { 0 };
            let predicted = match filter {
                0 => 0,
                1 => a,
                2 => b,
                3 => ((u16::from(a) + u16::from(b)) / 2) as u8,
                4 => paeth(a, b, c),
                other => {
                    return Err(ImageError::Decode(format!("unknown row filter {} on row {}", other, y)));
                }
            };
            cur[x] = src[x].wrapping_add(predicted);
        }
    }
    Ok(out)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = i16::from(a) + i16::from(b) - i16::from(c);
    let pa = (p - i16::from(a)).abs();
    let pb = (p - i16::from(b)).abs();
    let pc = (p - i16::from(c)).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}
