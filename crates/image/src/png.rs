//! A PNG chunk reader producing [`RasterImage`] values.
//!
//! Pixel data is kept in its compressed, predictor-filtered form so opaque
//! images can be embedded without re-encoding. Chunk CRCs are not verified.

use crate::error::ImageError;
use crate::raster::{ColorSpace, RasterImage, Transparency};

const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'];
/// Largest width or height a PNG header may declare.
const MAX_DIMENSION: u32 = (1 << 31) - 1;

/// Turns encoded image bytes into a [`RasterImage`].
pub trait RasterDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<RasterImage, ImageError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PngDecoder;

impl RasterDecoder for PngDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<RasterImage, ImageError> {
        decode_png(bytes)
    }
}

struct Header {
    width: u32,
    height: u32,
    bit_depth: u8,
    color_type: u8,
}

pub fn decode_png(bytes: &[u8]) -> Result<RasterImage, ImageError> {
    if bytes.len() < SIGNATURE.len() || bytes[..SIGNATURE.len()] != SIGNATURE {
        return Err(ImageError::Decode("missing PNG signature".into()));
    }

    let mut pos = SIGNATURE.len();
    let mut header: Option<Header> = None;
    let mut palette: Option<Vec<u8>> = None;
    let mut trns: Option<Vec<u8>> = None;
    let mut data = Vec::new();
    let mut ended = false;

    while pos < bytes.len() {
        let (kind, body, next) = read_chunk(bytes, pos)?;
        pos = next;
        match &kind {
            b"IHDR" => header = Some(parse_header(body)?),
            b"PLTE" => {
                if body.is_empty() || body.len() % 3 != 0 || body.len() > 256 * 3 {
                    return Err(ImageError::Decode(format!("invalid PLTE length {}", body.len())));
                }
                palette = Some(body.to_vec());
            }
            b"tRNS" => trns = Some(body.to_vec()),
            b"IDAT" => data.extend_from_slice(body),
            b"IEND" => {
                ended = true;
                break;
            }
            _ => {
                if header.is_none() {
                    return Err(ImageError::Decode("first chunk is not IHDR".into()));
                }
                log::trace!("Skipping PNG chunk {}", String::from_utf8_lossy(&kind));
            }
        }
    }

    let header = header.ok_or_else(|| ImageError::Decode("missing IHDR chunk".into()))?;
    if !ended {
        log::debug!("PNG stream has no IEND chunk");
    }
    if data.is_empty() {
        return Err(ImageError::Decode("no IDAT data".into()));
    }

    let (components, color_space, native_alpha) = match header.color_type {
        0 => (1, ColorSpace::DeviceGray, false),
        2 => (3, ColorSpace::DeviceRGB, false),
        3 => (1, ColorSpace::DeviceRGB, false),
        4 => (1, ColorSpace::DeviceGray, true),
        6 => (3, ColorSpace::DeviceRGB, true),
        other => return Err(ImageError::UnsupportedFormat(format!("PNG color type {}", other))),
    };

    let palette = if header.color_type == 3 {
        Some(palette.ok_or_else(|| ImageError::Decode("indexed PNG without PLTE".into()))?)
    } else {
        None
    };

    let transparency = if native_alpha {
        Transparency::NativeAlpha
    } else {
        match (trns, &palette) {
            (Some(table), Some(entries)) => {
                if table.len() > entries.len() / 3 {
                    return Err(ImageError::Decode(format!(
                        "tRNS has {} entries for a {}-color palette",
                        table.len(),
                        entries.len() / 3
                    )));
                }
                Transparency::IndexedAlpha(table)
            }
            (Some(key), None) => {
                log::warn!(
                    "Ignoring {}-byte color-key transparency; image will be embedded as opaque",
                    key.len()
                );
                Transparency::None
            }
            (None, _) => Transparency::None,
        }
    };

    Ok(RasterImage {
        width: header.width,
        height: header.height,
        bit_depth: header.bit_depth,
        components,
        color_space,
        palette,
        transparency,
        data,
    })
}

fn read_chunk(bytes: &[u8], pos: usize) -> Result<([u8; 4], &[u8], usize), ImageError> {
    let truncated = || ImageError::Decode(format!("truncated chunk at byte {}", pos));
    let head = bytes.get(pos..pos + 8).ok_or_else(truncated)?;
    let len = u32::from_be_bytes([head[0], head[1], head[2], head[3]]) as usize;
    let kind = [head[4], head[5], head[6], head[7]];
    let body_start = pos + 8;
    let body_end = body_start.checked_add(len).ok_or_else(truncated)?;
    let body = bytes.get(body_start..body_end).ok_or_else(truncated)?;
    // Four CRC bytes follow the body.
    let next = body_end + 4;
    if next > bytes.len() {
        return Err(truncated());
    }
    Ok((kind, body, next))
}

fn parse_header(body: &[u8]) -> Result<Header, ImageError> {
    if body.len() != 13 {
        return Err(ImageError::Decode(format!("IHDR has {} bytes", body.len())));
    }
    let width = u32::from_be_bytes([body[0], body[1], body[2], body[3]]);
    let height = u32::from_be_bytes([body[4], body[5], body[6], body[7]]);
    let bit_depth = body[8];
    let color_type = body[9];
    let (compression, filter, interlace) = (body[10], body[11], body[12]);

    if width == 0 || height == 0 {
        return Err(ImageError::Decode(format!("empty image {}x{}", width, height)));
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(ImageError::Decode(format!(
            "image dimensions {}x{} exceed {}",
            width, height, MAX_DIMENSION
        )));
    }
    if compression != 0 || filter != 0 {
        return Err(ImageError::UnsupportedFormat(format!(
            "compression method {} / filter method {}",
            compression, filter
        )));
    }
    if interlace != 0 {
        return Err(ImageError::UnsupportedFormat("interlaced PNG".into()));
    }

    let depth_ok = match color_type {
        0 => matches!(bit_depth, 1 | 2 | 4 | 8 | 16),
        3 => matches!(bit_depth, 1 | 2 | 4 | 8),
        2 | 4 | 6 => matches!(bit_depth, 8 | 16),
        _ => true,
    };
    if !depth_ok {
        return Err(ImageError::UnsupportedFormat(format!(
            "bit depth {} for PNG color type {}",
            bit_depth, color_type
        )));
    }

    Ok(Header { width, height, bit_depth, color_type })
}
