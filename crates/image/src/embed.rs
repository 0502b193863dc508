//! Turns a [`RasterImage`] into image XObjects.
//!
//! Embedding is split in two halves. [`prepare`] does all the pixel work:
//! decoding, channel separation and compression. It touches no shared state, so
//! independent images can be prepared on any thread. [`PreparedImage::register`]
//! then mints identities for the palette, image and soft mask on the
//! document's single registration path. Nothing is registered unless
//! preparation succeeded and the registry has room for every object.

use crate::error::ImageError;
use crate::raster::{ColorSpace, RasterImage, Transparency};
use kiln_object::{Compressor, ObjectError, ObjectRegistry};
use lopdf::{Dictionary, Object, ObjectId, Stream, dictionary};

/// Filter of pixel data passed through from the source image.
const PASSTHROUGH_FILTER: &str = "FlateDecode";
/// PNG predictors, chosen per row.
const PNG_PREDICTOR: i64 = 15;

/// How an image's alpha is obtained. Decided once per image by [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlphaSource<'a> {
    Opaque,
    IndexedAlpha(&'a [u8]),
    NativeAlpha,
}

pub fn classify(image: &RasterImage) -> AlphaSource<'_> {
    match &image.transparency {
        Transparency::IndexedAlpha(table) => AlphaSource::IndexedAlpha(table),
        Transparency::NativeAlpha => AlphaSource::NativeAlpha,
        Transparency::None => AlphaSource::Opaque,
    }
}

/// Buffer sizes for `pixel_count` pixels whose color samples are `bit_depth` bits wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferLayout {
    pub pixel_count: usize,
    pub color_byte_size: usize,
    pub total_color_bytes: usize,
    pub alpha_bytes: usize,
}

impl BufferLayout {
    pub fn new(pixel_count: usize, components: u8, bit_depth: u8) -> Result<Self, ImageError> {
        let color_byte_size = usize::from(components) * usize::from(bit_depth) / 8;
        let total_color_bytes = pixel_count.checked_mul(color_byte_size).ok_or_else(|| {
            ImageError::UnsupportedFormat(format!("{} pixels of {} bytes are too large", pixel_count, color_byte_size))
        })?;
        Ok(Self { pixel_count, color_byte_size, total_color_bytes, alpha_bytes: pixel_count })
    }
}

#[derive(Debug, Clone)]
struct PreparedPalette {
    base: ColorSpace,
    entries: usize,
    stream: Stream,
}

/// An image whose payloads are computed but which has no object identities yet.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    width: u32,
    height: u32,
    bits_per_component: u8,
    color_space: ColorSpace,
    filter: &'static str,
    data: Vec<u8>,
    decode_parms: Option<Dictionary>,
    palette: Option<PreparedPalette>,
    soft_mask: Option<Stream>,
}

/// Identities assigned to an embedded image and its companions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddedImage {
    pub image: ObjectId,
    pub soft_mask: Option<ObjectId>,
    pub palette: Option<ObjectId>,
    pub width: u32,
    pub height: u32,
}

impl PreparedImage {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn has_soft_mask(&self) -> bool {
        self.soft_mask.is_some()
    }

    pub fn has_palette(&self) -> bool {
        self.palette.is_some()
    }

    /// Number of objects [`register`](Self::register) will add.
    pub fn object_count(&self) -> u32 {
        1 + u32::from(self.palette.is_some()) + u32::from(self.soft_mask.is_some())
    }

    /// Registers palette, image and soft mask, in that order.
    pub fn register(self, registry: &mut ObjectRegistry) -> Result<EmbeddedImage, ImageError> {
        if registry.remaining() < self.object_count() {
            return Err(ObjectError::RegistryExhausted { limit: registry.limit() }.into());
        }

        let (palette_id, color_space) = match self.palette {
            Some(palette) => {
                let id = registry.register(palette.stream)?;
                let indexed: Vec<Object> = vec![
                    "Indexed".into(),
                    palette.base.name().into(),
                    Object::Integer(palette.entries as i64 - 1),
                    id.into(),
                ];
                (Some(id), Object::Array(indexed))
            }
            None => (None, Object::from(self.color_space.name())),
        };

        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => self.width,
            "Height" => self.height,
            "ColorSpace" => color_space,
            "BitsPerComponent" => self.bits_per_component,
            "Filter" => self.filter,
        };
        if let Some(parms) = self.decode_parms {
            dict.set("DecodeParms", parms);
        }

        let (image_id, mask_id) = match self.soft_mask {
            Some(mask) => {
                let image_id = registry.reserve()?;
                let mask_id = registry.register(mask)?;
                dict.set("SMask", mask_id);
                registry.fill(image_id, Stream::new(dict, self.data))?;
                (image_id, Some(mask_id))
            }
            None => (registry.register(Stream::new(dict, self.data))?, None),
        };

        log::debug!(
            "Registered {}x{} image as {} {} R (soft mask: {:?}, palette: {:?})",
            self.width,
            self.height,
            image_id.0,
            image_id.1,
            mask_id,
            palette_id
        );
        Ok(EmbeddedImage { image: image_id, soft_mask: mask_id, palette: palette_id, width: self.width, height: self.height })
    }
}

/// Computes every payload for `image` without registering anything.
pub fn prepare(image: &RasterImage, compressor: &dyn Compressor) -> Result<PreparedImage, ImageError> {
    if image.width == 0 || image.height == 0 {
        return Err(ImageError::Decode(format!("empty image {}x{}", image.width, image.height)));
    }
    let palette = image.palette.as_deref().map(|p| prepare_palette(p, image.color_space, compressor)).transpose()?;

    let source = classify(image);
    log::debug!("Preparing {}x{} image, alpha source {:?}", image.width, image.height, source);
    match source {
        AlphaSource::IndexedAlpha(table) => {
            if palette.is_none() {
                return Err(ImageError::UnsupportedFormat("alpha table on an image without a palette".into()));
            }
            if !matches!(image.bit_depth, 1 | 2 | 4 | 8) || image.components != 1 {
                return Err(ImageError::UnsupportedFormat(format!(
                    "{}-bit palette indices with {} components",
                    image.bit_depth, image.components
                )));
            }
            let layout = BufferLayout::new(image.pixel_count()?, 1, 8)?;
            let samples = image.decode_samples()?;
            let indices = unpack_indices(&samples, image, image.row_bytes()?);
            let alpha: Vec<u8> = indices.iter().map(|&i| table.get(usize::from(i)).copied().unwrap_or(u8::MAX)).collect();
            finalize_with_alpha(image, layout, indices, alpha, palette, compressor)
        }
        AlphaSource::NativeAlpha => {
            if image.bit_depth != 8 {
                return Err(ImageError::UnsupportedFormat(format!(
                    "{}-bit images with an alpha channel",
                    image.bit_depth
                )));
            }
            let layout = BufferLayout::new(image.pixel_count()?, image.components, 8)?;
            let samples = image.decode_samples()?;
            let (color, alpha) = split_alpha(&samples, usize::from(image.components), layout)?;
            finalize_with_alpha(image, layout, color, alpha, palette, compressor)
        }
        AlphaSource::Opaque => prepare_opaque(image, palette),
    }
}

/// Prepares and registers `image` in one step.
pub fn embed(
    image: &RasterImage,
    registry: &mut ObjectRegistry,
    compressor: &dyn Compressor,
) -> Result<EmbeddedImage, ImageError> {
    prepare(image, compressor)?.register(registry)
}

/// Embeds several images. Preparation may run in parallel; registration
/// always follows the order of `images`.
pub fn embed_all(
    images: &[RasterImage],
    registry: &mut ObjectRegistry,
    compressor: &dyn Compressor,
) -> Result<Vec<EmbeddedImage>, ImageError> {
    #[cfg(feature = "parallel")]
    let prepared: Vec<PreparedImage> = {
        use rayon::prelude::*;
        images.par_iter().map(|image| prepare(image, compressor)).collect::<Result<_, _>>()?
    };
    #[cfg(not(feature = "parallel"))]
    let prepared: Vec<PreparedImage> = images.iter().map(|image| prepare(image, compressor)).collect::<Result<_, _>>()?;

    let needed: u32 = prepared.iter().map(PreparedImage::object_count).sum();
    if registry.remaining() < needed {
        return Err(ObjectError::RegistryExhausted { limit: registry.limit() }.into());
    }
    prepared.into_iter().map(|image| image.register(registry)).collect()
}

fn prepare_palette(
    palette: &[u8],
    base: ColorSpace,
    compressor: &dyn Compressor,
) -> Result<PreparedPalette, ImageError> {
    let entry_size = usize::from(base.components());
    if palette.is_empty() || palette.len() % entry_size != 0 || palette.len() / entry_size > 256 {
        return Err(ImageError::UnsupportedFormat(format!(
            "palette of {} bytes for {}",
            palette.len(),
            base.name()
        )));
    }
    let stream = Stream::new(dictionary! { "Filter" => compressor.filter_name() }, compressor.compress(palette)?);
    Ok(PreparedPalette { base, entries: palette.len() / entry_size, stream })
}

fn prepare_opaque(image: &RasterImage, palette: Option<PreparedPalette>) -> Result<PreparedImage, ImageError> {
    if image.data.is_empty() {
        return Err(ImageError::Decode("image has no pixel data".into()));
    }
    check_opaque_format(image)?;
    let decode_parms = dictionary! {
        "Predictor" => PNG_PREDICTOR,
        "Colors" => image.components,
        "BitsPerComponent" => image.bit_depth,
        "Columns" => image.width,
    };
    Ok(PreparedImage {
        width: image.width,
        height: image.height,
        bits_per_component: image.bit_depth,
        color_space: image.color_space,
        filter: PASSTHROUGH_FILTER,
        data: image.data.clone(),
        decode_parms: Some(decode_parms),
        palette,
        soft_mask: None,
    })
}

/// The predictor data is passed through, so its sample layout must be one a
/// reader can decode as is.
fn check_opaque_format(image: &RasterImage) -> Result<(), ImageError> {
    if !matches!(image.bit_depth, 1 | 2 | 4 | 8 | 16) {
        return Err(ImageError::UnsupportedFormat(format!("{}-bit samples", image.bit_depth)));
    }
    if image.is_indexed() {
        if image.components != 1 {
            return Err(ImageError::UnsupportedFormat(format!(
                "indexed image with {} components per pixel",
                image.components
            )));
        }
        if image.bit_depth == 16 {
            return Err(ImageError::UnsupportedFormat("16-bit palette indices".into()));
        }
    } else if image.components != image.color_space.components() {
        return Err(ImageError::UnsupportedFormat(format!(
            "{} components for {}",
            image.components,
            image.color_space.name()
        )));
    }
    Ok(())
}

fn finalize_with_alpha(
    image: &RasterImage,
    layout: BufferLayout,
    color: Vec<u8>,
    alpha: Vec<u8>,
    palette: Option<PreparedPalette>,
    compressor: &dyn Compressor,
) -> Result<PreparedImage, ImageError> {
    if color.len() != layout.total_color_bytes || alpha.len() != layout.alpha_bytes {
        return Err(ImageError::Decode(format!(
            "expected {} color and {} alpha bytes, got {} and {}",
            layout.total_color_bytes,
            layout.alpha_bytes,
            color.len(),
            alpha.len()
        )));
    }

    let mask_dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => image.width,
        "Height" => image.height,
        "ColorSpace" => "DeviceGray",
        "BitsPerComponent" => 8,
        "Decode" => vec![Object::Integer(0), Object::Integer(1)],
        "Filter" => compressor.filter_name(),
    };
    let soft_mask = Stream::new(mask_dict, compressor.compress(&alpha)?);

    Ok(PreparedImage {
        width: image.width,
        height: image.height,
        bits_per_component: 8,
        color_space: image.color_space,
        filter: compressor.filter_name(),
        data: compressor.compress(&color)?,
        decode_parms: None,
        palette,
        soft_mask: Some(soft_mask),
    })
}

/// Expands packed palette indices to one byte per pixel.
fn unpack_indices(samples: &[u8], image: &RasterImage, row_bytes: usize) -> Vec<u8> {
    let width = image.width as usize;
    let depth = usize::from(image.bit_depth);
    let mask = ((1u16 << depth) - 1) as u8;
    let mut indices = Vec::with_capacity(width * image.height as usize);
    for row in samples.chunks(row_bytes) {
        if depth == 8 {
            indices.extend_from_slice(&row[..width]);
            continue;
        }
        for x in 0..width {
            let bit = x * depth;
            let shift = 8 - depth - bit % 8;
            indices.push((row[bit / 8] >> shift) & mask);
        }
    }
    indices
}

/// Splits interleaved 8-bit samples into color and alpha planes.
fn split_alpha(samples: &[u8], components: usize, layout: BufferLayout) -> Result<(Vec<u8>, Vec<u8>), ImageError> {
    let stride = components + 1;
    if samples.len() != layout.pixel_count * stride {
        return Err(ImageError::Decode(format!(
            "expected {} interleaved samples, got {}",
            layout.pixel_count * stride,
            samples.len()
        )));
    }
    let mut color = Vec::with_capacity(layout.total_color_bytes);
    let mut alpha = Vec::with_capacity(layout.alpha_bytes);
    for pixel in samples.chunks_exact(stride) {
        color.extend_from_slice(&pixel[..components]);
        alpha.push(pixel[components]);
    }
    Ok((color, alpha))
}
