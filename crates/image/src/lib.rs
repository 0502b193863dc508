//! Raster image embedding.
//!
//! [`PngDecoder`] reads PNG files into [`RasterImage`] values; [`prepare`]
//! and [`PreparedImage::register`] turn them into image XObjects with an
//! optional `/SMask` soft mask and an optional indexed palette.

mod embed;
mod error;
mod png;
mod raster;

#[cfg(test)]
mod test_utils;

pub use embed::{AlphaSource, BufferLayout, EmbeddedImage, PreparedImage, classify, embed, embed_all, prepare};
pub use error::ImageError;
pub use png::{PngDecoder, RasterDecoder, decode_png};
pub use raster::{ColorSpace, RasterImage, Transparency};
