//! kiln writes PDF files whose objects are located through a cross-reference
//! stream, and embeds PNG images as image XObjects with soft masks.
//!
//! The codecs live in the workspace crates and are re-exported here:
//! [`kiln_object`] (serialization, registry, compression), [`kiln_xref`]
//! (the entry table encoder) and [`kiln_image`] (the image pipeline).

pub mod config;
pub mod error;
pub mod writer;

pub use config::WriterConfig;
pub use error::KilnError;
pub use writer::DocumentWriter;

pub use kiln_image as image;
pub use kiln_object as object;
pub use kiln_xref as xref;

use kiln_image::{PngDecoder, RasterDecoder};
use std::io::Write;

/// Writes a document with one page per PNG, in input order.
pub fn write_png_document<W: Write>(
    pngs: &[Vec<u8>],
    sink: W,
    config: WriterConfig,
    title: Option<&str>,
) -> Result<W, KilnError> {
    let decoder = PngDecoder;
    let images = pngs.iter().map(|png| decoder.decode(png)).collect::<Result<Vec<_>, _>>()?;

    let mut writer = DocumentWriter::new(sink, config)?;
    if let Some(title) = title {
        writer.set_title(title);
    }
    for embedded in writer.embed_images(&images)? {
        writer.add_image_page(&embedded)?;
    }
    writer.finish()
}
