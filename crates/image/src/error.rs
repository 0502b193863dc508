use kiln_object::ObjectError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Malformed image data: {0}")]
    Decode(String),

    /// A bit depth, colorspace or layout the pipeline cannot embed.
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Compression failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Object(#[from] ObjectError),
}
