use kiln_image::ImageError;
use kiln_object::ObjectError;
use kiln_xref::XrefError;
use thiserror::Error;

/// Errors surfaced while assembling a document.
#[derive(Error, Debug)]
pub enum KilnError {
    #[error("Object error: {0}")]
    Object(#[from] ObjectError),

    #[error("Cross-reference table error: {0}")]
    Xref(#[from] XrefError),

    #[error("Image embedding failed: {0}")]
    Image(#[from] ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("PDF content error: {0}")]
    Pdf(#[from] lopdf::Error),
}
