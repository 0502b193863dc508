use kiln_object::ObjectError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum XrefError {
    /// Field widths are derived from column maxima, which an empty table does not have.
    #[error("Cannot derive field widths for an empty entry table")]
    EmptyTable,

    #[error(transparent)]
    Object(#[from] ObjectError),
}
