use lopdf::ObjectId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ObjectError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A required header field is missing or malformed. Raised before any byte is written.
    #[error("Invalid object header: {0}")]
    Validation(String),

    #[error("Object identity space exhausted: limit is {limit}")]
    RegistryExhausted { limit: u32 },

    #[error("Object {} {} R was reserved but never filled", .0.0, .0.1)]
    UnfilledReservation(ObjectId),
}
