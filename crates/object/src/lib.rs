//! Object-level building blocks shared by the kiln crates.
//!
//! - [`Serialize`]: the byte-exact `computed_size`/`write_into` contract,
//!   implemented for `lopdf` objects, dictionaries, streams and indirect objects
//! - [`ObjectRegistry`]: the single authority that mints object identities
//! - [`Compressor`]: stream compression behind a filter name

mod compress;
mod error;
mod registry;
mod serialize;

pub use compress::{Compressor, FlateCompressor};
pub use error::ObjectError;
pub use registry::{DEFAULT_MAX_OBJECT_ID, ObjectRegistry};
pub use serialize::{
    CountingWriter, IndirectObject, Serialize, dictionary_size, integer_len, object_size,
    stream_header, stream_size, validate_stream_header, write_dictionary, write_object,
    write_stream,
};
