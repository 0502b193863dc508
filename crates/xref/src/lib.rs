//! Cross-reference stream encoding.
//!
//! An [`EntryTable`] collects one [`LocationEntry`] per object number, in
//! object-number order, and renders them as a self-describing `/XRef` stream
//! whose column widths are derived from the largest value in each column.
//! [`ObjectStreamBuilder`] packs objects whose rows become `Compressed` entries.

mod entry;
mod error;
mod objstm;
mod table;

pub use entry::{EntryKind, FieldWidths, LocationEntry, byte_width};
pub use error::XrefError;
pub use objstm::ObjectStreamBuilder;
pub use table::{EntryTable, FinalizedTable, PAYLOAD_FILTER, finalize};
