//! The entry table encoder.
//!
//! [`EntryTable`] only accumulates entries and trailer fields. Everything that
//! depends on them (`/W`, `/Size`, `/Length`, the payload) is produced by the
//! pure [`finalize`] function, called afresh for every size or write request,
//! so a size query followed by a write always agree.

use crate::entry::{FieldWidths, LocationEntry};
use crate::error::XrefError;
use itertools::Itertools;
use kiln_object::{ObjectError, Serialize, validate_stream_header};
use lopdf::{Dictionary, Object, Stream, dictionary};
use std::io::Write;

/// The filter readers apply to the hex-text payload.
pub const PAYLOAD_FILTER: &str = "ASCIIHexDecode";

/// Header keys the encoder owns. Callers may not set them through the trailer.
const RESERVED_KEYS: [&str; 7] = ["Type", "Size", "W", "Filter", "Length", "DecodeParms", "Index"];
const REQUIRED_KEYS: [&str; 5] = ["Type", "Size", "W", "Filter", "Length"];

#[derive(Debug, Clone, Default)]
pub struct EntryTable {
    entries: Vec<LocationEntry>,
    trailer: Dictionary,
}

impl EntryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_free(&mut self, next_free_object_id: u64, generation: u64) {
        self.entries.push(LocationEntry::Free { next_free: next_free_object_id, generation });
    }

    pub fn add_uncompressed(&mut self, byte_offset: u64, generation: u64) {
        self.entries.push(LocationEntry::Uncompressed { offset: byte_offset, generation });
    }

    pub fn add_compressed(&mut self, containing_stream_id: u64, index_in_stream: u64) {
        self.entries.push(LocationEntry::Compressed { stream_id: containing_stream_id, index: index_in_stream });
    }

    pub fn push(&mut self, entry: LocationEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LocationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds a document trailer field (`Root`, `Info`, `ID`, `Prev`) to the table header.
    pub fn set_trailer(&mut self, key: &str, value: impl Into<Object>) -> Result<(), XrefError> {
        if RESERVED_KEYS.contains(&key) {
            return Err(ObjectError::Validation(format!("/{} is derived from the table entries", key)).into());
        }
        self.trailer.set(key, value);
        Ok(())
    }

    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    pub fn finalize(&self) -> Result<FinalizedTable, XrefError> {
        finalize(&self.entries, &self.trailer)
    }

    /// Exact byte length of the rendered table object, header and framing included.
    pub fn computed_size(&self) -> Result<usize, XrefError> {
        Ok(self.finalize()?.computed_size()?)
    }

    /// Writes exactly `computed_size()` bytes. Nothing is written if the table
    /// is empty or its header fails validation.
    pub fn write_into(&self, writer: &mut dyn Write) -> Result<usize, XrefError> {
        let table = self.finalize()?;
        Ok(table.write_into(writer)?)
    }
}

/// A rendered snapshot of an entry table.
#[derive(Debug, Clone)]
pub struct FinalizedTable {
    widths: FieldWidths,
    stream: Stream,
}

impl FinalizedTable {
    pub fn widths(&self) -> FieldWidths {
        self.widths
    }

    pub fn header(&self) -> &Dictionary {
        &self.stream.dict
    }

    pub fn payload(&self) -> &[u8] {
        &self.stream.content
    }

    pub fn into_stream(self) -> Stream {
        self.stream
    }
}

impl Serialize for FinalizedTable {
    fn computed_size(&self) -> Result<usize, ObjectError> {
        self.stream.computed_size()
    }

    fn write_into(&self, writer: &mut dyn Write) -> Result<usize, ObjectError> {
        self.stream.write_into(writer)
    }
}

/// Derives widths, payload and header from `entries`. Rows are uppercase hex
/// fields separated by single spaces, joined by `\n` without a trailing newline.
pub fn finalize(entries: &[LocationEntry], trailer: &Dictionary) -> Result<FinalizedTable, XrefError> {
    if entries.is_empty() {
        return Err(XrefError::EmptyTable);
    }

    let widths = FieldWidths::from_entries(entries);
    if widths.as_array().contains(&0) {
        log::debug!("Entry table has an all-zero column, widths {:?}", widths.as_array());
    }
    let payload = entries.iter().map(|entry| widths.render_row(entry)).join("\n");

    let mut header = dictionary! {
        "Type" => "XRef",
        "Size" => entries.len() as i64,
        "W" => widths.to_object(),
        "Filter" => PAYLOAD_FILTER,
        "Length" => payload.len() as i64,
    };
    for (key, value) in trailer.iter() {
        header.set(key.clone(), value.clone());
    }
    validate_stream_header(&header, &REQUIRED_KEYS)?;

    Ok(FinalizedTable { widths, stream: Stream::new(header, payload.into_bytes()) })
}
