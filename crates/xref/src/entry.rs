//! Location records and the column widths derived from them.

use lopdf::Object;
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Free,
    Uncompressed,
    Compressed,
}

impl EntryKind {
    /// The value stored in the first column of a row.
    pub fn code(self) -> u64 {
        match self {
            EntryKind::Free => 0,
            EntryKind::Uncompressed => 1,
            EntryKind::Compressed => 2,
        }
    }
}

/// One row of the table. The object number is the row position, which the caller manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocationEntry {
    Free { next_free: u64, generation: u64 },
    Uncompressed { offset: u64, generation: u64 },
    Compressed { stream_id: u64, index: u64 },
}

impl LocationEntry {
    pub fn kind(&self) -> EntryKind {
        match self {
            LocationEntry::Free { .. } => EntryKind::Free,
            LocationEntry::Uncompressed { .. } => EntryKind::Uncompressed,
            LocationEntry::Compressed { .. } => EntryKind::Compressed,
        }
    }

    /// The three column values in row order.
    pub fn fields(&self) -> [u64; 3] {
        let kind = self.kind().code();
        match *self {
            LocationEntry::Free { next_free, generation } => [kind, next_free, generation],
            LocationEntry::Uncompressed { offset, generation } => [kind, offset, generation],
            LocationEntry::Compressed { stream_id, index } => [kind, stream_id, index],
        }
    }
}

/// Minimal number of bytes needed to hold `value`. Zero needs zero bytes.
pub fn byte_width(value: u64) -> u8 {
    let bits = (u64::BITS - value.leading_zeros()) as u8;
    bits.div_ceil(8)
}

/// Per-column byte widths. Each column is as wide as its largest value requires,
/// so one large value widens that column for every row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldWidths([u8; 3]);

impl FieldWidths {
    pub fn new(widths: [u8; 3]) -> Self {
        Self(widths)
    }

    pub fn from_entries(entries: &[LocationEntry]) -> Self {
        let mut max = [0u64; 3];
        for entry in entries {
            for (column, value) in entry.fields().into_iter().enumerate() {
                max[column] = max[column].max(value);
            }
        }
        Self(max.map(byte_width))
    }

    pub fn as_array(&self) -> [u8; 3] {
        self.0
    }

    /// Rendered length of one row: two hex digits per byte plus two separators.
    pub fn row_len(&self) -> usize {
        self.0.iter().map(|w| usize::from(*w) * 2).sum::<usize>() + 2
    }

    /// The `/W` array.
    pub fn to_object(&self) -> Object {
        Object::Array(self.0.iter().map(|w| Object::Integer(i64::from(*w))).collect())
    }

    pub(crate) fn render_row(&self, entry: &LocationEntry) -> String {
        let mut row = String::with_capacity(self.row_len());
        for (column, value) in entry.fields().into_iter().enumerate() {
            if column > 0 {
                row.push(' ');
            }
            let digits = usize::from(self.0[column]) * 2;
            if digits > 0 {
                let _ = write!(row, "{:0digits$X}", value, digits = digits);
            }
        }
        row
    }
}
