//! Byte-exact serialization of `lopdf` objects.
//!
//! Every serializable value reports the exact number of bytes it will produce
//! through [`Serialize::computed_size`] before [`Serialize::write_into`] runs.
//! Sizes are always derived from current content: a stream's `/Length` is
//! set from its payload at write time, never read back from a stale header.

use crate::error::ObjectError;
use lopdf::{Dictionary, Object, ObjectId, Stream, StringFormat};
use std::io::{self, Write};

const STREAM_OPEN: &[u8] = b"\nstream\n";
const STREAM_CLOSE: &[u8] = b"\nendstream";
const OBJ_OPEN: &[u8] = b" obj\n";
const OBJ_CLOSE: &[u8] = b"\nendobj\n";

/// The size/write contract shared by every object the workspace emits.
pub trait Serialize {
    /// Exact number of bytes `write_into` will produce for the current content.
    fn computed_size(&self) -> Result<usize, ObjectError>;

    /// Writes the object and returns the number of bytes written, which always
    /// equals `computed_size()`.
    fn write_into(&self, writer: &mut dyn Write) -> Result<usize, ObjectError>;
}

/// A writer adapter that counts the bytes accepted by the inner writer.
pub struct CountingWriter<W> {
    inner: W,
    count: usize,
}

impl<W: Write> CountingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, count: 0 }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.count += written;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// An object wrapped in its `N G obj ... endobj` framing.
#[derive(Debug, Clone, Copy)]
pub struct IndirectObject<'a> {
    pub id: ObjectId,
    pub object: &'a Object,
}

impl<'a> IndirectObject<'a> {
    pub fn new(id: ObjectId, object: &'a Object) -> Self {
        Self { id, object }
    }
}

/// Fails with a validation error naming the first required key missing from `dict`.
pub fn validate_stream_header(dict: &Dictionary, required: &[&str]) -> Result<(), ObjectError> {
    for key in required {
        if !dict.has(key.as_bytes()) {
            return Err(ObjectError::Validation(format!("missing required key /{}", key)));
        }
    }
    Ok(())
}

/// The dictionary actually written for a stream: its own entries with `/Length`
/// replaced by the payload length.
pub fn stream_header(stream: &Stream) -> Dictionary {
    let mut dict = stream.dict.clone();
    dict.set("Length", stream.content.len() as i64);
    dict
}

pub fn object_size(object: &Object) -> usize {
    match object {
        Object::Null => 4,
        Object::Boolean(b) => {
            if *b {
                4
            } else {
                5
            }
        }
        Object::Integer(i) => integer_len(*i),
        Object::Real(r) => format_real(r).len(),
        Object::Name(name) => 1 + name_len(name),
        Object::String(bytes, StringFormat::Literal) => {
            2 + bytes.iter().map(|b| literal_escape(*b).map_or(1, <[u8]>::len)).sum::<usize>()
        }
        Object::String(bytes, StringFormat::Hexadecimal) => 2 + bytes.len() * 2,
        Object::Array(items) => {
            2 + items.iter().map(object_size).sum::<usize>() + items.len().saturating_sub(1)
        }
        Object::Dictionary(dict) => dictionary_size(dict),
        Object::Stream(stream) => stream_size(stream),
        Object::Reference(id) => reference_len(*id),
    }
}

pub fn dictionary_size(dict: &Dictionary) -> usize {
    let entries: usize = dict
        .iter()
        .map(|(key, value)| 1 + name_len(key) + 1 + object_size(value) + 1)
        .sum();
    4 + entries
}

pub fn stream_size(stream: &Stream) -> usize {
    dictionary_size(&stream_header(stream)) + STREAM_OPEN.len() + stream.content.len() + STREAM_CLOSE.len()
}

pub fn write_object(writer: &mut dyn Write, object: &Object) -> io::Result<()> {
    match object {
        Object::Null => writer.write_all(b"null"),
        Object::Boolean(b) => writer.write_all(if *b { b"true" } else { b"false" }),
        Object::Integer(i) => write!(writer, "{}", i),
        Object::Real(r) => writer.write_all(format_real(r).as_bytes()),
        Object::Name(name) => {
            writer.write_all(b"/")?;
            write_name(writer, name)
        }
        Object::String(bytes, StringFormat::Literal) => {
            writer.write_all(b"(")?;
            for &byte in bytes {
                match literal_escape(byte) {
                    Some(escaped) => writer.write_all(escaped)?,
                    None => writer.write_all(&[byte])?,
                }
            }
            writer.write_all(b")")
        }
        Object::String(bytes, StringFormat::Hexadecimal) => {
            writer.write_all(b"<")?;
            for byte in bytes {
                write!(writer, "{:02X}", byte)?;
            }
            writer.write_all(b">")
        }
        Object::Array(items) => {
            writer.write_all(b"[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    writer.write_all(b" ")?;
                }
                write_object(writer, item)?;
            }
            writer.write_all(b"]")
        }
        Object::Dictionary(dict) => write_dictionary(writer, dict),
        Object::Stream(stream) => write_stream(writer, stream),
        Object::Reference(id) => write!(writer, "{} {} R", id.0, id.1),
    }
}

pub fn write_dictionary(writer: &mut dyn Write, dict: &Dictionary) -> io::Result<()> {
    writer.write_all(b"<<")?;
    for (key, value) in dict.iter() {
        writer.write_all(b"/")?;
        write_name(writer, key)?;
        writer.write_all(b" ")?;
        write_object(writer, value)?;
        writer.write_all(b" ")?;
    }
    writer.write_all(b">>")
}

pub fn write_stream(writer: &mut dyn Write, stream: &Stream) -> io::Result<()> {
    write_dictionary(writer, &stream_header(stream))?;
    writer.write_all(STREAM_OPEN)?;
    writer.write_all(&stream.content)?;
    writer.write_all(STREAM_CLOSE)
}

fn write_name(writer: &mut dyn Write, name: &[u8]) -> io::Result<()> {
    for &byte in name {
        if is_regular_name_byte(byte) {
            writer.write_all(&[byte])?;
        } else {
            write!(writer, "#{:02X}", byte)?;
        }
    }
    Ok(())
}

fn name_len(name: &[u8]) -> usize {
    name.iter().map(|b| if is_regular_name_byte(*b) { 1 } else { 3 }).sum()
}

fn is_regular_name_byte(byte: u8) -> bool {
    (0x21..=0x7E).contains(&byte) && !b"()<>[]{}/%#".contains(&byte)
}

/// Escape sequence for bytes a literal string cannot hold verbatim. A bare CR
/// would be read back as LF.
fn literal_escape(byte: u8) -> Option<&'static [u8]> {
    match byte {
        b'(' => Some(b"\\("),
        b')' => Some(b"\\)"),
        b'\\' => Some(b"\\\\"),
        b'\r' => Some(b"\\r"),
        _ => None,
    }
}

fn format_real<R: std::fmt::Display>(r: R) -> String {
    format!("{:.3}", r)
}

/// Decimal digit count of `value`, including a leading minus sign.
pub fn integer_len(value: i64) -> usize {
    let digits = value.unsigned_abs().checked_ilog10().map_or(1, |d| d as usize + 1);
    digits + usize::from(value < 0)
}

fn reference_len(id: ObjectId) -> usize {
    integer_len(i64::from(id.0)) + 1 + integer_len(i64::from(id.1)) + 2
}

fn counted<F>(writer: &mut dyn Write, write: F) -> Result<usize, ObjectError>
where
    F: FnOnce(&mut dyn Write) -> io::Result<()>,
{
    let mut counter = CountingWriter::new(writer);
    write(&mut counter)?;
    Ok(counter.count())
}

impl Serialize for Object {
    fn computed_size(&self) -> Result<usize, ObjectError> {
        Ok(object_size(self))
    }

    fn write_into(&self, writer: &mut dyn Write) -> Result<usize, ObjectError> {
        counted(writer, |w| write_object(w, self))
    }
}

impl Serialize for Dictionary {
    fn computed_size(&self) -> Result<usize, ObjectError> {
        Ok(dictionary_size(self))
    }

    fn write_into(&self, writer: &mut dyn Write) -> Result<usize, ObjectError> {
        counted(writer, |w| write_dictionary(w, self))
    }
}

impl Serialize for Stream {
    fn computed_size(&self) -> Result<usize, ObjectError> {
        Ok(stream_size(self))
    }

    fn write_into(&self, writer: &mut dyn Write) -> Result<usize, ObjectError> {
        counted(writer, |w| write_stream(w, self))
    }
}

impl Serialize for IndirectObject<'_> {
    fn computed_size(&self) -> Result<usize, ObjectError> {
        let head = integer_len(i64::from(self.id.0)) + 1 + integer_len(i64::from(self.id.1));
        Ok(head + OBJ_OPEN.len() + object_size(self.object) + OBJ_CLOSE.len())
    }

    fn write_into(&self, writer: &mut dyn Write) -> Result<usize, ObjectError> {
        counted(writer, |w| {
            write!(w, "{} {}", self.id.0, self.id.1)?;
            w.write_all(OBJ_OPEN)?;
            write_object(w, self.object)?;
            w.write_all(OBJ_CLOSE)
        })
    }
}
