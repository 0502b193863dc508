//! Packing of small objects into object streams.
//!
//! Members of an object stream are located through `Compressed` table entries:
//! the containing stream's object number plus the member's index.

use crate::error::XrefError;
use itertools::Itertools;
use kiln_object::{Compressor, ObjectError, object_size, write_object};
use lopdf::{Object, ObjectId, Stream, dictionary};

#[derive(Debug, Default, Clone)]
pub struct ObjectStreamBuilder {
    members: Vec<(u32, Vec<u8>)>,
}

impl ObjectStreamBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `object` may live inside an object stream.
    pub fn accepts(id: ObjectId, object: &Object) -> bool {
        id.1 == 0 && !matches!(object, Object::Stream(_))
    }

    /// Serializes `object` as the next member and returns its index in the stream.
    pub fn push(&mut self, id: ObjectId, object: &Object) -> Result<u64, XrefError> {
        if id.1 != 0 {
            return Err(ObjectError::Validation(format!(
                "object {} {} R has a non-zero generation and cannot be packed",
                id.0, id.1
            ))
            .into());
        }
        if let Object::Stream(_) = object {
            return Err(ObjectError::Validation(format!("object {} 0 R is a stream and cannot be packed", id.0)).into());
        }

        let mut bytes = Vec::with_capacity(object_size(object));
        write_object(&mut bytes, object).map_err(ObjectError::from)?;
        self.members.push((id.0, bytes));
        Ok(self.members.len() as u64 - 1)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Builds the `/ObjStm` stream: an index of `number offset` pairs, then the
    /// members separated by newlines. Offsets are relative to `/First`.
    pub fn build(&self, compressor: &dyn Compressor) -> Result<Stream, XrefError> {
        if self.members.is_empty() {
            return Err(ObjectError::Validation("object stream has no members".into()).into());
        }

        let mut body = Vec::new();
        let mut offsets = Vec::with_capacity(self.members.len());
        for (number, bytes) in &self.members {
            offsets.push((*number, body.len()));
            body.extend_from_slice(bytes);
            body.push(b'\n');
        }

        let mut data = offsets.iter().map(|(number, offset)| format!("{} {}", number, offset)).join(" ");
        data.push('\n');
        let first = data.len();
        let mut data = data.into_bytes();
        data.extend_from_slice(&body);

        let compressed = compressor.compress(&data).map_err(ObjectError::from)?;
        let dict = dictionary! {
            "Type" => "ObjStm",
            "N" => self.members.len() as i64,
            "First" => first as i64,
            "Filter" => compressor.filter_name(),
        };
        Ok(Stream::new(dict, compressed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::ZlibDecoder;
    use kiln_object::FlateCompressor;
    use std::io::Read;

    #[test]
    fn test_members_indexed_in_push_order() {
        let mut builder = ObjectStreamBuilder::new();
        assert_eq!(builder.push((4, 0), &Object::Integer(10)).unwrap(), 0);
        assert_eq!(builder.push((7, 0), &Object::Dictionary(dictionary! { "Type" => "Catalog" })).unwrap(), 1);

        let stream = builder.build(&FlateCompressor::default()).unwrap();
        assert_eq!(stream.dict.get(b"N").unwrap().as_i64().unwrap(), 2);
        let first = stream.dict.get(b"First").unwrap().as_i64().unwrap() as usize;

        let mut data = Vec::new();
        ZlibDecoder::new(&stream.content[..]).read_to_end(&mut data).unwrap();
        let text = String::from_utf8(data).unwrap();
        assert_eq!(text, "4 0 7 3\n10\n<</Type /Catalog >>\n");
        assert_eq!(first, 8);
        assert_eq!(&text[first + 3..first + 3 + 19], "<</Type /Catalog >>");
    }

    #[test]
    fn test_rejects_streams_and_generations() {
        let mut builder = ObjectStreamBuilder::new();
        let stream = Object::Stream(Stream::new(dictionary! {}, vec![1, 2, 3]));
        assert!(!ObjectStreamBuilder::accepts((1, 0), &stream));
        assert!(builder.push((1, 0), &stream).is_err());
        assert!(builder.push((2, 1), &Object::Null).is_err());
        assert!(builder.is_empty());
        assert!(builder.build(&FlateCompressor::default()).is_err());
    }
}
