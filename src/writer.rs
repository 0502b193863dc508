//! Assembles registered objects into a complete PDF file.
//!
//! Objects are buffered in the [`ObjectRegistry`] until [`DocumentWriter::finish`],
//! which writes them in identity order and closes the file with a
//! cross-reference stream. Byte offsets are accumulated from the sizes each
//! `write_into` call reports, so the sink only needs [`Write`].

use crate::config::WriterConfig;
use crate::error::KilnError;
use kiln_image::{EmbeddedImage, RasterImage};
use kiln_object::{Compressor, FlateCompressor, IndirectObject, ObjectRegistry, Serialize};
use kiln_xref::{EntryTable, LocationEntry, ObjectStreamBuilder};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Object, ObjectId, Stream, StringFormat, dictionary};
use std::collections::BTreeMap;
use std::io::Write;

const BINARY_MARKER: &[u8] = b"%\xE2\xE3\xCF\xD3\n";
const IMAGE_RESOURCE: &str = "Im0";

pub struct DocumentWriter<W: Write> {
    writer: W,
    position: u64,
    config: WriterConfig,
    compressor: FlateCompressor,
    registry: ObjectRegistry,
    pages_id: ObjectId,
    catalog_id: ObjectId,
    page_ids: Vec<ObjectId>,
    title: Option<String>,
}

impl<W: Write> DocumentWriter<W> {
    /// Writes the file header and reserves the page tree and catalog.
    pub fn new(mut writer: W, config: WriterConfig) -> Result<Self, KilnError> {
        config.validate()?;
        let header = format!("%PDF-{}\n", config.pdf_version);
        writer.write_all(header.as_bytes())?;
        writer.write_all(BINARY_MARKER)?;

        let mut registry = ObjectRegistry::with_limit(config.max_object_id);
        let pages_id = registry.reserve()?;
        let catalog_id = registry.reserve()?;

        Ok(Self {
            writer,
            position: (header.len() + BINARY_MARKER.len()) as u64,
            compressor: FlateCompressor::new(config.compression_level),
            config,
            registry,
            pages_id,
            catalog_id,
            page_ids: Vec::new(),
            title: None,
        })
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    pub fn pages_id(&self) -> ObjectId {
        self.pages_id
    }

    pub fn catalog_id(&self) -> ObjectId {
        self.catalog_id
    }

    /// The document's allocation capability. Everything registered here is
    /// written by [`finish`](Self::finish).
    pub fn registry_mut(&mut self) -> &mut ObjectRegistry {
        &mut self.registry
    }

    pub fn embed_image(&mut self, image: &RasterImage) -> Result<EmbeddedImage, KilnError> {
        Ok(kiln_image::embed(image, &mut self.registry, &self.compressor)?)
    }

    /// Embeds `images` in order. Preparation runs in parallel with the `parallel` feature.
    pub fn embed_images(&mut self, images: &[RasterImage]) -> Result<Vec<EmbeddedImage>, KilnError> {
        Ok(kiln_image::embed_all(images, &mut self.registry, &self.compressor)?)
    }

    /// Appends a page the size of `image` at 72 dpi with the image drawn across it.
    pub fn add_image_page(&mut self, image: &EmbeddedImage) -> Result<ObjectId, KilnError> {
        let (width, height) = (i64::from(image.width), i64::from(image.height));
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new("cm", vec![width.into(), 0.into(), 0.into(), height.into(), 0.into(), 0.into()]),
                Operation::new("Do", vec![Object::Name(IMAGE_RESOURCE.as_bytes().to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let encoded = content.encode()?;
        let content_stream = Stream::new(
            dictionary! { "Filter" => self.compressor.filter_name() },
            self.compressor.compress(&encoded)?,
        );
        let content_id = self.registry.register(content_stream)?;

        let page = dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(width), Object::Integer(height)],
            "Resources" => dictionary! {
                "XObject" => dictionary! { IMAGE_RESOURCE => image.image },
            },
            "Contents" => content_id,
        };
        let page_id = self.registry.register(page)?;
        self.page_ids.push(page_id);
        log::debug!("Added page {} for image {} {} R", self.page_ids.len(), image.image.0, image.image.1);
        Ok(page_id)
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    /// Writes every object, the cross-reference stream and the trailer, and
    /// returns the sink.
    pub fn finish(mut self) -> Result<W, KilnError> {
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => self.page_ids.iter().map(|id| Object::Reference(*id)).collect::<Vec<Object>>(),
            "Count" => self.page_ids.len() as i64,
        };
        self.registry.fill(self.pages_id, pages)?;
        self.registry.fill(self.catalog_id, dictionary! { "Type" => "Catalog", "Pages" => self.pages_id })?;
        let info_id = self.registry.register(self.info_dictionary())?;

        let objects = self.registry.take_objects()?;
        let mut locations: BTreeMap<u32, LocationEntry> = BTreeMap::new();
        let direct = if self.config.object_streams {
            self.pack_object_streams(objects, &mut locations)?
        } else {
            objects
        };

        for (id, object) in &direct {
            let offset = self.position;
            let written = IndirectObject::new(*id, object).write_into(&mut self.writer)?;
            self.position += written as u64;
            locations.insert(id.0, LocationEntry::Uncompressed { offset, generation: u64::from(id.1) });
        }

        let xref_id = self.registry.allocate()?;
        let xref_offset = self.position;
        locations.insert(xref_id.0, LocationEntry::Uncompressed { offset: xref_offset, generation: 0 });

        // Free rows form a linked list from the head at object 0, ending in 0.
        let free: Vec<u32> = (1..xref_id.0).filter(|number| !locations.contains_key(number)).collect();
        let next_free = |number: u32| {
            let rest = &free[free.partition_point(|&n| n <= number)..];
            rest.first().map_or(0, |&n| u64::from(n))
        };

        let mut table = EntryTable::new();
        table.add_free(next_free(0), 65535);
        for number in 1..=xref_id.0 {
            match locations.get(&number) {
                Some(entry) => table.push(*entry),
                None => {
                    log::warn!("Object {} was allocated but never written; marking it free", number);
                    table.add_free(next_free(number), 0);
                }
            }
        }
        table.set_trailer("Root", self.catalog_id)?;
        table.set_trailer("Info", info_id)?;
        table.set_trailer("ID", document_id())?;

        let stream = Object::Stream(table.finalize()?.into_stream());
        let written = IndirectObject::new(xref_id, &stream).write_into(&mut self.writer)?;
        self.position += written as u64;

        write!(self.writer, "startxref\n{}\n%%EOF\n", xref_offset)?;
        self.writer.flush()?;
        log::info!(
            "Wrote {} pages, {} objects, cross-reference stream at byte {}",
            self.page_ids.len(),
            table.len() - 1,
            xref_offset
        );
        Ok(self.writer)
    }

    fn info_dictionary(&self) -> Dictionary {
        let producer = self
            .config
            .producer
            .clone()
            .unwrap_or_else(|| format!("kiln {}", env!("CARGO_PKG_VERSION")));
        let created = chrono::Utc::now().format("D:%Y%m%d%H%M%SZ").to_string();
        let mut info = dictionary! {
            "Producer" => Object::string_literal(producer),
            "CreationDate" => Object::string_literal(created),
        };
        if let Some(title) = &self.title {
            info.set("Title", Object::string_literal(title.as_str()));
        }
        info
    }

    /// Moves every packable object into object streams and records its
    /// `Compressed` location. Returns the objects that must be written directly,
    /// the new `/ObjStm` streams included.
    fn pack_object_streams(
        &mut self,
        objects: Vec<(ObjectId, Object)>,
        locations: &mut BTreeMap<u32, LocationEntry>,
    ) -> Result<Vec<(ObjectId, Object)>, KilnError> {
        let (packable, mut direct): (Vec<_>, Vec<_>) =
            objects.into_iter().partition(|(id, object)| ObjectStreamBuilder::accepts(*id, object));

        for chunk in packable.chunks(self.config.objects_per_stream) {
            let stream_id = self.registry.allocate()?;
            let mut builder = ObjectStreamBuilder::new();
            for (id, object) in chunk {
                let index = builder.push(*id, object)?;
                locations.insert(id.0, LocationEntry::Compressed { stream_id: u64::from(stream_id.0), index });
            }
            direct.push((stream_id, Object::Stream(builder.build(&self.compressor)?)));
            log::debug!("Packed {} objects into object stream {} 0 R", builder.len(), stream_id.0);
        }
        Ok(direct)
    }
}

/// A fresh `[<id> <id>]` file identifier pair.
fn document_id() -> Object {
    let id: [u8; 16] = rand::random();
    let part = Object::String(id.to_vec(), StringFormat::Hexadecimal);
    Object::Array(vec![part.clone(), part])
}
