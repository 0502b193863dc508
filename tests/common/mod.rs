#![allow(dead_code)]

use flate2::Compression;
use flate2::write::ZlibEncoder;
use kiln::{KilnError, WriterConfig, write_png_document};
use std::io::Write;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// One decoded row of the cross-reference stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Row {
    pub kind: u64,
    pub field2: u64,
    pub field3: u64,
}

/// Wrapper around a generated PDF with helper methods
pub struct GeneratedPdf {
    pub bytes: Vec<u8>,
    pub xref_offset: usize,
    pub widths: [usize; 3],
    pub rows: Vec<Row>,
}

impl GeneratedPdf {
    /// Locates the table through `startxref` and decodes its rows.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, String> {
        let marker = bytes.windows(10).rposition(|w| w == b"startxref\n").ok_or("no startxref")?;
        let tail = std::str::from_utf8(&bytes[marker + 10..]).map_err(|e| e.to_string())?;
        let xref_offset: usize = tail
            .lines()
            .next()
            .and_then(|l| l.trim().parse().ok())
            .ok_or("bad startxref value")?;

        // The table and everything after it is ASCII.
        let table = std::str::from_utf8(bytes.get(xref_offset..).ok_or("startxref past end of file")?)
            .map_err(|e| e.to_string())?;
        let header_end = table.find(">>\nstream\n").ok_or("table has no stream")?;
        let header = &table[..header_end];
        if !header.contains("/Type /XRef") {
            return Err(format!("startxref does not point at a table: {}", &header[..header.len().min(40)]));
        }
        let widths = parse_widths(header)?;
        let length: usize = value_after(header, "/Length ")?;
        let payload = &table[header_end + 10..header_end + 10 + length];
        if !table[header_end + 10 + length..].starts_with("\nendstream") {
            return Err("/Length does not match the payload".into());
        }

        let rows = payload
            .split('\n')
            .map(|line| {
                let fields: Vec<&str> = line.split(' ').collect();
                if fields.len() != 3 {
                    return Err(format!("row '{}' does not have three fields", line));
                }
                let mut values = [0u64; 3];
                for (i, field) in fields.iter().enumerate() {
                    if field.len() != widths[i] * 2 {
                        return Err(format!("field '{}' is not {} bytes wide", field, widths[i]));
                    }
                    if !field.is_empty() {
                        values[i] = u64::from_str_radix(field, 16).map_err(|e| e.to_string())?;
                    }
                }
                Ok(Row { kind: values[0], field2: values[1], field3: values[2] })
            })
            .collect::<Result<Vec<_>, String>>()?;

        let size: usize = value_after(header, "/Size ")?;
        if size != rows.len() {
            return Err(format!("/Size {} but {} rows", size, rows.len()));
        }
        Ok(Self { bytes, xref_offset, widths, rows })
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    /// The `N 0 obj ... endobj` text of an uncompressed object.
    pub fn object_text(&self, number: usize) -> Option<String> {
        let row = self.rows.get(number)?;
        if row.kind != 1 {
            return None;
        }
        let text = &self.bytes[row.field2 as usize..];
        let end = text.windows(8).position(|w| w == b"\nendobj\n")?;
        Some(String::from_utf8_lossy(&text[..end + 8]).into_owned())
    }

    pub fn count(&self, needle: &str) -> usize {
        self.text().matches(needle).count()
    }

    /// Object numbers whose uncompressed text contains `needle`.
    pub fn objects_containing(&self, needle: &str) -> Vec<usize> {
        (0..self.rows.len())
            .filter(|n| self.object_text(*n).is_some_and(|t| t.contains(needle)))
            .collect()
    }
}

fn parse_widths(header: &str) -> Result<[usize; 3], String> {
    let start = header.find("/W [").ok_or("no /W")? + 4;
    let end = start + header[start..].find(']').ok_or("unterminated /W")?;
    let parts: Vec<usize> = header[start..end]
        .split(' ')
        .map(|p| p.parse().map_err(|_| format!("bad width '{}'", p)))
        .collect::<Result<_, _>>()?;
    parts.try_into().map_err(|_| "/W must have three entries".to_string())
}

fn value_after<T: std::str::FromStr>(header: &str, key: &str) -> Result<T, String> {
    let start = header.find(key).ok_or(format!("no {}", key))? + key.len();
    header[start..]
        .split(|c: char| !c.is_ascii_digit())
        .next()
        .and_then(|v| v.parse().ok())
        .ok_or(format!("bad value for {}", key))
}

/// A minimal PNG. Chunk CRCs are left zero; kiln does not check them.
pub fn png(width: u32, height: u32, color_type: u8, bit_depth: u8, pixels: &[u8], extra: &[(&[u8; 4], &[u8])]) -> Vec<u8> {
    let channels = match color_type {
        2 => 3,
        4 => 2,
        6 => 4,
        _ => 1,
    };
    let row_bytes = (width as usize * channels * bit_depth as usize).div_ceil(8);

    let mut out = vec![0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'];
    let mut ihdr = Vec::new();
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&height.to_be_bytes());
    ihdr.extend_from_slice(&[bit_depth, color_type, 0, 0, 0]);
    chunk(&mut out, b"IHDR", &ihdr);
    for (kind, body) in extra {
        chunk(&mut out, kind, body);
    }

    let mut filtered = Vec::new();
    for row in pixels.chunks(row_bytes) {
        filtered.push(0);
        filtered.extend_from_slice(row);
    }
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&filtered).unwrap();
    chunk(&mut out, b"IDAT", &encoder.finish().unwrap());
    chunk(&mut out, b"IEND", &[]);
    out
}

fn chunk(out: &mut Vec<u8>, kind: &[u8; 4], body: &[u8]) {
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(body);
    out.extend_from_slice(&[0, 0, 0, 0]);
}

pub fn rgb_png() -> Vec<u8> {
    png(2, 2, 2, 8, &[255, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255], &[])
}

pub fn rgba_png() -> Vec<u8> {
    png(2, 1, 6, 8, &[10, 20, 30, 0, 40, 50, 60, 255], &[])
}

pub fn indexed_png() -> Vec<u8> {
    let palette: &[u8] = &[255, 0, 0, 0, 255, 0, 0, 0, 255, 0, 0, 0];
    let trns: &[u8] = &[0, 128];
    png(2, 2, 3, 8, &[0, 1, 2, 3], &[(b"PLTE", palette), (b"tRNS", trns)])
}

pub fn generate(pngs: &[Vec<u8>], config: WriterConfig) -> Result<GeneratedPdf, KilnError> {
    let bytes = write_png_document(pngs, Vec::new(), config, Some("Test document"))?;
    Ok(GeneratedPdf::from_bytes(bytes).unwrap_or_else(|e| panic!("unreadable PDF: {}", e)))
}
