//! Entry table and image embedding benchmarks
//!
//! Measures table finalization over growing entry counts and the cost of
//! preparing an RGBA image for embedding.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use kiln::image::{ColorSpace, RasterImage, Transparency, prepare};
use kiln::object::{Compressor, FlateCompressor};
use kiln::xref::EntryTable;
use std::hint::black_box;

fn table_with(entries: u64) -> EntryTable {
    let mut table = EntryTable::new();
    table.add_free(0, 65535);
    for i in 1..entries {
        if i % 5 == 0 {
            table.add_compressed(entries + i / 100, i % 100);
        } else {
            table.add_uncompressed(i * 731, 0);
        }
    }
    table
}

fn bench_table_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("entry_table");
    for entries in [100u64, 10_000, 100_000] {
        let table = table_with(entries);
        let size = table.computed_size().unwrap_or(0);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("write_into", entries), &table, |b, table| {
            let mut buffer = Vec::with_capacity(size);
            b.iter(|| {
                buffer.clear();
                black_box(table.write_into(&mut buffer).unwrap_or(0))
            })
        });
    }
    group.finish();
}

fn rgba_image(width: u32, height: u32, compressor: &dyn Compressor) -> RasterImage {
    let row = 1 + width as usize * 4;
    let mut filtered = vec![0u8; row * height as usize];
    for (i, byte) in filtered.iter_mut().enumerate() {
        if i % row != 0 {
            *byte = (i * 7 % 251) as u8;
        }
    }
    RasterImage {
        width,
        height,
        bit_depth: 8,
        components: 3,
        color_space: ColorSpace::DeviceRGB,
        palette: None,
        transparency: Transparency::NativeAlpha,
        data: compressor.compress(&filtered).unwrap_or_default(),
    }
}

fn bench_image_prepare(c: &mut Criterion) {
    let compressor = FlateCompressor::new(6);
    let mut group = c.benchmark_group("image_prepare");
    group.sample_size(20);
    for side in [64u32, 512] {
        let image = rgba_image(side, side, &compressor);
        group.throughput(Throughput::Elements(u64::from(side) * u64::from(side)));
        group.bench_with_input(BenchmarkId::new("rgba", side), &image, |b, image| {
            b.iter(|| black_box(prepare(image, &compressor).map(|p| p.object_count()).unwrap_or(0)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_table_encoding, bench_image_prepare);
criterion_main!(benches);
