//! Benchmarks for batched record decoding

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lidarlod_core::PointRecord;
use lidarlod_io::{LasHeader, LasLoader, LasVersion, LasWriter, HEADER_LEN};

/// Build an in-memory format 2 file with the given number of points
fn generate_las_bytes(num_points: usize) -> Vec<u8> {
    let header = LasHeader {
        point_offset: HEADER_LEN as u32,
        format_id: 2,
        struct_size: 26,
        point_count: num_points as u32,
        scale: [0.01; 3],
        offset: [0.0; 3],
        maximum_bounds: [1000.0; 3],
        minimum_bounds: [0.0; 3],
        version: LasVersion::default(),
    };

    let records: Vec<PointRecord> = (0..num_points)
        .map(|i| {
            let t = i as f64 * 0.1;
            PointRecord {
                position: [
                    ((t.sin() + 1.0) * 50_000.0) as i32,
                    ((t.cos() + 1.0) * 50_000.0) as i32,
                    (i % 100_000) as i32,
                ],
                intensity: (i % 4096) as u16,
                classification: (i % 10) as u8,
                color: Some([(i % 256) as u16, 128, 64]),
            }
        })
        .collect();

    let mut bytes = Vec::new();
    LasWriter::write_records_to_writer(&mut bytes, &header, &records).expect("write LAS fixture");
    bytes
}

fn benchmark_batched_decode(c: &mut Criterion) {
    let sizes = vec![10_000, 100_000, 500_000];

    let mut group = c.benchmark_group("batched_decode");
    for size in sizes {
        let bytes = generate_las_bytes(size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("read_all", size), &bytes, |b, bytes| {
            b.iter(|| {
                let mut loader = LasLoader::new(bytes.as_slice()).expect("parse header");
                black_box(loader.read_all(100_000).expect("decode"))
            })
        });
    }
    group.finish();
}

fn benchmark_skip_preview(c: &mut Criterion) {
    let bytes = generate_las_bytes(500_000);

    let mut group = c.benchmark_group("skip_preview");
    for skip in [1usize, 4, 16] {
        group.bench_with_input(BenchmarkId::from_parameter(skip), &skip, |b, &skip| {
            b.iter(|| {
                let mut loader = LasLoader::new(bytes.as_slice()).expect("parse header");
                let mut decoded = 0usize;
                for batch in loader.batches(10_000, skip) {
                    decoded += batch.iter().filter(|r| r.is_ok()).count();
                }
                black_box(decoded)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_batched_decode, benchmark_skip_preview);
criterion_main!(benches);
