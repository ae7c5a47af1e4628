//! Benchmarks for octree build and per-leaf clustering

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lidarlod_core::{Aabb, LodPoint, Point3d};
use lidarlod_simplification::{KMeans, Octree};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn generate_terrain(num_points: usize) -> Vec<LodPoint> {
    (0..num_points)
        .map(|i| {
            let t = i as f64 * 0.013;
            let x = (t.sin() * 0.5 + 0.5) * 100.0;
            let y = ((t * 1.7).cos() * 0.5 + 0.5) * 100.0;
            let z = (x * 0.1).sin() * (y * 0.1).cos() * 10.0 + 10.0;
            LodPoint::new(Point3d::new(x, y, z), [0.4, 0.6, 0.2], (i % 4096) as f64)
        })
        .collect()
}

fn build_tree(granularity: u32, points: &[LodPoint]) -> Octree {
    let mut tree = Octree::new(granularity, Aabb::new(0.0, 100.0, 0.0, 100.0, 0.0, 20.0)).unwrap();
    for p in points {
        tree.insert(*p);
    }
    tree
}

fn bench_octree(c: &mut Criterion) {
    let points = generate_terrain(100_000);
    let granularities = [4u32, 6];

    let mut group = c.benchmark_group("octree");

    for &g in &granularities {
        group.bench_with_input(BenchmarkId::new("build", g), &g, |b, &g| {
            b.iter(|| black_box(build_tree(g, black_box(&points))));
        });

        group.bench_with_input(BenchmarkId::new("simplify", g), &g, |b, &g| {
            b.iter_batched(
                || build_tree(g, &points),
                |mut tree| {
                    let mut rng = StdRng::seed_from_u64(7);
                    tree.simplify(&KMeans::default(), &mut rng).unwrap();
                    black_box(tree.leaf_point_count())
                },
                criterion::BatchSize::LargeInput,
            );
        });

        group.bench_with_input(BenchmarkId::new("simplify_parallel", g), &g, |b, &g| {
            b.iter_batched(
                || build_tree(g, &points),
                |mut tree| {
                    tree.simplify_parallel(&KMeans::default(), 7).unwrap();
                    black_box(tree.leaf_point_count())
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

fn bench_kmeans(c: &mut Criterion) {
    let mut group = c.benchmark_group("kmeans");

    for &size in &[100usize, 1_000, 10_000] {
        let points = generate_terrain(size);
        group.bench_with_input(BenchmarkId::new("k2", size), &points, |b, points| {
            let engine = KMeans::default();
            b.iter(|| {
                let mut rng = StdRng::seed_from_u64(1);
                black_box(engine.cluster(black_box(points), &mut rng).unwrap())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_octree, bench_kmeans);
criterion_main!(benches);
