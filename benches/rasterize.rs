//! Benchmarks all five rasterizer engines against shared triangle sizes.
//!
//! Structured as a `BenchmarkId`-keyed group over small/medium/large
//! triangles, one group per engine.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rasterlab::{ddfi::Ddfi, efaa::Efaa, hsgr::Hsgr, scdt::Scdt, ssaa::Ssaa};

const WIDTH: i32 = 256;
const HEIGHT: i32 = 256;
const COLOR: u32 = 0xC0FF8040;

fn small_triangle() -> [f64; 6] {
    [20.0, 20.0, 40.0, 20.0, 30.0, 40.0]
}

fn medium_triangle() -> [f64; 6] {
    [20.0, 20.0, 150.0, 30.0, 90.0, 180.0]
}

fn large_triangle() -> [f64; 6] {
    [5.0, 5.0, 250.0, 40.0, 120.0, 250.0]
}

fn bench_single_triangle(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_triangle");

    for (name, tri) in [
        ("small", small_triangle()),
        ("medium", medium_triangle()),
        ("large", large_triangle()),
    ] {
        group.bench_with_input(BenchmarkId::new("ddfi", name), &tri, |b, verts| {
            let mut r = Ddfi::new(WIDTH, HEIGHT);
            b.iter(|| {
                r.clear(0xFF000000);
                r.draw_polygon(black_box(verts), COLOR);
            });
        });

        group.bench_with_input(BenchmarkId::new("efaa", name), &tri, |b, verts| {
            let mut r = Efaa::new(WIDTH, HEIGHT);
            b.iter(|| {
                r.clear(0xFF000000);
                r.draw_polygon(black_box(verts), COLOR);
            });
        });

        group.bench_with_input(BenchmarkId::new("hsgr", name), &tri, |b, verts| {
            let mut r = Hsgr::new(WIDTH, HEIGHT);
            b.iter(|| {
                r.clear(0xFF000000);
                r.draw_polygon(black_box(verts), COLOR);
            });
        });

        group.bench_with_input(BenchmarkId::new("scdt", name), &tri, |b, verts| {
            let mut r = Scdt::new(WIDTH, HEIGHT);
            b.iter(|| {
                r.clear(0xFF000000);
                r.draw_polygon(black_box(verts), COLOR);
            });
        });

        group.bench_with_input(BenchmarkId::new("ssaa", name), &tri, |b, verts| {
            let mut r = Ssaa::new(WIDTH, HEIGHT);
            b.iter(|| {
                r.clear(0xFF000000);
                r.draw_polygon(black_box(verts), COLOR);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_single_triangle);
criterion_main!(benches);
