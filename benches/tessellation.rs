//! Gradient tessellation benchmarks
//!
//! Measures how subdivision cost grows with primitive size and color spread.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use vexport::tessellate::{GradientTessellator, TessellationOptions};
use vexport::types::Vertex;
use vexport::{Color, Vec3};

fn benchmark_line_tessellation(c: &mut Criterion) {
    let mut group = c.benchmark_group("line_tessellation");
    let tessellator = GradientTessellator::new(TessellationOptions::default());

    for length in [10.0, 100.0, 1000.0] {
        let start = Vertex::new(Vec3::new(0.0, 0.0, 0.0), Color::rgb(255, 0, 0));
        let end = Vertex::new(Vec3::new(length, length / 2.0, 0.0), Color::rgb(0, 0, 255));
        group.bench_with_input(BenchmarkId::new("length", length as u32), &length, |b, _| {
            b.iter(|| tessellator.line(black_box(start), black_box(end)));
        });
    }
    group.finish();
}

fn benchmark_triangle_tessellation(c: &mut Criterion) {
    let mut group = c.benchmark_group("triangle_tessellation");

    // A coarser threshold trades smoothness for fewer pieces
    for threshold in [1.0, 16.0, 256.0] {
        let tessellator =
            GradientTessellator::new(TessellationOptions { distance_threshold: threshold, ..TessellationOptions::default() });
        let v1 = Vertex::new(Vec3::new(0.0, 0.0, 0.0), Color::rgb(255, 0, 0));
        let v2 = Vertex::new(Vec3::new(400.0, 0.0, 0.0), Color::rgb(0, 255, 0));
        let v3 = Vertex::new(Vec3::new(200.0, 300.0, 0.0), Color::rgb(0, 0, 255));
        group.bench_with_input(BenchmarkId::new("threshold", threshold as u32), &threshold, |b, _| {
            b.iter(|| tessellator.triangle(black_box(v1), black_box(v2), black_box(v3)));
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_line_tessellation, benchmark_triangle_tessellation);
criterion_main!(benches);
