//! End-to-end export benchmarks
//!
//! Renders a shaded mesh of growing size to every document format.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use vexport::{Color, ExportOptions, Exporter, JsonScene, MeshTopology, OutputFormat, SceneItem, SortMode, Vec3};

/// A `cells` x `cells` grid of triangles spanning NDC, colored by position.
fn mesh_scene(cells: usize) -> JsonScene {
    let mut positions = Vec::with_capacity(cells * cells * 6);
    let mut colors = Vec::with_capacity(cells * cells * 6);
    let step = 2.0 / cells as f64;
    let shade = |x: f64, y: f64| Color::rgb(((x + 1.0) * 127.0) as u8, ((y + 1.0) * 127.0) as u8, 128);
    for row in 0..cells {
        for col in 0..cells {
            let (x0, y0) = (-1.0 + col as f64 * step, -1.0 + row as f64 * step);
            let (x1, y1) = (x0 + step, y0 + step);
            for (x, y) in [(x0, y0), (x1, y0), (x1, y1), (x0, y0), (x1, y1), (x0, y1)] {
                positions.push(Vec3::new(x, y, (x * y) / 2.0));
                colors.push(shade(x, y));
            }
        }
    }
    JsonScene::new(400.0, 400.0).with_item(SceneItem::Mesh {
        topology: MeshTopology::Triangles,
        positions,
        colors: Some(colors),
        color: Color::BLACK,
        size: 1.0,
        actor: None,
    })
}

fn benchmark_export_formats(c: &mut Criterion) {
    let mut group = c.benchmark_group("export_formats");

    for format in [OutputFormat::Eps, OutputFormat::Pdf, OutputFormat::Svg] {
        for cells in [4, 16] {
            let mut scene = mesh_scene(cells);
            let exporter = Exporter::new(ExportOptions { format, ..ExportOptions::default() });
            group.bench_with_input(BenchmarkId::new(format.extension(), cells), &cells, |b, _| {
                b.iter(|| exporter.render(&mut scene, "bench").expect("Failed to export scene"));
            });
        }
    }
    group.finish();
}

fn benchmark_sort_modes(c: &mut Criterion) {
    let mut group = c.benchmark_group("sort_modes");
    let mut scene = mesh_scene(12);

    for mode in [SortMode::None, SortMode::Simple, SortMode::Bsp] {
        let exporter = Exporter::new(ExportOptions { format: OutputFormat::Svg, sort_mode: mode, ..ExportOptions::default() });
        group.bench_function(format!("{:?}", mode), |b| {
            b.iter(|| exporter.render(&mut scene, "bench").expect("Failed to export scene"));
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_export_formats, benchmark_sort_modes);
criterion_main!(benches);
