//! # vexport-tessellate
//!
//! Flat-color formats cannot interpolate color across a stroke or a fill. This crate
//! splits Gouraud-shaded lines and triangles into pieces whose corner colors are close
//! enough to be drawn with a single averaged color.
//!
//! A piece stops splitting when its corner colors are within [`ColorTolerance`] or when
//! it is smaller than the squared device-space distance threshold. Each split halves
//! every edge, so the distance test bounds the total work for any input.
//!
//! Subdivision runs on an explicit worklist; no recursion.

pub mod options;

pub use options::{ColorTolerance, TessellationOptions};

use log::debug;
use vexport_types::{Color, Vec3, Vertex};

const DEGENERATE_EPSILON: f64 = 1e-12;

/// A straight, single-color piece of a subdivided line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatLine {
    pub start: Vec3,
    pub end: Vec3,
    pub color: Color,
}

/// A single-color piece of a subdivided triangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatTriangle {
    pub points: [Vec3; 3],
    pub color: Color,
}

#[derive(Debug, Clone, Default)]
pub struct GradientTessellator {
    options: TessellationOptions,
}

impl GradientTessellator {
    pub fn new(options: TessellationOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &TessellationOptions {
        &self.options
    }

    fn colors_close(&self, a: Color, b: Color) -> bool {
        self.options.tolerance.is_close(a, b, self.options.use_alpha)
    }

    fn is_small(&self, a: &Vec3, b: &Vec3) -> bool {
        a.distance_squared(b) < self.options.distance_threshold
    }

    /// Subdivides a two-color line. Pieces are returned in order from `v1` to `v2`.
    pub fn line(&self, v1: Vertex, v2: Vertex) -> Vec<FlatLine> {
        let mut out = Vec::new();
        self.line_into(v1, v2, &mut out);
        out
    }

    pub fn line_into(&self, v1: Vertex, v2: Vertex, out: &mut Vec<FlatLine>) {
        if v1.position.distance_squared(&v2.position) < DEGENERATE_EPSILON {
            debug!("Skipping zero-length shaded line at {:?}", v1.position);
            return;
        }

        let mut work = vec![(v1, v2)];
        while let Some((a, b)) = work.pop() {
            if self.colors_close(a.color, b.color) || self.is_small(&a.position, &b.position) {
                out.push(FlatLine {
                    start: a.position,
                    end: b.position,
                    color: Color::average(a.color, b.color),
                });
                continue;
            }
            let mid = Vertex::new(a.position.midpoint(&b.position), Color::average(a.color, b.color));
            // LIFO: push the far half first so pieces come out in order.
            work.push((mid, b));
            work.push((a, mid));
        }
    }

    /// Subdivides a three-color triangle by edge-midpoint quadrisection.
    pub fn triangle(&self, v1: Vertex, v2: Vertex, v3: Vertex) -> Vec<FlatTriangle> {
        let mut out = Vec::new();
        self.triangle_into(v1, v2, v3, &mut out);
        out
    }

    pub fn triangle_into(&self, v1: Vertex, v2: Vertex, v3: Vertex, out: &mut Vec<FlatTriangle>) {
        if is_degenerate(&v1.position, &v2.position, &v3.position) {
            debug!("Skipping zero-area shaded triangle at {:?}", v1.position);
            return;
        }

        let mut work = vec![[v1, v2, v3]];
        while let Some([a, b, c]) = work.pop() {
            let close = self.colors_close(a.color, b.color)
                && self.colors_close(a.color, c.color)
                && self.colors_close(b.color, c.color);
            let small = self.is_small(&a.position, &b.position)
                && self.is_small(&a.position, &c.position)
                && self.is_small(&b.position, &c.position);

            if close || small {
                out.push(FlatTriangle {
                    points: [a.position, b.position, c.position],
                    color: Color::average3(a.color, b.color, c.color),
                });
                continue;
            }

            let ab = Vertex::new(a.position.midpoint(&b.position), Color::average(a.color, b.color));
            let ac = Vertex::new(a.position.midpoint(&c.position), Color::average(a.color, c.color));
            let bc = Vertex::new(b.position.midpoint(&c.position), Color::average(b.color, c.color));

            work.push([ab, ac, bc]);
            work.push([c, ac, bc]);
            work.push([b, ab, bc]);
            work.push([a, ab, ac]);
        }
    }
}

/// True when the triangle has no area in device x/y.
pub fn is_degenerate(a: &Vec3, b: &Vec3, c: &Vec3) -> bool {
    let area2 = (b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y);
    area2.abs() < DEGENERATE_EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;

    fn red_to_blue(length: f64) -> (Vertex, Vertex) {
        (
            Vertex::at(0.0, 0.0, 0.0, Color::rgb(255, 0, 0)),
            Vertex::at(length, 0.0, 0.0, Color::rgb(0, 0, 255)),
        )
    }

    #[test]
    fn test_gradient_line_splits_into_close_pieces() {
        let tess = GradientTessellator::default();
        let (a, b) = red_to_blue(100.0);
        let pieces = tess.line(a, b);
        assert!(pieces.len() > 1);

        let tolerance = ColorTolerance::default();
        // Reconstruct each piece's endpoint colors by walking the line.
        let t = |x: f64| x / 100.0;
        for piece in &pieces {
            let c0 = lerp_color(a.color, b.color, t(piece.start.x));
            let c1 = lerp_color(a.color, b.color, t(piece.end.x));
            let far_apart = piece.start.distance_squared(&piece.end) >= 1.0;
            if far_apart {
                assert!(tolerance.is_close(c0, c1, true), "{c0:?} vs {c1:?}");
            }
        }
        assert_eq!(pieces.first().unwrap().start, a.position);
        assert_eq!(pieces.last().unwrap().end, b.position);
        for pair in pieces.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    fn lerp_color(a: Color, b: Color, t: f64) -> Color {
        let l = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * t).round() as u8;
        Color::rgba(l(a.r, b.r), l(a.g, b.g), l(a.b, b.b), l(a.a, b.a))
    }

    #[test]
    fn test_piece_count_bounded_by_distance_threshold() {
        let tess = GradientTessellator::default();
        // Colors that never become "close" force the distance test to stop the split.
        let strict = GradientTessellator::new(TessellationOptions {
            tolerance: ColorTolerance { r: 0, g: 0, b: 0, a: 0 },
            ..TessellationOptions::default()
        });
        for length in [3.0, 10.0, 100.0, 777.0] {
            let (a, b) = red_to_blue(length);
            let bound = 2usize.pow((length / tess.options().distance_threshold.sqrt()).log2().ceil() as u32);
            assert!(tess.line(a, b).len() <= bound);
            assert!(strict.line(a, b).len() <= bound);
        }
    }

    #[test]
    fn test_uniform_line_is_single_piece() {
        let tess = GradientTessellator::default();
        let c = Color::rgb(10, 20, 30);
        let pieces = tess.line(Vertex::at(0.0, 0.0, 0.0, c), Vertex::at(500.0, 0.0, 0.0, c));
        assert_eq!(pieces, vec![FlatLine { start: Vec3::ZERO, end: Vec3::new(500.0, 0.0, 0.0), color: c }]);
    }

    #[test]
    fn test_degenerate_inputs_are_skipped() {
        let tess = GradientTessellator::default();
        let v = Vertex::at(5.0, 5.0, 0.0, Color::rgb(255, 0, 0));
        let w = Vertex::at(5.0, 5.0, 0.0, Color::rgb(0, 0, 255));
        assert!(tess.line(v, w).is_empty());
        let collinear = Vertex::at(10.0, 10.0, 0.0, Color::rgb(0, 255, 0));
        assert!(tess.triangle(v, Vertex::at(7.0, 7.0, 0.0, Color::BLACK), collinear).is_empty());
    }

    #[test]
    fn test_triangle_quadrisection_covers_area() {
        let tess = GradientTessellator::default();
        let a = Vertex::at(0.0, 0.0, 0.0, Color::rgb(255, 0, 0));
        let b = Vertex::at(64.0, 0.0, 0.0, Color::rgb(0, 255, 0));
        let c = Vertex::at(0.0, 64.0, 0.0, Color::rgb(0, 0, 255));
        let pieces = tess.triangle(a, b, c);
        assert!(pieces.len() > 1);
        assert_eq!((pieces.len() - 1) % 3, 0);

        let area = |p: &[Vec3; 3]| ((p[1].x - p[0].x) * (p[2].y - p[0].y) - (p[2].x - p[0].x) * (p[1].y - p[0].y)).abs() / 2.0;
        let total: f64 = pieces.iter().map(|t| area(&t.points)).sum();
        assert!((total - 64.0 * 64.0 / 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_flat_triangle_uses_average_color() {
        let tess = GradientTessellator::default();
        let pieces = tess.triangle(
            Vertex::at(0.0, 0.0, 0.0, Color::rgb(10, 10, 10)),
            Vertex::at(10.0, 0.0, 0.0, Color::rgb(13, 10, 10)),
            Vertex::at(0.0, 10.0, 0.0, Color::rgb(16, 10, 10)),
        );
        assert_eq!(pieces.len(), 1);
        assert_eq!(pieces[0].color, Color::rgb(13, 10, 10));
    }
}
