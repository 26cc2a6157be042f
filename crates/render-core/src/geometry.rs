//! Device-independent outlines for arcs, wedges and markers.
//!
//! Angles are in degrees, counter-clockwise from the +x axis, y up.

use crate::style::MarkerShape;
use vexport_path::Path;
use vexport_types::{Point2, Rect};

/// Maximum chord deviation, in device units, of an arc approximation.
const ARC_ERROR: f64 = 4.0;

/// Bezier handle length for a quarter circle of unit radius.
const KAPPA: f64 = 0.552_284_749_830_793_4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillRule {
    #[default]
    NonZero,
    EvenOdd,
}

/// An outline together with the rule it should be filled with.
#[derive(Debug, Clone, PartialEq)]
pub struct Outline {
    pub path: Path,
    pub fill_rule: FillRule,
}

/// Number of straight segments needed to approximate the arc within [`ARC_ERROR`].
///
/// Always at least one. Zero radii yield one segment.
pub fn arc_segment_count(rx: f64, ry: f64, start: f64, stop: f64) -> usize {
    let max_radius = rx.max(ry);
    if max_radius <= 0.0 {
        return 1;
    }
    let error = ARC_ERROR.min(max_radius);
    let max_step = 2.0 * (error / (2.0 * max_radius)).asin();
    let count = ((stop - start).abs().to_radians() / max_step).ceil();
    (count as usize).max(1)
}

/// Polyline points along an elliptic arc, `start` and `stop` included.
pub fn elliptic_arc_points(center: Point2, rx: f64, ry: f64, start: f64, stop: f64) -> Vec<Point2> {
    let segments = arc_segment_count(rx, ry, start, stop);
    let step = (stop - start).to_radians() / segments as f64;
    let first = start.to_radians();
    (0..=segments)
        .map(|i| {
            let angle = first + step * i as f64;
            Point2::new(center.x + rx * angle.cos(), center.y + ry * angle.sin())
        })
        .collect()
}

/// A point on the ellipse at `angle` degrees.
pub fn ellipse_point(center: Point2, rx: f64, ry: f64, angle: f64) -> Point2 {
    let (s, c) = angle.to_radians().sin_cos();
    Point2::new(center.x + rx * c, center.y + ry * s)
}

/// Appends a closed ellipse made of four cubic segments, starting at angle 0.
pub fn append_ellipse(path: &mut Path, center: Point2, rx: f64, ry: f64) {
    let (cx, cy) = (center.x, center.y);
    let (kx, ky) = (rx * KAPPA, ry * KAPPA);
    path.move_to(cx + rx, cy);
    path.cubic_to(Point2::new(cx + rx, cy + ky), Point2::new(cx + kx, cy + ry), Point2::new(cx, cy + ry));
    path.cubic_to(Point2::new(cx - kx, cy + ry), Point2::new(cx - rx, cy + ky), Point2::new(cx - rx, cy));
    path.cubic_to(Point2::new(cx - rx, cy - ky), Point2::new(cx - kx, cy - ry), Point2::new(cx, cy - ry));
    path.cubic_to(Point2::new(cx + kx, cy - ry), Point2::new(cx + rx, cy - ky), Point2::new(cx + rx, cy));
}

fn append_polyline(path: &mut Path, points: &[Point2], start_subpath: bool) {
    for (i, p) in points.iter().enumerate() {
        if i == 0 && start_subpath {
            path.move_to(p.x, p.y);
        } else {
            path.line_to(p.x, p.y);
        }
    }
}

/// Outline of a filled elliptic wedge, optionally hollowed by an inner ellipse.
///
/// A sweep of 360° or more is a full ellipse (a ring when the inner radii are
/// non-zero, filled even-odd). A partial sweep traces the outer arc from `start` to
/// `stop`, then the inner arc back from `stop` to `start`; with zero inner radii the
/// inner arc collapses to the center.
pub fn wedge_outline(center: Point2, outer: (f64, f64), inner: (f64, f64), start: f64, stop: f64) -> Outline {
    let hollow = inner.0 > 0.0 || inner.1 > 0.0;
    let mut path = Path::new();

    if (stop - start).abs() >= 360.0 {
        append_ellipse(&mut path, center, outer.0, outer.1);
        if hollow {
            append_ellipse(&mut path, center, inner.0, inner.1);
        }
        let fill_rule = if hollow { FillRule::EvenOdd } else { FillRule::NonZero };
        return Outline { path, fill_rule };
    }

    append_polyline(&mut path, &elliptic_arc_points(center, outer.0, outer.1, start, stop), true);
    if hollow {
        append_polyline(&mut path, &elliptic_arc_points(center, inner.0, inner.1, stop, start), false);
        Outline { path, fill_rule: FillRule::EvenOdd }
    } else {
        path.line_to(center.x, center.y);
        Outline { path, fill_rule: FillRule::NonZero }
    }
}

/// Outline of an elliptic arc. Full sweeps become a closed ellipse.
pub fn arc_outline(center: Point2, rx: f64, ry: f64, start: f64, stop: f64) -> Path {
    let mut path = Path::new();
    if (stop - start).abs() >= 360.0 {
        append_ellipse(&mut path, center, rx, ry);
    } else {
        append_polyline(&mut path, &elliptic_arc_points(center, rx, ry, start, stop), true);
    }
    path
}

/// Outline of one marker of edge length `size` centered on `at`.
///
/// Cross and plus are open strokes; the other shapes are closed fills.
pub fn marker_outline(shape: MarkerShape, at: Point2, size: f64) -> Path {
    let d = size * 0.5;
    let mut path = Path::new();
    match shape {
        MarkerShape::Cross => {
            path.move_to(at.x + d, at.y + d).line_to(at.x - d, at.y - d);
            path.move_to(at.x + d, at.y - d).line_to(at.x - d, at.y + d);
        }
        MarkerShape::Plus => {
            path.move_to(at.x, at.y + d).line_to(at.x, at.y - d);
            path.move_to(at.x + d, at.y).line_to(at.x - d, at.y);
        }
        MarkerShape::Square => {
            let corners = Rect::new(at.x - d, at.y - d, size, size).corners();
            append_polyline(&mut path, &corners, true);
        }
        MarkerShape::Circle => append_ellipse(&mut path, at, d, d),
        MarkerShape::Diamond => {
            path.move_to(at.x + d, at.y)
                .line_to(at.x, at.y + d)
                .line_to(at.x - d, at.y)
                .line_to(at.x, at.y - d);
        }
    }
    path
}

/// Quad corners of a line segment thickened to `2 · radius`, or `None` when the
/// endpoints coincide.
pub fn thick_segment(p1: Point2, p2: Point2, radius: f64) -> Option<[Point2; 4]> {
    let (dx, dy) = (p2.x - p1.x, p2.y - p1.y);
    let length = (dx * dx + dy * dy).sqrt();
    if length < 1e-12 {
        return None;
    }
    let (nx, ny) = (-dy / length * radius, dx / length * radius);
    Some([
        Point2::new(p1.x + nx, p1.y + ny),
        Point2::new(p1.x - nx, p1.y - ny),
        Point2::new(p2.x - nx, p2.y - ny),
        Point2::new(p2.x + nx, p2.y + ny),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use vexport_path::Segment;

    #[test]
    fn test_arc_segment_count() {
        // err = 4, r = 100: step = 2·asin(0.02) ≈ 0.040003 rad.
        assert_eq!(arc_segment_count(100.0, 50.0, 0.0, 90.0), 40);
        assert_eq!(arc_segment_count(50.0, 100.0, 90.0, 0.0), 40);
        // Small radii clamp the error to the radius: step = 2·asin(0.5) = 60°.
        assert_eq!(arc_segment_count(2.0, 2.0, 0.0, 100.0), 2);
        assert_eq!(arc_segment_count(0.0, 0.0, 0.0, 180.0), 1);
    }

    #[test]
    fn test_arc_points_hit_endpoints() {
        let pts = elliptic_arc_points(Point2::new(10.0, 10.0), 5.0, 3.0, 0.0, 90.0);
        let first = pts.first().unwrap();
        let last = pts.last().unwrap();
        assert!((first.x - 15.0).abs() < 1e-9 && (first.y - 10.0).abs() < 1e-9);
        assert!((last.x - 10.0).abs() < 1e-9 && (last.y - 13.0).abs() < 1e-9);
    }

    #[test]
    fn test_full_ring_is_even_odd() {
        let outline = wedge_outline(Point2::new(0.0, 0.0), (10.0, 10.0), (5.0, 5.0), 0.0, 360.0);
        assert_eq!(outline.fill_rule, FillRule::EvenOdd);
        let moves = outline.path.segments().filter(|s| matches!(s, Ok(Segment::MoveTo(_)))).count();
        assert_eq!(moves, 2);

        let disc = wedge_outline(Point2::new(0.0, 0.0), (10.0, 10.0), (0.0, 0.0), 0.0, 360.0);
        assert_eq!(disc.fill_rule, FillRule::NonZero);
    }

    #[test]
    fn test_pie_wedge_returns_to_center() {
        let outline = wedge_outline(Point2::new(1.0, 2.0), (10.0, 10.0), (0.0, 0.0), 0.0, 90.0);
        let last = *outline.path.points().last().unwrap();
        assert_eq!((last.x, last.y), (1.0, 2.0));
    }

    #[test]
    fn test_markers() {
        let cross = marker_outline(MarkerShape::Cross, Point2::new(0.0, 0.0), 4.0);
        assert_eq!(cross.len(), 4);
        let square = marker_outline(MarkerShape::Square, Point2::new(0.0, 0.0), 4.0);
        assert_eq!(square.bounds(), Some(Rect::new(-2.0, -2.0, 4.0, 4.0)));
        let circle = marker_outline(MarkerShape::Circle, Point2::new(0.0, 0.0), 4.0);
        assert!(circle.validate().is_ok());
    }

    #[test]
    fn test_thick_segment() {
        let quad = thick_segment(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), 2.0).unwrap();
        assert_eq!(quad[0], Point2::new(0.0, 2.0));
        assert_eq!(quad[2], Point2::new(10.0, -2.0));
        assert!(thick_segment(Point2::new(1.0, 1.0), Point2::new(1.0, 1.0), 2.0).is_none());
    }
}
