//! Conic-to-cubic normalization.
//!
//! A quadratic Bezier `(cur, c, end)` is exactly the cubic
//! `(cur, cur + 2/3·(c − cur), end + 2/3·(c − end), end)`, so the conversion loses
//! nothing.

use crate::error::PathError;
use crate::path::{Path, PathCode, Segment};
use vexport_types::Vec3;

const TWO_THIRDS: f64 = 2.0 / 3.0;

/// Degree-elevates a conic segment, returning the two cubic control points.
pub fn elevate_conic(cur: Vec3, ctrl: Vec3, end: Vec3) -> (Vec3, Vec3) {
    let cp1 = cur + (ctrl - cur) * TWO_THIRDS;
    let cp2 = end + (ctrl - end) * TWO_THIRDS;
    (cp1, cp2)
}

/// Walks the path once, replacing every conic with its cubic equivalent.
pub fn normalized_segments(path: &Path) -> Result<Vec<Segment>, PathError> {
    let mut out = Vec::with_capacity(path.len());
    let mut current: Option<Vec3> = None;
    let mut index = 0;

    for segment in path.segments() {
        let segment = segment?;
        let normalized = match segment {
            Segment::MoveTo(_) | Segment::LineTo(_) => segment,
            Segment::Conic { ctrl, end } => {
                let cur = current.ok_or(PathError::NoCurrentPoint { index })?;
                let (ctrl1, ctrl2) = elevate_conic(cur, ctrl, end);
                Segment::Cubic { ctrl1, ctrl2, end }
            }
            Segment::Cubic { .. } => {
                current.ok_or(PathError::NoCurrentPoint { index })?;
                segment
            }
        };
        index += match segment {
            Segment::MoveTo(_) | Segment::LineTo(_) => 1,
            Segment::Conic { .. } => 2,
            Segment::Cubic { .. } => 3,
        };
        current = Some(segment.end());
        out.push(normalized);
    }
    Ok(out)
}

/// Returns a copy of `path` without conic runs.
pub fn to_cubic(path: &Path) -> Result<Path, PathError> {
    let segments = normalized_segments(path)?;
    let mut out = Path::with_capacity(path.len() + path.len() / 2);
    for segment in segments {
        match segment {
            Segment::MoveTo(p) => out.append(p, PathCode::MoveTo),
            Segment::LineTo(p) => out.append(p, PathCode::LineTo),
            Segment::Cubic { ctrl1, ctrl2, end } => {
                out.append(ctrl1, PathCode::CubicCurve);
                out.append(ctrl2, PathCode::CubicCurve);
                out.append(end, PathCode::CubicCurve);
            }
            // normalized_segments never yields conics
            Segment::Conic { .. } => {}
        }
    }
    Ok(out)
}
