use crate::error::PathError;
use vexport_types::{Matrix3, Point2, Rect, Vec3};

/// Role of a control point within a [`Path`].
///
/// `ConicCurve` points come in runs of two (control, end) and `CubicCurve`
/// points in runs of three (control, control, end).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathCode {
    MoveTo,
    LineTo,
    ConicCurve,
    CubicCurve,
}

impl PathCode {
    /// Number of consecutive points a segment of this kind occupies.
    pub fn run_length(self) -> usize {
        match self {
            PathCode::MoveTo | PathCode::LineTo => 1,
            PathCode::ConicCurve => 2,
            PathCode::CubicCurve => 3,
        }
    }
}

/// One decoded drawing step of a path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segment {
    MoveTo(Vec3),
    LineTo(Vec3),
    Conic { ctrl: Vec3, end: Vec3 },
    Cubic { ctrl1: Vec3, ctrl2: Vec3, end: Vec3 },
}

impl Segment {
    pub fn end(&self) -> Vec3 {
        match *self {
            Segment::MoveTo(p) | Segment::LineTo(p) => p,
            Segment::Conic { end, .. } | Segment::Cubic { end, .. } => end,
        }
    }
}

/// An ordered sequence of typed control points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    points: Vec<Vec3>,
    codes: Vec<PathCode>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { points: Vec::with_capacity(capacity), codes: Vec::with_capacity(capacity) }
    }

    pub fn append(&mut self, point: Vec3, code: PathCode) {
        self.points.push(point);
        self.codes.push(code);
    }

    pub fn move_to(&mut self, x: f64, y: f64) -> &mut Self {
        self.append(Vec3::new(x, y, 0.0), PathCode::MoveTo);
        self
    }

    pub fn line_to(&mut self, x: f64, y: f64) -> &mut Self {
        self.append(Vec3::new(x, y, 0.0), PathCode::LineTo);
        self
    }

    pub fn conic_to(&mut self, ctrl: Point2, end: Point2) -> &mut Self {
        self.append(ctrl.to_vec3(), PathCode::ConicCurve);
        self.append(end.to_vec3(), PathCode::ConicCurve);
        self
    }

    pub fn cubic_to(&mut self, ctrl1: Point2, ctrl2: Point2, end: Point2) -> &mut Self {
        self.append(ctrl1.to_vec3(), PathCode::CubicCurve);
        self.append(ctrl2.to_vec3(), PathCode::CubicCurve);
        self.append(end.to_vec3(), PathCode::CubicCurve);
        self
    }

    /// Clears all points and codes, keeping the allocated capacity.
    pub fn reset(&mut self) {
        self.points.clear();
        self.codes.clear();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.points.capacity()
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    pub fn codes(&self) -> &[PathCode] {
        &self.codes
    }

    /// Decodes the code stream into segments, failing on a broken curve run.
    pub fn segments(&self) -> Segments<'_> {
        Segments { path: self, index: 0 }
    }

    /// Checks the run-length invariants without materializing segments.
    pub fn validate(&self) -> Result<(), PathError> {
        self.segments().try_for_each(|s| s.map(|_| ()))
    }

    /// Applies an affine transform to every point's x/y.
    pub fn transform(&mut self, m: &Matrix3) {
        for p in &mut self.points {
            let q = m.transform_point(p.xy());
            p.x = q.x;
            p.y = q.y;
        }
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        for p in &mut self.points {
            p.x += dx;
            p.y += dy;
        }
    }

    /// Bounding box of all control points.
    pub fn bounds(&self) -> Option<Rect> {
        Rect::bounding(self.points.iter().map(Vec3::xy))
    }
}

pub struct Segments<'a> {
    path: &'a Path,
    index: usize,
}

impl Iterator for Segments<'_> {
    type Item = Result<Segment, PathError>;

    fn next(&mut self) -> Option<Self::Item> {
        let codes = &self.path.codes;
        let points = &self.path.points;
        let start = self.index;
        let code = *codes.get(start)?;
        let run = code.run_length();

        let complete = codes.get(start..start + run).is_some_and(|c| c.iter().all(|&k| k == code));
        if !complete {
            // Stop after reporting once.
            self.index = codes.len();
            return Some(Err(PathError::BrokenRun { code, index: start, expected: run }));
        }
        self.index += run;

        Some(Ok(match code {
            PathCode::MoveTo => Segment::MoveTo(points[start]),
            PathCode::LineTo => Segment::LineTo(points[start]),
            PathCode::ConicCurve => Segment::Conic { ctrl: points[start], end: points[start + 1] },
            PathCode::CubicCurve => Segment::Cubic {
                ctrl1: points[start],
                ctrl2: points[start + 1],
                end: points[start + 2],
            },
        }))
    }
}
