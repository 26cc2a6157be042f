//! Immediate-mode interception: drawing calls project their vertices and hand
//! primitives straight to a sink instead of issuing GPU draws.

use crate::error::CaptureError;
use crate::primitive::{Primitive, PrimitiveSink, Stipple};
use log::warn;
use vexport_projector::Projector;
use vexport_types::{Color, Matrix4, Vec3, Vertex};

/// Per-vertex or uniform color input for a drawing call.
#[derive(Debug, Clone, Copy)]
pub enum Colors<'a> {
    Uniform(Color),
    PerVertex(&'a [Color]),
}

impl Colors<'_> {
    fn check(&self, vertices: usize) -> Result<(), CaptureError> {
        match self {
            Colors::PerVertex(colors) if colors.len() != vertices => Err(CaptureError::ColorCountMismatch {
                vertices,
                expected: vertices,
                actual: colors.len(),
            }),
            _ => Ok(()),
        }
    }

    fn get(&self, i: usize) -> Color {
        match self {
            Colors::Uniform(c) => *c,
            Colors::PerVertex(colors) => colors[i],
        }
    }
}

pub struct ImmediateCapture<'a, S: PrimitiveSink + ?Sized> {
    projector: &'a Projector,
    sink: &'a mut S,
    actor: Option<Matrix4>,
    point_size: f64,
    line_width: f64,
    stipple: Option<Stipple>,
}

impl<'a, S: PrimitiveSink + ?Sized> ImmediateCapture<'a, S> {
    pub fn new(projector: &'a Projector, sink: &'a mut S) -> Self {
        Self { projector, sink, actor: None, point_size: 1.0, line_width: 1.0, stipple: None }
    }

    pub fn set_actor_matrix(&mut self, actor: Option<Matrix4>) {
        self.actor = actor;
    }

    pub fn set_point_size(&mut self, size: f64) {
        self.point_size = size;
    }

    pub fn set_line_width(&mut self, width: f64) {
        self.line_width = width;
    }

    pub fn set_stipple(&mut self, stipple: Option<Stipple>) {
        self.stipple = stipple;
    }

    fn project_all(&self, points: &[Vec3], colors: &Colors<'_>) -> Result<Vec<Option<Vertex>>, CaptureError> {
        colors.check(points.len())?;
        Ok(points
            .iter()
            .enumerate()
            .map(|(i, p)| match self.projector.project(*p, self.actor.as_ref()) {
                Ok(d) => Some(Vertex::new(d, colors.get(i))),
                Err(e) => {
                    warn!("Dropping vertex {} ({:?}): {}", i, p, e);
                    None
                }
            })
            .collect())
    }

    /// Returns the number of primitives emitted.
    pub fn draw_points(&mut self, points: &[Vec3], colors: Colors<'_>) -> Result<usize, CaptureError> {
        let vertices = self.project_all(points, &colors)?;
        let mut emitted = 0;
        for vertex in vertices.into_iter().flatten() {
            self.sink.accept(Primitive::Point { vertex, size: self.point_size });
            emitted += 1;
        }
        Ok(emitted)
    }

    /// Independent segments from consecutive pairs; an odd trailing point is ignored.
    pub fn draw_lines(&mut self, points: &[Vec3], colors: Colors<'_>) -> Result<usize, CaptureError> {
        let vertices = self.project_all(points, &colors)?;
        Ok(vertices.chunks_exact(2).filter(|pair| self.emit_line(pair[0], pair[1])).count())
    }

    pub fn draw_line_strip(&mut self, points: &[Vec3], colors: Colors<'_>) -> Result<usize, CaptureError> {
        let vertices = self.project_all(points, &colors)?;
        Ok(vertices.windows(2).filter(|pair| self.emit_line(pair[0], pair[1])).count())
    }

    fn emit_line(&mut self, a: Option<Vertex>, b: Option<Vertex>) -> bool {
        let (Some(a), Some(b)) = (a, b) else { return false };
        self.sink.accept(Primitive::Line { vertices: [a, b], width: self.line_width, stipple: self.stipple });
        true
    }

    fn emit_triangle(&mut self, a: Option<Vertex>, b: Option<Vertex>, c: Option<Vertex>) -> bool {
        let (Some(a), Some(b), Some(c)) = (a, b, c) else { return false };
        self.sink.accept(Primitive::Triangle { vertices: [a, b, c] });
        true
    }

    pub fn draw_triangles(&mut self, points: &[Vec3], colors: Colors<'_>) -> Result<usize, CaptureError> {
        let vertices = self.project_all(points, &colors)?;
        Ok(vertices.chunks_exact(3).filter(|t| self.emit_triangle(t[0], t[1], t[2])).count())
    }

    /// Strip triangles alternate winding so every triangle keeps the strip's orientation.
    pub fn draw_triangle_strip(&mut self, points: &[Vec3], colors: Colors<'_>) -> Result<usize, CaptureError> {
        let vertices = self.project_all(points, &colors)?;
        let mut emitted = 0;
        for (i, t) in vertices.windows(3).enumerate() {
            let ok = if i % 2 == 0 {
                self.emit_triangle(t[0], t[1], t[2])
            } else {
                self.emit_triangle(t[1], t[0], t[2])
            };
            emitted += ok as usize;
        }
        Ok(emitted)
    }

    pub fn draw_triangle_fan(&mut self, points: &[Vec3], colors: Colors<'_>) -> Result<usize, CaptureError> {
        let vertices = self.project_all(points, &colors)?;
        let Some((&center, rest)) = vertices.split_first() else { return Ok(0) };
        Ok(rest.windows(2).filter(|pair| self.emit_triangle(center, pair[0], pair[1])).count())
    }

    /// A convex polygon kept whole as a fan primitive.
    pub fn draw_polygon(&mut self, points: &[Vec3], colors: Colors<'_>) -> Result<usize, CaptureError> {
        let vertices = self.project_all(points, &colors)?;
        let vertices: Option<Vec<Vertex>> = vertices.into_iter().collect();
        match vertices {
            Some(vertices) if vertices.len() >= 3 => {
                self.sink.accept(Primitive::PolygonFan { vertices });
                Ok(1)
            }
            _ => Ok(0),
        }
    }
}
