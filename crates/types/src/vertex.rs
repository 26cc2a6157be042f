use crate::color::Color;
use crate::geometry::Vec3;

/// A device-space position with its color, as produced by capture.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vertex {
    pub position: Vec3,
    pub color: Color,
}

impl Vertex {
    pub const fn new(position: Vec3, color: Color) -> Self {
        Self { position, color }
    }

    pub fn at(x: f64, y: f64, z: f64, color: Color) -> Self {
        Self::new(Vec3::new(x, y, z), color)
    }
}
