//! Free-form triangle mesh shadings (shading type 4).
//!
//! Every vertex is written as a flag byte, two 32-bit coordinates scaled into
//! the `Decode` range and one byte per RGB channel. All flags are 0, so each
//! triangle is self-contained.

use lopdf::{Dictionary, Object};
use vexport_types::{Color, Point2, Rect};

pub type MeshVertex = (Point2, Color);

#[derive(Debug, Clone, Default)]
pub struct ShadingMesh {
    triangles: Vec<[MeshVertex; 3]>,
}

impl ShadingMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_triangle(&mut self, triangle: [MeshVertex; 3]) {
        self.triangles.push(triangle);
    }

    /// Splits a quad into `(0, 1, 2)` and `(0, 2, 3)`.
    pub fn push_quad(&mut self, quad: [MeshVertex; 4]) {
        self.triangles.push([quad[0], quad[1], quad[2]]);
        self.triangles.push([quad[0], quad[2], quad[3]]);
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn bounds(&self) -> Option<Rect> {
        Rect::bounding(self.triangles.iter().flatten().map(|(p, _)| *p))
    }

    /// Mean vertex alpha; a mesh carries RGB only, so opacity goes through the
    /// graphics state.
    pub fn average_alpha(&self) -> u8 {
        let count = self.triangles.len() * 3;
        if count == 0 {
            return 255;
        }
        let sum: usize = self.triangles.iter().flatten().map(|(_, c)| c.a as usize).sum();
        (sum / count) as u8
    }

    /// The shading dictionary and its packed vertex data, or `None` for an
    /// empty mesh.
    pub fn encode(&self) -> Option<(Dictionary, Vec<u8>)> {
        let bounds = self.bounds()?;
        let (x_span, y_span) = (bounds.width.max(1e-6), bounds.height.max(1e-6));
        let quantize = |v: f64, min: f64, span: f64| -> u32 {
            (((v - min) / span).clamp(0.0, 1.0) * u32::MAX as f64).round() as u32
        };

        let mut data = Vec::with_capacity(self.triangles.len() * 3 * 12);
        for (p, color) in self.triangles.iter().flatten() {
            data.push(0u8);
            data.extend_from_slice(&quantize(p.x, bounds.x, x_span).to_be_bytes());
            data.extend_from_slice(&quantize(p.y, bounds.y, y_span).to_be_bytes());
            data.extend_from_slice(&[color.r, color.g, color.b]);
        }

        let decode: Vec<Object> = [bounds.x, bounds.x + x_span, bounds.y, bounds.y + y_span, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0]
            .into_iter()
            .map(|v| Object::Real(v as f32))
            .collect();
        let mut dict = Dictionary::new();
        dict.set("ShadingType", 4);
        dict.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
        dict.set("BitsPerCoordinate", 32);
        dict.set("BitsPerComponent", 8);
        dict.set("BitsPerFlag", 8);
        dict.set("Decode", decode);
        Some((dict, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corner(x: f64, y: f64, color: Color) -> MeshVertex {
        (Point2::new(x, y), color)
    }

    #[test]
    fn test_empty_mesh_has_nothing_to_encode() {
        let mesh = ShadingMesh::new();
        assert!(mesh.encode().is_none());
        assert_eq!(mesh.average_alpha(), 255);
    }

    #[test]
    fn test_triangle_packing() {
        let mut mesh = ShadingMesh::new();
        mesh.push_triangle([
            corner(10.0, 20.0, Color::rgb(255, 0, 0)),
            corner(30.0, 20.0, Color::rgb(0, 255, 0)),
            corner(10.0, 60.0, Color::rgb(0, 0, 255)),
        ]);
        let (dict, data) = mesh.encode().unwrap();
        assert_eq!(data.len(), 36);
        assert_eq!(dict.get(b"ShadingType").unwrap().as_i64().unwrap(), 4);

        // First vertex sits on the minimum corner, second on the x maximum.
        assert_eq!(&data[..12], &[0, 0, 0, 0, 0, 0, 0, 0, 0, 255, 0, 0]);
        assert_eq!(&data[13..17], &u32::MAX.to_be_bytes());
        assert_eq!(&data[9..12], &[255, 0, 0]);
        assert_eq!(&data[33..36], &[0, 0, 255]);

        let decode = dict.get(b"Decode").unwrap().as_array().unwrap();
        assert_eq!(decode.len(), 10);
        assert_eq!(decode[1].as_float().unwrap(), 30.0);
        assert_eq!(decode[3].as_float().unwrap(), 60.0);
    }

    #[test]
    fn test_quads_split_and_alpha_average() {
        let mut mesh = ShadingMesh::new();
        let c = Color::rgba(0, 0, 0, 100);
        let d = Color::rgba(0, 0, 0, 200);
        mesh.push_quad([corner(0.0, 0.0, c), corner(1.0, 0.0, c), corner(1.0, 1.0, d), corner(0.0, 1.0, d)]);
        assert_eq!(mesh.len(), 2);
        assert_eq!(mesh.average_alpha(), 150);
    }
}
