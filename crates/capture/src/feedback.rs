//! Deferred capture: decodes an interleaved transform-feedback vertex buffer.
//!
//! Each vertex holds a clip-space position as four little-endian `f32` values and,
//! optionally, a color. Vertices are projected to device space and regrouped into
//! primitives according to the declared topology.

use crate::error::CaptureError;
use crate::primitive::{Primitive, PrimitiveSink};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use vexport_projector::Projector;
use vexport_types::{Color, Vertex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topology {
    Points,
    Lines,
    Triangles,
}

impl Topology {
    pub fn vertices_per_primitive(self) -> usize {
        match self {
            Topology::Points => 1,
            Topology::Lines => 2,
            Topology::Triangles => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorFormat {
    /// Four normalized bytes.
    Unorm8x4,
    /// Three `f32` in `[0, 1]`, opaque.
    Float32x3,
    /// Four `f32` in `[0, 1]`.
    Float32x4,
}

impl ColorFormat {
    pub fn byte_len(self) -> usize {
        match self {
            ColorFormat::Unorm8x4 => 4,
            ColorFormat::Float32x3 => 12,
            ColorFormat::Float32x4 => 16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorAttribute {
    pub offset: usize,
    pub format: ColorFormat,
}

/// Byte layout of one vertex in the captured buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeLayout {
    pub stride: usize,
    pub position_offset: usize,
    pub color: Option<ColorAttribute>,
}

const POSITION_BYTES: usize = 16;

impl AttributeLayout {
    /// Tightly packed clip position, no color.
    pub fn position_only() -> Self {
        Self { stride: POSITION_BYTES, position_offset: 0, color: None }
    }

    /// Clip position followed by four float color components.
    pub fn position_color() -> Self {
        Self {
            stride: POSITION_BYTES + 16,
            position_offset: 0,
            color: Some(ColorAttribute { offset: POSITION_BYTES, format: ColorFormat::Float32x4 }),
        }
    }

    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.stride == 0 {
            return Err(CaptureError::InvalidLayout("stride is zero".into()));
        }
        let fits = |offset: usize, len: usize| offset.checked_add(len).is_some_and(|end| end <= self.stride);
        if !fits(self.position_offset, POSITION_BYTES) {
            return Err(CaptureError::InvalidLayout(format!(
                "position at {} overruns the {}-byte stride",
                self.position_offset, self.stride
            )));
        }
        if let Some(color) = self.color
            && !fits(color.offset, color.format.byte_len())
        {
            return Err(CaptureError::InvalidLayout(format!(
                "color at {} overruns the {}-byte stride",
                color.offset, self.stride
            )));
        }
        Ok(())
    }
}

fn read_f32(bytes: &[u8], offset: usize) -> f32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    f32::from_le_bytes(raw)
}

/// Decoder configuration for one captured draw.
#[derive(Debug, Clone)]
pub struct FeedbackDecoder<'a> {
    pub projector: &'a Projector,
    pub layout: AttributeLayout,
    pub topology: Topology,
    /// Used when the layout declares no color.
    pub fallback_color: Color,
    pub point_size: f64,
    pub line_width: f64,
}

impl<'a> FeedbackDecoder<'a> {
    pub fn new(projector: &'a Projector, layout: AttributeLayout, topology: Topology) -> Self {
        Self { projector, layout, topology, fallback_color: Color::BLACK, point_size: 1.0, line_width: 1.0 }
    }

    pub fn with_fallback_color(mut self, color: Color) -> Self {
        self.fallback_color = color;
        self
    }

    fn vertex(&self, record: &[u8]) -> Result<Vertex, CaptureError> {
        let p = self.layout.position_offset;
        let clip = [
            read_f32(record, p) as f64,
            read_f32(record, p + 4) as f64,
            read_f32(record, p + 8) as f64,
            read_f32(record, p + 12) as f64,
        ];
        let position = self.projector.project_clip(clip)?;
        let color = match self.layout.color {
            None => self.fallback_color,
            Some(ColorAttribute { offset, format: ColorFormat::Unorm8x4 }) => {
                Color::rgba(record[offset], record[offset + 1], record[offset + 2], record[offset + 3])
            }
            Some(ColorAttribute { offset, format: ColorFormat::Float32x3 }) => Color::from_unit(
                read_f32(record, offset),
                read_f32(record, offset + 4),
                read_f32(record, offset + 8),
                1.0,
            ),
            Some(ColorAttribute { offset, format: ColorFormat::Float32x4 }) => Color::from_unit(
                read_f32(record, offset),
                read_f32(record, offset + 4),
                read_f32(record, offset + 8),
                read_f32(record, offset + 12),
            ),
        };
        Ok(Vertex::new(position, color))
    }

    /// Decodes `buffer` into the sink, returning the number of primitives emitted.
    ///
    /// Primitives with a vertex on the camera plane are dropped; an incomplete
    /// trailing primitive is dropped with a warning.
    pub fn decode<S: PrimitiveSink + ?Sized>(&self, buffer: &[u8], sink: &mut S) -> Result<usize, CaptureError> {
        self.layout.validate()?;
        let stride = self.layout.stride;
        if buffer.len() % stride != 0 {
            return Err(CaptureError::RaggedBuffer { len: buffer.len(), stride });
        }

        let per_primitive = self.topology.vertices_per_primitive();
        let vertex_count = buffer.len() / stride;
        if vertex_count % per_primitive != 0 {
            warn!(
                "Dropping {} trailing vertices that do not form a complete {:?} primitive",
                vertex_count % per_primitive,
                self.topology
            );
        }

        let mut emitted = 0;
        for (index, group) in buffer.chunks_exact(stride * per_primitive).enumerate() {
            let vertices: Result<Vec<Vertex>, CaptureError> =
                group.chunks_exact(stride).map(|record| self.vertex(record)).collect();
            let vertices = match vertices {
                Ok(v) => v,
                Err(CaptureError::Projection(e)) => {
                    debug!("Skipping primitive {}: {}", index, e);
                    continue;
                }
                Err(e) => return Err(e),
            };
            let primitive = match self.topology {
                Topology::Points => Primitive::Point { vertex: vertices[0], size: self.point_size },
                Topology::Lines => Primitive::Line {
                    vertices: [vertices[0], vertices[1]],
                    width: self.line_width,
                    stipple: None,
                },
                Topology::Triangles => Primitive::Triangle { vertices: [vertices[0], vertices[1], vertices[2]] },
            };
            sink.accept(primitive);
            emitted += 1;
        }
        Ok(emitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vexport_projector::Viewport;
    use vexport_types::Vec3;

    fn push_f32s(buf: &mut Vec<u8>, values: &[f32]) {
        for v in values {
            buf.extend_from_slice(&v.to_le_bytes());
        }
    }

    #[test]
    fn test_decode_triangles_with_float_colors() {
        let projector = Projector::identity(Viewport::sized(200.0, 100.0));
        let mut buf = Vec::new();
        push_f32s(&mut buf, &[-2.0, -2.0, 0.0, 2.0, 1.0, 0.0, 0.0, 1.0]);
        push_f32s(&mut buf, &[1.0, -1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0]);
        push_f32s(&mut buf, &[0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.5]);

        let decoder = FeedbackDecoder::new(&projector, AttributeLayout::position_color(), Topology::Triangles);
        let mut out: Vec<Primitive> = Vec::new();
        assert_eq!(decoder.decode(&buf, &mut out).unwrap(), 1);

        let Primitive::Triangle { vertices } = &out[0] else { panic!("expected triangle") };
        // w = 2 divides the first vertex back onto the NDC corner.
        assert_eq!(vertices[0].position, Vec3::new(0.0, 0.0, 0.5));
        assert_eq!(vertices[0].color, Color::rgb(255, 0, 0));
        assert_eq!(vertices[2].color, Color::rgba(0, 0, 255, 128));
    }

    #[test]
    fn test_missing_color_uses_fallback_and_drops_partial() {
        let projector = Projector::identity(Viewport::sized(10.0, 10.0));
        let mut buf = Vec::new();
        for _ in 0..5 {
            push_f32s(&mut buf, &[0.0, 0.0, 0.0, 1.0]);
        }
        let decoder = FeedbackDecoder::new(&projector, AttributeLayout::position_only(), Topology::Lines)
            .with_fallback_color(Color::rgb(9, 9, 9));
        let mut out: Vec<Primitive> = Vec::new();
        assert_eq!(decoder.decode(&buf, &mut out).unwrap(), 2);
        assert!(out.iter().all(|p| p.uniform_color() == Some(Color::rgb(9, 9, 9))));
    }

    #[test]
    fn test_unorm_colors_and_zero_w_skip() {
        let projector = Projector::identity(Viewport::sized(10.0, 10.0));
        let layout = AttributeLayout {
            stride: 20,
            position_offset: 4,
            color: Some(ColorAttribute { offset: 0, format: ColorFormat::Unorm8x4 }),
        };
        let mut buf = Vec::new();
        buf.extend_from_slice(&[1, 2, 3, 4]);
        push_f32s(&mut buf, &[0.0, 0.0, 0.0, 1.0]);
        buf.extend_from_slice(&[5, 6, 7, 8]);
        push_f32s(&mut buf, &[0.0, 0.0, 0.0, 0.0]);

        let decoder = FeedbackDecoder::new(&projector, layout, Topology::Points);
        let mut out: Vec<Primitive> = Vec::new();
        assert_eq!(decoder.decode(&buf, &mut out).unwrap(), 1);
        assert_eq!(out[0].vertices()[0].color, Color::rgba(1, 2, 3, 4));
    }

    #[test]
    fn test_layout_errors() {
        let projector = Projector::identity(Viewport::sized(10.0, 10.0));
        let bad = AttributeLayout { stride: 12, position_offset: 0, color: None };
        let decoder = FeedbackDecoder::new(&projector, bad, Topology::Points);
        assert!(matches!(decoder.decode(&[0; 12], &mut Vec::new()), Err(CaptureError::InvalidLayout(_))));

        let decoder = FeedbackDecoder::new(&projector, AttributeLayout::position_only(), Topology::Points);
        assert!(matches!(decoder.decode(&[0; 17], &mut Vec::new()), Err(CaptureError::RaggedBuffer { .. })));
    }

    #[test]
    fn test_huge_offsets_are_layout_errors() {
        let far = AttributeLayout { stride: 32, position_offset: usize::MAX - 4, color: None };
        assert!(matches!(far.validate(), Err(CaptureError::InvalidLayout(_))));

        let far_color = AttributeLayout {
            color: Some(ColorAttribute { offset: usize::MAX, format: ColorFormat::Unorm8x4 }),
            ..AttributeLayout::position_color()
        };
        assert!(matches!(far_color.validate(), Err(CaptureError::InvalidLayout(_))));
        assert!(AttributeLayout::position_color().validate().is_ok());
    }
}
