//! Parser for legacy GL feedback buffers in `3D_COLOR` layout.
//!
//! The buffer is a flat `f32` stream of tokens. Vertices are seven floats
//! (window x, y, z and RGBA in `[0, 1]`), already in device space. Drawing state
//! that feedback mode cannot carry (point size, line width, stipple, blending) is
//! smuggled through `PASS_THROUGH` markers and applied to the primitives that follow.

use crate::error::CaptureError;
use crate::primitive::{Primitive, PrimitiveSink, Stipple};
use log::{debug, trace};
use vexport_types::{Color, Vec3, Vertex};

pub const PASS_THROUGH_TOKEN: u32 = 0x0700;
pub const POINT_TOKEN: u32 = 0x0701;
pub const LINE_TOKEN: u32 = 0x0702;
pub const POLYGON_TOKEN: u32 = 0x0703;
pub const BITMAP_TOKEN: u32 = 0x0704;
pub const DRAW_PIXEL_TOKEN: u32 = 0x0705;
pub const COPY_PIXEL_TOKEN: u32 = 0x0706;
pub const LINE_RESET_TOKEN: u32 = 0x0707;

const VERTEX_FLOATS: usize = 7;

/// Codes carried by `PASS_THROUGH` markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PassThrough {
    BeginOffset = 1,
    EndOffset = 2,
    BeginBoundary = 3,
    EndBoundary = 4,
    BeginStipple = 5,
    EndStipple = 6,
    PointSize = 7,
    LineWidth = 8,
    BeginBlend = 9,
    EndBlend = 10,
    SrcBlend = 11,
    DstBlend = 12,
    ImageMap = 13,
    DrawPixels = 14,
    Text = 15,
}

impl PassThrough {
    pub fn from_code(code: u32) -> Option<Self> {
        use PassThrough::*;
        Some(match code {
            1 => BeginOffset,
            2 => EndOffset,
            3 => BeginBoundary,
            4 => EndBoundary,
            5 => BeginStipple,
            6 => EndStipple,
            7 => PointSize,
            8 => LineWidth,
            9 => BeginBlend,
            10 => EndBlend,
            11 => SrcBlend,
            12 => DstBlend,
            13 => ImageMap,
            14 => DrawPixels,
            15 => Text,
            _ => return None,
        })
    }

    /// How many `PASS_THROUGH` values follow the marker.
    pub fn parameter_count(self) -> usize {
        match self {
            PassThrough::BeginOffset | PassThrough::BeginStipple => 2,
            PassThrough::PointSize | PassThrough::LineWidth | PassThrough::SrcBlend | PassThrough::DstBlend => 1,
            _ => 0,
        }
    }
}

/// Encodes a state marker the way a drawing layer would emit it into the feedback stream.
pub fn encode_pass_through(code: PassThrough, parameters: &[f32], out: &mut Vec<f32>) {
    out.push(PASS_THROUGH_TOKEN as f32);
    out.push(code as u32 as f32);
    for value in parameters {
        out.push(PASS_THROUGH_TOKEN as f32);
        out.push(*value);
    }
}

#[derive(Debug, Clone)]
struct DrawState {
    point_size: f64,
    line_width: f64,
    stipple: Option<Stipple>,
    blending: bool,
}

impl Default for DrawState {
    fn default() -> Self {
        Self { point_size: 1.0, line_width: 1.0, stipple: None, blending: false }
    }
}

struct Cursor<'a> {
    buffer: &'a [f32],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn next(&mut self) -> Result<f32, CaptureError> {
        let value = *self.buffer.get(self.offset).ok_or(CaptureError::Truncated { offset: self.offset })?;
        self.offset += 1;
        Ok(value)
    }

    fn take(&mut self, n: usize) -> Result<&'a [f32], CaptureError> {
        let end = self.offset + n;
        let slice = self.buffer.get(self.offset..end).ok_or(CaptureError::Truncated { offset: self.offset })?;
        self.offset = end;
        Ok(slice)
    }

    fn vertex(&mut self, opaque: bool) -> Result<Vertex, CaptureError> {
        let v = self.take(VERTEX_FLOATS)?;
        let alpha = if opaque { 1.0 } else { v[6] };
        Ok(Vertex::new(
            Vec3::new(v[0] as f64, v[1] as f64, v[2] as f64),
            Color::from_unit(v[3], v[4], v[5], alpha),
        ))
    }

    fn pass_through_value(&mut self) -> Result<f32, CaptureError> {
        let at = self.offset;
        let token = self.next()?;
        if token as u32 != PASS_THROUGH_TOKEN {
            return Err(CaptureError::UnknownToken { token, offset: at });
        }
        self.next()
    }

    fn is_done(&self) -> bool {
        self.offset >= self.buffer.len()
    }
}

/// Parses a feedback buffer into primitives, returning how many were emitted.
pub fn parse_feedback<S: PrimitiveSink + ?Sized>(buffer: &[f32], sink: &mut S) -> Result<usize, CaptureError> {
    let mut cursor = Cursor { buffer, offset: 0 };
    let mut state = DrawState::default();
    let mut emitted = 0;

    while !cursor.is_done() {
        let at = cursor.offset;
        let token = cursor.next()?;
        match token as u32 {
            POINT_TOKEN => {
                let vertex = cursor.vertex(false)?;
                sink.accept(Primitive::Point { vertex, size: state.point_size });
                emitted += 1;
            }
            LINE_TOKEN | LINE_RESET_TOKEN => {
                let a = cursor.vertex(false)?;
                let b = cursor.vertex(false)?;
                sink.accept(Primitive::Line { vertices: [a, b], width: state.line_width, stipple: state.stipple });
                emitted += 1;
            }
            POLYGON_TOKEN => {
                let count = cursor.next()? as usize;
                let vertices = (0..count)
                    .map(|_| cursor.vertex(!state.blending))
                    .collect::<Result<Vec<_>, _>>()?;
                match vertices.len() {
                    0..=2 => debug!("Skipping polygon with {} vertices at offset {}", count, at),
                    3 => {
                        sink.accept(Primitive::Triangle { vertices: [vertices[0], vertices[1], vertices[2]] });
                        emitted += 1;
                    }
                    _ => {
                        sink.accept(Primitive::PolygonFan { vertices });
                        emitted += 1;
                    }
                }
            }
            BITMAP_TOKEN | DRAW_PIXEL_TOKEN | COPY_PIXEL_TOKEN => {
                cursor.vertex(false)?;
                trace!("Ignoring raster token {:#06x} at offset {}", token as u32, at);
            }
            PASS_THROUGH_TOKEN => {
                let raw = cursor.next()?;
                let code = PassThrough::from_code(raw as u32).ok_or(CaptureError::UnknownToken { token: raw, offset: at + 1 })?;
                let mut params = [0.0f32; 2];
                for slot in params.iter_mut().take(code.parameter_count()) {
                    *slot = cursor.pass_through_value()?;
                }
                apply(&mut state, code, params);
            }
            _ => return Err(CaptureError::UnknownToken { token, offset: at }),
        }
    }
    Ok(emitted)
}

fn apply(state: &mut DrawState, code: PassThrough, params: [f32; 2]) {
    match code {
        PassThrough::PointSize => state.point_size = params[0] as f64,
        PassThrough::LineWidth => state.line_width = params[0] as f64,
        PassThrough::BeginStipple => {
            state.stipple = Some(Stipple { pattern: params[0] as u16, factor: params[1] as u16 })
        }
        PassThrough::EndStipple => state.stipple = None,
        PassThrough::BeginBlend => state.blending = true,
        PassThrough::EndBlend => state.blending = false,
        other => trace!("Pass-through {:?} carries no capture state", other),
    }
}
