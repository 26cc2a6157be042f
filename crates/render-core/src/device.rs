use crate::error::RenderError;
use chrono::{DateTime, Utc};
use crate::image::ImageData;
use crate::style::{Brush, MarkerShape, Pen, TextProperty};
use log::warn;
use crate::stipple::stipple_dash_array;
use vexport_capture::{Primitive, Stipple};
use vexport_path::Path;
use vexport_types::{Color, Matrix3, Point2, Rect, Size, TransformStack};

/// Metadata written into the document header.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentInfo {
    pub title: String,
    pub creator: String,
    /// Fixed creation time; the current time when unset.
    pub creation_date: Option<DateTime<Utc>>,
}

impl Default for DocumentInfo {
    fn default() -> Self {
        Self { title: "untitled".to_string(), creator: "vexport".to_string(), creation_date: None }
    }
}

impl DocumentInfo {
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.creation_date.unwrap_or_else(Utc::now)
    }
}

/// Graphics state owned by one device for one export.
#[derive(Debug, Clone)]
pub struct DeviceState {
    pub pen: Pen,
    pub brush: Brush,
    pub text: TextProperty,
    pub transform: TransformStack<Matrix3>,
    pub clip: Option<Rect>,
    pub canvas: Size,
    /// Stipple of the captured line being drawn; overrides the pen's line type.
    pub stipple: Option<Stipple>,
}

impl DeviceState {
    pub fn new(canvas: Size) -> Self {
        Self {
            pen: Pen::default(),
            brush: Brush::default(),
            text: TextProperty::default(),
            transform: TransformStack::new(),
            clip: None,
            canvas,
            stipple: None,
        }
    }

    /// Back to defaults; the canvas size is kept.
    pub fn reset(&mut self) {
        *self = Self::new(self.canvas);
    }

    pub fn matrix(&self) -> Matrix3 {
        self.transform.current()
    }

    /// Pen width in user space per axis, so that strokes keep their device width
    /// under the current transform.
    pub fn unscaled_pen_width(&self) -> (f64, f64) {
        let (sx, sy) = self.matrix().scale_factors();
        let w = self.pen.width;
        let div = |s: f64| if s.abs() > 1e-12 { w / s.abs() } else { w };
        (div(sx), div(sy))
    }

    /// Dash array for the active stipple in user space, or `None` when strokes
    /// follow the pen's line type.
    pub fn stipple_dash(&self) -> Option<Vec<f64>> {
        let dash = stipple_dash_array(self.stipple?);
        if dash.is_empty() {
            return None;
        }
        let (sx, sy) = self.matrix().scale_factors();
        let scale = (sx.abs() + sy.abs()) * 0.5;
        let scale = if scale > 1e-12 { scale } else { 1.0 };
        Some(dash.into_iter().map(|d| d / scale).collect())
    }
}

/// A vector output format.
///
/// Drawing calls take device-space points (y up, origin bottom-left) and read the
/// pen, brush and text property from [`DeviceState`]. Per-vertex `colors`, when
/// given, hold one entry per point.
pub trait VectorDevice {
    /// Short format name for logging.
    fn name(&self) -> &'static str;

    fn state(&self) -> &DeviceState;

    fn state_mut(&mut self) -> &mut DeviceState;

    /// Starts the document and resets the graphics state.
    fn begin(&mut self) -> Result<(), RenderError>;

    /// Closes the document and returns its bytes.
    fn finish(self: Box<Self>) -> Result<Vec<u8>, RenderError>;

    fn set_pen(&mut self, pen: Pen) {
        self.state_mut().pen = pen;
    }

    fn set_brush(&mut self, brush: Brush) {
        self.state_mut().brush = brush;
    }

    fn set_text_property(&mut self, text: TextProperty) {
        self.state_mut().text = text;
    }

    /// Connected polyline through `points`.
    fn draw_poly(&mut self, points: &[Point2], colors: Option<&[Color]>) -> Result<(), RenderError>;

    /// Independent segments between consecutive pairs of `points`.
    fn draw_lines(&mut self, points: &[Point2], colors: Option<&[Color]>) -> Result<(), RenderError>;

    /// Squares of the pen width centered on each point.
    fn draw_points(&mut self, points: &[Point2], colors: Option<&[Color]>) -> Result<(), RenderError>;

    fn draw_markers(
        &mut self,
        shape: MarkerShape,
        highlight: bool,
        points: &[Point2],
        colors: Option<&[Color]>,
    ) -> Result<(), RenderError>;

    /// Filled polygon. Distinct per-vertex colors are interpolated across a fan
    /// rooted at the first point.
    fn draw_polygon(&mut self, points: &[Point2], colors: Option<&[Color]>) -> Result<(), RenderError>;

    /// Independent quads, four points each.
    fn draw_quads(&mut self, points: &[Point2], colors: Option<&[Color]>) -> Result<(), RenderError> {
        for (i, quad) in points.chunks_exact(4).enumerate() {
            let quad_colors = colors.and_then(|c| c.get(i * 4..i * 4 + 4));
            self.draw_polygon(quad, quad_colors)?;
        }
        Ok(())
    }

    /// Quad strip: points `2i, 2i+1` lie on opposite sides of the strip.
    fn draw_quad_strip(&mut self, points: &[Point2], colors: Option<&[Color]>) -> Result<(), RenderError> {
        if points.len() < 4 || points.len() % 2 != 0 {
            warn!("Ignoring quad strip with {} points", points.len());
            return Ok(());
        }
        for i in (0..points.len() - 2).step_by(2) {
            let quad = [points[i], points[i + 1], points[i + 3], points[i + 2]];
            let quad_colors = colors.and_then(|c| {
                (c.len() >= i + 4).then(|| [c[i], c[i + 1], c[i + 3], c[i + 2]])
            });
            self.draw_polygon(&quad, quad_colors.as_ref().map(|c| c.as_slice()))?;
        }
        Ok(())
    }

    fn draw_ellipse_wedge(
        &mut self,
        center: Point2,
        outer: (f64, f64),
        inner: (f64, f64),
        start: f64,
        stop: f64,
    ) -> Result<(), RenderError>;

    fn draw_elliptic_arc(&mut self, center: Point2, rx: f64, ry: f64, start: f64, stop: f64)
    -> Result<(), RenderError>;

    fn draw_string(&mut self, at: Point2, text: &str) -> Result<(), RenderError>;

    /// Fills `path`, translated by `origin`, with the brush.
    fn draw_path(&mut self, path: &Path, origin: Point2) -> Result<(), RenderError>;

    /// Draws `image` stretched over `rect`.
    fn draw_image(&mut self, rect: Rect, image: &ImageData) -> Result<(), RenderError>;

    /// Draws one captured primitive using its own colors and sizes.
    fn draw_primitive(&mut self, primitive: &Primitive) -> Result<(), RenderError> {
        let saved = self.state().pen;
        let result = match primitive {
            Primitive::Point { vertex, size } => {
                self.state_mut().pen.width = *size;
                self.draw_points(&[vertex.position.xy()], Some(&[vertex.color]))
            }
            Primitive::Line { vertices: [a, b], width, stipple } => {
                let state = self.state_mut();
                state.pen.width = *width;
                state.stipple = *stipple;
                let points = [a.position.xy(), b.position.xy()];
                // A dash cannot follow a color gradient, so stippled lines take the mean color.
                let result = if state.stipple_dash().is_some() {
                    state.pen.color = Color::average(a.color, b.color);
                    self.draw_poly(&points, None)
                } else {
                    self.draw_poly(&points, Some(&[a.color, b.color]))
                };
                self.state_mut().stipple = None;
                result
            }
            Primitive::Triangle { .. } | Primitive::PolygonFan { .. } => {
                let vertices = primitive.vertices();
                let points: Vec<Point2> = vertices.iter().map(|v| v.position.xy()).collect();
                let colors: Vec<Color> = vertices.iter().map(|v| v.color).collect();
                self.draw_polygon(&points, Some(&colors))
            }
        };
        self.state_mut().pen = saved;
        result
    }

    /// Fills the whole canvas with `color`.
    fn fill_background(&mut self, color: Color) -> Result<(), RenderError> {
        let canvas = self.state().canvas;
        let saved = std::mem::replace(&mut self.state_mut().brush, Brush::solid(color));
        let result = self.draw_polygon(&Rect::new(0.0, 0.0, canvas.width, canvas.height).corners(), None);
        self.state_mut().brush = saved;
        result
    }

    /// Called after every change to the current matrix.
    fn apply_transform(&mut self) -> Result<(), RenderError>;

    fn push_matrix(&mut self) -> Result<(), RenderError> {
        self.state_mut().transform.push();
        Ok(())
    }

    fn pop_matrix(&mut self) -> Result<(), RenderError> {
        if !self.state_mut().transform.pop() {
            warn!("{}: matrix stack underflow ignored", self.name());
            return Ok(());
        }
        self.apply_transform()
    }

    fn set_matrix(&mut self, m: Matrix3) -> Result<(), RenderError> {
        self.state_mut().transform.set(m);
        self.apply_transform()
    }

    fn multiply_matrix(&mut self, m: Matrix3) -> Result<(), RenderError> {
        self.state_mut().transform.multiply(m);
        self.apply_transform()
    }

    /// Restricts drawing to `clip` (device space), or lifts the restriction.
    fn set_clip(&mut self, clip: Option<Rect>) -> Result<(), RenderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use vexport_types::Vertex;

    /// Records the calls the provided trait methods forward to.
    struct Recorder {
        state: DeviceState,
        calls: Vec<String>,
    }

    impl Recorder {
        fn new() -> Self {
            Self { state: DeviceState::new(Size::new(100.0, 50.0)), calls: Vec::new() }
        }
    }

    impl VectorDevice for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }
        fn state(&self) -> &DeviceState {
            &self.state
        }
        fn state_mut(&mut self) -> &mut DeviceState {
            &mut self.state
        }
        fn begin(&mut self) -> Result<(), RenderError> {
            self.state.reset();
            Ok(())
        }
        fn finish(self: Box<Self>) -> Result<Vec<u8>, RenderError> {
            Ok(self.calls.join("\n").into_bytes())
        }
        fn draw_poly(&mut self, p: &[Point2], _: Option<&[Color]>) -> Result<(), RenderError> {
            self.calls.push(format!("poly {} w={}", p.len(), self.state.pen.width));
            Ok(())
        }
        fn draw_lines(&mut self, p: &[Point2], _: Option<&[Color]>) -> Result<(), RenderError> {
            self.calls.push(format!("lines {}", p.len()));
            Ok(())
        }
        fn draw_points(&mut self, p: &[Point2], _: Option<&[Color]>) -> Result<(), RenderError> {
            self.calls.push(format!("points {} w={}", p.len(), self.state.pen.width));
            Ok(())
        }
        fn draw_markers(&mut self, _: MarkerShape, _: bool, _: &[Point2], _: Option<&[Color]>) -> Result<(), RenderError> {
            Ok(())
        }
        fn draw_polygon(&mut self, p: &[Point2], c: Option<&[Color]>) -> Result<(), RenderError> {
            self.calls.push(format!("polygon {} colors={}", p.len(), c.map_or(0, |c| c.len())));
            Ok(())
        }
        fn draw_ellipse_wedge(&mut self, _: Point2, _: (f64, f64), _: (f64, f64), _: f64, _: f64) -> Result<(), RenderError> {
            Ok(())
        }
        fn draw_elliptic_arc(&mut self, _: Point2, _: f64, _: f64, _: f64, _: f64) -> Result<(), RenderError> {
            Ok(())
        }
        fn draw_string(&mut self, _: Point2, _: &str) -> Result<(), RenderError> {
            Ok(())
        }
        fn draw_path(&mut self, _: &Path, _: Point2) -> Result<(), RenderError> {
            Ok(())
        }
        fn draw_image(&mut self, _: Rect, _: &ImageData) -> Result<(), RenderError> {
            Ok(())
        }
        fn apply_transform(&mut self) -> Result<(), RenderError> {
            self.calls.push(format!("transform {:?}", self.state.matrix().to_affine()));
            Ok(())
        }
        fn set_clip(&mut self, clip: Option<Rect>) -> Result<(), RenderError> {
            self.state.clip = clip;
            Ok(())
        }
    }

    #[test]
    fn test_primitive_dispatch_restores_pen() {
        let mut device = Recorder::new();
        let red = Color::rgb(255, 0, 0);
        device.draw_primitive(&Primitive::Point { vertex: Vertex::at(1.0, 1.0, 0.0, red), size: 5.0 }).unwrap();
        device
            .draw_primitive(&Primitive::Line {
                vertices: [Vertex::at(0.0, 0.0, 0.0, red), Vertex::at(1.0, 0.0, 0.0, red)],
                width: 3.0,
                stipple: None,
            })
            .unwrap();
        device
            .draw_primitive(&Primitive::PolygonFan { vertices: vec![Vertex::at(0.0, 0.0, 0.0, red); 5] })
            .unwrap();
        assert_eq!(device.calls, vec!["points 1 w=5", "poly 2 w=3", "polygon 5 colors=5"]);
        assert_eq!(device.state.pen.width, 1.0);
    }

    #[test]
    fn test_quad_strip_and_quads() {
        let mut device = Recorder::new();
        let pts: Vec<Point2> = (0..6).map(|i| Point2::new(i as f64, (i % 2) as f64)).collect();
        device.draw_quad_strip(&pts, None).unwrap();
        device.draw_quad_strip(&pts[..3], None).unwrap();
        device.draw_quads(&pts[..4], Some(&[Color::BLACK; 4])).unwrap();
        assert_eq!(device.calls, vec!["polygon 4 colors=0", "polygon 4 colors=0", "polygon 4 colors=4"]);
    }

    #[test]
    fn test_matrix_stack_calls_apply_hook() {
        let mut device = Recorder::new();
        device.push_matrix().unwrap();
        device.multiply_matrix(Matrix3::translation(2.0, 3.0)).unwrap();
        device.pop_matrix().unwrap();
        device.pop_matrix().unwrap();
        assert_eq!(device.calls.len(), 2);
        assert_eq!(device.state.matrix(), Matrix3::IDENTITY);
    }

    #[test]
    fn test_unscaled_pen_width() {
        let mut state = DeviceState::new(Size::new(10.0, 10.0));
        state.pen.width = 4.0;
        state.transform.set(Matrix3::scale(2.0, -4.0));
        assert_eq!(state.unscaled_pen_width(), (2.0, 1.0));
        state.reset();
        assert_eq!(state.pen.width, 1.0);
        assert_eq!(state.canvas, Size::new(10.0, 10.0));
    }

    #[test]
    fn test_stipple_dash_follows_transform() {
        let mut state = DeviceState::new(Size::new(10.0, 10.0));
        assert_eq!(state.stipple_dash(), None);
        state.stipple = Some(Stipple { pattern: 0xFFFF, factor: 0 });
        assert_eq!(state.stipple_dash(), None);
        state.stipple = Some(Stipple { pattern: 0x00FF, factor: 1 });
        state.transform.set(Matrix3::scale(2.0, 2.0));
        assert_eq!(state.stipple_dash(), Some(vec![4.0, 4.0]));
    }

    #[test]
    fn test_stippled_line_uses_mean_color() {
        let mut device = Recorder::new();
        device
            .draw_primitive(&Primitive::Line {
                vertices: [Vertex::at(0.0, 0.0, 0.0, Color::rgb(200, 0, 0)), Vertex::at(1.0, 0.0, 0.0, Color::rgb(0, 0, 100))],
                width: 2.0,
                stipple: Some(Stipple { pattern: 0x0F0F, factor: 1 }),
            })
            .unwrap();
        assert_eq!(device.calls, vec!["poly 2 w=2"]);
        assert_eq!(device.state.stipple, None);
        assert_eq!(device.state.pen.color, Color::BLACK);
    }
}
