//! PDF emitter.
//!
//! Unlike the PostScript device, points are written in user space and the
//! current matrix travels in the content stream: every change emits one `cm`
//! with the delta from the matrix already in effect. Each draw call is wrapped
//! in `q … Q` so colors, widths and opacity never leak between calls.

use crate::shading::ShadingMesh;
use crate::writer::StreamingPdfWriter;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Object, ObjectId, StringFormat, dictionary};
use log::{debug, warn};
use std::collections::{BTreeMap, HashMap};
use vexport_path::{Path, Segment, normalized_segments};
use vexport_render_core::geometry::{FillRule, arc_outline, marker_outline, thick_segment, wedge_outline};
use vexport_render_core::{
    DeviceState, DocumentInfo, ImageData, MarkerShape, RenderError, TextLayout, TextureMode, VectorDevice,
};
use vexport_traits::{MonospaceTextBackend, TextBackend};
use vexport_types::{Color, Matrix3, Point2, Rect, Size, Vec3};

const PDF_VERSION: &str = "1.7";
const MATRIX_TOLERANCE: f64 = 1e-9;
const MAX_TEXTURE_TILES: usize = 4096;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PdfOptions {
    /// Flate-compresses content, image and shading streams.
    pub compress: bool,
    /// Draws strings as filled glyph outlines instead of base-14 text.
    pub text_as_paths: bool,
    pub info: DocumentInfo,
}

/// An open clip group: the `q` that started it and the matrix in effect then.
#[derive(Debug, Clone, Copy)]
struct ClipGroup {
    saved: Matrix3,
}

pub struct PdfDevice {
    state: DeviceState,
    options: PdfOptions,
    text_backend: Box<dyn TextBackend>,
    writer: Option<StreamingPdfWriter<Vec<u8>>>,
    ops: Vec<Operation>,
    /// Matrix the content stream has concatenated so far.
    applied: Matrix3,
    clip: Option<ClipGroup>,
    ext_gstates: BTreeMap<u8, ObjectId>,
    shadings: Vec<ObjectId>,
    images: HashMap<(ImageData, bool), (String, ObjectId)>,
    fonts: BTreeMap<&'static str, String>,
}

fn num(v: f64) -> Object {
    if v.is_finite() { Object::Real(v as f32) } else { Object::Real(0.0) }
}

fn name(s: &str) -> Object {
    Object::Name(s.as_bytes().to_vec())
}

fn unit(channel: u8) -> Object {
    num(channel as f64 / 255.0)
}

fn affine(m: &Matrix3) -> Vec<Object> {
    m.to_affine().into_iter().map(num).collect()
}

fn color_at(colors: Option<&[Color]>, i: usize, fallback: Color) -> Color {
    colors.and_then(|c| c.get(i)).copied().unwrap_or(fallback)
}

/// The shared color when every entry matches, `None` when they differ.
fn uniform_color(colors: &[Color]) -> Option<Color> {
    let first = *colors.first()?;
    colors.iter().all(|c| *c == first).then_some(first)
}

/// Latin-1 bytes for a base-14 font; anything wider becomes `?`.
fn latin1(text: &str) -> Vec<u8> {
    text.chars().map(|ch| if (ch as u32) < 256 { ch as u8 } else { b'?' }).collect()
}

impl PdfDevice {
    pub fn new(canvas: Size, options: PdfOptions) -> Self {
        Self {
            state: DeviceState::new(canvas),
            options,
            text_backend: Box::new(MonospaceTextBackend::default()),
            writer: None,
            ops: Vec::new(),
            applied: Matrix3::IDENTITY,
            clip: None,
            ext_gstates: BTreeMap::new(),
            shadings: Vec::new(),
            images: HashMap::new(),
            fonts: BTreeMap::new(),
        }
    }

    pub fn with_text_backend(mut self, backend: Box<dyn TextBackend>) -> Self {
        self.text_backend = backend;
        self
    }

    fn op(&mut self, operator: &str, operands: Vec<Object>) {
        self.ops.push(Operation::new(operator, operands));
    }

    fn writer(&mut self) -> Result<&mut StreamingPdfWriter<Vec<u8>>, RenderError> {
        self.writer.as_mut().ok_or_else(|| RenderError::Pdf("device used before begin()".into()))
    }

    /// Brings the stream's matrix up to the current one with a single `cm`.
    fn sync_matrix(&mut self) -> Result<(), RenderError> {
        let target = self.state.matrix();
        if target.approx_eq(&self.applied, MATRIX_TOLERANCE) {
            return Ok(());
        }
        let inverse = self
            .applied
            .inverse()
            .ok_or_else(|| RenderError::Pdf("current matrix is singular".into()))?;
        let delta = inverse * target;
        if !delta.is_identity(MATRIX_TOLERANCE) {
            self.op("cm", affine(&delta));
        }
        self.applied = target;
        Ok(())
    }

    fn close_clip(&mut self) -> Result<(), RenderError> {
        if let Some(group) = self.clip.take() {
            self.op("Q", vec![]);
            self.applied = group.saved;
            self.sync_matrix()?;
        }
        Ok(())
    }

    fn begin_paint(&mut self, alpha: u8) -> Result<(), RenderError> {
        self.op("q", vec![]);
        if alpha < 255 {
            let gs = self.ext_gstate(alpha)?;
            self.op("gs", vec![name(&gs)]);
        }
        Ok(())
    }

    fn end_paint(&mut self) {
        self.op("Q", vec![]);
    }

    /// Graphics state object for a constant alpha, shared by every use.
    fn ext_gstate(&mut self, alpha: u8) -> Result<String, RenderError> {
        if !self.ext_gstates.contains_key(&alpha) {
            let a = alpha as f64 / 255.0;
            let dict = dictionary! { "Type" => "ExtGState", "CA" => num(a), "ca" => num(a) };
            let id = self.writer()?.write_object(Object::Dictionary(dict))?;
            self.ext_gstates.insert(alpha, id);
        }
        Ok(format!("GS{}", alpha))
    }

    fn fill_color(&mut self, c: Color) {
        self.op("rg", vec![unit(c.r), unit(c.g), unit(c.b)]);
    }

    fn stroke_color(&mut self, c: Color) {
        self.op("RG", vec![unit(c.r), unit(c.g), unit(c.b)]);
    }

    /// Width in user space; strokes keep the pen's device width.
    fn user_width(&self) -> f64 {
        let (wx, wy) = self.state.unscaled_pen_width();
        (wx + wy) * 0.5
    }

    fn pen_setup(&mut self) {
        let width = self.user_width();
        self.op("w", vec![num(width)]);
        let dash: Vec<Object> = match self.state.stipple_dash() {
            Some(dash) => dash.into_iter().map(num).collect(),
            None => self.state.pen.line_type.dash_pattern().iter().map(|d| num(d * width)).collect(),
        };
        if !dash.is_empty() {
            self.op("d", vec![Object::Array(dash), Object::Integer(0)]);
        }
    }

    fn polygon_ops(&mut self, points: &[Point2], close: bool) {
        for (i, p) in points.iter().enumerate() {
            self.op(if i == 0 { "m" } else { "l" }, vec![num(p.x), num(p.y)]);
        }
        if close {
            self.op("h", vec![]);
        }
    }

    fn path_ops(&mut self, path: &Path, origin: Point2) -> Result<(), RenderError> {
        let at = |p: Vec3| [num(p.x + origin.x), num(p.y + origin.y)];
        for segment in normalized_segments(path)? {
            let operation = match segment {
                Segment::MoveTo(p) => Operation::new("m", at(p).to_vec()),
                Segment::LineTo(p) => Operation::new("l", at(p).to_vec()),
                Segment::Cubic { ctrl1, ctrl2, end } => {
                    Operation::new("c", [at(ctrl1), at(ctrl2), at(end)].concat())
                }
                Segment::Conic { .. } => return Err(RenderError::Pdf("conic left after normalization".into())),
            };
            self.ops.push(operation);
        }
        Ok(())
    }

    fn fill_op(rule: FillRule) -> &'static str {
        match rule {
            FillRule::NonZero => "f",
            FillRule::EvenOdd => "f*",
        }
    }

    fn paint_shading(&mut self, mesh: ShadingMesh) -> Result<(), RenderError> {
        let alpha = mesh.average_alpha();
        let Some((dict, data)) = mesh.encode() else {
            return Ok(());
        };
        if alpha == 0 {
            return Ok(());
        }
        let id = self.writer()?.write_stream(dict, data)?;
        let sh = format!("Sh{}", self.shadings.len());
        self.shadings.push(id);
        self.begin_paint(alpha)?;
        self.op("sh", vec![name(&sh)]);
        self.end_paint();
        Ok(())
    }

    /// Strokes `pairs` of point indices, as one path for a shared color or as
    /// thickened quads in a shading mesh when the end colors differ.
    fn stroke_pairs(&mut self, points: &[Point2], colors: Option<&[Color]>, pairs: &[(usize, usize)], joined: bool) -> Result<(), RenderError> {
        let pen = self.state.pen;
        if !pen.is_visible() || pairs.is_empty() {
            return Ok(());
        }
        let uniform = match colors {
            None => Some(pen.color),
            Some(c) => uniform_color(c),
        };

        let Some(color) = uniform else {
            let radius = self.user_width() * 0.5;
            let mut mesh = ShadingMesh::new();
            for &(i, j) in pairs {
                let (c1, c2) = (color_at(colors, i, pen.color), color_at(colors, j, pen.color));
                if let Some([a, b, c, d]) = thick_segment(points[i], points[j], radius) {
                    mesh.push_quad([(a, c1), (b, c1), (c, c2), (d, c2)]);
                }
            }
            return self.paint_shading(mesh);
        };

        if color.is_transparent() {
            return Ok(());
        }
        self.begin_paint(color.a)?;
        self.stroke_color(color);
        self.pen_setup();
        let mut last = None;
        for &(i, j) in pairs {
            if !(joined && last == Some(i)) {
                self.op("m", vec![num(points[i].x), num(points[i].y)]);
            }
            self.op("l", vec![num(points[j].x), num(points[j].y)]);
            last = Some(j);
        }
        self.op("S", vec![]);
        self.end_paint();
        Ok(())
    }

    /// Buffers an image XObject, reusing one already written for the same pixels.
    fn image_xobject(&mut self, image: &ImageData, smooth: bool) -> Result<String, RenderError> {
        let rgb = image.composite_onto(self.state.brush.color);
        let key = (rgb, smooth);
        if let Some((resource, _)) = self.images.get(&key) {
            return Ok(resource.clone());
        }
        let (rgb, _) = &key;
        let dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => rgb.width as i64,
            "Height" => rgb.height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Interpolate" => smooth,
        };
        let pixels = rgb.pixels.clone();
        let id = self.writer()?.write_stream(dict, pixels)?;
        let resource = format!("Im{}", self.images.len());
        self.images.insert(key, (resource.clone(), id));
        Ok(resource)
    }

    fn paint_image(&mut self, resource: &str, rect: Rect) {
        self.op("q", vec![]);
        self.op("cm", vec![num(rect.width), num(0.0), num(0.0), num(rect.height), num(rect.x), num(rect.y)]);
        self.op("Do", vec![name(resource)]);
        self.op("Q", vec![]);
    }

    /// Clips to the polygon and lays the brush texture over its bounds.
    fn fill_textured(&mut self, points: &[Point2], texture: &ImageData) -> Result<(), RenderError> {
        if let Err(err) = texture.validate() {
            warn!("{}: skipping textured fill: {}", self.name(), err);
            return Ok(());
        }
        let Some(bounds) = Rect::bounding(points.iter().copied()) else {
            return Ok(());
        };
        if texture.is_empty() || bounds.is_empty() {
            return Ok(());
        }
        let properties = self.state.brush.texture_properties;
        let resource = self.image_xobject(texture, properties.smooth)?;

        self.op("q", vec![]);
        self.polygon_ops(points, true);
        self.op("W", vec![]);
        self.op("n", vec![]);
        match properties.mode {
            TextureMode::Stretch => self.paint_image(&resource, bounds),
            TextureMode::Repeat => {
                let (tw, th) = (texture.width as f64, texture.height as f64);
                let columns = (bounds.width / tw).ceil() as usize;
                let rows = (bounds.height / th).ceil() as usize;
                if columns.saturating_mul(rows) > MAX_TEXTURE_TILES {
                    warn!("{}: texture needs {}x{} tiles, stretching instead", self.name(), columns, rows);
                    self.paint_image(&resource, bounds);
                } else {
                    for row in 0..rows {
                        for column in 0..columns {
                            let tile = Rect::new(bounds.x + column as f64 * tw, bounds.y + row as f64 * th, tw, th);
                            self.paint_image(&resource, tile);
                        }
                    }
                }
            }
        }
        self.op("Q", vec![]);
        Ok(())
    }

    fn font_resource(&mut self, base_font: &'static str) -> String {
        let next = format!("F{}", self.fonts.len());
        self.fonts.entry(base_font).or_insert(next).clone()
    }

    fn draw_text_native(&mut self, at: Point2, text: &str) -> Result<(), RenderError> {
        let prop = self.state.text;
        let (_, sy) = self.state.matrix().scale_factors();
        let font_size = if sy.abs() > 1e-12 { prop.size / sy.abs() } else { prop.size };
        let layout = TextLayout::new(text, &prop, font_size, self.text_backend.as_ref())?;
        if layout.lines.is_empty() {
            return Ok(());
        }
        let font = self.font_resource(prop.base14_font_name());
        let start = layout.start_point(at);
        let (cos, sin) = layout.rotation();

        self.begin_paint(prop.color.a)?;
        self.fill_color(prop.color);
        self.op("BT", vec![]);
        self.op("Tf", vec![name(&font), num(font_size)]);
        self.op("Tm", vec![num(cos), num(sin), num(-sin), num(cos), num(start.x), num(start.y)]);
        let mut previous = 0.0;
        for (i, (line, offset)) in layout.lines.iter().zip(layout.line_offsets()).enumerate() {
            let dy = if i == 0 { 0.0 } else { -layout.leading };
            if i > 0 || offset != 0.0 {
                self.op("Td", vec![num(offset - previous), num(dy)]);
            }
            previous = offset;
            self.op("Tj", vec![Object::String(latin1(&line.text), StringFormat::Literal)]);
        }
        self.op("ET", vec![]);
        self.end_paint();
        Ok(())
    }

    fn draw_text_outline(&mut self, at: Point2, text: &str) -> Result<(), RenderError> {
        let prop = self.state.text;
        let layout = match TextLayout::new(text, &prop, prop.size, self.text_backend.as_ref()) {
            Ok(layout) => layout,
            Err(err) => {
                warn!("Skipping text {:?}: {}", text, err);
                return Ok(());
            }
        };
        let query = prop.font_query();
        let mut glyphs = Vec::with_capacity(layout.lines.len());
        for line in &layout.lines {
            match self.text_backend.string_to_path(&line.text, &query) {
                Ok(path) => glyphs.push(path),
                Err(err) => {
                    warn!("Skipping text {:?}: {}", text, err);
                    return Ok(());
                }
            }
        }

        let start = layout.start_point(at);
        let (cos, sin) = layout.rotation();
        self.begin_paint(prop.color.a)?;
        self.op("cm", vec![num(cos), num(sin), num(-sin), num(cos), num(start.x), num(start.y)]);
        self.fill_color(prop.color);
        for (i, (path, offset)) in glyphs.iter().zip(layout.line_offsets()).enumerate() {
            self.path_ops(path, Point2::new(offset, -layout.leading * i as f64))?;
        }
        self.op("f", vec![]);
        self.end_paint();
        Ok(())
    }

    fn resources(&self) -> Dictionary {
        let mut resources = Dictionary::new();
        if !self.fonts.is_empty() {
            let mut fonts = Dictionary::new();
            for (base_font, resource) in &self.fonts {
                let font = dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => *base_font,
                    "Encoding" => "WinAnsiEncoding",
                };
                fonts.set(resource.as_bytes().to_vec(), font);
            }
            resources.set("Font", fonts);
        }
        if !self.ext_gstates.is_empty() {
            let mut states = Dictionary::new();
            for (alpha, id) in &self.ext_gstates {
                states.set(format!("GS{}", alpha).into_bytes(), Object::Reference(*id));
            }
            resources.set("ExtGState", states);
        }
        if !self.shadings.is_empty() {
            let mut shadings = Dictionary::new();
            for (i, id) in self.shadings.iter().enumerate() {
                shadings.set(format!("Sh{}", i).into_bytes(), Object::Reference(*id));
            }
            resources.set("Shading", shadings);
        }
        if !self.images.is_empty() {
            let mut xobjects = Dictionary::new();
            for (resource, id) in self.images.values() {
                xobjects.set(resource.as_bytes().to_vec(), Object::Reference(*id));
            }
            resources.set("XObject", xobjects);
        }
        resources
    }

    fn info_dictionary(&self) -> Dictionary {
        let info = &self.options.info;
        let date = info.timestamp().format("D:%Y%m%d%H%M%SZ").to_string();
        dictionary! {
            "Title" => Object::string_literal(info.title.as_str()),
            "Creator" => Object::string_literal(info.creator.as_str()),
            "Producer" => Object::string_literal("vexport"),
            "CreationDate" => Object::string_literal(date),
        }
    }
}

impl VectorDevice for PdfDevice {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn state(&self) -> &DeviceState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut DeviceState {
        &mut self.state
    }

    fn begin(&mut self) -> Result<(), RenderError> {
        self.state.reset();
        self.writer = Some(StreamingPdfWriter::new(Vec::new(), PDF_VERSION, self.options.compress)?);
        self.ops.clear();
        self.applied = Matrix3::IDENTITY;
        self.clip = None;
        self.ext_gstates.clear();
        self.shadings.clear();
        self.images.clear();
        self.fonts.clear();
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<Vec<u8>, RenderError> {
        if let Some(group) = self.clip.take() {
            self.op("Q", vec![]);
            self.applied = group.saved;
        }
        let resources = self.resources();
        let info = self.info_dictionary();
        let canvas = self.state.canvas;
        let operations = std::mem::take(&mut self.ops);
        debug!(
            "pdf: {} operations, {} shadings, {} images, {} fonts",
            operations.len(),
            self.shadings.len(),
            self.images.len(),
            self.fonts.len()
        );

        let mut writer = self.writer.take().ok_or(RenderError::Finished)?;
        let content_id = writer.write_content(Content { operations })?;
        let pages_id = writer.pages_id();
        let page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), num(canvas.width), num(canvas.height)],
            "Resources" => resources,
            "Contents" => content_id,
        };
        let page_id = writer.write_object(Object::Dictionary(page))?;
        Ok(writer.finish(&[page_id], Some(info))?)
    }

    fn draw_poly(&mut self, points: &[Point2], colors: Option<&[Color]>) -> Result<(), RenderError> {
        let pairs: Vec<(usize, usize)> = (1..points.len()).map(|i| (i - 1, i)).collect();
        self.stroke_pairs(points, colors, &pairs, true)
    }

    fn draw_lines(&mut self, points: &[Point2], colors: Option<&[Color]>) -> Result<(), RenderError> {
        let pairs: Vec<(usize, usize)> = (0..points.len() / 2).map(|i| (2 * i, 2 * i + 1)).collect();
        self.stroke_pairs(points, colors, &pairs, false)
    }

    fn draw_points(&mut self, points: &[Point2], colors: Option<&[Color]>) -> Result<(), RenderError> {
        let (wx, wy) = self.state.unscaled_pen_width();
        let pen = self.state.pen.color;
        for (i, p) in points.iter().enumerate() {
            let color = color_at(colors, i, pen);
            if color.is_transparent() {
                continue;
            }
            self.begin_paint(color.a)?;
            self.fill_color(color);
            self.op("re", vec![num(p.x - wx * 0.5), num(p.y - wy * 0.5), num(wx), num(wy)]);
            self.op("f", vec![]);
            self.end_paint();
        }
        Ok(())
    }

    fn draw_markers(
        &mut self,
        shape: MarkerShape,
        highlight: bool,
        points: &[Point2],
        colors: Option<&[Color]>,
    ) -> Result<(), RenderError> {
        let size = self.user_width();
        let (sx, _) = self.state.matrix().scale_factors();
        let stroke_width = (if highlight { 1.5 } else { 0.5 }) / sx.abs().max(1e-12);
        let pen = self.state.pen.color;
        for (i, p) in points.iter().enumerate() {
            let color = color_at(colors, i, pen);
            if color.is_transparent() {
                continue;
            }
            let outline = marker_outline(shape, *p, size);
            self.begin_paint(color.a)?;
            if shape.is_stroked() {
                self.stroke_color(color);
                self.op("w", vec![num(stroke_width)]);
                self.path_ops(&outline, Point2::default())?;
                self.op("S", vec![]);
            } else {
                self.fill_color(color);
                self.path_ops(&outline, Point2::default())?;
                self.op("h", vec![]);
                self.op("f", vec![]);
            }
            self.end_paint();
        }
        Ok(())
    }

    fn draw_polygon(&mut self, points: &[Point2], colors: Option<&[Color]>) -> Result<(), RenderError> {
        if points.len() < 3 {
            return Ok(());
        }
        let brush = self.state.brush.clone();
        let uniform = match colors {
            None => Some(brush.color),
            Some(c) => uniform_color(c),
        };
        let Some(color) = uniform else {
            let mut mesh = ShadingMesh::new();
            let c = |i: usize| color_at(colors, i, brush.color);
            for i in 1..points.len() - 1 {
                mesh.push_triangle([(points[0], c(0)), (points[i], c(i)), (points[i + 1], c(i + 1))]);
            }
            return self.paint_shading(mesh);
        };

        if let Some(texture) = brush.texture.as_deref() {
            return self.fill_textured(points, texture);
        }
        if color.is_transparent() {
            return Ok(());
        }
        self.begin_paint(color.a)?;
        self.fill_color(color);
        self.polygon_ops(points, true);
        self.op("f", vec![]);
        self.end_paint();
        Ok(())
    }

    fn draw_ellipse_wedge(
        &mut self,
        center: Point2,
        outer: (f64, f64),
        inner: (f64, f64),
        start: f64,
        stop: f64,
    ) -> Result<(), RenderError> {
        let color = self.state.brush.color;
        if color.is_transparent() {
            return Ok(());
        }
        let outline = wedge_outline(center, outer, inner, start, stop);
        self.begin_paint(color.a)?;
        self.fill_color(color);
        self.path_ops(&outline.path, Point2::default())?;
        self.op("h", vec![]);
        self.op(Self::fill_op(outline.fill_rule), vec![]);
        self.end_paint();
        Ok(())
    }

    fn draw_elliptic_arc(&mut self, center: Point2, rx: f64, ry: f64, start: f64, stop: f64) -> Result<(), RenderError> {
        let outline = arc_outline(center, rx, ry, start, stop);
        let fill = self.state.brush.color;
        if !fill.is_transparent() {
            self.begin_paint(fill.a)?;
            self.fill_color(fill);
            self.path_ops(&outline, Point2::default())?;
            self.op("f", vec![]);
            self.end_paint();
        }
        let pen = self.state.pen;
        if pen.is_visible() {
            self.begin_paint(pen.color.a)?;
            self.stroke_color(pen.color);
            self.pen_setup();
            self.path_ops(&outline, Point2::default())?;
            self.op("S", vec![]);
            self.end_paint();
        }
        Ok(())
    }

    fn draw_string(&mut self, at: Point2, text: &str) -> Result<(), RenderError> {
        if text.trim().is_empty() || self.state.text.color.is_transparent() {
            return Ok(());
        }
        if self.options.text_as_paths {
            self.draw_text_outline(at, text)
        } else {
            self.draw_text_native(at, text)
        }
    }

    fn draw_path(&mut self, path: &Path, origin: Point2) -> Result<(), RenderError> {
        let color = self.state.brush.color;
        if color.is_transparent() || path.is_empty() {
            return Ok(());
        }
        self.begin_paint(color.a)?;
        self.fill_color(color);
        self.path_ops(path, origin)?;
        self.op("h", vec![]);
        self.op("f", vec![]);
        self.end_paint();
        Ok(())
    }

    fn draw_image(&mut self, rect: Rect, image: &ImageData) -> Result<(), RenderError> {
        if let Err(err) = image.validate() {
            warn!("{}: skipping image: {}", self.name(), err);
            return Ok(());
        }
        if image.is_empty() || rect.is_empty() {
            return Ok(());
        }
        let resource = self.image_xobject(image, false)?;
        self.paint_image(&resource, rect);
        Ok(())
    }

    fn apply_transform(&mut self) -> Result<(), RenderError> {
        self.sync_matrix()
    }

    /// Clips in device space: the group undoes the current matrix around the
    /// `re W n` and then restores it.
    fn set_clip(&mut self, clip: Option<Rect>) -> Result<(), RenderError> {
        self.close_clip()?;
        self.state.clip = clip;
        let Some(rect) = clip else {
            return Ok(());
        };
        let saved = self.applied;
        self.op("q", vec![]);
        let undo = (!saved.is_identity(MATRIX_TOLERANCE)).then(|| saved.inverse()).flatten();
        if let Some(inverse) = undo {
            self.op("cm", affine(&inverse));
        }
        self.op("re", vec![num(rect.x), num(rect.y), num(rect.width), num(rect.height)]);
        self.op("W", vec![]);
        self.op("n", vec![]);
        if undo.is_some() {
            self.op("cm", affine(&saved));
        }
        self.clip = Some(ClipGroup { saved });
        Ok(())
    }
}
