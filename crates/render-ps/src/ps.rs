//! PostScript and EPS emitter.
//!
//! Points arrive in user space and are mapped through the current matrix before
//! they are written, so the page itself keeps an identity CTM. Consecutive line
//! segments that share an endpoint, color, width and dash are chained into one
//! path (`LS … L … LE`); everything else ends the open chain first.

use crate::prolog::{FOOTER, PROLOG};
use flate2::Compression;
use flate2::write::GzEncoder;
use log::{debug, warn};
use std::io::Write;
use vexport_capture::Primitive;
use vexport_path::{Path, Segment, normalized_segments};
use vexport_render_core::geometry::{FillRule, arc_outline, marker_outline, wedge_outline};
use vexport_render_core::utils::{fmt_num, fmt_unit};
use vexport_render_core::{
    DeviceState, DocumentInfo, ImageData, Justification, MarkerShape, RenderError, TextLayout, VectorDevice,
    VerticalJustification, stipple_dash_array,
};
use vexport_tessellate::{GradientTessellator, TessellationOptions};
use vexport_traits::{MonospaceTextBackend, TextBackend};
use vexport_types::{Color, Matrix3, Point2, Rect, Size, Vertex};

const HEX_LINE_LEN: usize = 72;

#[derive(Debug, Clone, PartialEq)]
pub struct PsOptions {
    /// Writes an EPS header instead of a printable PS page.
    pub encapsulated: bool,
    /// Gzips the finished document.
    pub compress: bool,
    /// Shrinks the bounding box to the drawn content.
    pub tight_bounding_box: bool,
    /// Draws strings as filled glyph outlines instead of `show`.
    pub text_as_paths: bool,
    /// Leaves strings out; a TeX overlay places them instead.
    pub omit_text: bool,
    pub info: DocumentInfo,
    pub tessellation: TessellationOptions,
}

impl Default for PsOptions {
    fn default() -> Self {
        Self {
            encapsulated: false,
            compress: false,
            tight_bounding_box: false,
            text_as_paths: false,
            omit_text: false,
            info: DocumentInfo::default(),
            tessellation: TessellationOptions::default(),
        }
    }
}

pub struct PsDevice {
    state: DeviceState,
    options: PsOptions,
    tessellator: GradientTessellator,
    text_backend: Box<dyn TextBackend>,
    body: Vec<u8>,
    /// End point of the open line chain.
    line_end: Option<Point2>,
    last_color: Option<Color>,
    last_width: Option<f64>,
    last_dash: Option<Vec<f64>>,
    bounds: Option<Rect>,
    clip_open: bool,
    warned_texture: bool,
}

fn pt(p: Point2) -> String {
    format!("{} {}", fmt_num(p.x), fmt_num(p.y))
}

fn same_position(a: Point2, b: Point2) -> bool {
    (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9
}

fn color_at(colors: Option<&[Color]>, i: usize, fallback: Color) -> Color {
    colors.and_then(|c| c.get(i)).copied().unwrap_or(fallback)
}

/// Escapes a string literal; characters outside Latin-1 become `?`.
fn escape_ps(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            ' '..='~' => out.push(ch),
            _ if (ch as u32) < 256 => out.push_str(&format!("\\{:03o}", ch as u32)),
            _ => out.push('?'),
        }
    }
    out
}

/// Prolog procedure that shows a string with the given anchor.
fn text_procedure(h: Justification, v: VerticalJustification) -> &'static str {
    match (v, h) {
        (VerticalJustification::Bottom, Justification::Left) => "S",
        (VerticalJustification::Bottom, Justification::Center) => "SBC",
        (VerticalJustification::Bottom, Justification::Right) => "SBR",
        (VerticalJustification::Center, Justification::Left) => "SCL",
        (VerticalJustification::Center, Justification::Center) => "SCC",
        (VerticalJustification::Center, Justification::Right) => "SCR",
        (VerticalJustification::Top, Justification::Left) => "STL",
        (VerticalJustification::Top, Justification::Center) => "STC",
        (VerticalJustification::Top, Justification::Right) => "STR",
    }
}

impl PsDevice {
    pub fn new(canvas: Size, options: PsOptions) -> Self {
        Self {
            state: DeviceState::new(canvas),
            tessellator: GradientTessellator::new(options.tessellation),
            options,
            text_backend: Box::new(MonospaceTextBackend::default()),
            body: Vec::new(),
            line_end: None,
            last_color: None,
            last_width: None,
            last_dash: None,
            bounds: None,
            clip_open: false,
            warned_texture: false,
        }
    }

    pub fn with_text_backend(mut self, backend: Box<dyn TextBackend>) -> Self {
        self.text_backend = backend;
        self
    }

    fn touch(&mut self, p: Point2) {
        self.bounds = match self.bounds {
            Some(b) => Rect::bounding(b.corners().into_iter().chain([p])),
            None => Some(Rect::new(p.x, p.y, 0.0, 0.0)),
        };
    }

    fn map(&mut self, p: Point2) -> Point2 {
        let q = self.state.matrix().transform_point(p);
        self.touch(q);
        q
    }

    fn forget_graphics_state(&mut self) {
        self.last_color = None;
        self.last_width = None;
        self.last_dash = None;
    }

    fn set_color(&mut self, c: Color) -> Result<(), RenderError> {
        if self.last_color != Some(c) {
            writeln!(self.body, "{} {} {} C", fmt_unit(c.r), fmt_unit(c.g), fmt_unit(c.b))?;
            self.last_color = Some(c);
        }
        Ok(())
    }

    fn set_width(&mut self, width: f64) -> Result<(), RenderError> {
        if self.last_width != Some(width) {
            writeln!(self.body, "{} W", fmt_num(width))?;
            self.last_width = Some(width);
        }
        Ok(())
    }

    fn set_dash(&mut self, dash: &[f64]) -> Result<(), RenderError> {
        if self.last_dash.as_deref() != Some(dash) {
            let items: Vec<String> = dash.iter().map(|d| fmt_num(*d)).collect();
            writeln!(self.body, "[{}] 0 setdash", items.join(" "))?;
            self.last_dash = Some(dash.to_vec());
        }
        Ok(())
    }

    fn end_line(&mut self) -> Result<(), RenderError> {
        if let Some(end) = self.line_end.take() {
            writeln!(self.body, "{} LE", pt(end))?;
        }
        Ok(())
    }

    /// Appends one device-space segment, continuing the open chain when possible.
    fn segment(&mut self, a: Point2, b: Point2, color: Color, width: f64, dash: &[f64]) -> Result<(), RenderError> {
        if color.is_transparent() {
            return Ok(());
        }
        let continues = self.line_end.is_some_and(|end| same_position(end, a))
            && self.last_color == Some(color)
            && self.last_width == Some(width)
            && self.last_dash.as_deref() == Some(dash);
        if !continues {
            self.end_line()?;
        }
        self.set_width(width)?;
        self.set_dash(dash)?;
        self.set_color(color)?;
        writeln!(self.body, "{} {}", pt(a), if continues { "L" } else { "LS" })?;
        self.line_end = Some(b);
        Ok(())
    }

    fn stroke_gradient(
        &mut self,
        a: Point2,
        b: Point2,
        ca: Color,
        cb: Color,
        width: f64,
        dash: &[f64],
    ) -> Result<(), RenderError> {
        if ca == cb {
            return self.segment(a, b, ca, width, dash);
        }
        let pieces = self.tessellator.line(Vertex::at(a.x, a.y, 0.0, ca), Vertex::at(b.x, b.y, 0.0, cb));
        for piece in pieces {
            self.segment(piece.start.xy(), piece.end.xy(), piece.color, width, dash)?;
        }
        Ok(())
    }

    fn stroke_pairs(
        &mut self,
        points: &[Point2],
        colors: Option<&[Color]>,
        pairs: Vec<(usize, usize)>,
    ) -> Result<(), RenderError> {
        let pen = self.state.pen;
        if !pen.is_visible() {
            return Ok(());
        }
        let dash: Vec<f64> = pen.line_type.dash_pattern().iter().map(|d| d * pen.width).collect();
        let mapped: Vec<Point2> = points.iter().map(|&p| self.map(p)).collect();
        for (i, j) in pairs {
            let (ca, cb) = (color_at(colors, i, pen.color), color_at(colors, j, pen.color));
            self.stroke_gradient(mapped[i], mapped[j], ca, cb, pen.width, &dash)?;
        }
        Ok(())
    }

    fn fill_triangle(&mut self, [p1, p2, p3]: [Point2; 3], color: Color) -> Result<(), RenderError> {
        if color.is_transparent() {
            return Ok(());
        }
        self.set_color(color)?;
        writeln!(self.body, "{} {} {} T", pt(p3), pt(p2), pt(p1))?;
        Ok(())
    }

    /// Writes `newpath` plus the outline. `touch` records the points in the bounds.
    fn write_path(&mut self, path: &Path, touch: bool) -> Result<(), RenderError> {
        writeln!(self.body, "newpath")?;
        for segment in normalized_segments(path)? {
            match segment {
                Segment::MoveTo(p) => writeln!(self.body, "{} moveto", pt(p.xy()))?,
                Segment::LineTo(p) => writeln!(self.body, "{} lineto", pt(p.xy()))?,
                Segment::Cubic { ctrl1, ctrl2, end } => writeln!(
                    self.body,
                    "{} {} {} curveto",
                    pt(ctrl1.xy()),
                    pt(ctrl2.xy()),
                    pt(end.xy())
                )?,
                // Normalized away.
                Segment::Conic { .. } => {}
            }
        }
        if touch {
            for p in path.points() {
                self.touch(p.xy());
            }
        }
        Ok(())
    }

    /// Fills or strokes a user-space outline with `paint`.
    fn paint_outline(&mut self, outline: &Path, color: Color, paint: &str) -> Result<(), RenderError> {
        if color.is_transparent() || outline.is_empty() {
            return Ok(());
        }
        self.end_line()?;
        let mut device = outline.clone();
        device.transform(&self.state.matrix());
        self.set_color(color)?;
        self.write_path(&device, true)?;
        writeln!(self.body, "{}", paint)?;
        Ok(())
    }

    /// Fills a path placed at `origin` and rotated by `rotation` degrees. After
    /// `initmatrix` the placement is written as a translate followed by the
    /// linear part of the current matrix composed with the rotation.
    fn fill_path_at(&mut self, path: &Path, origin: Point2, rotation: f64, color: Color) -> Result<(), RenderError> {
        if color.is_transparent() || path.is_empty() {
            return Ok(());
        }
        self.end_line()?;
        let placement =
            self.state.matrix() * Matrix3::translation(origin.x, origin.y) * Matrix3::rotation_degrees(rotation);

        let mut placed = path.clone();
        placed.transform(&placement);
        if let Some(extent) = placed.bounds() {
            for corner in extent.corners() {
                self.touch(corner);
            }
        }

        let [a, b, c, d, e, f] = placement.to_affine();
        writeln!(self.body, "gsave")?;
        writeln!(self.body, "initmatrix")?;
        writeln!(self.body, "{} translate", pt(Point2::new(e, f)))?;
        let linear = [a, b, c, d].map(fmt_num);
        if linear != ["1", "0", "0", "1"] {
            writeln!(self.body, "[{} 0 0] concat", linear.join(" "))?;
        }
        // Set inside the gsave so the cached color is still valid after grestore.
        writeln!(self.body, "{} {} {} C", fmt_unit(color.r), fmt_unit(color.g), fmt_unit(color.b))?;
        self.write_path(path, false)?;
        writeln!(self.body, "closepath fill")?;
        writeln!(self.body, "grestore")?;
        Ok(())
    }

    fn draw_text_outline(&mut self, at: Point2, line: &str) -> Result<(), RenderError> {
        let prop = self.state.text;
        let query = prop.font_query();
        let outline = self
            .text_backend
            .string_to_path(line, &query)
            .and_then(|path| Ok((path, TextLayout::new(line, &prop, prop.size, self.text_backend.as_ref())?)));
        match outline {
            Ok((path, layout)) => self.fill_path_at(&path, layout.start_point(at), prop.orientation, prop.color),
            Err(err) => {
                warn!("Skipping text {:?}: {}", line, err);
                Ok(())
            }
        }
    }

    fn header(&self) -> String {
        let info = &self.options.info;
        let canvas = self.state.canvas;
        let (w, h) = (canvas.width.ceil() as i64, canvas.height.ceil() as i64);
        let bbox = match (self.options.tight_bounding_box, self.bounds) {
            (true, Some(b)) => {
                format!("{} {} {} {}", b.x.floor() as i64, b.y.floor() as i64, b.right().ceil() as i64, b.top().ceil() as i64)
            }
            _ => format!("0 0 {} {}", w, h),
        };

        let mut lines = vec![
            if self.options.encapsulated { "%!PS-Adobe-3.0 EPSF-3.0" } else { "%!PS-Adobe-3.0" }.to_string(),
            format!("%%Title: {}", info.title),
            format!("%%Creator: {}", info.creator),
            format!("%%For: {}", info.creator),
            format!("%%CreationDate: {}", info.timestamp().format("%a %b %e %H:%M:%S %Y")),
            "%%LanguageLevel: 3".to_string(),
            "%%DocumentData: Clean7Bit".to_string(),
            "%%Pages: 1".to_string(),
        ];
        if !self.options.encapsulated {
            lines.push("%%Orientation: Portrait".to_string());
            lines.push(format!("%%DocumentMedia: Default {} {} 0 () ()", w, h));
        }
        lines.push(format!("%%BoundingBox: {}", bbox));
        lines.push("%%EndComments".to_string());
        let mut header = lines.join("\n");
        header.push('\n');
        header
    }
}

impl VectorDevice for PsDevice {
    fn name(&self) -> &'static str {
        if self.options.encapsulated { "eps" } else { "ps" }
    }

    fn state(&self) -> &DeviceState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut DeviceState {
        &mut self.state
    }

    fn begin(&mut self) -> Result<(), RenderError> {
        self.state.reset();
        self.body.clear();
        self.line_end = None;
        self.forget_graphics_state();
        self.bounds = None;
        self.clip_open = false;
        self.warned_texture = false;

        let (w, h) = (fmt_num(self.state.canvas.width), fmt_num(self.state.canvas.height));
        writeln!(self.body, "gsave")?;
        writeln!(self.body, "newpath 0 0 moveto {w} 0 lineto {w} {h} lineto 0 {h} lineto")?;
        writeln!(self.body, "closepath clip")?;
        debug!("{}: page {}x{} started", self.name(), w, h);
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<Vec<u8>, RenderError> {
        self.end_line()?;
        if self.clip_open {
            writeln!(self.body, "grestore")?;
        }
        writeln!(self.body, "grestore")?;

        let mut document = self.header().into_bytes();
        document.extend_from_slice(PROLOG.as_bytes());
        document.extend_from_slice(&self.body);
        document.extend_from_slice(FOOTER.as_bytes());

        if self.options.compress {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&document)?;
            document = encoder.finish()?;
        }
        debug!("{}: finished, {} bytes", self.name(), document.len());
        Ok(document)
    }

    fn draw_poly(&mut self, points: &[Point2], colors: Option<&[Color]>) -> Result<(), RenderError> {
        let pairs = (1..points.len()).map(|i| (i - 1, i)).collect();
        self.stroke_pairs(points, colors, pairs)
    }

    fn draw_lines(&mut self, points: &[Point2], colors: Option<&[Color]>) -> Result<(), RenderError> {
        let pairs = (0..points.len() / 2).map(|i| (2 * i, 2 * i + 1)).collect();
        self.stroke_pairs(points, colors, pairs)
    }

    fn draw_points(&mut self, points: &[Point2], colors: Option<&[Color]>) -> Result<(), RenderError> {
        self.end_line()?;
        let pen = self.state.pen;
        let radius = 0.5 * pen.width;
        for (i, p) in points.iter().enumerate() {
            let color = color_at(colors, i, pen.color);
            if color.is_transparent() {
                continue;
            }
            let at = self.map(*p);
            self.set_color(color)?;
            writeln!(self.body, "{} {} P", pt(at), fmt_num(radius))?;
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
        self.end_line()?;
        let pen = self.state.pen;
        for (i, p) in points.iter().enumerate() {
            let color = color_at(colors, i, pen.color);
            if color.is_transparent() {
                continue;
            }
            let at = self.state.matrix().transform_point(*p);
            let outline = marker_outline(shape, at, pen.width);
            self.set_color(color)?;
            if shape.is_stroked() {
                self.set_width(if highlight { 1.5 } else { 0.5 })?;
                self.set_dash(&[])?;
                self.write_path(&outline, true)?;
                writeln!(self.body, "stroke")?;
            } else {
                self.write_path(&outline, true)?;
                writeln!(self.body, "closepath fill")?;
            }
        }
        Ok(())
    }

    fn draw_polygon(&mut self, points: &[Point2], colors: Option<&[Color]>) -> Result<(), RenderError> {
        if points.len() < 3 {
            return Ok(());
        }
        let uniform = match colors {
            Some(c) if !c.is_empty() => c.iter().all(|x| *x == c[0]).then_some(c[0]),
            _ => None,
        };

        if let (Some(colors), None) = (colors, uniform) {
            self.end_line()?;
            let mapped: Vec<Point2> = points.iter().map(|&p| self.map(p)).collect();
            let fallback = self.state.brush.color;
            for i in 1..mapped.len() - 1 {
                let idx = [0, i, i + 1];
                let [c0, c1, c2] = idx.map(|k| color_at(Some(colors), k, fallback));
                let [p0, p1, p2] = idx.map(|k| mapped[k]);
                if c0 == c1 && c1 == c2 {
                    self.fill_triangle([p0, p1, p2], c0)?;
                    continue;
                }
                let pieces = self.tessellator.triangle(
                    Vertex::at(p0.x, p0.y, 0.0, c0),
                    Vertex::at(p1.x, p1.y, 0.0, c1),
                    Vertex::at(p2.x, p2.y, 0.0, c2),
                );
                for piece in pieces {
                    self.fill_triangle(piece.points.map(|v| v.xy()), piece.color)?;
                }
            }
            return Ok(());
        }

        let brush = &self.state.brush;
        if uniform.is_none() && !brush.is_visible() {
            return Ok(());
        }
        if brush.texture.is_some() && !self.warned_texture {
            warn!("{}: textured fills are drawn with the brush color", self.name());
            self.warned_texture = true;
        }
        let color = uniform.unwrap_or(self.state.brush.color);
        let mut outline = Path::with_capacity(points.len());
        for (i, p) in points.iter().enumerate() {
            if i == 0 {
                outline.move_to(p.x, p.y);
            } else {
                outline.line_to(p.x, p.y);
            }
        }
        self.paint_outline(&outline, color, "closepath fill")
    }

    fn draw_ellipse_wedge(
        &mut self,
        center: Point2,
        outer: (f64, f64),
        inner: (f64, f64),
        start: f64,
        stop: f64,
    ) -> Result<(), RenderError> {
        if !self.state.brush.is_visible() {
            return Ok(());
        }
        let outline = wedge_outline(center, outer, inner, start, stop);
        let paint = match outline.fill_rule {
            FillRule::NonZero => "closepath fill",
            FillRule::EvenOdd => "closepath eofill",
        };
        self.paint_outline(&outline.path, self.state.brush.color, paint)
    }

    fn draw_elliptic_arc(
        &mut self,
        center: Point2,
        rx: f64,
        ry: f64,
        start: f64,
        stop: f64,
    ) -> Result<(), RenderError> {
        let outline = arc_outline(center, rx, ry, start, stop);
        if self.state.brush.is_visible() {
            self.paint_outline(&outline, self.state.brush.color, "fill")?;
        }
        let pen = self.state.pen;
        if pen.is_visible() {
            let dash: Vec<f64> = pen.line_type.dash_pattern().iter().map(|d| d * pen.width).collect();
            self.end_line()?;
            self.set_width(pen.width)?;
            self.set_dash(&dash)?;
            self.paint_outline(&outline, pen.color, "stroke")?;
        }
        Ok(())
    }

    fn draw_string(&mut self, at: Point2, text: &str) -> Result<(), RenderError> {
        let line = text.replace('\n', " ");
        if self.options.omit_text || line.trim().is_empty() {
            return Ok(());
        }
        if self.options.text_as_paths {
            return self.draw_text_outline(at, &line);
        }

        let prop = self.state.text;
        if prop.color.is_transparent() {
            return Ok(());
        }
        self.end_line()?;
        let anchor = self.map(at);
        self.set_color(prop.color)?;
        let procedure = text_procedure(prop.justification, prop.vertical_justification);
        let font = prop.base14_font_name();
        if prop.orientation != 0.0 {
            writeln!(
                self.body,
                "({}) {} {} {} /{} {}R",
                escape_ps(&line),
                fmt_num(prop.orientation),
                pt(anchor),
                fmt_num(prop.size),
                font,
                procedure
            )?;
        } else {
            writeln!(self.body, "({}) {} {} /{} {}", escape_ps(&line), pt(anchor), fmt_num(prop.size), font, procedure)?;
        }
        Ok(())
    }

    fn draw_path(&mut self, path: &Path, origin: Point2) -> Result<(), RenderError> {
        if !self.state.brush.is_visible() {
            return Ok(());
        }
        self.fill_path_at(path, origin, 0.0, self.state.brush.color)
    }

    fn draw_image(&mut self, rect: Rect, image: &ImageData) -> Result<(), RenderError> {
        if let Err(err) = image.validate() {
            warn!("{}: skipping image: {}", self.name(), err);
            return Ok(());
        }
        if image.is_empty() {
            return Ok(());
        }
        self.end_line()?;
        let rgb = image.composite_onto(self.state.brush.color);
        let lo = self.map(Point2::new(rect.x, rect.y));
        let hi = self.map(Point2::new(rect.right(), rect.top()));
        let (w, h) = (rgb.width, rgb.height);

        writeln!(self.body, "gsave")?;
        writeln!(self.body, "{} translate", pt(lo))?;
        writeln!(self.body, "{} {} scale", fmt_num(hi.x - lo.x), fmt_num(hi.y - lo.y))?;
        writeln!(self.body, "/rgbstr {} string def", w * 3)?;
        writeln!(self.body, "{} {} 8", w, h)?;
        writeln!(self.body, "[ {} 0 0 -{} 0 {} ]", w, h, h)?;
        writeln!(self.body, "{{ currentfile rgbstr readhexstring pop }}")?;
        writeln!(self.body, "false 3")?;
        writeln!(self.body, "colorimage")?;
        for chunk in rgb.to_hex_rgb().as_bytes().chunks(HEX_LINE_LEN) {
            self.body.write_all(chunk)?;
            self.body.write_all(b"\n")?;
        }
        writeln!(self.body, "grestore")?;
        Ok(())
    }

    fn draw_primitive(&mut self, primitive: &Primitive) -> Result<(), RenderError> {
        match primitive {
            Primitive::Point { vertex, size } => {
                self.end_line()?;
                if vertex.color.is_transparent() {
                    return Ok(());
                }
                let at = self.map(vertex.position.xy());
                self.set_color(vertex.color)?;
                writeln!(self.body, "{} {} P", pt(at), fmt_num(0.5 * size))?;
                Ok(())
            }
            Primitive::Line { vertices: [a, b], width, stipple } => {
                let dash = stipple.map(stipple_dash_array).unwrap_or_default();
                let (pa, pb) = (self.map(a.position.xy()), self.map(b.position.xy()));
                self.stroke_gradient(pa, pb, a.color, b.color, *width, &dash)
            }
            Primitive::Triangle { .. } | Primitive::PolygonFan { .. } => {
                let vertices = primitive.vertices();
                let points: Vec<Point2> = vertices.iter().map(|v| v.position.xy()).collect();
                let colors: Vec<Color> = vertices.iter().map(|v| v.color).collect();
                self.draw_polygon(&points, Some(&colors))
            }
        }
    }

    fn apply_transform(&mut self) -> Result<(), RenderError> {
        // Points are mapped at draw time.
        Ok(())
    }

    fn set_clip(&mut self, clip: Option<Rect>) -> Result<(), RenderError> {
        self.end_line()?;
        if self.clip_open {
            writeln!(self.body, "grestore")?;
            self.clip_open = false;
            self.forget_graphics_state();
        }
        if let Some(rect) = clip {
            writeln!(self.body, "gsave")?;
            writeln!(
                self.body,
                "{} {} {} {} rectclip",
                fmt_num(rect.x),
                fmt_num(rect.y),
                fmt_num(rect.width),
                fmt_num(rect.height)
            )?;
            self.clip_open = true;
        }
        self.state.clip = clip;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use vexport_capture::Stipple;
    use vexport_render_core::{Brush, LineType};

    fn device() -> Box<PsDevice> {
        let mut device = Box::new(PsDevice::new(Size::new(200.0, 100.0), PsOptions::default()));
        device.begin().unwrap();
        device
    }

    fn render(device: Box<PsDevice>) -> String {
        String::from_utf8(device.finish().unwrap()).unwrap()
    }

    fn count_suffix(text: &str, suffix: &str) -> usize {
        text.lines().filter(|l| l.ends_with(suffix)).count()
    }

    #[test]
    fn test_document_structure() {
        let out = render(device());
        assert!(out.starts_with("%!PS-Adobe-3.0\n"));
        assert!(out.contains("%%BoundingBox: 0 0 200 100\n"));
        assert!(out.contains("%%LanguageLevel: 3\n"));
        assert!(out.contains("%%Orientation: Portrait\n"));
        assert!(out.contains("closepath clip\n"));
        assert!(out.ends_with("end\n%%EOF\n"));

        let options = PsOptions { encapsulated: true, ..PsOptions::default() };
        let mut eps = Box::new(PsDevice::new(Size::new(10.0, 10.0), options));
        eps.begin().unwrap();
        let out = render(eps);
        assert!(out.starts_with("%!PS-Adobe-3.0 EPSF-3.0\n"));
        assert!(!out.contains("%%Orientation"));
    }

    #[test]
    fn test_connected_segments_share_one_path() {
        let mut device = device();
        let pts = [Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), Point2::new(10.0, 10.0)];
        device.draw_poly(&pts, None).unwrap();
        let out = render(device);
        assert_eq!(count_suffix(&out, " LS"), 1);
        assert_eq!(count_suffix(&out, " L"), 1);
        assert_eq!(count_suffix(&out, " LE"), 1);
        assert!(out.contains("0 0 LS\n10 0 L\n10 10 LE\n"));
    }

    #[test]
    fn test_gradient_line_is_split() {
        let mut device = device();
        let pts = [Point2::new(0.0, 0.0), Point2::new(100.0, 0.0)];
        device.draw_poly(&pts, Some(&[Color::rgb(255, 0, 0), Color::rgb(0, 0, 255)])).unwrap();
        let out = render(device);
        assert!(count_suffix(&out, " LS") > 1);
    }

    #[test]
    fn test_invisible_pen_and_brush_draw_nothing() {
        let mut device = device();
        device.state_mut().pen.line_type = LineType::NoPen;
        device.set_brush(Brush::solid(Color::rgba(255, 0, 0, 0)));
        let pts = [Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), Point2::new(10.0, 10.0)];
        device.draw_poly(&pts, None).unwrap();
        device.draw_polygon(&pts, None).unwrap();
        let out = render(device);
        assert_eq!(count_suffix(&out, " LS"), 0);
        assert!(!out.lines().any(|l| l == "closepath fill"));
    }

    #[test]
    fn test_stippled_primitive_sets_dash() {
        let mut device = device();
        let red = Color::rgb(255, 0, 0);
        device
            .draw_primitive(&Primitive::Line {
                vertices: [Vertex::at(0.0, 0.0, 0.0, red), Vertex::at(50.0, 0.0, 0.0, red)],
                width: 2.0,
                stipple: Some(Stipple { pattern: 0x00FF, factor: 1 }),
            })
            .unwrap();
        let out = render(device);
        assert!(out.contains("[8 8] 0 setdash\n"));
        assert!(out.contains("2 W\n"));
        assert!(out.contains("1 0 0 C\n"));
    }

    #[test]
    fn test_flat_and_shaded_triangles() {
        let pts = [Point2::new(0.0, 0.0), Point2::new(100.0, 0.0), Point2::new(0.0, 100.0)];
        let mut flat_device = device();
        flat_device.draw_polygon(&pts, Some(&[Color::WHITE; 3])).unwrap();
        let flat = count_suffix(&render(flat_device), "closepath fill");

        let mut shaded = device();
        let colors = [Color::rgb(255, 0, 0), Color::rgb(0, 255, 0), Color::rgb(0, 0, 255)];
        shaded.draw_polygon(&pts, Some(&colors)).unwrap();
        let out = render(shaded);
        assert_eq!(flat, 1);
        assert!(count_suffix(&out, " T") > 1);
    }

    #[test]
    fn test_images() {
        let mut device = device();
        let image = ImageData::rgba(2, 1, vec![255, 0, 0, 255, 0, 255, 0, 255]);
        device.draw_image(Rect::new(10.0, 10.0, 20.0, 10.0), &image).unwrap();
        device.draw_image(Rect::new(0.0, 0.0, 1.0, 1.0), &ImageData::new(1, 1, 3, vec![0; 3]).unwrap()).unwrap();
        let bad = ImageData { width: 1, height: 1, components: 2, pixels: vec![0, 0] };
        device.draw_image(Rect::new(0.0, 0.0, 1.0, 1.0), &bad).unwrap();
        let out = render(device);
        assert_eq!(out.matches("colorimage\n").count(), 2);
        assert!(out.contains("ff000000ff00\n"));
        assert!(out.contains("[ 2 0 0 -1 0 1 ]\n"));
    }

    #[test]
    fn test_text_operators() {
        let mut device = device();
        device.state_mut().text.justification = Justification::Center;
        device.state_mut().text.vertical_justification = VerticalJustification::Top;
        device.draw_string(Point2::new(5.0, 6.0), "a (b)\nc").unwrap();
        device.state_mut().text.orientation = 45.0;
        device.draw_string(Point2::new(5.0, 6.0), "r").unwrap();
        let out = render(device);
        assert!(out.contains("(a \\(b\\) c) 5 6 12 /Helvetica STC\n"));
        assert!(out.contains("(r) 45 5 6 12 /Helvetica STCR\n"));
    }

    #[test]
    fn test_text_paths_without_outlines_are_skipped() {
        let options = PsOptions { text_as_paths: true, ..PsOptions::default() };
        let mut device = Box::new(PsDevice::new(Size::new(10.0, 10.0), options));
        device.begin().unwrap();
        device.draw_string(Point2::new(1.0, 1.0), "abc").unwrap();
        let out = render(device);
        assert!(!out.contains("initmatrix"));
        assert!(!out.contains("(abc)"));
    }

    #[test]
    fn test_transformed_points_and_clip() {
        let mut device = device();
        device.set_clip(Some(Rect::new(1.0, 2.0, 3.0, 4.0))).unwrap();
        device.multiply_matrix(Matrix3::translation(5.0, 5.0)).unwrap();
        device.draw_points(&[Point2::new(1.0, 1.0)], None).unwrap();
        device.set_clip(None).unwrap();
        let out = render(device);
        assert!(out.contains("1 2 3 4 rectclip\n"));
        assert!(out.contains("6 6 0.5 P\n"));
        // Viewport gsave, clip gsave and the page gsave are all balanced.
        assert_eq!(out.matches("gsave\n").count(), out.matches("grestore\n").count());
    }

    #[test]
    fn test_tight_bounding_box() {
        let options = PsOptions { tight_bounding_box: true, ..PsOptions::default() };
        let mut device = Box::new(PsDevice::new(Size::new(200.0, 100.0), options));
        device.begin().unwrap();
        device.draw_poly(&[Point2::new(10.5, 20.0), Point2::new(30.0, 40.2)], None).unwrap();
        let out = render(device);
        assert!(out.contains("%%BoundingBox: 10 20 30 41\n"));
    }

    #[test]
    fn test_compressed_output_is_gzip() {
        let options = PsOptions { compress: true, ..PsOptions::default() };
        let mut device = Box::new(PsDevice::new(Size::new(10.0, 10.0), options));
        device.begin().unwrap();
        let bytes = device.finish().unwrap();
        assert_eq!(&bytes[..2], &[0x1f, 0x8b]);
        let mut text = String::new();
        GzDecoder::new(&bytes[..]).read_to_string(&mut text).unwrap();
        assert!(text.ends_with("%%EOF\n"));
    }

    #[test]
    fn test_placed_outline_keeps_axis_scale() {
        let options = PsOptions { tight_bounding_box: true, ..PsOptions::default() };
        let mut device = Box::new(PsDevice::new(Size::new(200.0, 100.0), options));
        device.begin().unwrap();
        device.set_matrix(Matrix3::scale(2.0, 1.0)).unwrap();
        let mut glyph = Path::new();
        glyph.move_to(0.0, 0.25).line_to(10.0, 0.25).line_to(10.0, 1.25);
        device.fill_path_at(&glyph, Point2::new(5.0, 5.0), 90.0, Color::BLACK).unwrap();
        let out = render(device);
        assert!(out.contains("initmatrix\n10 5 translate\n[0 1 -2 0 0 0] concat\n"));
        // Glyph +x runs along device +y at unit scale; glyph +y runs along device -x doubled.
        assert!(out.contains("%%BoundingBox: 7 5 10 15\n"));
    }

    #[test]
    fn test_unrotated_outline_skips_concat() {
        let mut device = device();
        let mut glyph = Path::new();
        glyph.move_to(0.0, 0.0).line_to(3.0, 0.0).line_to(3.0, 3.0);
        device.set_brush(Brush::solid(Color::BLACK));
        device.draw_path(&glyph, Point2::new(1.0, 2.0)).unwrap();
        let out = render(device);
        assert!(out.contains("initmatrix\n1 2 translate\n0 0 0 C\n"));
        assert!(!out.contains("concat"));
    }
}
