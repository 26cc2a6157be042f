//! SVG emitter.
//!
//! Points are written in the page's SVG frame, `(x, H - y)`. The current matrix
//! and clip travel as a single wrapper `<g>` whose transform is the device matrix
//! conjugated by that flip; a new wrapper starts whenever either one changes.
//! Images, patterns, clip paths, marker symbols and embedded fonts are collected
//! while drawing and written to `<defs>` at [`VectorDevice::finish`].

use crate::fonts::FontRegistry;
use crate::node::XmlNode;
use crate::resources::{ClipKey, EmbeddedImage, PatternKey, ResourceTable};
use itertools::Itertools;
use log::{debug, warn};
use vexport_path::{Path, PathError, Segment};
use vexport_render_core::geometry::ellipse_point;
use vexport_render_core::utils::fmt_num;
use vexport_render_core::{DeviceState, DocumentInfo, ImageData, MarkerShape, RenderError, TextLayout, TextureMode, VectorDevice};
use vexport_tessellate::{GradientTessellator, TessellationOptions};
use vexport_traits::{MonospaceTextBackend, TextBackend};
use vexport_types::{Color, Matrix3, Point2, Rect, Size, Vec3, Vertex};

const SVG_NS: &str = "http://www.w3.org/2000/svg";
const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
const MATRIX_TOLERANCE: f64 = 1e-9;
/// Wedges sweeping at least this far are drawn as whole ellipses.
const FULL_WEDGE: f64 = 359.99;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SvgOptions {
    /// Draws strings as filled glyph outlines instead of `<text>`.
    pub text_as_paths: bool,
    /// Writes an SVG `<font>` for every face used by native text.
    pub embed_fonts: bool,
    pub info: DocumentInfo,
    pub tessellation: TessellationOptions,
}

pub struct SvgDevice {
    state: DeviceState,
    options: SvgOptions,
    text_backend: Box<dyn TextBackend>,
    tessellator: GradientTessellator,
    content: Vec<XmlNode>,
    group: Option<XmlNode>,
    /// Transform and clip id the current wrapper was opened for.
    wrapper: (Matrix3, Option<String>),
    images: ResourceTable<EmbeddedImage>,
    patterns: ResourceTable<PatternKey>,
    clips: ResourceTable<ClipKey>,
    markers: Vec<MarkerShape>,
    fonts: FontRegistry,
}

fn matrix_attr(m: &Matrix3) -> String {
    format!("matrix({})", m.to_affine().iter().map(|v| fmt_num(*v)).join(","))
}

fn opacity(color: Color) -> Option<String> {
    (color.a < 255).then(|| fmt_num(color.a as f64 / 255.0))
}

fn color_at(colors: Option<&[Color]>, i: usize, fallback: Color) -> Color {
    colors.and_then(|c| c.get(i)).copied().unwrap_or(fallback)
}

fn uniform_color(colors: &[Color]) -> Option<Color> {
    let first = *colors.first()?;
    colors.iter().all(|c| *c == first).then_some(first)
}

fn set_fill(node: &mut XmlNode, color: Color) {
    node.set("fill", color.to_hex_rgb());
    if let Some(alpha) = opacity(color) {
        node.set("fill-opacity", alpha);
    }
}

fn set_stroke(node: &mut XmlNode, color: Color) {
    node.set("stroke", color.to_hex_rgb());
    if let Some(alpha) = opacity(color) {
        node.set("stroke-opacity", alpha);
    }
}

/// Path data for `path` with every point mapped through `map`.
fn path_data(path: &Path, map: impl Fn(Vec3) -> (f64, f64)) -> Result<String, PathError> {
    let p = |v: Vec3| {
        let (x, y) = map(v);
        format!("{},{}", fmt_num(x), fmt_num(y))
    };
    let mut d = String::new();
    for segment in path.segments() {
        match segment? {
            Segment::MoveTo(v) => d.push_str(&format!("M{}", p(v))),
            Segment::LineTo(v) => d.push_str(&format!("L{}", p(v))),
            Segment::Conic { ctrl, end } => d.push_str(&format!("Q{} {}", p(ctrl), p(end))),
            Segment::Cubic { ctrl1, ctrl2, end } => d.push_str(&format!("C{} {} {}", p(ctrl1), p(ctrl2), p(end))),
        }
    }
    Ok(d)
}

fn marker_name(shape: MarkerShape) -> &'static str {
    match shape {
        MarkerShape::Cross => "cross",
        MarkerShape::Plus => "plus",
        MarkerShape::Square => "square",
        MarkerShape::Circle => "circle",
        MarkerShape::Diamond => "diamond",
    }
}

/// A unit-square symbol; `<use>` scales it to the marker size.
fn marker_symbol(shape: MarkerShape) -> XmlNode {
    let mut symbol = XmlNode::new("symbol")
        .attr("id", format!("marker-{}", marker_name(shape)))
        .attr("viewBox", "0 0 1 1")
        .attr("overflow", "visible");
    let body = match shape {
        MarkerShape::Cross => XmlNode::new("path").attr("d", "M0,0L1,1M0,1L1,0"),
        MarkerShape::Plus => XmlNode::new("path").attr("d", "M0.5,0L0.5,1M0,0.5L1,0.5"),
        MarkerShape::Square => XmlNode::new("rect").attr("x", "0").attr("y", "0").attr("width", "1").attr("height", "1"),
        MarkerShape::Circle => XmlNode::new("circle").attr("cx", "0.5").attr("cy", "0.5").attr("r", "0.5"),
        MarkerShape::Diamond => XmlNode::new("path").attr("d", "M0,0.5L0.5,1L1,0.5L0.5,0z"),
    };
    symbol.push(body);
    symbol
}

impl SvgDevice {
    pub fn new(canvas: Size, options: SvgOptions) -> Self {
        Self {
            state: DeviceState::new(canvas),
            tessellator: GradientTessellator::new(options.tessellation),
            options,
            text_backend: Box::new(MonospaceTextBackend::default()),
            content: Vec::new(),
            group: None,
            wrapper: (Matrix3::IDENTITY, None),
            images: ResourceTable::new("img"),
            patterns: ResourceTable::new("pattern"),
            clips: ResourceTable::new("clip"),
            markers: Vec::new(),
            fonts: FontRegistry::new(),
        }
    }

    pub fn with_text_backend(mut self, backend: Box<dyn TextBackend>) -> Self {
        self.text_backend = backend;
        self
    }

    fn height(&self) -> f64 {
        self.state.canvas.height
    }

    fn coords(&self, p: Point2) -> String {
        format!("{},{}", fmt_num(p.x), fmt_num(self.height() - p.y))
    }

    /// The current matrix expressed in the flipped SVG frame.
    fn frame_matrix(&self) -> Matrix3 {
        let flip = Matrix3::from_affine([1.0, 0.0, 0.0, -1.0, 0.0, self.height()]);
        flip * self.state.matrix() * flip
    }

    fn emit(&mut self, node: XmlNode) {
        match self.group.as_mut() {
            Some(group) => group.push(node),
            None => self.content.push(node),
        }
    }

    /// Opens the wrapper group. Groups never nest.
    pub(crate) fn push_group(&mut self, group: XmlNode) -> Result<(), RenderError> {
        if self.group.is_some() {
            return Err(RenderError::NestedGroup);
        }
        self.group = Some(group);
        Ok(())
    }

    fn pop_group(&mut self) {
        if let Some(group) = self.group.take() {
            if !group.is_empty() {
                self.content.push(group);
            }
        }
    }

    /// Clip rectangle in root coordinates, undoing the wrapper's transform.
    fn clip_id(&mut self, rect: Rect, frame: &Matrix3) -> String {
        let transform = if frame.is_identity(MATRIX_TOLERANCE) {
            None
        } else {
            frame.inverse().map(|inverse| matrix_attr(&inverse))
        };
        let key = ClipKey {
            x: fmt_num(rect.x),
            y: fmt_num(self.height() - rect.y - rect.height),
            width: fmt_num(rect.width),
            height: fmt_num(rect.height),
            transform,
        };
        self.clips.intern(key).0
    }

    fn sync_group(&mut self) -> Result<(), RenderError> {
        let frame = self.frame_matrix();
        let clip = match self.state.clip {
            Some(rect) => Some(self.clip_id(rect, &frame)),
            None => None,
        };
        if self.wrapper.0.approx_eq(&frame, MATRIX_TOLERANCE) && self.wrapper.1 == clip {
            return Ok(());
        }
        self.pop_group();
        self.wrapper = (frame, clip.clone());

        let identity = frame.is_identity(MATRIX_TOLERANCE);
        if identity && clip.is_none() {
            return Ok(());
        }
        let mut group = XmlNode::new("g");
        if !identity {
            group.set("transform", matrix_attr(&frame));
        }
        if let Some(id) = clip {
            group.set("clip-path", format!("url(#{})", id));
        }
        self.push_group(group)
    }

    fn stroke_width(&self) -> f64 {
        let (wx, wy) = self.state.unscaled_pen_width();
        (wx + wy) * 0.5
    }

    fn apply_pen(&self, node: &mut XmlNode, color: Color) {
        set_stroke(node, color);
        let width = self.stroke_width();
        if (width - 1.0).abs() > 1e-6 {
            node.set("stroke-width", fmt_num(width));
        }
        let dashes = self.state.stipple_dash().unwrap_or_else(|| self.state.pen.line_type.dash_pattern().to_vec());
        if !dashes.is_empty() {
            node.set("stroke-dasharray", dashes.iter().map(|d| fmt_num(*d)).join(","));
        }
    }

    fn image_id(&mut self, image: &ImageData) -> Result<String, RenderError> {
        let embedded = EmbeddedImage::encode(image)?;
        Ok(self.images.intern(embedded).0)
    }

    fn pattern_id(&mut self, texture: &ImageData) -> Result<String, RenderError> {
        let image_id = self.image_id(texture)?;
        let key = PatternKey {
            image_id,
            width: texture.width,
            height: texture.height,
            mode: self.state.brush.texture_properties.mode,
        };
        Ok(self.patterns.intern(key).0)
    }

    /// Brush fill for shapes; a usable texture wins over the color.
    fn apply_brush(&mut self, node: &mut XmlNode) -> Result<(), RenderError> {
        let brush = self.state.brush.clone();
        if let Some(texture) = brush.texture.as_deref() {
            match texture.validate() {
                Ok(()) if !texture.is_empty() => {
                    let id = self.pattern_id(texture)?;
                    node.set("fill", format!("url(#{})", id));
                    return Ok(());
                }
                Ok(()) => {}
                Err(err) => warn!("svg: ignoring texture: {}", err),
            }
        }
        set_fill(node, brush.color);
        Ok(())
    }

    fn stroke_pairs(
        &mut self,
        points: &[Point2],
        colors: Option<&[Color]>,
        pairs: &[(usize, usize)],
        joined: bool,
    ) -> Result<(), RenderError> {
        let pen = self.state.pen;
        if !pen.is_visible() || pairs.is_empty() {
            return Ok(());
        }
        let uniform = colors.map_or(Some(pen.color), uniform_color);
        let Some(color) = uniform else {
            let segments: Vec<_> = pairs
                .iter()
                .map(|&(i, j)| (points[i], color_at(colors, i, pen.color), points[j], color_at(colors, j, pen.color)))
                .collect();
            self.stroke_gradient(&segments);
            return Ok(());
        };
        if color.is_transparent() {
            return Ok(());
        }

        let mut node = if joined {
            XmlNode::new("polyline").attr("points", points.iter().map(|p| self.coords(*p)).join(" "))
        } else {
            let d: String = pairs
                .iter()
                .map(|&(i, j)| format!("M{}L{}", self.coords(points[i]), self.coords(points[j])))
                .collect();
            XmlNode::new("path").attr("d", d)
        };
        node.set("fill", "none");
        self.apply_pen(&mut node, color);
        self.emit(node);
        Ok(())
    }

    /// Splits two-color segments into flat pieces. Subdivision runs on device
    /// coordinates; the pieces are mapped back into user space.
    fn stroke_gradient(&mut self, segments: &[(Point2, Color, Point2, Color)]) {
        let matrix = self.state.matrix();
        let Some(inverse) = matrix.inverse() else {
            warn!("svg: skipping gradient line under a singular matrix");
            return;
        };
        let use_alpha = self.tessellator.options().use_alpha;
        let height = self.height();
        let mut group = XmlNode::new("g").attr("fill", "none");
        let width = self.stroke_width();
        if (width - 1.0).abs() > 1e-6 {
            group.set("stroke-width", fmt_num(width));
        }

        for &(a, ca, b, cb) in segments {
            let (da, db) = (matrix.transform_point(a), matrix.transform_point(b));
            let pieces = self.tessellator.line(Vertex::at(da.x, da.y, 0.0, ca), Vertex::at(db.x, db.y, 0.0, cb));
            for piece in pieces {
                if use_alpha && piece.color.is_transparent() {
                    continue;
                }
                let start = inverse.transform_point(piece.start.xy());
                let end = inverse.transform_point(piece.end.xy());
                let mut line = XmlNode::new("line")
                    .attr("x1", fmt_num(start.x))
                    .attr("y1", fmt_num(height - start.y))
                    .attr("x2", fmt_num(end.x))
                    .attr("y2", fmt_num(height - end.y))
                    .attr("stroke", piece.color.to_hex_rgb());
                if use_alpha {
                    if let Some(alpha) = opacity(piece.color) {
                        line.set("stroke-opacity", alpha);
                    }
                }
                group.push(line);
            }
        }
        if !group.children.is_empty() {
            self.emit(group);
        }
    }

    /// Gouraud fan rooted at the first point, flattened into single-color triangles.
    fn fill_gradient(&mut self, points: &[Point2], colors: Option<&[Color]>) {
        let matrix = self.state.matrix();
        let Some(inverse) = matrix.inverse() else {
            warn!("svg: skipping gradient polygon under a singular matrix");
            return;
        };
        let use_alpha = self.tessellator.options().use_alpha;
        let fallback = self.state.brush.color;
        let vertex = |i: usize| {
            let p = matrix.transform_point(points[i]);
            Vertex::at(p.x, p.y, 0.0, color_at(colors, i, fallback))
        };

        let mut pieces = Vec::new();
        for i in 1..points.len() - 1 {
            pieces.extend(self.tessellator.triangle(vertex(0), vertex(i), vertex(i + 1)));
        }
        debug!("svg: gradient polygon of {} points became {} triangles", points.len(), pieces.len());
        for piece in pieces {
            if use_alpha && piece.color.is_transparent() {
                continue;
            }
            let corners = piece.points.iter().map(|v| self.coords(inverse.transform_point(v.xy()))).join(" ");
            let mut polygon = XmlNode::new("polygon").attr("fill", piece.color.to_hex_rgb());
            if use_alpha {
                if let Some(alpha) = opacity(piece.color) {
                    polygon.set("fill-opacity", alpha);
                }
            }
            polygon.set("points", corners);
            polygon.set("shape-rendering", "crispEdges");
            self.emit(polygon);
        }
    }

    fn marker_id(&mut self, shape: MarkerShape) -> String {
        if !self.markers.contains(&shape) {
            self.markers.push(shape);
        }
        format!("marker-{}", marker_name(shape))
    }

    fn text_transform(&self, start: Point2, orientation: f64) -> String {
        let mut transform = format!("translate({},{})", fmt_num(start.x), fmt_num(self.height() - start.y));
        if orientation.abs() > 1e-9 {
            transform.push_str(&format!(" rotate({})", fmt_num(-orientation)));
        }
        transform
    }

    fn text_layout(&self, text: &str) -> Option<TextLayout> {
        let prop = self.state.text;
        let (_, sy) = self.state.matrix().scale_factors();
        let font_size = if sy.abs() > 1e-12 { prop.size / sy.abs() } else { prop.size };
        match TextLayout::new(text, &prop, font_size, self.text_backend.as_ref()) {
            Ok(layout) if !layout.lines.is_empty() => Some(layout),
            Ok(_) => None,
            Err(err) => {
                warn!("svg: skipping text {:?}: {}", text, err);
                None
            }
        }
    }

    fn draw_text_native(&mut self, at: Point2, text: &str) {
        let Some(layout) = self.text_layout(text) else {
            return;
        };
        let prop = self.state.text;
        let family = if self.options.embed_fonts {
            let mut id = String::new();
            for line in &layout.lines {
                id = self.fonts.register(&prop, &line.text);
            }
            id
        } else {
            prop.family.name().to_string()
        };

        let mut node = XmlNode::new("text")
            .attr("transform", self.text_transform(layout.start_point(at), prop.orientation))
            .attr("font-family", family)
            .attr("font-size", fmt_num(layout.font_size))
            .attr("xml:space", "preserve");
        if prop.bold {
            node.set("font-weight", "bold");
        }
        if prop.italic {
            node.set("font-style", "italic");
        }
        set_fill(&mut node, prop.color);

        let offsets = layout.line_offsets();
        if let [line] = layout.lines.as_slice() {
            if offsets[0] != 0.0 {
                node.set("x", fmt_num(offsets[0]));
            }
            node.text = Some(line.text.clone());
        } else {
            for (i, (line, offset)) in layout.lines.iter().zip(offsets).enumerate() {
                node.push(
                    XmlNode::new("tspan")
                        .attr("x", fmt_num(offset))
                        .attr("y", fmt_num(layout.leading * i as f64))
                        .with_text(line.text.clone()),
                );
            }
        }
        self.emit(node);
    }

    fn draw_text_outline(&mut self, at: Point2, text: &str) -> Result<(), RenderError> {
        let Some(layout) = self.text_layout(text) else {
            return Ok(());
        };
        let prop = self.state.text;
        let mut query = prop.font_query();
        query.size = layout.font_size;

        let mut d = String::new();
        for (i, (line, offset)) in layout.lines.iter().zip(layout.line_offsets()).enumerate() {
            let glyphs = match self.text_backend.string_to_path(&line.text, &query) {
                Ok(path) => path,
                Err(err) => {
                    warn!("svg: skipping text {:?}: {}", text, err);
                    return Ok(());
                }
            };
            let dy = layout.leading * i as f64;
            d.push_str(&path_data(&glyphs, |v| (offset + v.x, dy - v.y))?);
        }
        if d.is_empty() {
            return Ok(());
        }
        let mut node = XmlNode::new("path")
            .attr("transform", self.text_transform(layout.start_point(at), prop.orientation))
            .attr("d", d);
        set_fill(&mut node, prop.color);
        self.emit(node);
        Ok(())
    }

    fn ellipse_node(&self, center: Point2, rx: f64, ry: f64) -> XmlNode {
        let (cx, cy) = (fmt_num(center.x), fmt_num(self.height() - center.y));
        if (rx - ry).abs() < 1e-9 {
            XmlNode::new("circle").attr("cx", cx).attr("cy", cy).attr("r", fmt_num(rx))
        } else {
            XmlNode::new("ellipse").attr("cx", cx).attr("cy", cy).attr("rx", fmt_num(rx)).attr("ry", fmt_num(ry))
        }
    }

    /// A closed ellipse as two half arcs, for rings.
    fn ellipse_data(&self, center: Point2, rx: f64, ry: f64) -> String {
        let radii = format!("{},{}", fmt_num(rx), fmt_num(ry));
        format!(
            "M{}A{} 0 1 0 {}A{} 0 1 0 {}z",
            self.coords(Point2::new(center.x + rx, center.y)),
            radii,
            self.coords(Point2::new(center.x - rx, center.y)),
            radii,
            self.coords(Point2::new(center.x + rx, center.y)),
        )
    }

    fn definitions(&self) -> XmlNode {
        let mut defs = XmlNode::new("defs");
        if self.options.embed_fonts {
            defs.children.extend(self.fonts.to_nodes(self.text_backend.as_ref()));
        }
        for (image, id) in self.images.iter() {
            defs.push(
                XmlNode::new("image")
                    .attr("id", id)
                    .attr("width", image.width.to_string())
                    .attr("height", image.height.to_string())
                    .attr("xlink:href", image.data_uri.clone()),
            );
        }
        for (pattern, id) in self.patterns.iter() {
            let (w, h) = (pattern.width.to_string(), pattern.height.to_string());
            let mut node = XmlNode::new("pattern").attr("id", id);
            match pattern.mode {
                TextureMode::Repeat => {
                    node.set("width", w.clone());
                    node.set("height", h.clone());
                    node.set("patternUnits", "userSpaceOnUse");
                }
                TextureMode::Stretch => {
                    node.set("width", "1");
                    node.set("height", "1");
                    node.set("viewBox", format!("0 0 {} {}", w, h));
                    node.set("preserveAspectRatio", "none");
                }
            }
            node.push(
                XmlNode::new("use")
                    .attr("width", w)
                    .attr("height", h)
                    .attr("xlink:href", format!("#{}", pattern.image_id)),
            );
            defs.push(node);
        }
        for (clip, id) in self.clips.iter() {
            let mut rect = XmlNode::new("rect")
                .attr("fill", "#000")
                .attr("x", clip.x.clone())
                .attr("y", clip.y.clone())
                .attr("width", clip.width.clone())
                .attr("height", clip.height.clone());
            if let Some(transform) = &clip.transform {
                rect.set("transform", transform.clone());
            }
            let mut node = XmlNode::new("clipPath").attr("id", id);
            node.push(rect);
            defs.push(node);
        }
        defs.children.extend(self.markers.iter().map(|shape| marker_symbol(*shape)));
        defs
    }
}

impl VectorDevice for SvgDevice {
    fn name(&self) -> &'static str {
        "svg"
    }

    fn state(&self) -> &DeviceState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut DeviceState {
        &mut self.state
    }

    fn begin(&mut self) -> Result<(), RenderError> {
        self.state.reset();
        self.content.clear();
        self.group = None;
        self.wrapper = (Matrix3::IDENTITY, None);
        self.images.clear();
        self.patterns.clear();
        self.clips.clear();
        self.markers.clear();
        self.fonts.clear();
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<Vec<u8>, RenderError> {
        self.pop_group();
        let Size { width, height } = self.state.canvas;
        let info = &self.options.info;
        let mut root = XmlNode::new("svg")
            .attr("xmlns", SVG_NS)
            .attr("xmlns:xlink", XLINK_NS)
            .attr("version", "1.1")
            .attr("width", fmt_num(width))
            .attr("height", fmt_num(height))
            .attr("viewBox", format!("0 0 {} {}", fmt_num(width), fmt_num(height)));
        root.push(XmlNode::new("title").with_text(info.title.clone()));
        root.push(XmlNode::new("desc").with_text(format!(
            "Creator: {}; CreationDate: {}",
            info.creator,
            info.timestamp().format("%Y-%m-%dT%H:%M:%SZ")
        )));
        let defs = self.definitions();
        if !defs.is_empty() {
            root.push(defs);
        }
        debug!(
            "svg: {} top-level nodes, {} images, {} patterns, {} clips",
            self.content.len(),
            self.images.len(),
            self.patterns.len(),
            self.clips.len()
        );
        root.children.append(&mut self.content);
        root.to_document()
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
        if points.is_empty() {
            return Ok(());
        }
        let (wx, wy) = self.state.unscaled_pen_width();
        let height = self.height();
        let pen = self.state.pen.color;
        let corner = |p: &Point2| (fmt_num(p.x - wx * 0.5), fmt_num(height - p.y - wy * 0.5));

        if let Some(color) = colors.map_or(Some(pen), uniform_color) {
            if color.is_transparent() {
                return Ok(());
            }
            let d: String = points
                .iter()
                .map(|p| {
                    let (x, y) = corner(p);
                    format!("M{},{}h{}v{}h{}z", x, y, fmt_num(wx), fmt_num(wy), fmt_num(-wx))
                })
                .collect();
            let mut node = XmlNode::new("path").attr("d", d);
            set_fill(&mut node, color);
            self.emit(node);
            return Ok(());
        }

        for (i, p) in points.iter().enumerate() {
            let color = color_at(colors, i, pen);
            if color.is_transparent() {
                continue;
            }
            let (x, y) = corner(p);
            let mut rect = XmlNode::new("rect")
                .attr("x", x)
                .attr("y", y)
                .attr("width", fmt_num(wx))
                .attr("height", fmt_num(wy));
            set_fill(&mut rect, color);
            self.emit(rect);
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
        let size = self.stroke_width();
        if points.is_empty() || size <= 0.0 {
            return Ok(());
        }
        let id = self.marker_id(shape);
        let height = self.height();
        let stroke_width = fmt_num((if highlight { 1.5 } else { 1.0 }) / size);
        let paint = |node: &mut XmlNode, color: Color| {
            if shape.is_stroked() {
                set_stroke(node, color);
                node.set("stroke-width", stroke_width.clone());
                node.set("fill", "none");
            } else {
                set_fill(node, color);
            }
        };
        let place = |p: &Point2| {
            XmlNode::new("use")
                .attr("x", fmt_num(p.x - size * 0.5))
                .attr("y", fmt_num(height - p.y - size * 0.5))
                .attr("width", fmt_num(size))
                .attr("height", fmt_num(size))
                .attr("xlink:href", format!("#{}", id))
        };

        let pen = self.state.pen.color;
        if let Some(color) = colors.map_or(Some(pen), uniform_color) {
            if color.is_transparent() {
                return Ok(());
            }
            let mut group = XmlNode::new("g");
            paint(&mut group, color);
            group.children.extend(points.iter().map(place));
            self.emit(group);
            return Ok(());
        }
        for (i, p) in points.iter().enumerate() {
            let color = color_at(colors, i, pen);
            if color.is_transparent() {
                continue;
            }
            let mut node = place(p);
            paint(&mut node, color);
            self.emit(node);
        }
        Ok(())
    }

    fn draw_polygon(&mut self, points: &[Point2], colors: Option<&[Color]>) -> Result<(), RenderError> {
        if points.len() < 3 {
            return Ok(());
        }
        let brush = self.state.brush.clone();
        let textured = brush.texture.as_deref().is_some_and(|t| t.validate().is_ok() && !t.is_empty());
        let d = format!("M{}z", points.iter().map(|p| self.coords(*p)).join("L"));
        if textured {
            let mut node = XmlNode::new("path").attr("d", d);
            self.apply_brush(&mut node)?;
            self.emit(node);
            return Ok(());
        }

        let Some(color) = colors.map_or(Some(brush.color), uniform_color) else {
            self.fill_gradient(points, colors);
            return Ok(());
        };
        if color.is_transparent() {
            return Ok(());
        }
        let mut node = XmlNode::new("path").attr("d", d);
        set_fill(&mut node, color);
        self.emit(node);
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
        if !self.state.brush.is_visible() {
            return Ok(());
        }
        let (start, stop) = if stop < start { (stop, start) } else { (start, stop) };
        let sweep = stop - start;
        let hollow = inner.0 > 0.0 || inner.1 > 0.0;

        let mut node = if sweep >= FULL_WEDGE && !hollow {
            self.ellipse_node(center, outer.0, outer.1)
        } else if sweep >= FULL_WEDGE {
            let d = self.ellipse_data(center, outer.0, outer.1) + &self.ellipse_data(center, inner.0, inner.1);
            XmlNode::new("path").attr("d", d).attr("fill-rule", "evenodd")
        } else {
            let large = if sweep >= 180.0 { 1 } else { 0 };
            let at = |(rx, ry): (f64, f64), angle: f64| self.coords(ellipse_point(center, rx, ry, angle));
            let outer_radii = format!("{},{}", fmt_num(outer.0), fmt_num(outer.1));
            let d = if hollow {
                format!(
                    "M{}A{} 0 {} 0 {}L{}A{},{} 0 {} 1 {}z",
                    at(outer, start),
                    outer_radii,
                    large,
                    at(outer, stop),
                    at(inner, stop),
                    fmt_num(inner.0),
                    fmt_num(inner.1),
                    large,
                    at(inner, start)
                )
            } else {
                format!(
                    "M{}L{}A{} 0 {} 0 {}z",
                    self.coords(center),
                    at(outer, start),
                    outer_radii,
                    large,
                    at(outer, stop)
                )
            };
            let mut path = XmlNode::new("path").attr("d", d);
            if hollow {
                path.set("fill-rule", "evenodd");
            }
            path
        };
        self.apply_brush(&mut node)?;
        self.emit(node);
        Ok(())
    }

    fn draw_elliptic_arc(&mut self, center: Point2, rx: f64, ry: f64, start: f64, stop: f64) -> Result<(), RenderError> {
        let pen = self.state.pen;
        let filled = self.state.brush.is_visible();
        if !pen.is_visible() && !filled {
            return Ok(());
        }
        let (start, stop) = if stop < start { (stop, start) } else { (start, stop) };
        let sweep = stop - start;

        let mut node = if sweep >= 360.0 {
            self.ellipse_node(center, rx, ry)
        } else {
            let d = format!(
                "M{}A{},{} 0 {} 0 {}",
                self.coords(ellipse_point(center, rx, ry, start)),
                fmt_num(rx),
                fmt_num(ry),
                if sweep >= 180.0 { 1 } else { 0 },
                self.coords(ellipse_point(center, rx, ry, stop))
            );
            XmlNode::new("path").attr("d", d)
        };
        if filled {
            self.apply_brush(&mut node)?;
        } else {
            node.set("fill", "none");
        }
        if pen.is_visible() {
            self.apply_pen(&mut node, pen.color);
        }
        self.emit(node);
        Ok(())
    }

    fn draw_string(&mut self, at: Point2, text: &str) -> Result<(), RenderError> {
        if text.trim().is_empty() || self.state.text.color.is_transparent() {
            return Ok(());
        }
        if self.options.text_as_paths {
            self.draw_text_outline(at, text)
        } else {
            self.draw_text_native(at, text);
            Ok(())
        }
    }

    fn draw_path(&mut self, path: &Path, origin: Point2) -> Result<(), RenderError> {
        if path.is_empty() || !self.state.brush.is_visible() {
            return Ok(());
        }
        let height = self.height();
        let d = path_data(path, |v| (v.x + origin.x, height - (v.y + origin.y)))?;
        let mut node = XmlNode::new("path").attr("d", d);
        self.apply_brush(&mut node)?;
        self.emit(node);
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
        let id = self.image_id(image)?;
        let placement = Matrix3::from_affine([
            rect.width / image.width as f64,
            0.0,
            0.0,
            rect.height / image.height as f64,
            rect.x,
            self.height() - rect.y - rect.height,
        ]);
        let node = XmlNode::new("use")
            .attr("xlink:href", format!("#{}", id))
            .attr("transform", matrix_attr(&placement));
        self.emit(node);
        Ok(())
    }

    fn apply_transform(&mut self) -> Result<(), RenderError> {
        self.sync_group()
    }

    fn set_clip(&mut self, clip: Option<Rect>) -> Result<(), RenderError> {
        self.state.clip = clip;
        self.sync_group()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;
    use vexport_capture::{Primitive, Stipple};
    use vexport_render_core::{Brush, LineType, Pen, TextureProperties};

    fn options() -> SvgOptions {
        let info = DocumentInfo {
            title: "scene".into(),
            creator: "tests".into(),
            creation_date: chrono::Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single(),
        };
        SvgOptions { info, ..SvgOptions::default() }
    }

    fn render_with(options: SvgOptions, draw: impl FnOnce(&mut SvgDevice)) -> String {
        let mut device = Box::new(SvgDevice::new(Size::new(200.0, 100.0), options));
        device.begin().unwrap();
        draw(&mut device);
        String::from_utf8(device.finish().unwrap()).unwrap()
    }

    fn render(draw: impl FnOnce(&mut SvgDevice)) -> String {
        render_with(options(), draw)
    }

    fn elements<'a>(doc: &'a roxmltree::Document<'a>, tag: &str) -> Vec<roxmltree::Node<'a, 'a>> {
        doc.descendants().filter(|n| n.tag_name().name() == tag).collect()
    }

    fn href<'a>(node: &roxmltree::Node<'a, 'a>) -> Option<&'a str> {
        node.attributes().find(|a| a.name() == "href").map(|a| a.value())
    }

    fn triangle() -> [Point2; 3] {
        [Point2::new(10.0, 10.0), Point2::new(90.0, 10.0), Point2::new(50.0, 80.0)]
    }

    #[test]
    fn test_document_header() {
        let svg = render(|_| {});
        let doc = roxmltree::Document::parse(&svg).unwrap();
        let root = doc.root_element();
        assert_eq!(root.attribute("viewBox"), Some("0 0 200 100"));
        assert_eq!(elements(&doc, "title")[0].text(), Some("scene"));
        assert!(elements(&doc, "desc")[0].text().unwrap().contains("2024-05-01T12:00:00Z"));
        assert!(elements(&doc, "defs").is_empty());
    }

    #[test]
    fn test_points_are_flipped_without_wrapper() {
        let svg = render(|d| {
            d.draw_poly(&[Point2::new(0.0, 0.0), Point2::new(10.0, 10.0)], None).unwrap();
        });
        let doc = roxmltree::Document::parse(&svg).unwrap();
        assert!(elements(&doc, "g").is_empty());
        let line = &elements(&doc, "polyline")[0];
        assert_eq!(line.attribute("points"), Some("0,100 10,90"));
        assert_eq!(line.attribute("stroke"), Some("#000000"));
        assert_eq!(line.attribute("fill"), Some("none"));
    }

    #[test]
    fn test_transform_and_clip_wrappers() {
        let svg = render(|d| {
            d.set_matrix(Matrix3::translation(10.0, 0.0)).unwrap();
            d.set_clip(Some(Rect::new(0.0, 0.0, 50.0, 50.0))).unwrap();
            d.draw_polygon(&triangle(), None).unwrap();
            d.draw_polygon(&triangle(), None).unwrap();
            d.multiply_matrix(Matrix3::scale(2.0, 2.0)).unwrap();
            d.draw_polygon(&triangle(), None).unwrap();
        });
        let doc = roxmltree::Document::parse(&svg).unwrap();
        let groups = elements(&doc, "g");
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].attribute("transform"), Some("matrix(1,0,0,1,10,0)"));
        assert_eq!(groups[0].attribute("clip-path"), Some("url(#clip1)"));
        assert_eq!(groups[0].children().filter(|n| n.is_element()).count(), 2);
        assert_eq!(groups[1].attribute("clip-path"), Some("url(#clip2)"));

        let clips = elements(&doc, "clipPath");
        assert_eq!(clips.len(), 2);
        let rect = clips[0].first_element_child().unwrap();
        assert_eq!(rect.attribute("y"), Some("50"));
        assert_eq!(rect.attribute("transform"), Some("matrix(1,0,0,1,-10,0)"));
    }

    #[test]
    fn test_nested_group_is_rejected() {
        let mut device = SvgDevice::new(Size::new(10.0, 10.0), options());
        device.push_group(XmlNode::new("g")).unwrap();
        assert!(matches!(device.push_group(XmlNode::new("g")), Err(RenderError::NestedGroup)));
    }

    #[test]
    fn test_identical_images_share_one_definition() {
        let image = ImageData::rgb(2, 1, vec![255, 0, 0, 0, 0, 255]);
        let svg = render(|d| {
            d.draw_image(Rect::new(0.0, 0.0, 20.0, 10.0), &image).unwrap();
            d.draw_image(Rect::new(50.0, 50.0, 40.0, 20.0), &image.clone()).unwrap();
            d.draw_image(Rect::new(0.0, 0.0, 1.0, 1.0), &ImageData::rgb(1, 1, vec![1])).unwrap();
        });
        let doc = roxmltree::Document::parse(&svg).unwrap();
        let images = elements(&doc, "image");
        assert_eq!(images.len(), 1);
        assert!(href(&images[0]).unwrap().starts_with("data:image/png;base64,"));
        let uses = elements(&doc, "use");
        assert_eq!(uses.len(), 2);
        assert!(uses.iter().all(|u| href(u) == Some("#img1")));
        assert_eq!(uses[0].attribute("transform"), Some("matrix(10,0,0,10,0,90)"));
    }

    #[test]
    fn test_invisible_drawing_is_culled() {
        let svg = render(|d| {
            d.set_pen(Pen { line_type: LineType::NoPen, ..Pen::default() });
            d.draw_poly(&triangle(), None).unwrap();
            d.set_pen(Pen { color: Color::TRANSPARENT, ..Pen::default() });
            d.draw_lines(&triangle()[..2], None).unwrap();
            d.draw_markers(MarkerShape::Cross, false, &triangle(), None).unwrap();
            d.set_brush(Brush::solid(Color::TRANSPARENT));
            d.draw_polygon(&triangle(), None).unwrap();
            d.draw_ellipse_wedge(Point2::new(50.0, 50.0), (10.0, 10.0), (0.0, 0.0), 0.0, 90.0).unwrap();
            d.draw_elliptic_arc(Point2::new(50.0, 50.0), 10.0, 10.0, 0.0, 90.0).unwrap();
        });
        let doc = roxmltree::Document::parse(&svg).unwrap();
        let drawn: Vec<_> = doc
            .root_element()
            .children()
            .filter(|n| n.is_element() && !matches!(n.tag_name().name(), "title" | "desc" | "defs"))
            .collect();
        assert!(drawn.is_empty());
    }

    #[test]
    fn test_pen_width_and_dashes() {
        let svg = render(|d| {
            d.set_pen(Pen { width: 2.0, line_type: LineType::Dash, color: Color::rgba(255, 0, 0, 128) });
            d.draw_lines(&[Point2::new(0.0, 0.0), Point2::new(10.0, 0.0)], None).unwrap();
        });
        let doc = roxmltree::Document::parse(&svg).unwrap();
        let path = &elements(&doc, "path")[0];
        assert_eq!(path.attribute("d"), Some("M0,100L10,100"));
        assert_eq!(path.attribute("stroke-width"), Some("2"));
        assert_eq!(path.attribute("stroke-dasharray"), Some("8"));
        assert_eq!(path.attribute("stroke-opacity"), Some("0.502"));
    }

    #[test]
    fn test_stippled_line_is_dashed() {
        let green = Color::rgb(0, 255, 0);
        let svg = render(|d| {
            d.draw_primitive(&Primitive::Line {
                vertices: [Vertex::at(0.0, 0.0, 0.0, green), Vertex::at(10.0, 0.0, 0.0, green)],
                width: 1.0,
                stipple: Some(Stipple { pattern: 0x00FF, factor: 2 }),
            })
            .unwrap();
            d.draw_poly(&[Point2::new(0.0, 5.0), Point2::new(10.0, 5.0)], None).unwrap();
        });
        let doc = roxmltree::Document::parse(&svg).unwrap();
        let lines = elements(&doc, "polyline");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].attribute("stroke-dasharray"), Some("16,16"));
        assert_eq!(lines[0].attribute("stroke"), Some("#00ff00"));
        assert_eq!(lines[1].attribute("stroke-dasharray"), None);
    }

    #[test]
    fn test_gradient_line_is_split() {
        let svg = render(|d| {
            let points = [Point2::new(0.0, 50.0), Point2::new(100.0, 50.0)];
            d.draw_poly(&points, Some(&[Color::rgb(255, 0, 0), Color::rgb(0, 0, 255)])).unwrap();
        });
        let doc = roxmltree::Document::parse(&svg).unwrap();
        let lines = elements(&doc, "line");
        assert!(lines.len() > 4);
        assert_eq!(lines[0].attribute("x1"), Some("0"));
        assert_eq!(lines[0].attribute("y1"), Some("50"));
        assert_ne!(lines[0].attribute("stroke"), lines[lines.len() - 1].attribute("stroke"));
    }

    #[test]
    fn test_gradient_polygon_is_flattened() {
        let colors = [Color::rgb(255, 0, 0), Color::rgb(0, 255, 0), Color::rgb(0, 0, 255)];
        let svg = render(|d| {
            d.draw_polygon(&triangle(), Some(&colors)).unwrap();
            d.draw_polygon(&triangle(), Some(&[Color::rgb(1, 2, 3); 3])).unwrap();
        });
        let doc = roxmltree::Document::parse(&svg).unwrap();
        let pieces = elements(&doc, "polygon");
        assert!(pieces.len() > 1);
        assert!(pieces.iter().all(|p| p.attribute("shape-rendering") == Some("crispEdges")));
        let flat: Vec<_> = elements(&doc, "path");
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].attribute("fill"), Some("#010203"));
    }

    #[test]
    fn test_markers_share_a_symbol() {
        let points = [Point2::new(10.0, 10.0), Point2::new(20.0, 20.0)];
        let svg = render(|d| {
            d.set_pen(Pen { width: 4.0, ..Pen::default() });
            d.draw_markers(MarkerShape::Cross, true, &points, None).unwrap();
            d.draw_markers(MarkerShape::Cross, false, &points, Some(&[Color::rgb(255, 0, 0), Color::WHITE])).unwrap();
        });
        let doc = roxmltree::Document::parse(&svg).unwrap();
        let symbols = elements(&doc, "symbol");
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].attribute("id"), Some("marker-cross"));
        let uses = elements(&doc, "use");
        assert_eq!(uses.len(), 4);
        assert_eq!(uses[0].attribute("x"), Some("8"));
        assert_eq!(uses[0].attribute("y"), Some("88"));
        let group = &elements(&doc, "g")[0];
        assert_eq!(group.attribute("stroke-width"), Some("0.375"));
        assert_eq!(uses[2].attribute("stroke"), Some("#ff0000"));
    }

    #[test]
    fn test_points_of_one_color_share_a_path() {
        let points = [Point2::new(10.0, 10.0), Point2::new(20.0, 20.0)];
        let svg = render(|d| {
            d.set_pen(Pen { width: 2.0, ..Pen::default() });
            d.draw_points(&points, None).unwrap();
            d.draw_points(&points, Some(&[Color::rgb(255, 0, 0), Color::rgb(0, 255, 0)])).unwrap();
        });
        let doc = roxmltree::Document::parse(&svg).unwrap();
        assert_eq!(elements(&doc, "path")[0].attribute("d"), Some("M9,89h2v2h-2zM19,79h2v2h-2z"));
        assert_eq!(elements(&doc, "rect").len(), 2);
    }

    #[test]
    fn test_texture_fill_uses_pattern() {
        let texture = Arc::new(ImageData::rgb(2, 2, vec![0; 12]));
        let svg = render(|d| {
            d.set_brush(Brush {
                texture: Some(texture.clone()),
                texture_properties: TextureProperties { mode: TextureMode::Repeat, smooth: false },
                ..Brush::default()
            });
            d.draw_polygon(&triangle(), Some(&[Color::rgb(255, 0, 0), Color::WHITE, Color::BLACK])).unwrap();
        });
        let doc = roxmltree::Document::parse(&svg).unwrap();
        let pattern = &elements(&doc, "pattern")[0];
        assert_eq!(pattern.attribute("patternUnits"), Some("userSpaceOnUse"));
        assert_eq!(pattern.attribute("width"), Some("2"));
        assert_eq!(elements(&doc, "path")[0].attribute("fill"), Some("url(#pattern1)"));
        assert!(elements(&doc, "polygon").is_empty());
    }

    #[test]
    fn test_wedges_and_rings() {
        let center = Point2::new(50.0, 50.0);
        let svg = render(|d| {
            d.set_brush(Brush::solid(Color::rgb(0, 0, 255)));
            d.draw_ellipse_wedge(center, (10.0, 10.0), (0.0, 0.0), 0.0, 360.0).unwrap();
            d.draw_ellipse_wedge(center, (10.0, 10.0), (5.0, 5.0), 0.0, 360.0).unwrap();
            d.draw_ellipse_wedge(center, (10.0, 5.0), (0.0, 0.0), 0.0, 90.0).unwrap();
        });
        let doc = roxmltree::Document::parse(&svg).unwrap();
        assert_eq!(elements(&doc, "circle").len(), 1);
        let paths = elements(&doc, "path");
        assert_eq!(paths[0].attribute("fill-rule"), Some("evenodd"));
        assert_eq!(paths[1].attribute("d"), Some("M50,50L60,50A10,5 0 0 0 50,45z"));
    }

    #[test]
    fn test_arc_is_stroked_and_filled() {
        let svg = render(|d| {
            d.set_brush(Brush::solid(Color::TRANSPARENT));
            d.draw_elliptic_arc(Point2::new(50.0, 50.0), 10.0, 10.0, 0.0, 180.0).unwrap();
        });
        let doc = roxmltree::Document::parse(&svg).unwrap();
        let arc = &elements(&doc, "path")[0];
        assert_eq!(arc.attribute("d"), Some("M60,50A10,10 0 1 0 40,50"));
        assert_eq!(arc.attribute("fill"), Some("none"));
        assert_eq!(arc.attribute("stroke"), Some("#000000"));
    }

    #[test]
    fn test_multi_line_text_uses_tspans() {
        let svg = render(|d| {
            d.draw_string(Point2::new(20.0, 20.0), "ab\ncd").unwrap();
            d.draw_string(Point2::new(20.0, 20.0), "single").unwrap();
        });
        let doc = roxmltree::Document::parse(&svg).unwrap();
        let texts = elements(&doc, "text");
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[0].children().filter(|n| n.tag_name().name() == "tspan").count(), 2);
        assert_eq!(texts[1].text(), Some("single"));
        assert!(texts[0].attribute("transform").unwrap().starts_with("translate("));
    }

    #[test]
    fn test_embedded_fonts_are_defined() {
        let options = SvgOptions { embed_fonts: true, ..options() };
        let svg = render_with(options, |d| {
            d.draw_string(Point2::new(20.0, 20.0), "hi").unwrap();
        });
        let doc = roxmltree::Document::parse(&svg).unwrap();
        let font = &elements(&doc, "font")[0];
        let id = font.attribute("id").unwrap();
        assert_eq!(elements(&doc, "text")[0].attribute("font-family"), Some(id));
        assert_eq!(elements(&doc, "glyph").len(), 2);
    }

    #[test]
    fn test_outline_text_without_outlines_is_skipped() {
        let options = SvgOptions { text_as_paths: true, ..options() };
        let svg = render_with(options, |d| {
            d.draw_string(Point2::new(20.0, 20.0), "hi").unwrap();
        });
        let doc = roxmltree::Document::parse(&svg).unwrap();
        assert!(elements(&doc, "path").is_empty());
        assert!(elements(&doc, "text").is_empty());
    }
}
