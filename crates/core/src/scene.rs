//! Scenes the exporter drives.
//!
//! A [`Scene`] knows how to show or hide its raster-only content for each
//! export phase and how to replay itself into an [`ExportContext`]. [`JsonScene`]
//! is a declarative scene read from JSON, used by the `vexport` binary.

use crate::context::ExportContext;
use crate::error::ExportError;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path as FsPath;
use std::sync::Arc;
use vexport_capture::Colors;
use vexport_path::Path;
use vexport_projector::{Projector, Viewport};
use vexport_render_core::{Brush, ImageData, MarkerShape, Pen, TextProperty, TextureProperties, VectorDevice};
use vexport_types::{Color, Matrix3, Matrix4, Point2, Rect, Size, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportPhase {
    /// Off-screen render of the content that cannot be vectorized.
    Background,
    /// Vector capture; raster-only content already went into the background.
    Capture,
    /// Vector capture of everything, raster content embedded as images.
    CaptureAll,
}

pub trait Scene {
    fn canvas(&self) -> Size;

    /// Camera used to capture 3D content.
    fn projector(&self) -> Projector {
        let canvas = self.canvas();
        Projector::identity(Viewport::sized(canvas.width, canvas.height))
    }

    fn is_empty(&self) -> bool;

    /// True when some content can only be rasterized.
    fn has_raster_content(&self) -> bool {
        false
    }

    fn background_color(&self) -> Option<Color> {
        None
    }

    /// Shows and hides items for `phase`.
    fn prepare(&mut self, phase: ExportPhase);

    /// Undoes every visibility change made by [`Scene::prepare`].
    fn restore(&mut self);

    /// Renders the visible content off-screen.
    fn rasterize(&mut self) -> Result<ImageData, ExportError>;

    /// Replays the visible content into `ctx`.
    fn render(&mut self, ctx: &mut ExportContext) -> Result<(), ExportError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MeshTopology {
    Points,
    Lines,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
    Polygon,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PathStep {
    MoveTo([f64; 2]),
    LineTo([f64; 2]),
    ConicTo([f64; 4]),
    CubicTo([f64; 6]),
}

fn transparent() -> Color {
    Color::TRANSPARENT
}

fn unit_size() -> f64 {
    1.0
}

/// One drawable or state change. 2D items are in device space; meshes are in
/// world space and go through the scene camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "kebab-case")]
pub enum SceneItem {
    Polyline {
        points: Vec<Point2>,
        #[serde(default)]
        colors: Option<Vec<Color>>,
        #[serde(default)]
        pen: Pen,
    },
    Lines {
        points: Vec<Point2>,
        #[serde(default)]
        colors: Option<Vec<Color>>,
        #[serde(default)]
        pen: Pen,
    },
    Points {
        points: Vec<Point2>,
        #[serde(default)]
        colors: Option<Vec<Color>>,
        #[serde(default)]
        pen: Pen,
    },
    Markers {
        #[serde(default)]
        shape: MarkerShape,
        #[serde(default)]
        highlight: bool,
        points: Vec<Point2>,
        #[serde(default)]
        colors: Option<Vec<Color>>,
        #[serde(default)]
        pen: Pen,
    },
    Polygon {
        points: Vec<Point2>,
        #[serde(default)]
        colors: Option<Vec<Color>>,
        #[serde(default)]
        fill: Color,
        #[serde(default)]
        texture: Option<ImageData>,
        #[serde(default)]
        texture_properties: TextureProperties,
    },
    Wedge {
        center: Point2,
        outer: [f64; 2],
        #[serde(default)]
        inner: [f64; 2],
        start: f64,
        stop: f64,
        #[serde(default)]
        fill: Color,
    },
    Arc {
        center: Point2,
        radii: [f64; 2],
        start: f64,
        stop: f64,
        #[serde(default)]
        pen: Pen,
        #[serde(default = "transparent")]
        fill: Color,
    },
    Text {
        at: Point2,
        text: String,
        #[serde(default)]
        property: TextProperty,
    },
    Path {
        steps: Vec<PathStep>,
        #[serde(default)]
        origin: Point2,
        #[serde(default)]
        fill: Color,
    },
    Image {
        rect: Rect,
        image: ImageData,
    },
    Mesh {
        topology: MeshTopology,
        positions: Vec<Vec3>,
        #[serde(default)]
        colors: Option<Vec<Color>>,
        #[serde(default)]
        color: Color,
        /// Point size or line width before the export factors apply.
        #[serde(default = "unit_size")]
        size: f64,
        #[serde(default)]
        actor: Option<Matrix4>,
    },
    /// Pre-rendered content that cannot be vectorized, covering the canvas.
    Raster {
        image: ImageData,
    },
    /// Sets the device matrix, `[a b c d e f]`.
    Transform {
        matrix: [f64; 6],
    },
    Clip {
        #[serde(default)]
        rect: Option<Rect>,
    },
}

impl SceneItem {
    pub fn is_raster_only(&self) -> bool {
        matches!(self, SceneItem::Raster { .. })
    }

    fn is_mesh(&self) -> bool {
        matches!(self, SceneItem::Mesh { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Camera {
    pub projection: Matrix4,
    pub model_view: Matrix4,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct JsonScene {
    pub width: f64,
    pub height: f64,
    pub background: Option<Color>,
    pub camera: Camera,
    pub items: Vec<SceneItem>,
    #[serde(skip)]
    hidden: Vec<bool>,
}

impl Default for JsonScene {
    fn default() -> Self {
        Self { width: 400.0, height: 300.0, background: None, camera: Camera::default(), items: Vec::new(), hidden: Vec::new() }
    }
}

fn build_path(steps: &[PathStep]) -> Path {
    let mut path = Path::with_capacity(steps.len() * 3);
    for step in steps {
        match *step {
            PathStep::MoveTo([x, y]) => {
                path.move_to(x, y);
            }
            PathStep::LineTo([x, y]) => {
                path.line_to(x, y);
            }
            PathStep::ConicTo([cx, cy, x, y]) => {
                path.conic_to(Point2::new(cx, cy), Point2::new(x, y));
            }
            PathStep::CubicTo([c1x, c1y, c2x, c2y, x, y]) => {
                path.cubic_to(Point2::new(c1x, c1y), Point2::new(c2x, c2y), Point2::new(x, y));
            }
        }
    }
    path
}

impl JsonScene {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height, ..Self::default() }
    }

    pub fn with_item(mut self, item: SceneItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn from_json(json: &str) -> Result<Self, ExportError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file<P: AsRef<FsPath>>(path: P) -> Result<Self, ExportError> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// True when no phase has hidden anything.
    pub fn is_restored(&self) -> bool {
        self.hidden.iter().all(|hidden| !hidden)
    }

    fn is_visible(&self, index: usize) -> bool {
        !self.hidden.get(index).copied().unwrap_or(false)
    }

    fn capture_mesh(ctx: &mut ExportContext, item: &SceneItem) -> Result<usize, ExportError> {
        let SceneItem::Mesh { topology, positions, colors, color, size, actor } = item else {
            return Ok(0);
        };
        let colors = match colors {
            Some(colors) => Colors::PerVertex(colors),
            None => Colors::Uniform(*color),
        };
        let mut capture = ctx.capture();
        capture.set_actor_matrix(*actor);
        capture.set_point_size(*size);
        capture.set_line_width(*size);
        let count = match topology {
            MeshTopology::Points => capture.draw_points(positions, colors)?,
            MeshTopology::Lines => capture.draw_lines(positions, colors)?,
            MeshTopology::LineStrip => capture.draw_line_strip(positions, colors)?,
            MeshTopology::Triangles => capture.draw_triangles(positions, colors)?,
            MeshTopology::TriangleStrip => capture.draw_triangle_strip(positions, colors)?,
            MeshTopology::TriangleFan => capture.draw_triangle_fan(positions, colors)?,
            MeshTopology::Polygon => capture.draw_polygon(positions, colors)?,
        };
        Ok(count)
    }

    fn draw_item(&self, device: &mut dyn VectorDevice, item: &SceneItem) -> Result<(), ExportError> {
        match item {
            SceneItem::Polyline { points, colors, pen } => {
                device.set_pen(*pen);
                device.draw_poly(points, colors.as_deref())?;
            }
            SceneItem::Lines { points, colors, pen } => {
                device.set_pen(*pen);
                device.draw_lines(points, colors.as_deref())?;
            }
            SceneItem::Points { points, colors, pen } => {
                device.set_pen(*pen);
                device.draw_points(points, colors.as_deref())?;
            }
            SceneItem::Markers { shape, highlight, points, colors, pen } => {
                device.set_pen(*pen);
                device.draw_markers(*shape, *highlight, points, colors.as_deref())?;
            }
            SceneItem::Polygon { points, colors, fill, texture, texture_properties } => {
                device.set_brush(Brush {
                    color: *fill,
                    texture: texture.clone().map(Arc::new),
                    texture_properties: *texture_properties,
                });
                device.draw_polygon(points, colors.as_deref())?;
            }
            SceneItem::Wedge { center, outer, inner, start, stop, fill } => {
                device.set_brush(Brush::solid(*fill));
                device.draw_ellipse_wedge(*center, (outer[0], outer[1]), (inner[0], inner[1]), *start, *stop)?;
            }
            SceneItem::Arc { center, radii, start, stop, pen, fill } => {
                device.set_pen(*pen);
                device.set_brush(Brush::solid(*fill));
                device.draw_elliptic_arc(*center, radii[0], radii[1], *start, *stop)?;
            }
            SceneItem::Text { at, text, property } => {
                device.set_text_property(*property);
                device.draw_string(*at, text)?;
            }
            SceneItem::Path { steps, origin, fill } => {
                device.set_brush(Brush::solid(*fill));
                device.draw_path(&build_path(steps), *origin)?;
            }
            SceneItem::Image { rect, image } => device.draw_image(*rect, image)?,
            SceneItem::Raster { image } => device.draw_image(Rect::new(0.0, 0.0, self.width, self.height), image)?,
            SceneItem::Transform { matrix } => device.set_matrix(Matrix3::from_affine(*matrix))?,
            SceneItem::Clip { rect } => device.set_clip(*rect)?,
            SceneItem::Mesh { .. } => {}
        }
        Ok(())
    }
}

impl Scene for JsonScene {
    fn canvas(&self) -> Size {
        Size::new(self.width, self.height)
    }

    fn projector(&self) -> Projector {
        Projector::new(self.camera.projection, self.camera.model_view, Viewport::sized(self.width, self.height))
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn has_raster_content(&self) -> bool {
        self.items.iter().any(SceneItem::is_raster_only)
    }

    fn background_color(&self) -> Option<Color> {
        self.background
    }

    fn prepare(&mut self, phase: ExportPhase) {
        self.hidden = self
            .items
            .iter()
            .map(|item| match phase {
                ExportPhase::Background => !item.is_raster_only(),
                ExportPhase::Capture => item.is_raster_only(),
                ExportPhase::CaptureAll => false,
            })
            .collect();
    }

    fn restore(&mut self) {
        self.hidden.clear();
    }

    /// The topmost visible raster item; the scene carries its rasters pre-rendered.
    fn rasterize(&mut self) -> Result<ImageData, ExportError> {
        let image = self
            .items
            .iter()
            .enumerate()
            .rev()
            .find_map(|(i, item)| match item {
                SceneItem::Raster { image } if self.is_visible(i) => Some(image.clone()),
                _ => None,
            })
            .ok_or_else(|| ExportError::Scene("no visible raster content to render".into()))?;
        image.validate()?;
        Ok(image)
    }

    /// Meshes are captured and drawn first, sorted together; 2D items follow in order.
    fn render(&mut self, ctx: &mut ExportContext) -> Result<(), ExportError> {
        let mut captured = 0;
        for (i, item) in self.items.iter().enumerate() {
            if item.is_mesh() && self.is_visible(i) {
                captured += Self::capture_mesh(ctx, item)?;
            }
        }
        if captured > 0 {
            debug!("Captured {} primitives from scene meshes", captured);
        }
        ctx.flush()?;

        for (i, item) in self.items.iter().enumerate() {
            if !item.is_mesh() && self.is_visible(i) {
                self.draw_item(ctx.device(), item)?;
            }
        }
        Ok(())
    }
}
