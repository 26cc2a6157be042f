//! # vexport-core
//!
//! Turns a [`Scene`] into vector documents.
//!
//! - **options**: output format and export configuration, loadable from JSON
//! - **scene**: the [`Scene`] trait and the declarative [`JsonScene`]
//! - **context**: per-export capture state feeding a device
//! - **exporter**: the two-phase export (background raster, then vector capture)
//! - **error**: the error type every export returns
//!
//! Devices, capture, projection and tessellation live in their own crates and
//! are re-exported here.

// Re-export foundation crates
pub use vexport_path as path;
pub use vexport_traits as traits;
pub use vexport_types as types;

// Re-export algorithm crates
pub use vexport_capture as capture;
pub use vexport_projector as projector;
pub use vexport_tessellate as tessellate;

// Re-export render crates
pub use vexport_render_core as render;
pub use vexport_render_lopdf as pdf;
pub use vexport_render_ps as ps;
pub use vexport_render_svg as svg;

pub mod context;
pub mod error;
pub mod exporter;
pub mod options;
pub mod scene;

pub use context::ExportContext;
pub use error::ExportError;
pub use exporter::{ExportOutput, Exporter, TextBackendFactory};
pub use options::{ExportOptions, OutputFormat, TextMode};
pub use scene::{Camera, ExportPhase, JsonScene, MeshTopology, PathStep, Scene, SceneItem};

// Commonly used types from the lower crates
pub use capture::SortMode;
pub use render::{Brush, ImageData, MarkerShape, Pen, TextProperty, VectorDevice};
pub use types::{Color, Matrix3, Matrix4, Point2, Rect, Size, Vec3};
