//! # vexport-types
//!
//! Shared value types for the export pipeline: colors, device/world geometry and
//! the affine/projective matrices every other crate speaks in.

pub mod color;
pub mod geometry;
pub mod matrix;
pub mod vertex;

pub use color::Color;
pub use geometry::{Point2, Rect, Size, Vec3};
pub use matrix::{Identity, Matrix3, Matrix4, TransformStack};
pub use vertex::Vertex;
