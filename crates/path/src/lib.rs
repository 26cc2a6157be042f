//! # vexport-path
//!
//! Vector outlines as typed control points, plus the curve normalizer that turns
//! conic (quadratic) segments into exact cubic ones for formats that only know
//! cubic Beziers.

pub mod bezier;
pub mod error;
pub mod normalize;
pub mod path;

pub use error::PathError;
pub use normalize::{elevate_conic, normalized_segments, to_cubic};
pub use path::{Path, PathCode, Segment};
