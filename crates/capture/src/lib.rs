//! # vexport-capture
//!
//! Turns drawing activity into device-space [`Primitive`]s.
//!
//! Three entry points feed the same [`PrimitiveSink`]:
//! - [`ImmediateCapture`] intercepts immediate-mode drawing calls and projects each vertex.
//! - [`feedback::FeedbackDecoder`] decodes an interleaved transform-feedback buffer.
//! - [`tokens::parse_feedback`] reads a legacy feedback token stream.
//!
//! [`sort::sort_primitives`] then orders the captured primitives back to front.

pub mod error;
pub mod feedback;
pub mod immediate;
pub mod primitive;
pub mod sort;
pub mod tokens;

pub use error::CaptureError;
pub use feedback::{AttributeLayout, ColorAttribute, ColorFormat, FeedbackDecoder, Topology};
pub use immediate::{Colors, ImmediateCapture};
pub use primitive::{Primitive, PrimitiveBuffer, PrimitiveSink, Stipple};
pub use sort::{SortMode, sort_primitives};
pub use tokens::parse_feedback;
pub use vexport_types::Vertex;
