//! PostScript-family emitters.
//!
//! [`PsDevice`] writes single-page PostScript or EPS, optionally gzipped.
//! [`TexDevice`] writes the LaTeX overlay that places the strings of a scene on
//! top of its EPS rendering.

mod prolog;
pub mod ps;
pub mod tex;

pub use ps::{PsDevice, PsOptions};
pub use tex::TexDevice;
