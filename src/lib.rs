//! # vexport
//!
//! Vector export of rendered scenes. A scene is replayed into a PostScript,
//! EPS, PDF or SVG device, or into a LaTeX overlay paired with an EPS of the
//! graphics. 3D content is captured through a projector, depth sorted and
//! drawn as flat or smoothly shaded primitives.
//!
//! ```no_run
//! use std::path::Path;
//! use vexport::{ExportOptions, Exporter, JsonScene};
//!
//! let mut scene = JsonScene::from_file("scene.json")?;
//! Exporter::new(ExportOptions::default()).export(&mut scene, Path::new("scene.pdf"))?;
//! # Ok::<(), vexport::ExportError>(())
//! ```

pub use vexport_core::*;

use std::path::{Path, PathBuf};

/// Format implied by the extension of `output`, if it has a known one.
pub fn format_for_path(output: &Path) -> Option<OutputFormat> {
    output.extension().and_then(|ext| ext.to_str()).and_then(OutputFormat::from_extension)
}

/// Reads a JSON scene and exports it to `output`. A known output extension
/// overrides the format in `options`.
pub fn export_scene_file(scene: &Path, output: &Path, mut options: ExportOptions) -> Result<Vec<PathBuf>, ExportError> {
    if let Some(format) = format_for_path(output) {
        options.format = format;
    }
    let mut scene = JsonScene::from_file(scene)?;
    Exporter::new(options).export(&mut scene, output)
}
