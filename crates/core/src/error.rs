//! The single error type an export returns.

use thiserror::Error;
use vexport_capture::CaptureError;
use vexport_path::PathError;
use vexport_projector::ProjectError;
use vexport_render_core::RenderError;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("No output path given")]
    MissingOutputPath,
    #[error("Scene has nothing to export")]
    EmptyScene,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Rendering error: {0}")]
    Render(#[from] RenderError),
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),
    #[error("Projection error: {0}")]
    Projection(#[from] ProjectError),
    #[error("Bad path: {0}")]
    Path(#[from] PathError),
    #[error("Scene error: {0}")]
    Scene(String),
}

impl ExportError {
    /// True for errors raised before any rendering started.
    pub fn is_config(&self) -> bool {
        matches!(self, ExportError::Config(_) | ExportError::MissingOutputPath | ExportError::EmptyScene)
    }
}
