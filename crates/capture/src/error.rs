use thiserror::Error;
use vexport_projector::ProjectError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error("Projection error: {0}")]
    Projection(#[from] ProjectError),

    #[error("expected {expected} colors for {vertices} vertices, got {actual}")]
    ColorCountMismatch { vertices: usize, expected: usize, actual: usize },

    #[error("invalid attribute layout: {0}")]
    InvalidLayout(String),

    #[error("vertex buffer of {len} bytes is not a multiple of the {stride}-byte stride")]
    RaggedBuffer { len: usize, stride: usize },

    #[error("feedback buffer truncated at offset {offset}")]
    Truncated { offset: usize },

    #[error("unknown feedback token {token} at offset {offset}")]
    UnknownToken { token: f32, offset: usize },
}
