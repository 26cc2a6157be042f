use crate::path::PathCode;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PathError {
    #[error("{code:?} run starting at point {index} is incomplete (expected {expected} points)")]
    BrokenRun { code: PathCode, index: usize, expected: usize },

    #[error("curve segment at point {index} has no current point")]
    NoCurrentPoint { index: usize },
}
