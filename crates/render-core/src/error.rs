use thiserror::Error;
use vexport_path::PathError;
use vexport_traits::TextError;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF generation error: {0}")]
    Pdf(String),
    #[error("SVG serialization error: {0}")]
    Xml(String),
    #[error("Image encoding error: {0}")]
    Image(String),
    #[error("Bad path: {0}")]
    Path(#[from] PathError),
    #[error("Text backend error: {0}")]
    Text(#[from] TextError),
    #[error("Images with {components} components not supported")]
    UnsupportedImage { components: u8 },
    #[error("Image data holds {actual} bytes, expected {expected}")]
    ImageSize { expected: usize, actual: usize },
    #[error("A transform/clip group is already open; pop it before pushing another")]
    NestedGroup,
    #[error("Device already finished")]
    Finished,
    #[error("Other rendering error: {0}")]
    Other(String),
}

impl From<lopdf::Error> for RenderError {
    fn from(err: lopdf::Error) -> Self {
        RenderError::Pdf(err.to_string())
    }
}

impl From<quick_xml::Error> for RenderError {
    fn from(err: quick_xml::Error) -> Self {
        RenderError::Xml(err.to_string())
    }
}

impl From<image::ImageError> for RenderError {
    fn from(err: image::ImageError) -> Self {
        RenderError::Image(err.to_string())
    }
}

impl From<&str> for RenderError {
    fn from(s: &str) -> Self {
        RenderError::Other(s.to_string())
    }
}
