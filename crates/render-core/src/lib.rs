//! Device contract shared by the vector format emitters.
//!
//! - [`VectorDevice`] is the drawing interface every emitter implements
//! - [`DeviceState`] carries pen, brush, text, transform and clip state
//! - [`geometry`] and [`text`] hold the outline and layout math the emitters share

mod error;
pub mod device;
pub mod geometry;
pub mod image;
pub mod stipple;
pub mod style;
pub mod text;
pub mod utils;

pub use device::{DeviceState, DocumentInfo, VectorDevice};
pub use error::RenderError;
pub use geometry::{FillRule, Outline};
pub use image::ImageData;
pub use stipple::stipple_dash_array;
pub use style::{
    Brush, Justification, LineType, MarkerShape, Pen, TextProperty, TextureMode, TextureProperties,
    VerticalJustification,
};
pub use text::{TextLayout, TextLine};
