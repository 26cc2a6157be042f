pub mod text;

pub use text::{FontFamily, FontQuery, MonospaceTextBackend, TextBackend, TextError, TextExtent};
