//! TextBackend trait for abstracting font metrics and glyph outlines.
//!
//! Emitters need string extents for alignment and, in path mode, glyph outlines.
//! Neither is computed here; a backend supplies them.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use thiserror::Error;
use vexport_path::Path;

/// Error type for text backend operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TextError {
    #[error("Text backend '{backend}' cannot provide {operation}")]
    Unavailable { backend: &'static str, operation: &'static str },

    #[error("No outline for glyph {ch:?}: {message}")]
    Glyph { ch: char, message: String },

    #[error("Unsupported font family: {0}")]
    UnsupportedFamily(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FontFamily {
    #[default]
    Arial,
    Courier,
    Times,
}

impl FontFamily {
    pub fn name(self) -> &'static str {
        match self {
            FontFamily::Arial => "Arial",
            FontFamily::Courier => "Courier",
            FontFamily::Times => "Times",
        }
    }
}

/// The font a backend is asked about.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontQuery {
    pub family: FontFamily,
    pub size: f64,
    pub bold: bool,
    pub italic: bool,
}

impl FontQuery {
    pub fn new(family: FontFamily, size: f64) -> Self {
        Self { family, size, bold: false, italic: false }
    }
}

/// Extent of a single line of text, in points.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TextExtent {
    pub width: f64,
    pub ascent: f64,
    pub descent: f64,
}

impl TextExtent {
    pub fn height(&self) -> f64 {
        self.ascent + self.descent
    }
}

/// A source of text metrics and outlines.
///
/// Outlines are returned with the baseline origin at `(0, 0)` and y pointing up.
pub trait TextBackend: Debug {
    /// Extent of the widest line of `text`.
    fn string_bounds(&self, text: &str, font: &FontQuery) -> Result<TextExtent, TextError>;

    /// Outline of a whole string laid out on one baseline.
    fn string_to_path(&self, text: &str, font: &FontQuery) -> Result<Path, TextError>;

    /// Outline of a single glyph at unit em size.
    fn glyph_path(&self, ch: char, font: &FontQuery) -> Result<Path, TextError>;

    /// Horizontal adjustment between an adjacent glyph pair, in em units.
    fn kerning(&self, _left: char, _right: char, _font: &FontQuery) -> f64 {
        0.0
    }

    /// Returns a human-readable name for this backend (for logging/debugging).
    fn name(&self) -> &'static str;
}

/// Fixed-pitch metrics with no outline data.
///
/// Every glyph advances `advance · size`; ascent and descent are fixed fractions
/// of the size. Outline requests report [`TextError::Unavailable`].
#[derive(Debug, Clone, Copy)]
pub struct MonospaceTextBackend {
    pub advance: f64,
    pub ascent: f64,
    pub descent: f64,
}

impl Default for MonospaceTextBackend {
    fn default() -> Self {
        Self { advance: 0.6, ascent: 0.8, descent: 0.2 }
    }
}

impl TextBackend for MonospaceTextBackend {
    fn string_bounds(&self, text: &str, font: &FontQuery) -> Result<TextExtent, TextError> {
        let widest = text.lines().map(|line| line.chars().count()).max().unwrap_or(0);
        Ok(TextExtent {
            width: widest as f64 * self.advance * font.size,
            ascent: self.ascent * font.size,
            descent: self.descent * font.size,
        })
    }

    fn string_to_path(&self, _text: &str, _font: &FontQuery) -> Result<Path, TextError> {
        Err(TextError::Unavailable { backend: self.name(), operation: "string outlines" })
    }

    fn glyph_path(&self, _ch: char, _font: &FontQuery) -> Result<Path, TextError> {
        Err(TextError::Unavailable { backend: self.name(), operation: "glyph outlines" })
    }

    fn name(&self) -> &'static str {
        "monospace"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monospace_bounds_use_widest_line() {
        let backend = MonospaceTextBackend::default();
        let font = FontQuery::new(FontFamily::Courier, 10.0);
        let extent = backend.string_bounds("ab\nabcd\nc", &font).unwrap();
        assert!((extent.width - 24.0).abs() < 1e-12);
        assert!((extent.height() - 10.0).abs() < 1e-12);
        assert_eq!(backend.string_bounds("", &font).unwrap().width, 0.0);
    }

    #[test]
    fn test_monospace_outlines_unavailable() {
        let backend = MonospaceTextBackend::default();
        let font = FontQuery::new(FontFamily::Arial, 12.0);
        let err = backend.string_to_path("x", &font).unwrap_err();
        assert_eq!(err, TextError::Unavailable { backend: "monospace", operation: "string outlines" });
        assert!(err.to_string().contains("monospace"));
        assert!(backend.glyph_path('x', &font).is_err());
        assert_eq!(backend.kerning('A', 'V', &font), 0.0);
    }
}
