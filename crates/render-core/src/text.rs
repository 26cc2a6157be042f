//! Multi-line text block layout shared by the emitters that place lines themselves.

use crate::style::{Justification, TextProperty, VerticalJustification};
use vexport_traits::{TextBackend, TextError};
use vexport_types::Point2;

#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub width: f64,
}

/// A string split into lines and measured at a given font size.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLayout {
    pub lines: Vec<TextLine>,
    pub font_size: f64,
    pub width: f64,
    pub height: f64,
    pub line_height: f64,
    /// Baseline-to-baseline distance, `line_height · line_spacing`.
    pub leading: f64,
    pub ascent: f64,
    pub descent: f64,
    orientation: f64,
    justification: Justification,
    vertical: VerticalJustification,
}

impl TextLayout {
    /// Splits on `'\n'`, dropping an empty trailing line, and measures each line.
    pub fn new(
        text: &str,
        prop: &TextProperty,
        font_size: f64,
        backend: &dyn TextBackend,
    ) -> Result<Self, TextError> {
        let mut query = prop.font_query();
        query.size = font_size;

        let metrics = backend.string_bounds("", &query)?;
        let mut pieces: Vec<&str> = text.split('\n').collect();
        let mut lines = Vec::with_capacity(pieces.len());
        if pieces.last().is_some_and(|last| last.is_empty()) {
            pieces.pop();
        }
        for piece in pieces {
            let width = backend.string_bounds(piece, &query)?.width;
            lines.push(TextLine { text: piece.to_string(), width });
        }

        let width = lines.iter().map(|l| l.width).fold(0.0, f64::max);
        let line_height = metrics.height();
        let leading = line_height * prop.line_spacing;
        let height = match lines.len() {
            0 => 0.0,
            1 => metrics.ascent,
            n => line_height + leading * (n - 1) as f64,
        };

        Ok(Self {
            lines,
            font_size,
            width,
            height,
            line_height,
            leading,
            ascent: metrics.ascent,
            descent: metrics.descent,
            orientation: prop.orientation,
            justification: prop.justification,
            vertical: prop.vertical_justification,
        })
    }

    /// Baseline origin of the first line for an anchor at `at`, rotated with the text.
    pub fn start_point(&self, at: Point2) -> Point2 {
        let mut dx = 0.0;
        let mut dy = -self.ascent;
        match self.justification {
            Justification::Left => {}
            Justification::Center => dx -= self.width * 0.5,
            Justification::Right => dx -= self.width,
        }
        match self.vertical {
            VerticalJustification::Bottom => dy += self.height,
            VerticalJustification::Center => dy += self.height * 0.5,
            VerticalJustification::Top => {}
        }
        let (s, c) = self.orientation.to_radians().sin_cos();
        Point2::new(at.x + dx * c - dy * s, at.y + dx * s + dy * c)
    }

    /// Horizontal offset of each line within the block.
    pub fn line_offsets(&self) -> Vec<f64> {
        self.lines
            .iter()
            .map(|line| match self.justification {
                Justification::Left => 0.0,
                Justification::Center => (self.width - line.width) * 0.5,
                Justification::Right => self.width - line.width,
            })
            .collect()
    }

    /// `(cos θ, sin θ)` of the text orientation.
    pub fn rotation(&self) -> (f64, f64) {
        let (s, c) = self.orientation.to_radians().sin_cos();
        (c, s)
    }
}
