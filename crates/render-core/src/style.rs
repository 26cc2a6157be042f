//! Pen, brush, text and marker state carried by every device.

use crate::image::ImageData;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use vexport_traits::{FontFamily, FontQuery};
use vexport_types::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LineType {
    NoPen,
    #[default]
    Solid,
    Dash,
    Dot,
    DashDot,
    DashDotDot,
    DenseDot,
}

impl LineType {
    /// On/off lengths in pen-width units. Empty means a solid line.
    ///
    /// `NoPen` keeps a mostly-off pattern so that a stroke which slips past the
    /// culling rules still leaves almost nothing on the page.
    pub fn dash_pattern(self) -> &'static [f64] {
        match self {
            LineType::NoPen => &[0.0, 10.0],
            LineType::Solid => &[],
            LineType::Dash => &[8.0],
            LineType::Dot => &[1.0, 7.0],
            LineType::DashDot => &[4.0, 6.0, 2.0, 4.0],
            LineType::DashDotDot => &[3.0, 3.0, 1.0, 3.0, 3.0, 3.0],
            LineType::DenseDot => &[1.0, 3.0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Pen {
    pub color: Color,
    /// Line width, also the point and marker size.
    pub width: f64,
    pub line_type: LineType,
}

impl Default for Pen {
    fn default() -> Self {
        Self { color: Color::BLACK, width: 1.0, line_type: LineType::Solid }
    }
}

impl Pen {
    /// False when a stroke with this pen would leave no mark.
    pub fn is_visible(&self) -> bool {
        self.line_type != LineType::NoPen && !self.color.is_transparent()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextureMode {
    #[default]
    Stretch,
    Repeat,
}

/// How a textured brush maps its image onto a filled region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TextureProperties {
    pub mode: TextureMode,
    /// Linear sampling when set, nearest otherwise.
    pub smooth: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Brush {
    pub color: Color,
    pub texture: Option<Arc<ImageData>>,
    pub texture_properties: TextureProperties,
}

impl Default for Brush {
    fn default() -> Self {
        Self { color: Color::WHITE, texture: None, texture_properties: TextureProperties::default() }
    }
}

impl Brush {
    pub fn solid(color: Color) -> Self {
        Self { color, ..Self::default() }
    }

    /// False for a fully transparent, untextured brush.
    pub fn is_visible(&self) -> bool {
        self.texture.is_some() || !self.color.is_transparent()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Justification {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerticalJustification {
    #[default]
    Bottom,
    Center,
    Top,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TextProperty {
    pub family: FontFamily,
    /// Font size in points.
    pub size: f64,
    pub bold: bool,
    pub italic: bool,
    pub color: Color,
    /// Counter-clockwise rotation in degrees.
    pub orientation: f64,
    pub justification: Justification,
    pub vertical_justification: VerticalJustification,
    pub line_spacing: f64,
}

impl Default for TextProperty {
    fn default() -> Self {
        Self {
            family: FontFamily::Arial,
            size: 12.0,
            bold: false,
            italic: false,
            color: Color::BLACK,
            orientation: 0.0,
            justification: Justification::Left,
            vertical_justification: VerticalJustification::Bottom,
            line_spacing: 1.1,
        }
    }
}

impl TextProperty {
    pub fn font_query(&self) -> FontQuery {
        FontQuery { family: self.family, size: self.size, bold: self.bold, italic: self.italic }
    }

    /// Name of the matching base-14 font.
    pub fn base14_font_name(&self) -> &'static str {
        match (self.family, self.bold, self.italic) {
            (FontFamily::Arial, false, false) => "Helvetica",
            (FontFamily::Arial, true, false) => "Helvetica-Bold",
            (FontFamily::Arial, false, true) => "Helvetica-Oblique",
            (FontFamily::Arial, true, true) => "Helvetica-BoldOblique",
            (FontFamily::Courier, false, false) => "Courier",
            (FontFamily::Courier, true, false) => "Courier-Bold",
            (FontFamily::Courier, false, true) => "Courier-Oblique",
            (FontFamily::Courier, true, true) => "Courier-BoldOblique",
            (FontFamily::Times, false, false) => "Times-Roman",
            (FontFamily::Times, true, false) => "Times-Bold",
            (FontFamily::Times, false, true) => "Times-Italic",
            (FontFamily::Times, true, true) => "Times-BoldItalic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MarkerShape {
    Cross,
    #[default]
    Plus,
    Square,
    Circle,
    Diamond,
}

impl MarkerShape {
    /// Maps a numeric marker code; unknown codes draw as [`MarkerShape::Plus`].
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => MarkerShape::Cross,
            3 => MarkerShape::Square,
            4 => MarkerShape::Circle,
            5 => MarkerShape::Diamond,
            _ => MarkerShape::Plus,
        }
    }

    /// Stroked shapes use the pen color as stroke, the others as fill.
    pub fn is_stroked(self) -> bool {
        matches!(self, MarkerShape::Cross | MarkerShape::Plus)
    }
}
