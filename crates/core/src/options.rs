//! Export configuration, loadable from JSON.

use crate::error::ExportError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vexport_capture::SortMode;
use vexport_render_core::DocumentInfo;
use vexport_tessellate::TessellationOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    Ps,
    Eps,
    #[default]
    Pdf,
    Svg,
    /// LaTeX text overlay plus a companion EPS holding the graphics.
    Tex,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Ps => "ps",
            OutputFormat::Eps => "eps",
            OutputFormat::Pdf => "pdf",
            OutputFormat::Svg => "svg",
            OutputFormat::Tex => "tex",
        }
    }

    /// Format for a file extension, case-insensitive.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "ps" => Some(OutputFormat::Ps),
            "eps" => Some(OutputFormat::Eps),
            "pdf" => Some(OutputFormat::Pdf),
            "svg" => Some(OutputFormat::Svg),
            "tex" => Some(OutputFormat::Tex),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextMode {
    /// Text operators and font references.
    #[default]
    Native,
    /// Filled glyph outlines from the text backend.
    Paths,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ExportOptions {
    pub format: OutputFormat,
    /// Flate for PDF streams, gzip for PS/EPS. Ignored by SVG and TeX.
    pub compress: bool,
    /// Fills the canvas with the scene's background color first.
    pub draw_background: bool,
    pub sort_mode: SortMode,
    pub text_mode: TextMode,
    /// Renders non-vectorizable content to a raster placed behind the vector output.
    pub rasterize_3d: bool,
    pub point_size_factor: f64,
    pub line_width_factor: f64,
    /// Initial capacity of the primitive buffer; it grows when exceeded.
    pub buffer_size: usize,
    /// Shrinks the PS/EPS bounding box to the drawn content.
    pub tight_bounding_box: bool,
    /// Writes SVG fonts for the faces used by native text.
    pub embed_fonts: bool,
    pub tessellation: TessellationOptions,
    pub title: String,
    pub creator: String,
    /// Fixed document timestamp; the export time when unset.
    #[serde(skip)]
    pub creation_date: Option<DateTime<Utc>>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            compress: true,
            draw_background: true,
            sort_mode: SortMode::default(),
            text_mode: TextMode::default(),
            rasterize_3d: false,
            point_size_factor: 5.0 / 7.0,
            line_width_factor: 5.0 / 7.0,
            buffer_size: 4096,
            tight_bounding_box: false,
            embed_fonts: false,
            tessellation: TessellationOptions::default(),
            title: "vexport scene".to_string(),
            creator: "vexport".to_string(),
            creation_date: None,
        }
    }
}

impl ExportOptions {
    pub fn from_json(json: &str) -> Result<Self, ExportError> {
        let options: ExportOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), ExportError> {
        if !(self.point_size_factor > 0.0 && self.point_size_factor.is_finite()) {
            return Err(ExportError::Config(format!("point size factor must be positive, got {}", self.point_size_factor)));
        }
        if !(self.line_width_factor > 0.0 && self.line_width_factor.is_finite()) {
            return Err(ExportError::Config(format!("line width factor must be positive, got {}", self.line_width_factor)));
        }
        if self.buffer_size == 0 {
            return Err(ExportError::Config("primitive buffer size must be at least 1".into()));
        }
        if !(self.tessellation.distance_threshold > 0.0) {
            return Err(ExportError::Config(format!(
                "tessellation distance threshold must be positive, got {}",
                self.tessellation.distance_threshold
            )));
        }
        Ok(())
    }

    pub fn info(&self) -> DocumentInfo {
        DocumentInfo { title: self.title.clone(), creator: self.creator.clone(), creation_date: self.creation_date }
    }

    pub fn text_as_paths(&self) -> bool {
        self.text_mode == TextMode::Paths
    }
}
