use serde::{Deserialize, Serialize};
use vexport_types::Color;

/// Largest per-channel difference (0–255) at which two colors count as equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorTolerance {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Default for ColorTolerance {
    fn default() -> Self {
        Self { r: 16, g: 8, b: 32, a: 32 }
    }
}

impl ColorTolerance {
    /// Alpha only participates when `use_alpha` is set.
    pub fn is_close(&self, a: Color, b: Color, use_alpha: bool) -> bool {
        let [dr, dg, db, da] = a.delta(&b);
        dr <= self.r && dg <= self.g && db <= self.b && (!use_alpha || da <= self.a)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TessellationOptions {
    pub tolerance: ColorTolerance,
    /// Squared device-space length below which a piece is never split.
    pub distance_threshold: f64,
    pub use_alpha: bool,
}

impl Default for TessellationOptions {
    fn default() -> Self {
        Self {
            tolerance: ColorTolerance::default(),
            distance_threshold: 1.0,
            use_alpha: true,
        }
    }
}
