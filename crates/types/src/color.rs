use serde::{de, Deserialize, Deserializer, Serialize};

fn default_opaque() -> u8 {
    255
}

fn is_opaque(alpha: &u8) -> bool {
    *alpha == 255
}

/// An 8-bit RGBA color, the unit every emitter and the tessellator work in.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    #[serde(skip_serializing_if = "is_opaque", default = "default_opaque")]
    pub a: u8,
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn gray(value: u8) -> Self {
        Self::rgb(value, value, value)
    }

    /// Builds a color from unit-range floats, clamping out-of-range components.
    pub fn from_unit(r: f32, g: f32, b: f32, a: f32) -> Self {
        fn channel(v: f32) -> u8 {
            (v.clamp(0.0, 1.0) * 255.0).round() as u8
        }
        Self::rgba(channel(r), channel(g), channel(b), channel(a))
    }

    pub fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    pub fn is_opaque(&self) -> bool {
        self.a == 255
    }

    pub fn is_transparent(&self) -> bool {
        self.a == 0
    }

    /// Components in `[0, 1]`, alpha last.
    pub fn to_unit(&self) -> [f32; 4] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            self.a as f32 / 255.0,
        ]
    }

    pub fn alpha_unit(&self) -> f32 {
        self.a as f32 / 255.0
    }

    /// `#rrggbb`, alpha dropped.
    pub fn to_hex_rgb(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Integer midpoint of two colors, per channel.
    pub fn average(a: Color, b: Color) -> Color {
        fn mid(x: u8, y: u8) -> u8 {
            ((x as u16 + y as u16) / 2) as u8
        }
        Color::rgba(mid(a.r, b.r), mid(a.g, b.g), mid(a.b, b.b), mid(a.a, b.a))
    }

    /// Integer mean of three colors, per channel.
    pub fn average3(a: Color, b: Color, c: Color) -> Color {
        fn mean(x: u8, y: u8, z: u8) -> u8 {
            ((x as u16 + y as u16 + z as u16) / 3) as u8
        }
        Color::rgba(
            mean(a.r, b.r, c.r),
            mean(a.g, b.g, c.g),
            mean(a.b, b.b, c.b),
            mean(a.a, b.a, c.a),
        )
    }

    /// Absolute per-channel difference `[r, g, b, a]`.
    pub fn delta(&self, other: &Color) -> [u8; 4] {
        [
            self.r.abs_diff(other.r),
            self.g.abs_diff(other.g),
            self.b.abs_diff(other.b),
            self.a.abs_diff(other.a),
        ]
    }

    /// Parse a hex color string (#RGB, #RRGGBB or #RRGGBBAA format)
    pub fn parse_hex(s: &str) -> Result<Color, String> {
        let s = s.trim();
        let hex = s
            .strip_prefix('#')
            .ok_or_else(|| format!("Color must start with #, got: {}", s))?;

        let component = |range: &str, name: &str| {
            u8::from_str_radix(range, 16).map_err(|e| format!("Invalid {} component: {}", name, e))
        };

        match hex.len() {
            3 => {
                // #RGB format - expand each digit
                let r = component(&hex[0..1].repeat(2), "red")?;
                let g = component(&hex[1..2].repeat(2), "green")?;
                let b = component(&hex[2..3].repeat(2), "blue")?;
                Ok(Color::rgb(r, g, b))
            }
            6 | 8 => {
                let r = component(&hex[0..2], "red")?;
                let g = component(&hex[2..4], "green")?;
                let b = component(&hex[4..6], "blue")?;
                let a = if hex.len() == 8 { component(&hex[6..8], "alpha")? } else { 255 };
                Ok(Color::rgba(r, g, b, a))
            }
            _ => Err(format!("Invalid hex color length: expected 3, 6 or 8, got {}", hex.len())),
        }
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum ColorDef {
            Str(String),
            Map { r: u8, g: u8, b: u8, #[serde(default = "default_opaque")] a: u8 },
        }

        match ColorDef::deserialize(deserializer)? {
            ColorDef::Str(s) => Self::parse_hex(&s).map_err(de::Error::custom),
            ColorDef::Map { r, g, b, a } => Ok(Color { r, g, b, a }),
        }
    }
}
