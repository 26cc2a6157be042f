use crate::error::RenderError;
use image::ImageEncoder;
use image::codecs::png::PngEncoder;
use serde::{Deserialize, Serialize};
use vexport_types::Color;

/// An already-decoded 8-bit raster, rows stored top to bottom.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    /// Interleaved channels per pixel: 3 for RGB, 4 for RGBA.
    pub components: u8,
    pub pixels: Vec<u8>,
}

impl ImageData {
    pub fn new(width: u32, height: u32, components: u8, pixels: Vec<u8>) -> Result<Self, RenderError> {
        let image = Self { width, height, components, pixels };
        image.validate()?;
        Ok(image)
    }

    pub fn rgb(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self { width, height, components: 3, pixels }
    }

    pub fn rgba(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self { width, height, components: 4, pixels }
    }

    /// Checks the component count and that the buffer matches the dimensions.
    pub fn validate(&self) -> Result<(), RenderError> {
        if self.components != 3 && self.components != 4 {
            return Err(RenderError::UnsupportedImage { components: self.components });
        }
        let expected = self.width as usize * self.height as usize * self.components as usize;
        if self.pixels.len() != expected {
            return Err(RenderError::ImageSize { expected, actual: self.pixels.len() });
        }
        Ok(())
    }

    pub fn has_alpha(&self) -> bool {
        self.components == 4
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    fn row_len(&self) -> usize {
        self.width as usize * self.components as usize
    }

    /// Blends RGBA pixels over an opaque `background`, returning an RGB image.
    /// RGB images are returned unchanged.
    pub fn composite_onto(&self, background: Color) -> ImageData {
        if !self.has_alpha() {
            return self.clone();
        }
        let blend = |src: u8, dst: u8, alpha: u8| -> u8 {
            let a = alpha as u32;
            ((src as u32 * a + dst as u32 * (255 - a) + 127) / 255) as u8
        };
        let pixels = self
            .pixels
            .chunks_exact(4)
            .flat_map(|px| {
                [
                    blend(px[0], background.r, px[3]),
                    blend(px[1], background.g, px[3]),
                    blend(px[2], background.b, px[3]),
                ]
            })
            .collect();
        ImageData::rgb(self.width, self.height, pixels)
    }

    /// Same image with the row order reversed.
    pub fn flipped_y(&self) -> ImageData {
        let row_len = self.row_len();
        let pixels = if row_len == 0 {
            Vec::new()
        } else {
            self.pixels.chunks_exact(row_len).rev().flatten().copied().collect()
        };
        ImageData { pixels, ..self.clone() }
    }

    /// RGBA copy, appending an opaque alpha to RGB pixels.
    pub fn to_rgba8(&self) -> Vec<u8> {
        if self.has_alpha() {
            return self.pixels.clone();
        }
        self.pixels.chunks_exact(3).flat_map(|px| [px[0], px[1], px[2], 255]).collect()
    }

    /// Hex dump of the RGB channels, as consumed by PostScript `colorimage`.
    pub fn to_hex_rgb(&self) -> String {
        let step = self.components as usize;
        let mut out = String::with_capacity(self.pixels.len() / step.max(1) * 6);
        for px in self.pixels.chunks_exact(step.max(1)) {
            for channel in px.iter().take(3) {
                out.push_str(&format!("{:02x}", channel));
            }
        }
        out
    }

    /// Encodes the image as PNG.
    pub fn encode_png(&self) -> Result<Vec<u8>, RenderError> {
        self.validate()?;
        let mut png = Vec::new();
        let color = if self.has_alpha() { image::ExtendedColorType::Rgba8 } else { image::ExtendedColorType::Rgb8 };
        PngEncoder::new(&mut png).write_image(&self.pixels, self.width, self.height, color)?;
        Ok(png)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_component_count_and_length() {
        assert!(ImageData::new(1, 1, 3, vec![1, 2, 3]).is_ok());
        let err = ImageData::new(1, 1, 2, vec![1, 2]).unwrap_err();
        assert!(matches!(err, RenderError::UnsupportedImage { components: 2 }));
        assert_eq!(err.to_string(), "Images with 2 components not supported");
        assert!(matches!(ImageData::new(2, 1, 3, vec![0; 5]), Err(RenderError::ImageSize { expected: 6, actual: 5 })));
    }

    #[test]
    fn test_composite_onto_background() {
        let image = ImageData::rgba(2, 1, vec![255, 0, 0, 255, 255, 0, 0, 0]);
        let rgb = image.composite_onto(Color::rgb(0, 0, 255));
        assert_eq!(rgb.components, 3);
        assert_eq!(rgb.pixels, vec![255, 0, 0, 0, 0, 255]);

        let half = ImageData::rgba(1, 1, vec![255, 255, 255, 128]).composite_onto(Color::BLACK);
        assert_eq!(half.pixels, vec![128, 128, 128]);
    }

    #[test]
    fn test_flip_and_expand() {
        let image = ImageData::rgb(1, 2, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(image.flipped_y().pixels, vec![4, 5, 6, 1, 2, 3]);
        assert_eq!(image.to_rgba8(), vec![1, 2, 3, 255, 4, 5, 6, 255]);
        assert_eq!(image.to_hex_rgb(), "010203040506");
    }

    #[test]
    fn test_png_signature() {
        let png = ImageData::rgb(2, 2, vec![200; 12]).encode_png().unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }
}
