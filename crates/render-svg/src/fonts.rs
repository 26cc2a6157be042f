//! Embedded SVG fonts.
//!
//! Every string drawn as native text registers its characters and adjacent
//! character pairs under its face. At the end of the export each face becomes
//! one `<font>` with a `<glyph>` per character and an `<hkern>` per pair that
//! the backend kerns.

use crate::node::XmlNode;
use itertools::Itertools;
use log::warn;
use std::collections::{BTreeMap, BTreeSet};
use vexport_path::{Path, PathError, Segment};
use vexport_render_core::TextProperty;
use vexport_render_core::utils::fmt_num;
use vexport_traits::{FontFamily, FontQuery, TextBackend};

/// Glyph outlines are requested at this size, which makes font units match
/// the backend's output units.
pub const UNITS_PER_EM: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FontKey {
    pub family: FontFamily,
    pub bold: bool,
    pub italic: bool,
}

impl FontKey {
    pub fn of(prop: &TextProperty) -> Self {
        Self { family: prop.family, bold: prop.bold, italic: prop.italic }
    }

    fn query(&self) -> FontQuery {
        FontQuery { family: self.family, size: UNITS_PER_EM, bold: self.bold, italic: self.italic }
    }
}

#[derive(Debug, Clone, Default)]
struct FontUsage {
    id: String,
    chars: BTreeSet<char>,
    kerning_pairs: BTreeSet<(char, char)>,
}

#[derive(Debug, Clone, Default)]
pub struct FontRegistry {
    faces: BTreeMap<FontKey, FontUsage>,
}

/// Path data in font units; glyph space is y-up like the backend's outlines.
fn glyph_data(path: &Path) -> Result<String, PathError> {
    let mut d = String::new();
    let p = |v: vexport_types::Vec3| format!("{},{}", fmt_num(v.x), fmt_num(v.y));
    for segment in path.segments() {
        match segment? {
            Segment::MoveTo(v) => d.push_str(&format!("M{}", p(v))),
            Segment::LineTo(v) => d.push_str(&format!("L{}", p(v))),
            Segment::Conic { ctrl, end } => d.push_str(&format!("Q{} {}", p(ctrl), p(end))),
            Segment::Cubic { ctrl1, ctrl2, end } => d.push_str(&format!("C{} {} {}", p(ctrl1), p(ctrl2), p(end))),
        }
    }
    Ok(d)
}

impl FontRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the characters of `text` and returns the face's font id.
    pub fn register(&mut self, prop: &TextProperty, text: &str) -> String {
        let key = FontKey::of(prop);
        let next_id = self.faces.len() + 1;
        let usage = self.faces.entry(key).or_insert_with(|| FontUsage {
            id: format!("font{}-{}", next_id, key.family.name()),
            ..FontUsage::default()
        });
        usage.chars.extend(text.chars().filter(|c| !c.is_control()));
        usage.kerning_pairs.extend(text.chars().tuple_windows::<(char, char)>());
        usage.id.clone()
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn clear(&mut self) {
        self.faces.clear();
    }

    /// One `<font>` per registered face. Glyphs the backend cannot outline are
    /// left out with a warning; the face itself is still written.
    pub fn to_nodes(&self, backend: &dyn TextBackend) -> Vec<XmlNode> {
        let mut nodes = Vec::with_capacity(self.faces.len());
        for (key, usage) in &self.faces {
            let query = key.query();
            let (ascent, descent) = match backend.string_bounds("", &query) {
                Ok(extent) => (extent.ascent, extent.descent),
                Err(_) => (UNITS_PER_EM * 0.8, UNITS_PER_EM * 0.2),
            };
            let mut font = XmlNode::new("font").attr("id", usage.id.clone());
            font.push(
                XmlNode::new("font-face")
                    .attr("font-family", usage.id.clone())
                    .attr("font-style", if key.italic { "italic" } else { "normal" })
                    .attr("font-weight", if key.bold { "bold" } else { "normal" })
                    .attr("font-size", "all")
                    .attr("units-per-em", fmt_num(UNITS_PER_EM))
                    .attr("ascent", fmt_num(ascent))
                    .attr("descent", fmt_num(-descent))
                    .attr("alphabetic", "0"),
            );

            let mut missing = 0usize;
            for ch in &usage.chars {
                let advance = backend
                    .string_bounds(&ch.to_string(), &query)
                    .map(|extent| extent.width)
                    .unwrap_or(UNITS_PER_EM * 0.5);
                let mut glyph =
                    XmlNode::new("glyph").attr("unicode", ch.to_string()).attr("horiz-adv-x", fmt_num(advance));
                match backend.glyph_path(*ch, &query) {
                    Ok(path) if path.is_empty() => {}
                    Ok(path) => match glyph_data(&path) {
                        Ok(d) => glyph.set("d", d),
                        Err(err) => {
                            warn!("Dropping outline of {:?} in {}: {}", ch, usage.id, err);
                            missing += 1;
                        }
                    },
                    Err(_) => missing += 1,
                }
                font.push(glyph);
            }
            if missing > 0 {
                warn!("{} glyph outline(s) unavailable for {} from {}", missing, usage.id, backend.name());
            }

            for &(left, right) in &usage.kerning_pairs {
                let kerning = backend.kerning(left, right, &query);
                if kerning.abs() > 1e-9 {
                    font.push(
                        XmlNode::new("hkern")
                            .attr("u1", left.to_string())
                            .attr("u2", right.to_string())
                            .attr("k", fmt_num(-kerning)),
                    );
                }
            }
            nodes.push(font);
        }
        nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vexport_traits::{MonospaceTextBackend, TextError, TextExtent};

    #[derive(Debug)]
    struct BoxGlyphs;

    impl TextBackend for BoxGlyphs {
        fn string_bounds(&self, text: &str, font: &FontQuery) -> Result<TextExtent, TextError> {
            let n = text.chars().count() as f64;
            Ok(TextExtent { width: n * font.size * 0.5, ascent: font.size * 0.75, descent: font.size * 0.25 })
        }

        fn string_to_path(&self, _text: &str, _font: &FontQuery) -> Result<Path, TextError> {
            Ok(Path::new())
        }

        fn glyph_path(&self, _ch: char, font: &FontQuery) -> Result<Path, TextError> {
            let mut path = Path::new();
            path.move_to(0.0, 0.0).line_to(font.size * 0.5, 0.0).line_to(0.0, font.size * 0.5);
            Ok(path)
        }

        fn kerning(&self, left: char, right: char, _font: &FontQuery) -> f64 {
            if left == 'A' && right == 'V' { -80.0 } else { 0.0 }
        }

        fn name(&self) -> &'static str {
            "boxes"
        }
    }

    #[test]
    fn test_register_collects_chars_and_pairs() {
        let mut registry = FontRegistry::new();
        let prop = TextProperty::default();
        let id = registry.register(&prop, "AVA");
        assert_eq!(registry.register(&prop, "V"), id);
        assert_eq!(registry.len(), 1);

        let bold = TextProperty { bold: true, ..prop };
        assert_ne!(registry.register(&bold, "x"), id);
        assert_eq!(registry.len(), 2);

        let usage = registry.faces.get(&FontKey::of(&prop)).unwrap();
        assert_eq!(usage.chars.len(), 2);
        assert!(usage.kerning_pairs.contains(&('A', 'V')) && usage.kerning_pairs.contains(&('V', 'A')));
    }

    #[test]
    fn test_font_nodes_with_glyphs_and_kerning() {
        let mut registry = FontRegistry::new();
        registry.register(&TextProperty::default(), "AV");
        let nodes = registry.to_nodes(&BoxGlyphs);
        assert_eq!(nodes.len(), 1);
        let font = &nodes[0];
        let glyphs: Vec<_> = font.children.iter().filter(|n| n.name == "glyph").collect();
        assert_eq!(glyphs.len(), 2);
        assert_eq!(glyphs[0].get("d"), Some("M0,0L500,0L0,500"));
        assert_eq!(glyphs[0].get("horiz-adv-x"), Some("500"));
        let kerns: Vec<_> = font.children.iter().filter(|n| n.name == "hkern").collect();
        assert_eq!(kerns.len(), 1);
        assert_eq!(kerns[0].get("k"), Some("80"));
    }

    #[test]
    fn test_broken_glyph_outline_is_dropped_whole() {
        let mut path = Path::new();
        path.move_to(0.0, 0.0).line_to(5.0, 0.0);
        path.append(vexport_types::Vec3::new(5.0, 5.0, 0.0), vexport_path::PathCode::CubicCurve);
        assert!(glyph_data(&path).is_err());

        #[derive(Debug)]
        struct BrokenGlyphs;
        impl TextBackend for BrokenGlyphs {
            fn string_bounds(&self, text: &str, font: &FontQuery) -> Result<TextExtent, TextError> {
                BoxGlyphs.string_bounds(text, font)
            }
            fn string_to_path(&self, _text: &str, _font: &FontQuery) -> Result<Path, TextError> {
                Ok(Path::new())
            }
            fn glyph_path(&self, _ch: char, _font: &FontQuery) -> Result<Path, TextError> {
                let mut path = Path::new();
                path.move_to(0.0, 0.0).line_to(5.0, 0.0);
                path.append(vexport_types::Vec3::new(5.0, 5.0, 0.0), vexport_path::PathCode::CubicCurve);
                Ok(path)
            }
            fn kerning(&self, _left: char, _right: char, _font: &FontQuery) -> f64 {
                0.0
            }
            fn name(&self) -> &'static str {
                "broken"
            }
        }

        let mut registry = FontRegistry::new();
        registry.register(&TextProperty::default(), "a");
        let nodes = registry.to_nodes(&BrokenGlyphs);
        let glyph = nodes[0].children.iter().find(|n| n.name == "glyph").unwrap();
        assert_eq!(glyph.get("d"), None);
    }

    #[test]
    fn test_missing_outlines_keep_the_face() {
        let mut registry = FontRegistry::new();
        registry.register(&TextProperty::default(), "ab");
        let nodes = registry.to_nodes(&MonospaceTextBackend::default());
        assert_eq!(nodes[0].children[0].name, "font-face");
        assert!(nodes[0].children.iter().filter(|n| n.name == "glyph").all(|g| g.get("d").is_none()));
    }
}
