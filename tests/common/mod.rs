#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use lopdf::{Document as LopdfDocument, Object};
use vexport::{ExportError, ExportOptions, Exporter, JsonScene, OutputFormat};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Uncompressed options with a fixed timestamp so outputs can be compared.
pub fn fixed_options(format: OutputFormat) -> ExportOptions {
    ExportOptions {
        format,
        compress: false,
        creation_date: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).single(),
        ..ExportOptions::default()
    }
}

/// Renders `scene` and returns the bytes of the main document.
pub fn render(scene: &mut JsonScene, options: ExportOptions) -> Result<Vec<u8>, ExportError> {
    let format = options.format;
    let outputs = Exporter::new(options).render(scene, "scene")?;
    Ok(outputs.into_iter().find(|o| o.format == format).map(|o| o.bytes).unwrap_or_default())
}

pub fn scene_from(json: serde_json::Value) -> JsonScene {
    serde_json::from_value(json).expect("scene fixture should parse")
}

/// Wrapper around a generated PDF with helper methods
pub struct GeneratedPdf {
    pub bytes: Vec<u8>,
    pub doc: LopdfDocument,
}

impl GeneratedPdf {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, Box<dyn std::error::Error>> {
        let doc = LopdfDocument::load_mem(&bytes)?;
        Ok(Self { bytes, doc })
    }

    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    /// Shading dictionaries, whether stored as streams or plain dictionaries.
    pub fn shading_count(&self) -> usize {
        self.doc
            .objects
            .values()
            .filter_map(|object| match object {
                Object::Stream(stream) => Some(&stream.dict),
                Object::Dictionary(dict) => Some(dict),
                _ => None,
            })
            .filter(|dict| dict.get(b"ShadingType").is_ok())
            .count()
    }

    /// Decoded content of the first page.
    pub fn content(&self) -> Result<String, Box<dyn std::error::Error>> {
        let page = *self.doc.get_pages().values().next().ok_or("PDF has no pages")?;
        Ok(String::from_utf8_lossy(&self.doc.get_page_content(page)?).into_owned())
    }
}

/// Wrapper around generated SVG text; parsed on demand with roxmltree.
pub struct GeneratedSvg {
    pub text: String,
}

impl GeneratedSvg {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, Box<dyn std::error::Error>> {
        let text = String::from_utf8(bytes)?;
        roxmltree::Document::parse(&text)?;
        Ok(Self { text })
    }

    fn document(&self) -> roxmltree::Document<'_> {
        roxmltree::Document::parse(&self.text).expect("validated in from_bytes")
    }

    /// Elements named `name` anywhere in the document.
    pub fn count(&self, name: &str) -> usize {
        self.document().descendants().filter(|n| n.tag_name().name() == name).count()
    }

    /// Elements named `name` inside `<defs>`.
    pub fn count_in_defs(&self, name: &str) -> usize {
        self.document()
            .descendants()
            .filter(|n| n.tag_name().name() == "defs")
            .flat_map(|defs| defs.descendants())
            .filter(|n| n.tag_name().name() == name)
            .count()
    }

    /// Shapes that paint something: every drawing element outside `<defs>`.
    pub fn drawn_shapes(&self) -> usize {
        const SHAPES: [&str; 8] = ["path", "polygon", "polyline", "line", "rect", "circle", "ellipse", "text"];
        self.document()
            .descendants()
            .filter(|n| SHAPES.contains(&n.tag_name().name()))
            .filter(|n| !n.ancestors().any(|a| a.tag_name().name() == "defs"))
            .count()
    }
}
