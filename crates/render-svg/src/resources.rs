//! Content-keyed definition tables.
//!
//! Each table hands out an id the first time a key is seen and returns the
//! same id afterwards. Entries keep insertion order, so `<defs>` come out in
//! first-use order and two identical exports produce identical ids.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::collections::HashMap;
use std::hash::Hash;
use vexport_render_core::{ImageData, RenderError, TextureMode};

#[derive(Debug, Clone)]
pub struct ResourceTable<K> {
    prefix: &'static str,
    ids: HashMap<K, usize>,
    entries: Vec<(K, String)>,
}

impl<K: Hash + Eq + Clone> ResourceTable<K> {
    pub fn new(prefix: &'static str) -> Self {
        Self { prefix, ids: HashMap::new(), entries: Vec::new() }
    }

    /// Id for `key`, and whether this call created it.
    pub fn intern(&mut self, key: K) -> (String, bool) {
        if let Some(&index) = self.ids.get(&key) {
            return (self.entries[index].1.clone(), false);
        }
        let id = format!("{}{}", self.prefix, self.entries.len() + 1);
        self.ids.insert(key.clone(), self.entries.len());
        self.entries.push((key, id.clone()));
        (id, true)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &str)> {
        self.entries.iter().map(|(k, id)| (k, id.as_str()))
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.entries.clear();
    }
}

/// An embedded raster: pixel size plus its PNG data URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmbeddedImage {
    pub width: u32,
    pub height: u32,
    pub data_uri: String,
}

impl EmbeddedImage {
    pub fn encode(image: &ImageData) -> Result<Self, RenderError> {
        let png = image.encode_png()?;
        Ok(Self {
            width: image.width,
            height: image.height,
            data_uri: format!("data:image/png;base64,{}", STANDARD.encode(png)),
        })
    }
}

/// A fill pattern: the image it tiles or stretches and how.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatternKey {
    pub image_id: String,
    pub width: u32,
    pub height: u32,
    pub mode: TextureMode,
}

/// Clip rectangle attributes as written, in SVG root space.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClipKey {
    pub x: String,
    pub y: String,
    pub width: String,
    pub height: String,
    pub transform: Option<String>,
}
