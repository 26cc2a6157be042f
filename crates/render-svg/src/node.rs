//! A small owned element tree.
//!
//! Definitions are only known once drawing is over, so the document is kept in
//! memory and serialized in one go with quick-xml at `finish`.

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::io::Write;
use vexport_render_core::RenderError;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlNode {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
    pub text: Option<String>,
}

impl XmlNode {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), ..Self::default() }
    }

    /// Builder form of [`XmlNode::set`].
    pub fn attr(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Sets an attribute, replacing an earlier value for the same key.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((key.to_string(), value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn push(&mut self, child: XmlNode) {
        self.children.push(child);
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty() && self.text.is_none()
    }

    fn write_to<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), RenderError> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }
        if self.is_empty() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }
        writer.write_event(Event::Start(start))?;
        if let Some(text) = &self.text {
            writer.write_event(Event::Text(BytesText::new(text)))?;
        }
        for child in &self.children {
            child.write_to(writer)?;
        }
        writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))?;
        Ok(())
    }

    /// Serializes the tree as a standalone UTF-8 document.
    pub fn to_document(&self) -> Result<Vec<u8>, RenderError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 1);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        self.write_to(&mut writer)?;
        let mut out = writer.into_inner();
        out.push(b'\n');
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attributes_replace_and_escape() {
        let mut node = XmlNode::new("text").attr("fill", "#000000").with_text("a < b & c");
        node.set("fill", "#ff0000");
        assert_eq!(node.get("fill"), Some("#ff0000"));
        assert_eq!(node.attributes.len(), 1);

        let out = String::from_utf8(node.to_document().unwrap()).unwrap();
        assert!(out.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(out.contains("a &lt; b &amp; c"));
    }

    #[test]
    fn test_empty_elements_self_close() {
        let mut root = XmlNode::new("svg");
        root.push(XmlNode::new("g").attr("id", "a\"b"));
        let out = String::from_utf8(root.to_document().unwrap()).unwrap();
        assert!(out.contains("<g id=\"a&quot;b\"/>"));
        assert!(out.trim_end().ends_with("</svg>"));
    }
}
