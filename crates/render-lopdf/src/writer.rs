use flate2::Compression;
use flate2::write::ZlibEncoder;
use lopdf::content::Content;
use lopdf::xref::{Xref, XrefEntry, XrefType};
use lopdf::{Dictionary, Object, ObjectId, Stream, StringFormat, dictionary};
use std::io::{self, Write};
use vexport_render_core::utils::fmt_num;

const PAGES_ID: ObjectId = (1, 0);
const CATALOG_ID: ObjectId = (2, 0);

/// Writes a PDF front to back. Each object goes to the sink as soon as it is
/// known; only its xref entry is kept, and the page tree and catalog are
/// written last under the ids reserved for them.
pub struct StreamingPdfWriter<W: Write> {
    sink: W,
    written: u64,
    xref: Xref,
    next_id: u32,
    compress: bool,
}

impl<W: Write> StreamingPdfWriter<W> {
    pub fn new(sink: W, version: &str, compress: bool) -> io::Result<Self> {
        let mut writer = Self {
            sink,
            written: 0,
            xref: Xref::new(0, XrefType::CrossReferenceTable),
            next_id: CATALOG_ID.0 + 1,
            compress,
        };
        writer.emit(format!("%PDF-{}\n", version).as_bytes())?;
        writer.emit(b"%\xe2\xe3\xcf\xd3\n")?;
        Ok(writer)
    }

    /// Id of the page tree, for the `Parent` entry of pages.
    pub fn pages_id(&self) -> ObjectId {
        PAGES_ID
    }

    fn emit(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.sink.write_all(bytes)?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    fn write_at(&mut self, id: ObjectId, object: &Object) -> io::Result<()> {
        let offset = u32::try_from(self.written)
            .map_err(|_| io::Error::other("PDF exceeds the 4 GiB cross-reference limit"))?;
        let mut body = format!("{} {} obj\n", id.0, id.1).into_bytes();
        encode_object(&mut body, object);
        body.extend_from_slice(b"\nendobj\n");
        self.xref.insert(id.0, XrefEntry::Normal { offset, generation: id.1 });
        self.emit(&body)
    }

    pub fn write_object(&mut self, object: Object) -> io::Result<ObjectId> {
        let id = (self.next_id, 0);
        self.next_id += 1;
        self.write_at(id, &object)?;
        Ok(id)
    }

    /// Writes a stream, deflating it when compression is on.
    pub fn write_stream(&mut self, mut dict: Dictionary, data: Vec<u8>) -> io::Result<ObjectId> {
        let data = if self.compress && !data.is_empty() {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&data)?;
            dict.set("Filter", "FlateDecode");
            encoder.finish()?
        } else {
            data
        };
        self.write_object(Object::Stream(Stream::new(dict, data)))
    }

    pub fn write_content(&mut self, content: Content) -> io::Result<ObjectId> {
        let data = content.encode().map_err(|e| io::Error::other(e.to_string()))?;
        self.write_stream(Dictionary::new(), data)
    }

    /// Writes the page tree, catalog, xref table and trailer.
    pub fn finish(mut self, page_ids: &[ObjectId], info: Option<Dictionary>) -> io::Result<W> {
        let info_id = info.map(|dict| self.write_object(Object::Dictionary(dict))).transpose()?;
        let kids: Vec<Object> = page_ids.iter().map(|id| Object::Reference(*id)).collect();
        let pages = dictionary! { "Type" => "Pages", "Kids" => kids, "Count" => page_ids.len() as i64 };
        self.write_at(PAGES_ID, &Object::Dictionary(pages))?;
        self.write_at(CATALOG_ID, &Object::Dictionary(dictionary! { "Type" => "Catalog", "Pages" => PAGES_ID }))?;

        let xref_offset = self.written;
        self.xref.size = self.next_id;
        let mut tail = Vec::new();
        write_xref(&mut tail, &self.xref)?;
        let mut trailer = dictionary! { "Size" => self.xref.size as i64, "Root" => CATALOG_ID };
        if let Some(id) = info_id {
            trailer.set("Info", id);
        }
        tail.extend_from_slice(b"trailer\n");
        encode_dictionary(&mut tail, &trailer);
        write!(tail, "\nstartxref\n{}\n%%EOF", xref_offset)?;
        self.emit(&tail)?;
        self.sink.flush()?;
        Ok(self.sink)
    }
}

/// Writes one subsection covering ids `0..xref.size`; ids without a normal
/// entry are listed as free.
fn write_xref<O: Write>(out: &mut O, xref: &Xref) -> io::Result<()> {
    writeln!(out, "xref")?;
    writeln!(out, "0 {}", xref.size)?;
    writeln!(out, "0000000000 65535 f ")?;
    for id in 1..xref.size {
        match xref.get(id) {
            Some(XrefEntry::Normal { offset, generation }) => writeln!(out, "{:010} {:05} n ", offset, generation)?,
            _ => writeln!(out, "0000000000 65535 f ")?,
        }
    }
    Ok(())
}

fn is_regular_name_byte(byte: u8) -> bool {
    byte.is_ascii_graphic() && !b"()<>[]{}/%#".contains(&byte)
}

fn encode_object(out: &mut Vec<u8>, object: &Object) {
    match object {
        Object::Null => out.extend_from_slice(b"null"),
        Object::Boolean(value) => out.extend_from_slice(if *value { b"true" } else { b"false" }),
        Object::Integer(value) => out.extend_from_slice(value.to_string().as_bytes()),
        Object::Real(value) => out.extend_from_slice(fmt_num(*value as f64).as_bytes()),
        Object::Name(name) => {
            out.push(b'/');
            for &byte in name {
                if is_regular_name_byte(byte) {
                    out.push(byte);
                } else {
                    out.extend_from_slice(format!("#{:02X}", byte).as_bytes());
                }
            }
        }
        Object::String(bytes, StringFormat::Literal) => {
            out.push(b'(');
            for &byte in bytes {
                match byte {
                    b'(' | b')' | b'\\' => out.extend_from_slice(&[b'\\', byte]),
                    b'\n' => out.extend_from_slice(b"\\n"),
                    b'\r' => out.extend_from_slice(b"\\r"),
                    _ => out.push(byte),
                }
            }
            out.push(b')');
        }
        Object::String(bytes, StringFormat::Hexadecimal) => {
            out.push(b'<');
            for byte in bytes {
                out.extend_from_slice(format!("{:02X}", byte).as_bytes());
            }
            out.push(b'>');
        }
        Object::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                encode_object(out, item);
            }
            out.push(b']');
        }
        Object::Dictionary(dict) => encode_dictionary(out, dict),
        Object::Stream(stream) => {
            let mut dict = stream.dict.clone();
            dict.set("Length", stream.content.len() as i64);
            encode_dictionary(out, &dict);
            out.extend_from_slice(b"\nstream\n");
            out.extend_from_slice(&stream.content);
            out.extend_from_slice(b"\nendstream");
        }
        Object::Reference((number, generation)) => out.extend_from_slice(format!("{} {} R", number, generation).as_bytes()),
    }
}

/// Keys are written in sorted order so that identical inputs give identical bytes.
fn encode_dictionary(out: &mut Vec<u8>, dict: &Dictionary) {
    let mut entries: Vec<_> = dict.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    out.extend_from_slice(b"<<");
    for (key, value) in entries {
        encode_object(out, &Object::Name(key.clone()));
        out.push(b' ');
        encode_object(out, value);
        out.push(b' ');
    }
    out.extend_from_slice(b">>");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_minimal(compress: bool) -> Vec<u8> {
        let mut writer = StreamingPdfWriter::new(Vec::new(), "1.7", compress).unwrap();
        let content = writer.write_stream(Dictionary::new(), b"0 0 m 10 10 l S".to_vec()).unwrap();
        let page = writer
            .write_object(
                dictionary! {
                    "Type" => "Page",
                    "Parent" => writer.pages_id(),
                    "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(10), Object::Integer(10)],
                    "Contents" => content,
                }
                .into(),
            )
            .unwrap();
        writer.finish(&[page], Some(dictionary! { "Title" => Object::string_literal("t") })).unwrap()
    }

    #[test]
    fn test_output_loads_back() {
        for compress in [false, true] {
            let bytes = write_minimal(compress);
            assert!(bytes.starts_with(b"%PDF-1.7"));
            assert!(bytes.ends_with(b"%%EOF"));
            let doc = lopdf::Document::load_mem(&bytes).unwrap();
            assert_eq!(doc.get_pages().len(), 1);
        }
    }

    #[test]
    fn test_xref_offsets_point_at_objects() {
        let bytes = write_minimal(false);
        let start = bytes.windows(5).position(|w| w == b"xref\n").unwrap();
        let table = String::from_utf8_lossy(&bytes[start..]).to_string();
        let mut lines = table.lines().skip(1);
        assert_eq!(lines.next(), Some("0 6"));
        assert_eq!(lines.next(), Some("0000000000 65535 f "));
        for id in 1..6 {
            let entry = lines.next().unwrap();
            let offset: usize = entry[..10].parse().unwrap();
            assert!(entry.ends_with(" 00000 n "));
            assert!(bytes[offset..].starts_with(format!("{} 0 obj", id).as_bytes()));
        }
        assert!(table.contains("/Size 6"));
    }

    #[test]
    fn test_compressed_stream_is_flagged() {
        let plain = String::from_utf8_lossy(&write_minimal(false)).to_string();
        assert!(plain.contains("0 0 m 10 10 l S"));
        let packed = String::from_utf8_lossy(&write_minimal(true)).to_string();
        assert!(packed.contains("/Filter /FlateDecode"));
        assert!(!packed.contains("0 0 m 10 10 l S"));
    }

    #[test]
    fn test_encoding_escapes() {
        let mut out = Vec::new();
        encode_object(
            &mut out,
            &Object::Array(vec![
                Object::Name(b"A B".to_vec()),
                Object::string_literal("a(b)\n"),
                Object::Real(0.5),
                Object::Reference((4, 0)),
            ]),
        );
        assert_eq!(String::from_utf8(out).unwrap(), "[/A#20B (a\\(b\\)\\n) 0.5 4 0 R]");
    }
}
