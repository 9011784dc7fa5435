use super::document::Document;
use super::xml::{self, Element};
use crate::error::{ReportError, Result};
use std::collections::HashSet;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use tracing::debug;

pub const DOCUMENT_PART: &str = "word/document.xml";
pub const DOCUMENT_RELS: &str = "word/_rels/document.xml.rels";
pub const CONTENT_TYPES: &str = "[Content_Types].xml";
const MEDIA_DIR: &str = "word/media/";

const RELS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const IMAGE_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

/// An opened .docx: every zip entry in original order, with the main
/// document parsed for editing.
#[derive(Debug, Clone)]
pub struct DocxPackage {
    entries: Vec<(String, Vec<u8>)>,
    pub document: Document,
}

impl DocxPackage {
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;
            entries.push((name, data));
        }
        Self::from_entries(entries)
    }

    pub fn from_entries(entries: Vec<(String, Vec<u8>)>) -> Result<Self> {
        let raw = entries
            .iter()
            .find(|(name, _)| name == DOCUMENT_PART)
            .map(|(_, data)| data)
            .ok_or_else(|| ReportError::MalformedPackage(format!("missing {DOCUMENT_PART}")))?;
        let text = std::str::from_utf8(raw)
            .map_err(|e| ReportError::MalformedPackage(format!("{DOCUMENT_PART}: {e}")))?;
        let document = Document::parse(text)?;
        Ok(DocxPackage { entries, document })
    }

    pub fn entry(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d.as_slice())
    }

    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    fn set_entry(&mut self, name: &str, data: Vec<u8>) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some((_, d)) => *d = data,
            None => self.entries.push((name.to_string(), data)),
        }
    }

    fn xml_entry(&self, name: &str) -> Result<Option<xml::XmlDocument>> {
        let Some(raw) = self.entry(name) else {
            return Ok(None);
        };
        let text = std::str::from_utf8(raw)
            .map_err(|e| ReportError::MalformedPackage(format!("{name}: {e}")))?;
        xml::parse(text).map(Some)
    }

    /// Store image bytes as a new media part and return the relationship id
    /// that references it from the main document.
    pub fn add_image(&mut self, bytes: Vec<u8>, ext: &str) -> Result<String> {
        let ext = ext.to_ascii_lowercase();
        let names: HashSet<&str> = self.entry_names().collect();
        let media_name = (1..)
            .map(|n| format!("{MEDIA_DIR}report_image{n}.{ext}"))
            .find(|candidate| !names.contains(candidate.as_str()))
            .unwrap_or_default();

        let mut rels = self.xml_entry(DOCUMENT_RELS)?.unwrap_or_else(|| xml::XmlDocument {
            declaration: true,
            root: Element::new("Relationships").with_attr("xmlns", RELS_NS),
        });
        let next = rels
            .root
            .elements()
            .filter_map(|r| r.attr("Id"))
            .filter_map(|id| id.strip_prefix("rId").and_then(|n| n.parse::<u32>().ok()))
            .max()
            .unwrap_or(0)
            + 1;
        let rel_id = format!("rId{next}");
        let target = media_name.trim_start_matches("word/").to_string();
        rels.root.push(
            Element::new("Relationship")
                .with_attr("Id", &rel_id)
                .with_attr("Type", IMAGE_REL)
                .with_attr("Target", &target),
        );
        self.set_entry(DOCUMENT_RELS, xml::write(&rels)?);

        if let Some(mut types) = self.xml_entry(CONTENT_TYPES)? {
            let registered = types.root.elements().any(|e| {
                e.name == "Default"
                    && e.attr("Extension")
                        .is_some_and(|x| x.eq_ignore_ascii_case(&ext))
            });
            if !registered {
                types.root.children.insert(
                    0,
                    xml::Node::Element(
                        Element::new("Default")
                            .with_attr("Extension", &ext)
                            .with_attr("ContentType", content_type(&ext)),
                    ),
                );
                self.set_entry(CONTENT_TYPES, xml::write(&types)?);
            }
        }

        debug!(media = %media_name, rel = %rel_id, "added image part");
        self.set_entry(&media_name, bytes);
        Ok(rel_id)
    }

    /// Serialize the package, writing the edited document back in place.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let document = self.document.to_xml()?;
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let deflated = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        let stored = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (name, data) in &self.entries {
            let opts = if name.starts_with(MEDIA_DIR) {
                stored
            } else {
                deflated
            };
            zip.start_file(name.as_str(), opts)?;
            if name == DOCUMENT_PART {
                zip.write_all(&document)?;
            } else {
                zip.write_all(data)?;
            }
        }
        Ok(zip.finish()?.into_inner())
    }

    /// Write the package to `path` in one go.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

fn content_type(ext: &str) -> &'static str {
    match ext {
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::docx::document::tests::document_xml;

    pub(crate) const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;
    pub(crate) const RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

    /// In-memory package around the given body markup.
    pub(crate) fn package_with_body(body: &str) -> DocxPackage {
        DocxPackage::from_entries(vec![
            (CONTENT_TYPES.to_string(), CONTENT_TYPES_XML.as_bytes().to_vec()),
            (DOCUMENT_PART.to_string(), document_xml(body).into_bytes()),
            (DOCUMENT_RELS.to_string(), RELS_XML.as_bytes().to_vec()),
        ])
        .unwrap()
    }

    #[test]
    fn missing_document_part_is_malformed() {
        let err = DocxPackage::from_entries(vec![(
            CONTENT_TYPES.to_string(),
            CONTENT_TYPES_XML.as_bytes().to_vec(),
        )])
        .unwrap_err();
        assert!(matches!(err, ReportError::MalformedPackage(_)));
    }

    #[test]
    fn add_image_registers_part_relationship_and_type() {
        let mut pkg = package_with_body("<w:p/>");
        let first = pkg.add_image(vec![1, 2, 3], "PNG").unwrap();
        let second = pkg.add_image(vec![4, 5], "png").unwrap();
        assert_eq!(first, "rId2");
        assert_eq!(second, "rId3");
        assert_eq!(pkg.entry("word/media/report_image1.png"), Some(&[1u8, 2, 3][..]));
        assert!(pkg.entry("word/media/report_image2.png").is_some());

        let rels = String::from_utf8(pkg.entry(DOCUMENT_RELS).unwrap().to_vec()).unwrap();
        assert!(rels.contains(r#"Id="rId3""#));
        assert!(rels.contains(r#"Target="media/report_image2.png""#));
        let types = String::from_utf8(pkg.entry(CONTENT_TYPES).unwrap().to_vec()).unwrap();
        assert_eq!(types.matches(r#"Extension="png""#).count(), 1);
    }

    #[test]
    fn saved_bytes_reopen_with_edits() {
        let mut pkg = package_with_body("<w:p><w:r><w:t>旧</w:t></w:r></w:p>");
        let p = pkg.document.paragraphs_mut().remove(0);
        crate::docx::document::set_paragraph_text(p, "新", false);
        pkg.add_image(vec![9; 16], "jpg").unwrap();

        let reopened = DocxPackage::from_bytes(&pkg.to_bytes().unwrap()).unwrap();
        assert_eq!(reopened.document.all_paragraph_texts(), vec!["新".to_string()]);
        let names: Vec<&str> = reopened.entry_names().collect();
        assert_eq!(names[0], CONTENT_TYPES);
        assert!(names.contains(&"word/media/report_image1.jpg"));
    }
}
