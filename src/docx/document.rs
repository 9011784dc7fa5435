use super::xml::{self, Element, Node, XmlDocument};
use crate::error::{ReportError, Result};

/// `w:pPr` children that must come after `w:jc`.
const AFTER_JC: [&str; 9] = [
    "w:textDirection",
    "w:textAlignment",
    "w:textboxTightWrap",
    "w:outlineLvl",
    "w:divId",
    "w:cnfStyle",
    "w:rPr",
    "w:sectPr",
    "w:pPrChange",
];

/// `word/document.xml` with its body held apart for editing.
#[derive(Debug, Clone)]
pub struct Document {
    declaration: bool,
    root: Element,
    body: Element,
    body_pos: usize,
}

impl Document {
    pub fn parse(text: &str) -> Result<Self> {
        let XmlDocument {
            declaration,
            mut root,
        } = xml::parse(text)?;
        let body_pos = root
            .children
            .iter()
            .position(|n| n.is_element("w:body"))
            .ok_or_else(|| ReportError::MalformedPackage("document has no w:body".into()))?;
        let body = match root.children.remove(body_pos) {
            Node::Element(e) => e,
            _ => unreachable!("w:body position holds an element"),
        };
        Ok(Document {
            declaration,
            root,
            body,
            body_pos,
        })
    }

    pub fn to_xml(&self) -> Result<Vec<u8>> {
        let mut root = self.root.clone();
        root.children
            .insert(self.body_pos, Node::Element(self.body.clone()));
        xml::write(&XmlDocument {
            declaration: self.declaration,
            root,
        })
    }

    pub fn body(&self) -> &Element {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Element {
        &mut self.body
    }

    /// Every paragraph in the body, including those nested in table cells.
    pub fn paragraphs_mut(&mut self) -> Vec<&mut Element> {
        let mut out = Vec::new();
        self.body.find_all_mut("w:p", &mut out);
        out
    }

    /// Text of every paragraph, body-level and in tables, in document order.
    pub fn all_paragraph_texts(&self) -> Vec<String> {
        let mut paras = Vec::new();
        self.body.find_all("w:p", &mut paras);
        paras.into_iter().map(paragraph_text).collect()
    }

    pub fn tables(&self) -> Vec<&Element> {
        self.body.elements().filter(|e| e.name == "w:tbl").collect()
    }

    /// Every table cell, outer tables first, in document order.
    pub fn table_cells(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        self.body.find_all("w:tc", &mut out);
        out
    }

    pub fn table_cells_mut(&mut self) -> Vec<&mut Element> {
        let mut out = Vec::new();
        self.body.find_all_mut("w:tc", &mut out);
        out
    }

    /// Smallest drawing id not yet used by a `wp:docPr`.
    pub fn next_drawing_id(&self) -> u32 {
        let mut props = Vec::new();
        self.body.find_all("wp:docPr", &mut props);
        props
            .iter()
            .filter_map(|p| p.attr("id").and_then(|id| id.parse::<u32>().ok()))
            .max()
            .map_or(1, |m| m.saturating_add(1))
    }
}

/// Visible text of a paragraph: all `w:t` runs, tabs and breaks.
pub fn paragraph_text(p: &Element) -> String {
    fn walk(el: &Element, out: &mut String) {
        for child in el.elements() {
            match child.name.as_str() {
                "w:t" => out.push_str(&child.text()),
                "w:tab" => out.push('\t'),
                "w:br" | "w:cr" => out.push('\n'),
                _ => walk(child, out),
            }
        }
    }
    let mut out = String::new();
    walk(p, &mut out);
    out
}

/// Cell text with paragraphs joined by newlines.
pub fn cell_text(tc: &Element) -> String {
    tc.elements()
        .filter(|e| e.name == "w:p")
        .map(paragraph_text)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn text_element(text: &str) -> Element {
    let mut t = Element::new("w:t").with_attr("xml:space", "preserve");
    t.set_text(text);
    t
}

/// A run carrying `text`, with `\n` rendered as line breaks.
pub fn text_run(rpr: Option<Element>, text: &str) -> Element {
    let mut run = Element::new("w:r");
    if let Some(rpr) = rpr {
        run.push(rpr);
    }
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            run.push(Element::new("w:br"));
        }
        run.push(text_element(line.trim_end_matches('\r')));
    }
    run
}

pub fn set_alignment(p: &mut Element, value: &str) {
    let ppr = p.ensure_child("w:pPr", true);
    if let Some(jc) = ppr.child_mut("w:jc") {
        jc.set_attr("w:val", value);
        return;
    }
    let jc = Node::Element(Element::new("w:jc").with_attr("w:val", value));
    match ppr
        .children
        .iter()
        .position(|n| AFTER_JC.iter().any(|name| n.is_element(name)))
    {
        Some(pos) => ppr.children.insert(pos, jc),
        None => ppr.children.push(jc),
    }
}

/// Replace all runs of `p` with a single run of `text`. Paragraph properties
/// and the first run's character formatting survive.
pub fn set_paragraph_text(p: &mut Element, text: &str, centered: bool) {
    let rpr = p
        .find_first("w:r")
        .and_then(|r| r.child("w:rPr"))
        .cloned();
    p.children.retain(|n| n.is_element("w:pPr"));
    if centered {
        set_alignment(p, "center");
    }
    if !text.is_empty() {
        p.push(text_run(rpr, text));
    }
}

/// Strip a cell down to its properties and one paragraph, and return that
/// paragraph with its runs removed.
pub fn clear_cell(tc: &mut Element) -> &mut Element {
    let mut kept_paragraph = false;
    tc.children.retain(|n| match n {
        Node::Element(e) if e.name == "w:tcPr" => true,
        Node::Element(e) if e.name == "w:p" && !kept_paragraph => {
            kept_paragraph = true;
            true
        }
        _ => false,
    });
    let p = tc.ensure_child("w:p", false);
    p.children.retain(|n| n.is_element("w:pPr"));
    p
}

pub fn set_cell_text(tc: &mut Element, text: &str, centered: bool) {
    let rpr = tc
        .find_first("w:r")
        .and_then(|r| r.child("w:rPr"))
        .cloned();
    let p = clear_cell(tc);
    if centered {
        set_alignment(p, "center");
    }
    if !text.is_empty() {
        p.push(text_run(rpr, text));
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const W_NS: &str =
        "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

    /// Wrap body markup into a complete `document.xml`.
    pub(crate) fn document_xml(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="{W_NS}"><w:body>{body}<w:sectPr/></w:body></w:document>"#
        )
    }

    #[test]
    fn body_survives_round_trip_in_place() {
        let doc = Document::parse(&document_xml("<w:p><w:r><w:t>甲</w:t></w:r></w:p>")).unwrap();
        let out = String::from_utf8(doc.to_xml().unwrap()).unwrap();
        assert!(out.starts_with("<?xml"));
        assert!(out.contains("<w:body><w:p><w:r><w:t>甲</w:t></w:r></w:p><w:sectPr/></w:body>"));
    }

    #[test]
    fn missing_body_is_malformed() {
        let err = Document::parse(&format!(r#"<w:document xmlns:w="{W_NS}"/>"#)).unwrap_err();
        assert!(matches!(err, ReportError::MalformedPackage(_)));
    }

    #[test]
    fn paragraph_text_spans_runs() {
        let doc = Document::parse(&document_xml(
            "<w:p><w:r><w:t>表 3.</w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>1.1</w:t><w:tab/><w:t>梁体</w:t></w:r></w:p>",
        ))
        .unwrap();
        assert_eq!(doc.all_paragraph_texts(), vec!["表 3.1.1\t梁体".to_string()]);
    }

    #[test]
    fn set_cell_text_keeps_formatting_and_centers() {
        let mut tc = xml::parse(
            r#"<w:tc><w:tcPr><w:tcW w:w="100"/></w:tcPr><w:p><w:pPr><w:rPr><w:sz w:val="18"/></w:rPr></w:pPr><w:r><w:rPr><w:b/></w:rPr><w:t>old</w:t></w:r></w:p><w:p><w:r><w:t>second</w:t></w:r></w:p></w:tc>"#,
        )
        .unwrap()
        .root;
        set_cell_text(&mut tc, "a\nb", true);

        assert_eq!(cell_text(&tc), "a\nb");
        assert_eq!(tc.elements().filter(|e| e.name == "w:p").count(), 1);
        let ppr = tc.find_first("w:pPr").unwrap();
        assert!(ppr.children[0].is_element("w:jc"));
        assert_eq!(ppr.child("w:jc").unwrap().attr("w:val"), Some("center"));
        let run = tc.find_first("w:r").unwrap();
        assert!(run.child("w:rPr").unwrap().child("w:b").is_some());
        assert!(run.child("w:br").is_some());
    }

    #[test]
    fn next_drawing_id_follows_existing() {
        let doc = Document::parse(&document_xml(
            r#"<w:p><w:r><w:drawing><wp:inline><wp:docPr id="7" name="x"/></wp:inline></w:drawing></w:r></w:p>"#,
        ))
        .unwrap();
        assert_eq!(doc.next_drawing_id(), 8);
        let empty = Document::parse(&document_xml("")).unwrap();
        assert_eq!(empty.next_drawing_id(), 1);
    }
}
