//! Minimal owned XML tree over `quick-xml` events.
//!
//! WordprocessingML parts are small enough to hold in memory, and editing a
//! tree is far simpler than splicing event streams. Names are kept verbatim
//! (`w:p`, `wp:inline`) and namespaces are never resolved, so a round trip
//! leaves untouched markup byte-for-byte equivalent apart from attribute
//! quoting and empty-element form.

use crate::error::{ReportError, Result};
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
}

impl Node {
    pub fn is_element(&self, name: &str) -> bool {
        matches!(self, Node::Element(e) if e.name == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Element {
            name: name.to_string(),
            ..Element::default()
        }
    }

    pub fn with_attr(mut self, key: &str, value: &str) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, key: &str, value: &str) {
        match self.attrs.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.to_string(),
            None => self.attrs.push((key.to_string(), value.to_string())),
        }
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.elements_mut().find(|e| e.name == name)
    }

    /// Existing child `name`, or a new empty one inserted at the front (or
    /// appended when `front` is false).
    pub fn ensure_child(&mut self, name: &str, front: bool) -> &mut Element {
        let pos = match self.children.iter().position(|n| n.is_element(name)) {
            Some(p) => p,
            None if front => {
                self.children.insert(0, Node::Element(Element::new(name)));
                0
            }
            None => {
                self.children.push(Node::Element(Element::new(name)));
                self.children.len() - 1
            }
        };
        match &mut self.children[pos] {
            Node::Element(e) => e,
            _ => unreachable!("position {pos} holds an element"),
        }
    }

    pub fn remove_children(&mut self, name: &str) {
        self.children.retain(|n| !n.is_element(name));
    }

    /// Concatenated text of direct text children.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for n in &self.children {
            match n {
                Node::Text(t) | Node::CData(t) => out.push_str(t),
                _ => {}
            }
        }
        out
    }

    pub fn set_text(&mut self, text: &str) {
        self.children.clear();
        if !text.is_empty() {
            self.children.push(Node::Text(text.to_string()));
        }
    }

    /// Outermost descendants named `name`, in document order. Matches are not
    /// searched further.
    pub fn find_all<'a>(&'a self, name: &str, out: &mut Vec<&'a Element>) {
        for el in self.elements() {
            if el.name == name {
                out.push(el);
            } else {
                el.find_all(name, out);
            }
        }
    }

    /// Mutable counterpart of [`Element::find_all`].
    pub fn find_all_mut<'a>(&'a mut self, name: &str, out: &mut Vec<&'a mut Element>) {
        for child in self.children.iter_mut() {
            if let Node::Element(el) = child {
                if el.name == name {
                    out.push(el);
                } else {
                    el.find_all_mut(name, out);
                }
            }
        }
    }

    pub fn find_first(&self, name: &str) -> Option<&Element> {
        for el in self.elements() {
            if el.name == name {
                return Some(el);
            }
            if let Some(found) = el.find_first(name) {
                return Some(found);
            }
        }
        None
    }
}

/// A parsed XML part: optional declaration plus the root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    pub declaration: bool,
    pub root: Element,
}

fn element_from(start: &BytesStart) -> Result<Element> {
    let mut el = Element::new(&String::from_utf8_lossy(start.name().as_ref()));
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::InvalidAttr)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        el.attrs.push((key, value));
    }
    Ok(el)
}

fn attach(stack: &mut [Element], top: &mut Vec<Node>, node: Node) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => top.push(node),
    }
}

fn parse_nodes(xml: &str) -> Result<(bool, Vec<Node>)> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);

    let mut declaration = false;
    let mut stack: Vec<Element> = Vec::new();
    let mut top: Vec<Node> = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Decl(_) => declaration = true,
            Event::Start(e) => stack.push(element_from(&e)?),
            Event::Empty(e) => {
                let el = element_from(&e)?;
                attach(&mut stack, &mut top, Node::Element(el));
            }
            Event::End(_) => {
                let el = stack
                    .pop()
                    .ok_or_else(|| ReportError::MalformedPackage("unbalanced end tag".into()))?;
                attach(&mut stack, &mut top, Node::Element(el));
            }
            Event::Text(t) => {
                let text = t.unescape()?.into_owned();
                attach(&mut stack, &mut top, Node::Text(text));
            }
            Event::CData(c) => {
                let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                attach(&mut stack, &mut top, Node::CData(text));
            }
            Event::Comment(c) => {
                let text = String::from_utf8_lossy(&c).into_owned();
                attach(&mut stack, &mut top, Node::Comment(text));
            }
            Event::Eof => break,
            _ => {}
        }
    }
    if let Some(open) = stack.last() {
        return Err(ReportError::MalformedPackage(format!(
            "unclosed element <{}>",
            open.name
        )));
    }
    Ok((declaration, top))
}

pub fn parse(xml: &str) -> Result<XmlDocument> {
    let (declaration, top) = parse_nodes(xml)?;
    let root = top
        .into_iter()
        .find_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
        .ok_or_else(|| ReportError::MalformedPackage("xml part has no root element".into()))?;
    Ok(XmlDocument { declaration, root })
}

/// Parse a snippet with one or more top-level elements.
pub fn parse_fragment(xml: &str) -> Result<Vec<Element>> {
    let (_, top) = parse_nodes(xml)?;
    Ok(top
        .into_iter()
        .filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
        .collect())
}

fn write_element(writer: &mut Writer<Vec<u8>>, el: &Element) -> Result<()> {
    let mut start = BytesStart::new(el.name.as_str());
    for (k, v) in &el.attrs {
        start.push_attribute((k.as_str(), v.as_str()));
    }
    if el.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }
    writer.write_event(Event::Start(start))?;
    for child in &el.children {
        match child {
            Node::Element(c) => write_element(writer, c)?,
            Node::Text(t) => writer.write_event(Event::Text(BytesText::new(t)))?,
            Node::CData(t) => writer.write_event(Event::CData(BytesCData::new(t.as_str())))?,
            Node::Comment(t) => {
                writer.write_event(Event::Comment(BytesText::from_escaped(t.as_str())))?
            }
        }
    }
    writer.write_event(Event::End(BytesEnd::new(el.name.as_str())))?;
    Ok(())
}

pub fn write(doc: &XmlDocument) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());
    if doc.declaration {
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        writer.get_mut().extend_from_slice(b"\r\n");
    }
    write_element(&mut writer, &doc.root)?;
    Ok(writer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_keeps_structure_and_text() {
        let src = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="urn:w"><w:body><w:p><w:r><w:t xml:space="preserve"> a &amp; b </w:t></w:r></w:p><w:sectPr/></w:body></w:document>"#;
        let doc = parse(src).unwrap();
        assert!(doc.declaration);
        let t = doc.root.find_first("w:t").unwrap();
        assert_eq!(t.text(), " a & b ");
        assert_eq!(t.attr("xml:space"), Some("preserve"));

        let out = String::from_utf8(write(&doc).unwrap()).unwrap();
        assert!(out.contains("<w:t xml:space=\"preserve\"> a &amp; b </w:t>"));
        assert!(out.contains("<w:sectPr/>"));
        assert_eq!(parse(&out).unwrap(), doc);
    }

    #[test]
    fn find_all_stops_at_outermost_match() {
        let doc = parse("<r><a><a/></a><b><a/></b></r>").unwrap();
        let mut found = Vec::new();
        doc.root.find_all("a", &mut found);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].children.len(), 1);
    }

    #[test]
    fn ensure_child_inserts_once() {
        let mut el = Element::new("w:p").with_child(Element::new("w:r"));
        el.ensure_child("w:pPr", true).set_attr("x", "1");
        el.ensure_child("w:pPr", true).set_attr("y", "2");
        assert_eq!(el.children.len(), 2);
        assert!(el.children[0].is_element("w:pPr"));
        assert_eq!(el.child("w:pPr").unwrap().attrs.len(), 2);
    }

    #[test]
    fn malformed_input_is_an_error() {
        assert!(parse("<a><b></a>").is_err());
        assert!(parse("<a>").is_err());
        assert!(parse("   ").is_err());
    }
}
