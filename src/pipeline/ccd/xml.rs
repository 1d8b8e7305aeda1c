//! Namespace-stripped element tree over `quick-xml` events.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::CcdError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlElement {
    /// Local name, prefix dropped.
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Trimmed text content, `None` when blank.
    pub fn text(&self) -> Option<&str> {
        let t = self.text.trim();
        (!t.is_empty()).then_some(t)
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Follow a chain of direct children.
    pub fn path(&self, path: &[&str]) -> Option<&XmlElement> {
        path.iter().try_fold(self, |el, name| el.child(name))
    }

    /// All descendants in document order, excluding `self`.
    pub fn descendants(&self) -> Vec<&XmlElement> {
        let mut out = Vec::new();
        let mut stack: Vec<&XmlElement> = self.children.iter().rev().collect();
        while let Some(el) = stack.pop() {
            out.push(el);
            stack.extend(el.children.iter().rev());
        }
        out
    }

    pub fn find_all(&self, name: &str) -> Vec<&XmlElement> {
        self.descendants()
            .into_iter()
            .filter(|el| el.name == name)
            .collect()
    }

    pub fn find(&self, name: &str) -> Option<&XmlElement> {
        self.descendants().into_iter().find(|el| el.name == name)
    }

    /// First descendant named `path[0]` from which the rest of `path`
    /// resolves through direct children.
    pub fn find_path(&self, path: &[&str]) -> Option<&XmlElement> {
        let (first, rest) = path.split_first()?;
        self.find_all(first)
            .into_iter()
            .find_map(|el| el.path(rest))
    }
}

/// Parse a whole document into its root element.
pub fn parse_document(bytes: &[u8]) -> Result<XmlElement, CcdError> {
    let mut reader = Reader::from_reader(bytes);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| {
            CcdError::MalformedDocument(format!(
                "XML error at byte {}: {e}",
                reader.buffer_position()
            ))
        })?;

        match event {
            Event::Start(start) => stack.push(open(&start)?),
            Event::Empty(start) => {
                let el = open(&start)?;
                close(el, &mut stack, &mut root)?;
            }
            Event::End(_) => {
                let el = stack.pop().ok_or_else(|| {
                    CcdError::MalformedDocument("closing tag without an open element".into())
                })?;
                close(el, &mut stack, &mut root)?;
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    let text = text
                        .unescape()
                        .map_err(|e| CcdError::MalformedDocument(format!("bad text: {e}")))?;
                    push_text(current, &text);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    let text = std::str::from_utf8(&data)
                        .map_err(|e| CcdError::MalformedDocument(format!("bad CDATA: {e}")))?;
                    push_text(current, text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(CcdError::MalformedDocument(format!(
            "unclosed element <{}>",
            open.name
        )));
    }
    root.ok_or_else(|| CcdError::MalformedDocument("no root element".into()))
}

fn open(start: &BytesStart<'_>) -> Result<XmlElement, CcdError> {
    let name = utf8(start.local_name().as_ref())?;
    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| CcdError::MalformedDocument(format!("bad attribute: {e}")))?;
        let key = utf8(attr.key.local_name().as_ref())?;
        let value = attr
            .unescape_value()
            .map_err(|e| CcdError::MalformedDocument(format!("bad attribute value: {e}")))?;
        attrs.push((key, value.into_owned()));
    }
    Ok(XmlElement {
        name,
        attrs,
        ..XmlElement::default()
    })
}

fn close(
    el: XmlElement,
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
) -> Result<(), CcdError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(el),
        None if root.is_none() => *root = Some(el),
        None => {
            return Err(CcdError::MalformedDocument(format!(
                "second root element <{}>",
                el.name
            )))
        }
    }
    Ok(())
}

fn push_text(el: &mut XmlElement, text: &str) {
    if !el.text.is_empty() {
        el.text.push(' ');
    }
    el.text.push_str(text);
}

fn utf8(bytes: &[u8]) -> Result<String, CcdError> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| CcdError::MalformedDocument(format!("invalid UTF-8 name: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_prefixes_and_keeps_attributes() {
        let doc = br#"<?xml version="1.0"?>
            <hl7:ClinicalDocument xmlns:hl7="urn:hl7-org:v3">
              <hl7:title>Summary &amp; Notes</hl7:title>
              <hl7:code code="34133-9" displayName="Summary"/>
            </hl7:ClinicalDocument>"#;
        let root = parse_document(doc).unwrap();
        assert_eq!(root.name, "ClinicalDocument");
        assert_eq!(root.child("title").and_then(|t| t.text()), Some("Summary & Notes"));
        assert_eq!(root.child("code").and_then(|c| c.attr("code")), Some("34133-9"));
    }

    #[test]
    fn find_path_resolves_descendant_chains() {
        let doc = br#"<a><x><b><c id="1"/></b></x><b><d/></b></a>"#;
        let root = parse_document(doc).unwrap();
        assert_eq!(root.find_path(&["b", "c"]).and_then(|c| c.attr("id")), Some("1"));
        assert!(root.find_path(&["b", "e"]).is_none());
        assert_eq!(root.find_all("b").len(), 2);
    }

    #[test]
    fn malformed_input_is_rejected() {
        for bad in [&b"<a><b></a>"[..], b"<a><b>", b"", b"just text"] {
            assert!(
                matches!(parse_document(bad), Err(CcdError::MalformedDocument(_))),
                "accepted {:?}",
                String::from_utf8_lossy(bad)
            );
        }
    }
}
