//! Minimal XML tree for style and locale files.

use crate::error::RenderError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

type Result<T> = std::result::Result<T, RenderError>;

#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct XmlNode {
    /// Local name, without namespace prefix.
    pub name: String,
    /// Attributes by qualified name (`xml:lang` keeps its prefix).
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlChild>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum XmlChild {
    Element(XmlNode),
    Text(String),
}

impl XmlNode {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn elements(&self) -> impl Iterator<Item = &XmlNode> {
        self.children.iter().filter_map(|child| match child {
            XmlChild::Element(node) => Some(node),
            XmlChild::Text(_) => None,
        })
    }

    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.elements().find(|node| node.name == name)
    }

    /// Concatenated text content of direct text children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|child| match child {
                XmlChild::Text(text) => Some(text.as_str()),
                XmlChild::Element(_) => None,
            })
            .collect()
    }
}

/// Parse a document and return its root element.
pub(crate) fn parse(source: &str) -> Result<XmlNode> {
    let mut reader = Reader::from_str(source);
    reader.config_mut().trim_text_start = false;
    reader.config_mut().trim_text_end = false;

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => stack.push(element(&e)?),
            Event::Empty(e) => attach(&mut stack, &mut root, element(&e)?)?,
            Event::End(e) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| RenderError::Style("unexpected closing tag".to_string()))?;
                let end = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if node.name != end {
                    return Err(RenderError::Style(format!(
                        "expected </{}>, found </{}>",
                        node.name, end
                    )));
                }
                attach(&mut stack, &mut root, node)?;
            }
            Event::Text(e) => {
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(XmlChild::Text(e.unescape()?.into_owned()));
                }
            }
            Event::CData(e) => {
                if let Some(parent) = stack.last_mut() {
                    let text = String::from_utf8_lossy(&e.into_inner()).to_string();
                    parent.children.push(XmlChild::Text(text));
                }
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions, doctypes.
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(RenderError::Style(format!("unclosed element <{}>", open.name)));
    }
    root.ok_or_else(|| RenderError::Style("empty document".to_string()))
}

fn element(e: &BytesStart<'_>) -> Result<XmlNode> {
    let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| RenderError::Style(err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr.unescape_value()?.into_owned();
        attrs.push((key, value));
    }
    Ok(XmlNode {
        name,
        attrs,
        children: Vec::new(),
    })
}

fn attach(stack: &mut [XmlNode], root: &mut Option<XmlNode>, node: XmlNode) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(XmlChild::Element(node)),
        None if root.is_none() => *root = Some(node),
        None => return Err(RenderError::Style("multiple root elements".to_string())),
    }
    Ok(())
}
