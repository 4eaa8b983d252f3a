//! Builds [`XmlTree`]s from text with quick-xml's pull reader.
//!
//! Parsing is all-or-nothing: any well-formedness problem discards the whole
//! tree and the caller gets `None`.

use std::borrow::Cow;

use anyhow::{Context, Result, anyhow, bail};
use quick_xml::Reader;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesStart, Event};

use super::query::is_whitespaces;
use super::tree::{Attributes, NodeId, XmlElement, XmlNode, XmlTree};

/// Options for [`xml_string_parser`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Keep comments as [`XmlNode::Comment`] nodes instead of dropping them.
    pub preserve_comments: bool,
    /// Apply [`XmlTree::remove_trailing_whitespaces`] to the parsed document.
    pub remove_trailing_whitespaces: bool,
}

/// Parse `xml`, returning `None` if it is not well-formed.
///
/// Undefined entity references are kept in the text as written.
pub fn xml_string_parser(xml: &str, options: &ParseOptions) -> Option<XmlTree> {
    match TreeBuilder::new(options.preserve_comments).build(xml) {
        Ok(tree) if options.remove_trailing_whitespaces => Some(tree.remove_trailing_whitespaces()),
        Ok(tree) => Some(tree),
        Err(err) => {
            tracing::debug!(error = %err, "cannot parse XML");
            None
        }
    }
}

impl XmlTree {
    /// Parse with default [`ParseOptions`].
    pub fn parse(xml: &str) -> Option<XmlTree> {
        xml_string_parser(xml, &ParseOptions::default())
    }
}

struct TreeBuilder {
    tree: XmlTree,
    /// Open elements, the document at the bottom
    stack: Vec<NodeId>,
    /// Character data not yet turned into a text node
    text: String,
    preserve_comments: bool,
    seen_root: bool,
}

impl TreeBuilder {
    fn new(preserve_comments: bool) -> Self {
        Self {
            tree: XmlTree::new(),
            stack: vec![XmlTree::ROOT],
            text: String::new(),
            preserve_comments,
            seen_root: false,
        }
    }

    fn build(mut self, xml: &str) -> Result<XmlTree> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(false);

        loop {
            let event = reader
                .read_event()
                .with_context(|| format!("at byte {}", reader.error_position()))?;
            match event {
                Event::Start(e) => {
                    let id = self.open_element(&e)?;
                    self.stack.push(id);
                }
                Event::Empty(e) => {
                    self.open_element(&e)?;
                }
                Event::End(_) => {
                    self.flush_text()?;
                    if self.stack.len() == 1 {
                        bail!("end tag without a start tag");
                    }
                    self.stack.pop();
                }
                Event::Text(e) => {
                    let text = std::str::from_utf8(&e)?;
                    self.text.push_str(&normalize_line_endings(text));
                }
                Event::GeneralRef(e) => {
                    let name = std::str::from_utf8(&e)?;
                    self.text.push_str(&resolve_reference(name)?);
                }
                Event::CData(e) => {
                    self.flush_text()?;
                    if self.stack.len() == 1 {
                        bail!("CDATA section outside the root element");
                    }
                    let content = std::str::from_utf8(&e)?.to_string();
                    self.tree.attach(self.parent(), XmlNode::CData(content));
                }
                Event::Comment(e) => {
                    if self.preserve_comments {
                        self.flush_text()?;
                        let content = std::str::from_utf8(&e)?.to_string();
                        self.tree.attach(self.parent(), XmlNode::Comment(content));
                    }
                }
                Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
                Event::Eof => break,
            }
        }

        self.flush_text()?;
        if self.stack.len() > 1 {
            bail!("unclosed element at end of input");
        }
        if !self.seen_root {
            bail!("no root element");
        }
        Ok(self.tree)
    }

    fn parent(&self) -> NodeId {
        self.stack.last().copied().unwrap_or(XmlTree::ROOT)
    }

    fn open_element(&mut self, start: &BytesStart<'_>) -> Result<NodeId> {
        self.flush_text()?;
        if self.stack.len() == 1 {
            if self.seen_root {
                bail!("more than one root element");
            }
            self.seen_root = true;
        }

        let name = std::str::from_utf8(start.name().as_ref())?.to_string();
        let mut attributes = Attributes::new();
        for attr in start.attributes() {
            let attr = attr?;
            let key = std::str::from_utf8(attr.key.as_ref())?;
            let raw = std::str::from_utf8(&attr.value)?;
            attributes.insert(key, Some(unescape(raw)?.into_owned()));
        }

        Ok(self.tree.attach(
            self.parent(),
            XmlNode::Element(XmlElement {
                name,
                attributes,
                children: Vec::new(),
            }),
        ))
    }

    /// Turn pending character data into a text node. Outside the root
    /// element only whitespace is allowed, and it is not kept.
    fn flush_text(&mut self) -> Result<()> {
        if self.text.is_empty() {
            return Ok(());
        }
        let text = std::mem::take(&mut self.text);
        if self.stack.len() == 1 {
            if !is_whitespaces(&text) {
                bail!("text outside the root element");
            }
            return Ok(());
        }
        self.tree.attach(self.parent(), XmlNode::Text(text));
        Ok(())
    }
}

/// Replacement text for `&name;`. Unknown entities stay as written.
fn resolve_reference(name: &str) -> Result<Cow<'static, str>> {
    if let Some(number) = name.strip_prefix('#') {
        let code = match number.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16),
            None => number.parse::<u32>(),
        }
        .map_err(|_| anyhow!("invalid character reference &{name};"))?;
        return char::from_u32(code)
            .filter(|&ch| ch != '\0')
            .map(|ch| Cow::Owned(ch.to_string()))
            .ok_or_else(|| anyhow!("invalid character reference &{name};"));
    }
    Ok(match resolve_predefined_entity(name) {
        Some(text) => Cow::Borrowed(text),
        None => Cow::Owned(format!("&{name};")),
    })
}

/// Resolve references inside an attribute value.
fn unescape(raw: &str) -> Result<Cow<'_, str>> {
    if !raw.contains('&') {
        return Ok(Cow::Borrowed(raw));
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find(';') else {
            bail!("unterminated reference in attribute value {raw:?}");
        };
        out.push_str(&resolve_reference(&after[..end])?);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(Cow::Owned(out))
}

fn normalize_line_endings(text: &str) -> Cow<'_, str> {
    if text.contains('\r') {
        Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(text)
    }
}
