//! Compact string rendering of trees, meant for inspection and logs.
//!
//! Rendering is lossy: text is written without escaping and CDATA sections
//! are replaced by a placeholder.

use std::fmt;

use super::tree::{Attributes, Xml, XmlNode};

/// Levels of children [`xml2string`] expands unless told otherwise.
pub const DEFAULT_DEPTH: usize = 1;

const CDATA_PLACEHOLDER: &str = "<![CDATA[ ... ]]>";

/// `name="value"` pairs joined by spaces; valueless attributes render as the bare name.
pub fn attributes_to_string(attributes: &Attributes) -> String {
    attributes
        .iter()
        .map(|(name, value)| match value {
            Some(value) if !value.is_empty() => format!("{name}=\"{value}\""),
            _ => name.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render `xml`, expanding `depth` levels of children.
///
/// At depth 0 documents and elements render without children, so
/// `<a><b/></a>` prints as `<a/>`. A document renders as a `document` element.
pub fn xml2string(xml: Xml<'_>, depth: usize) -> String {
    let mut out = String::new();
    let mut steps = vec![Step::Open(xml, depth)];
    while let Some(step) = steps.pop() {
        match step {
            Step::Open(node, depth) => match node.node() {
                XmlNode::Document { .. } => {
                    open_container(&mut out, &mut steps, node, "document", "", depth);
                }
                XmlNode::Element(element) => {
                    let name = if element.name.is_empty() {
                        "document"
                    } else {
                        element.name.as_str()
                    };
                    let attrs = attributes_to_string(&element.attributes);
                    open_container(&mut out, &mut steps, node, name, &attrs, depth);
                }
                XmlNode::Text(text) => out.push_str(text),
                XmlNode::Comment(content) => {
                    out.push_str("<!--");
                    out.push_str(content);
                    out.push_str("-->");
                }
                XmlNode::CData(_) => out.push_str(CDATA_PLACEHOLDER),
            },
            // Nothing written since the start tag: self-close instead
            Step::Close { mark, .. } if out.len() == mark => {
                out.pop();
                out.push_str("/>");
            }
            Step::Close { name, .. } => {
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
        }
    }
    out
}

/// Pending rendering work, kept on an explicit stack so deep trees do not
/// exhaust the call stack.
enum Step<'a> {
    Open(Xml<'a>, usize),
    /// End tag of `name`, whose start tag ended at byte `mark`
    Close { name: &'a str, mark: usize },
}

fn open_container<'a>(
    out: &mut String,
    steps: &mut Vec<Step<'a>>,
    node: Xml<'a>,
    name: &'a str,
    attrs: &str,
    depth: usize,
) {
    out.push('<');
    out.push_str(name);
    if !attrs.is_empty() {
        out.push(' ');
        out.push_str(attrs);
    }
    out.push('>');
    steps.push(Step::Close {
        name,
        mark: out.len(),
    });
    if let Some(next) = depth.checked_sub(1) {
        steps.extend(node.children().rev().map(|child| Step::Open(child, next)));
    }
}

impl fmt::Display for Xml<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&xml2string(*self, DEFAULT_DEPTH))
    }
}
