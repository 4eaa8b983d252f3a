//! Lookups, text extraction and whitespace normalization over [`Xml`] nodes.

use super::tree::{NodeId, Xml, XmlElement, XmlNode, XmlTree};

/// True if `input` is empty or made only of whitespace.
pub fn is_whitespaces(input: &str) -> bool {
    input.chars().all(char::is_whitespace)
}

/// Case-insensitive name comparison.
pub fn same_name(n1: &str, n2: &str) -> bool {
    n1.chars()
        .flat_map(char::to_uppercase)
        .eq(n2.chars().flat_map(char::to_uppercase))
}

/// Follow `path` through element children, comparing names exactly.
///
/// Each segment selects the first element child with that name. An empty
/// path yields `xml` itself; a missing segment yields `None`.
pub fn find_xml<'a, S: AsRef<str>>(xml: Xml<'a>, path: &[S]) -> Option<Xml<'a>> {
    resolve_path(xml, path, |name, segment| name == segment)
}

/// Like [`find_xml`], with names compared by [`same_name`].
pub fn child_for_path<'a, S: AsRef<str>>(xml: Xml<'a>, path: &[S]) -> Option<Xml<'a>> {
    resolve_path(xml, path, same_name)
}

fn resolve_path<'a, S: AsRef<str>>(
    xml: Xml<'a>,
    path: &[S],
    matches: fn(&str, &str) -> bool,
) -> Option<Xml<'a>> {
    let Some((head, tail)) = path.split_first() else {
        return Some(xml);
    };
    let head = head.as_ref();
    let child = xml
        .children()
        .find(|ch| ch.name().is_some_and(|name| matches(name, head)))?;
    resolve_path(child, tail, matches)
}

/// Concatenated text of a subtree, each text node trimmed.
///
/// Comments and CDATA sections contribute nothing.
pub fn extract_all_text(xml: Xml<'_>) -> String {
    let mut out = String::new();
    let mut pending = vec![xml];
    while let Some(node) = pending.pop() {
        match node.node() {
            XmlNode::Text(text) => out.push_str(text.trim()),
            XmlNode::Document { .. } | XmlNode::Element(_) => pending.extend(node.children().rev()),
            XmlNode::Comment(_) | XmlNode::CData(_) => {}
        }
    }
    out
}

/// Copy `nodes` into a new tree, dropping whitespace-only text nodes from the
/// front of the sequence and, recursively, from the front of every document
/// and element child list.
///
/// Only leading whitespace is dropped: whitespace between or after other
/// nodes is kept. The copies become the children of the new tree's document.
pub fn remove_trailing_whitespaces(nodes: &[Xml<'_>]) -> XmlTree {
    let mut tree = XmlTree::new();
    copy_stripped(nodes.iter().copied(), &mut tree, XmlTree::ROOT);
    tree
}

impl XmlTree {
    /// This document with [`remove_trailing_whitespaces`] applied to its children.
    pub fn remove_trailing_whitespaces(&self) -> XmlTree {
        let mut tree = XmlTree::new();
        copy_stripped(self.root().children(), &mut tree, XmlTree::ROOT);
        tree
    }
}

/// Copies in document order with an explicit work list, so nesting depth is
/// bounded by memory rather than the call stack.
fn copy_stripped<'a>(nodes: impl Iterator<Item = Xml<'a>>, dst: &mut XmlTree, parent: NodeId) {
    let mut pending = Vec::new();
    push_stripped(&mut pending, nodes, parent);
    while let Some((node, parent)) = pending.pop() {
        let copy = match node.node() {
            XmlNode::Document { .. } => XmlNode::Document {
                children: Vec::new(),
            },
            XmlNode::Element(element) => XmlNode::Element(XmlElement {
                name: element.name.clone(),
                attributes: element.attributes.clone(),
                children: Vec::new(),
            }),
            leaf @ (XmlNode::Text(_) | XmlNode::CData(_) | XmlNode::Comment(_)) => leaf.clone(),
        };
        let id = dst.attach(parent, copy);
        push_stripped(&mut pending, node.children(), id);
    }
}

/// Queue `nodes` under `parent` without their leading whitespace, first node on top.
fn push_stripped<'a>(
    pending: &mut Vec<(Xml<'a>, NodeId)>,
    nodes: impl Iterator<Item = Xml<'a>>,
    parent: NodeId,
) {
    let kept: Vec<_> = nodes
        .skip_while(|node| node.text().is_some_and(is_whitespaces))
        .collect();
    pending.extend(kept.into_iter().rev().map(|node| (node, parent)));
}
