//! Arena-backed XML tree.
//!
//! Nodes live in one `Vec` owned by [`XmlTree`] and refer to each other by
//! [`NodeId`]. A parent keeps its children's ids in document order; a child
//! keeps its parent's id. Nothing holds a second owning reference, so the
//! back-references cannot form ownership cycles.

use anyhow::{Result, bail};
use std::fmt;

/// Index of a node inside its [`XmlTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Element attributes: unique names, insertion order kept for printing.
///
/// A `None` value is an attribute present without a value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: Vec<(String, Option<String>)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute, replacing the value in place if the name exists.
    pub fn insert(&mut self, name: impl Into<String>, value: Option<String>) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// `None` when the attribute is missing, `Some(None)` when it has no value.
    pub fn get(&self, name: &str) -> Option<Option<&str>> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_deref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Option<String>)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, Option<String>)>>(iter: I) -> Self {
        let mut attributes = Attributes::new();
        for (name, value) in iter {
            attributes.insert(name, value);
        }
        attributes
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Attributes,
    pub children: Vec<NodeId>,
}

/// The five kinds of node a tree is made of.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Document { children: Vec<NodeId> },
    Element(XmlElement),
    Text(String),
    CData(String),
    Comment(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Document,
    Element,
    Text,
    CData,
    Comment,
}

impl XmlNode {
    pub fn node_type(&self) -> NodeType {
        match self {
            XmlNode::Document { .. } => NodeType::Document,
            XmlNode::Element(_) => NodeType::Element,
            XmlNode::Text(_) => NodeType::Text,
            XmlNode::CData(_) => NodeType::CData,
            XmlNode::Comment(_) => NodeType::Comment,
        }
    }

    /// Child ids for documents and elements, `None` for leaves.
    pub fn children(&self) -> Option<&[NodeId]> {
        match self {
            XmlNode::Document { children } => Some(children),
            XmlNode::Element(element) => Some(&element.children),
            XmlNode::Text(_) | XmlNode::CData(_) | XmlNode::Comment(_) => None,
        }
    }

    fn children_mut(&mut self) -> Option<&mut Vec<NodeId>> {
        match self {
            XmlNode::Document { children } => Some(children),
            XmlNode::Element(element) => Some(&mut element.children),
            XmlNode::Text(_) | XmlNode::CData(_) | XmlNode::Comment(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct NodeData {
    parent: Option<NodeId>,
    node: XmlNode,
}

/// An XML document. The root is always a [`XmlNode::Document`] at [`XmlTree::ROOT`].
#[derive(Debug, Clone, PartialEq)]
pub struct XmlTree {
    nodes: Vec<NodeData>,
}

impl Default for XmlTree {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlTree {
    pub const ROOT: NodeId = NodeId(0);

    /// A document without children.
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData {
                parent: None,
                node: XmlNode::Document {
                    children: Vec::new(),
                },
            }],
        }
    }

    pub fn root(&self) -> Xml<'_> {
        Xml {
            tree: self,
            id: Self::ROOT,
        }
    }

    /// First element child of the document.
    pub fn root_element(&self) -> Option<Xml<'_>> {
        self.root().children().find(Xml::is_element)
    }

    pub fn get(&self, id: NodeId) -> Option<Xml<'_>> {
        (id.0 < self.nodes.len()).then_some(Xml { tree: self, id })
    }

    /// Number of nodes in the arena, the root and detached nodes included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// True when the document has no children.
    pub fn is_empty(&self) -> bool {
        self.root().children().len() == 0
    }

    /// Add a node under `parent`, wiring both directions.
    ///
    /// Fails when `parent` does not exist or cannot have children.
    pub fn append(&mut self, parent: NodeId, node: XmlNode) -> Result<NodeId> {
        match self.nodes.get(parent.0).map(|data| data.node.children()) {
            Some(Some(_)) => Ok(self.attach(parent, node)),
            Some(None) => bail!("node {} cannot have children", parent.0),
            None => bail!("no node {} in this tree", parent.0),
        }
    }

    /// Build an element with the given children, attributes and parent.
    ///
    /// The element is recorded in the arena only: `parent` is stored as its
    /// back-reference but the element is not added to the parent's children,
    /// and the `children` keep whatever parent they already had. The name is
    /// not validated. Keeping the tree consistent is up to the caller; use
    /// [`XmlTree::append`] for wired insertion.
    pub fn make_element(
        &mut self,
        name: impl Into<String>,
        children: Vec<NodeId>,
        attributes: Attributes,
        parent: Option<NodeId>,
    ) -> NodeId {
        self.push(
            parent,
            XmlNode::Element(XmlElement {
                name: name.into(),
                attributes,
                children,
            }),
        )
    }

    /// Build a text node. Same wiring contract as [`XmlTree::make_element`].
    pub fn make_text(&mut self, text: impl Into<String>, parent: Option<NodeId>) -> NodeId {
        self.push(parent, XmlNode::Text(text.into()))
    }

    pub(crate) fn attach(&mut self, parent: NodeId, node: XmlNode) -> NodeId {
        let id = self.push(Some(parent), node);
        if let Some(children) = self.nodes[parent.0].node.children_mut() {
            children.push(id);
        }
        id
    }

    fn push(&mut self, parent: Option<NodeId>, node: XmlNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData { parent, node });
        id
    }
}

/// A node together with the tree it belongs to.
#[derive(Clone, Copy)]
pub struct Xml<'a> {
    tree: &'a XmlTree,
    id: NodeId,
}

impl PartialEq for Xml<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && std::ptr::eq(self.tree, other.tree)
    }
}

impl Eq for Xml<'_> {}

impl<'a> Xml<'a> {
    fn data(&self) -> &'a NodeData {
        &self.tree.nodes[self.id.0]
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &'a XmlTree {
        self.tree
    }

    pub fn node(&self) -> &'a XmlNode {
        &self.data().node
    }

    pub fn node_type(&self) -> NodeType {
        self.node().node_type()
    }

    pub fn is_document(&self) -> bool {
        self.node_type() == NodeType::Document
    }

    pub fn is_element(&self) -> bool {
        self.node_type() == NodeType::Element
    }

    pub fn is_text(&self) -> bool {
        self.node_type() == NodeType::Text
    }

    pub fn is_cdata(&self) -> bool {
        self.node_type() == NodeType::CData
    }

    pub fn is_comment(&self) -> bool {
        self.node_type() == NodeType::Comment
    }

    /// True exactly for documents and elements.
    pub fn has_children(&self) -> bool {
        self.node().children().is_some()
    }

    pub fn parent(&self) -> Option<Xml<'a>> {
        self.data().parent.map(|id| Xml {
            tree: self.tree,
            id,
        })
    }

    /// Children in document order; empty for leaves.
    pub fn children(&self) -> Children<'a> {
        Children {
            tree: self.tree,
            ids: self.node().children().unwrap_or(&[]).iter(),
        }
    }

    pub fn as_element(&self) -> Option<&'a XmlElement> {
        match self.node() {
            XmlNode::Element(element) => Some(element),
            XmlNode::Document { .. }
            | XmlNode::Text(_)
            | XmlNode::CData(_)
            | XmlNode::Comment(_) => None,
        }
    }

    /// Element name; `None` for every other kind of node.
    pub fn name(&self) -> Option<&'a str> {
        self.as_element().map(|e| e.name.as_str())
    }

    pub fn attributes(&self) -> Option<&'a Attributes> {
        self.as_element().map(|e| &e.attributes)
    }

    /// Value of an attribute; `None` if missing, valueless, or not an element.
    pub fn attribute(&self, name: &str) -> Option<&'a str> {
        self.attributes().and_then(|attrs| attrs.get(name)).flatten()
    }

    /// Payload of a text node.
    pub fn text(&self) -> Option<&'a str> {
        match self.node() {
            XmlNode::Text(text) => Some(text),
            XmlNode::Document { .. }
            | XmlNode::Element(_)
            | XmlNode::CData(_)
            | XmlNode::Comment(_) => None,
        }
    }

    /// Payload of a text, CDATA or comment node.
    pub fn content(&self) -> Option<&'a str> {
        match self.node() {
            XmlNode::Text(s) | XmlNode::CData(s) | XmlNode::Comment(s) => Some(s),
            XmlNode::Document { .. } | XmlNode::Element(_) => None,
        }
    }

    /// First element child with exactly this name.
    pub fn child(&self, name: &str) -> Option<Xml<'a>> {
        self.children().find(|ch| ch.name() == Some(name))
    }
}

impl fmt::Debug for Xml<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node() {
            XmlNode::Document { .. } => write!(f, "Document"),
            XmlNode::Element(e) => write!(f, "Element({:?})", e.name),
            XmlNode::Text(s) => write!(f, "Text({s:?})"),
            XmlNode::CData(s) => write!(f, "CData({s:?})"),
            XmlNode::Comment(s) => write!(f, "Comment({s:?})"),
        }
    }
}

/// Iterator over the children of a node.
#[derive(Clone)]
pub struct Children<'a> {
    tree: &'a XmlTree,
    ids: std::slice::Iter<'a, NodeId>,
}

impl<'a> Iterator for Children<'a> {
    type Item = Xml<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        self.ids.next().map(|&id| Xml { tree, id })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ids.size_hint()
    }
}

impl DoubleEndedIterator for Children<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        self.ids.next_back().map(|&id| Xml { tree, id })
    }
}

impl ExactSizeIterator for Children<'_> {}
