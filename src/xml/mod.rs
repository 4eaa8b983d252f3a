//! Immutable XML trees.
//!
//! A parsed document is an [`XmlTree`]: an arena of [`XmlNode`]s rooted at a
//! document node. Queries run through [`Xml`], a cheap copyable handle to one
//! node of a tree.
//!
//! - `tree`: the node model, predicates and construction helpers
//! - `query`: path lookup, text extraction, whitespace stripping
//! - `print`: compact rendering for inspection
//! - `parser`: text to tree, via quick-xml
//!
//! ```
//! use epub_package::xml::{XmlTree, child_for_path, extract_all_text};
//!
//! let tree = XmlTree::parse("<package><metadata><title> Emma </title></metadata></package>").unwrap();
//! let title = child_for_path(tree.root(), &["PACKAGE", "metadata", "title"]).unwrap();
//! assert_eq!(extract_all_text(title), "Emma");
//! assert_eq!(title.to_string(), "<title> Emma </title>");
//! ```

mod parser;
mod print;
mod query;
mod tree;

pub use parser::{ParseOptions, xml_string_parser};
pub use print::{DEFAULT_DEPTH, attributes_to_string, xml2string};
pub use query::{
    child_for_path, extract_all_text, find_xml, is_whitespaces, remove_trailing_whitespaces,
    same_name,
};
pub use tree::{Attributes, Children, NodeId, NodeType, Xml, XmlElement, XmlNode, XmlTree};
