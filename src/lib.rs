//! # epub-package
//!
//! Locates and parses the package document (`content.opf`) of an EPUB.
//!
//! An EPUB is a ZIP container. Its `META-INF/container.xml` points at the
//! package document, which holds the book's metadata, manifest and spine.
//! This library reads the container through a random-access byte source,
//! follows that pointer (falling back to `OEBPS/content.opf`), and returns
//! the parsed document as an immutable [`XmlTree`] together with any
//! diagnostics met on the way.
//!
//! ## Features
//!
//! - ZIP central directory reading, ZIP64 included, with STORED and DEFLATE entries
//! - Text decoding from BOM or XML declaration
//! - Arena-backed XML trees with path lookup, text extraction and whitespace stripping
//! - Resolution that never fails outright: every problem becomes a [`Diagnostic`]
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use epub_package::{open_epub, resolve_package_document, xml::child_for_path, xml::extract_all_text};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let archive = open_epub(Path::new("book.epub")).await?;
//!
//!     let outcome = resolve_package_document(&archive).await;
//!     for diagnostic in outcome.diagnostics() {
//!         eprintln!("warning: {diagnostic}");
//!     }
//!
//!     if let Some(opf) = outcome.value() {
//!         if let Some(title) = child_for_path(opf.root(), &["package", "metadata", "dc:title"]) {
//!             println!("{}", extract_all_text(title));
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod cli;
pub mod diagnostics;
pub mod io;
pub mod package;
pub mod xml;
pub mod zip;

pub use archive::{ArchiveText, EpubArchive, open_epub};
pub use cli::Cli;
pub use diagnostics::{Diagnostic, Outcome};
pub use io::{LocalFileReader, MemoryReader, ReadAt};
pub use package::{
    CONTAINER_PATH, DEFAULT_PACKAGE_PATH, ResolveOptions, locate_package_document,
    read_container, read_xml, resolve_package_document, resolve_package_document_with,
};
pub use xml::{ParseOptions, Xml, XmlNode, XmlTree};
pub use zip::{ZipExtractor, ZipFileEntry};
