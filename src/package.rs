//! Finding and parsing the package document of an EPUB.
//!
//! Resolution runs in three steps, each reporting through [`Outcome`]:
//!
//! 1. parse `META-INF/container.xml`
//! 2. read the package document path from its
//!    `container/rootfiles/rootfile` element (`full-path`), falling back to
//!    `OEBPS/content.opf`
//! 3. parse the document at that path
//!
//! Only step 3 decides success. Diagnostics of step 2 (which include step 1's
//! when the container could not be used) precede those of step 3.

use serde_json::json;

use crate::archive::ArchiveText;
use crate::diagnostics::{Diagnostic, Outcome};
use crate::xml::{ParseOptions, XmlTree, find_xml, xml_string_parser};

/// Fixed location of the container descriptor.
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Package document location assumed when the container does not name one.
pub const DEFAULT_PACKAGE_PATH: &str = "OEBPS/content.opf";

const ROOTFILE_PATH: [&str; 3] = ["container", "rootfiles", "rootfile"];

/// How the package document itself is parsed. The container is always
/// parsed with default options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    pub parse: ParseOptions,
}

/// Find and parse the package document with default options.
pub async fn resolve_package_document<A: ArchiveText + ?Sized>(archive: &A) -> Outcome<XmlTree> {
    resolve_package_document_with(archive, &ResolveOptions::default()).await
}

pub async fn resolve_package_document_with<A: ArchiveText + ?Sized>(
    archive: &A,
    options: &ResolveOptions,
) -> Outcome<XmlTree> {
    let (path, location_diagnostics) = match locate_package_document(archive).await {
        Outcome::Success { value, diagnostics } => (value, diagnostics),
        // Location always succeeds, with the default path at worst
        Outcome::Failure { diagnostics } => (DEFAULT_PACKAGE_PATH.to_string(), diagnostics),
    };
    tracing::debug!(%path, "reading package document");

    read_xml(archive, &path, &options.parse)
        .await
        .prepend_diagnostics(location_diagnostics)
}

/// Read and parse the container descriptor.
pub async fn read_container<A: ArchiveText + ?Sized>(archive: &A) -> Outcome<XmlTree> {
    let text = match archive.read_entry_as_text(CONTAINER_PATH).await {
        Ok(Some(text)) => text,
        Ok(None) => return Outcome::failure(Diagnostic::new("No container file")),
        Err(err) => {
            tracing::warn!(path = CONTAINER_PATH, error = %err, "cannot read entry");
            return Outcome::failure(read_error("No container file", &err));
        }
    };

    match xml_string_parser(&text, &ParseOptions::default()) {
        Some(tree) => Outcome::success(tree),
        None => Outcome::failure(Diagnostic::new("Can not parse container.xml")),
    }
}

/// Path of the package document inside the archive.
///
/// Always a success: when the container is unusable the default path is
/// returned with the container's diagnostics, and when it names no rootfile
/// the default path is returned with a diagnostic of its own.
pub async fn locate_package_document<A: ArchiveText + ?Sized>(archive: &A) -> Outcome<String> {
    let container = match read_container(archive).await {
        Outcome::Success { value, .. } => value,
        Outcome::Failure { diagnostics } => {
            tracing::debug!("container unusable, assuming {DEFAULT_PACKAGE_PATH}");
            return Outcome::success_with(DEFAULT_PACKAGE_PATH.to_string(), diagnostics);
        }
    };

    let full_path = find_xml(container.root(), &ROOTFILE_PATH)
        .and_then(|rootfile| rootfile.attribute("full-path"));
    match full_path {
        Some(path) => Outcome::success(path.to_string()),
        None => Outcome::success_with(
            DEFAULT_PACKAGE_PATH.to_string(),
            vec![Diagnostic::new("Can't find rootfile element")],
        ),
    }
}

/// Read the entry at `path` and parse it as XML.
pub async fn read_xml<A: ArchiveText + ?Sized>(
    archive: &A,
    path: &str,
    options: &ParseOptions,
) -> Outcome<XmlTree> {
    let missing = format!("No file for path: {path}");
    let text = match archive.read_entry_as_text(path).await {
        Ok(Some(text)) => text,
        Ok(None) => return Outcome::failure(Diagnostic::new(missing)),
        Err(err) => {
            tracing::warn!(path, error = %err, "cannot read entry");
            return Outcome::failure(read_error(missing, &err));
        }
    };

    match xml_string_parser(&text, options) {
        Some(tree) => Outcome::success(tree),
        None => Outcome::failure(Diagnostic::new(format!("Can not parse {path}"))),
    }
}

/// A read failure reports like a missing entry, with the cause attached.
fn read_error(message: impl Into<String>, err: &anyhow::Error) -> Diagnostic {
    Diagnostic::new(message).with_data(json!({ "error": format!("{err:#}") }))
}
