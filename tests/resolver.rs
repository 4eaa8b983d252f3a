//! End-to-end resolution against real ZIP archives.

use std::io::{Cursor, Write};
use std::sync::Arc;

use epub_package::xml::{child_for_path, extract_all_text, xml2string};
use epub_package::{
    ArchiveText, CONTAINER_PATH, DEFAULT_PACKAGE_PATH, EpubArchive, MemoryReader, ParseOptions,
    ResolveOptions, resolve_package_document, resolve_package_document_with,
};
use pretty_assertions::assert_eq;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

const CONTAINER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="EPUB/package.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

const PACKAGE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="uid">
  <!-- generated -->
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="uid">urn:uuid:1234</dc:identifier>
    <dc:title>Pride &amp; Prejudice</dc:title>
    <dc:language>en</dc:language>
  </metadata>
  <manifest>
    <item id="c1" href="c1.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine>
    <itemref idref="c1"/>
  </spine>
</package>
"#;

const MIMETYPE: &[u8] = b"application/epub+zip";

fn build_zip(entries: &[(&str, &[u8], CompressionMethod)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data, method) in entries {
        let options = SimpleFileOptions::default().compression_method(*method);
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

async fn open(entries: &[(&str, &[u8], CompressionMethod)]) -> EpubArchive<MemoryReader> {
    let bytes = build_zip(entries);
    EpubArchive::open(Arc::new(MemoryReader::new(bytes)))
        .await
        .unwrap()
}

fn book() -> Vec<(&'static str, &'static [u8], CompressionMethod)> {
    vec![
        ("mimetype", MIMETYPE, CompressionMethod::Stored),
        (CONTAINER_PATH, CONTAINER.as_bytes(), CompressionMethod::Deflated),
        ("EPUB/package.opf", PACKAGE.as_bytes(), CompressionMethod::Deflated),
        ("EPUB/c1.xhtml", b"<html/>".as_slice(), CompressionMethod::Stored),
    ]
}

#[tokio::test]
async fn resolves_a_well_formed_book() {
    let archive = open(&book()).await;
    assert_eq!(archive.entries().len(), 4);

    let outcome = resolve_package_document(&archive).await;
    assert!(outcome.is_success());
    assert!(outcome.diagnostics().is_empty());

    let tree = outcome.value().unwrap();
    let title = child_for_path(tree.root(), &["package", "metadata", "DC:TITLE"]).unwrap();
    assert_eq!(extract_all_text(title), "Pride & Prejudice");

    let package = tree.root_element().unwrap();
    assert_eq!(package.attribute("version"), Some("3.0"));
    assert_eq!(package.attribute("unique-identifier"), Some("uid"));
    // Comments are dropped by default
    assert!(package.children().all(|c| !c.is_comment()));
}

#[tokio::test]
async fn entries_are_decoded_as_text() {
    let archive = open(&book()).await;
    assert_eq!(
        archive.read_entry_as_text("mimetype").await.unwrap().as_deref(),
        Some("application/epub+zip")
    );
    assert_eq!(archive.read_entry_as_text("EPUB/missing.xhtml").await.unwrap(), None);
    // Lookup is exact
    assert_eq!(archive.read_entry_as_text("epub/package.opf").await.unwrap(), None);
}

#[tokio::test]
async fn falls_back_to_the_default_location() {
    let archive = open(&[
        ("mimetype", MIMETYPE, CompressionMethod::Stored),
        (DEFAULT_PACKAGE_PATH, PACKAGE.as_bytes(), CompressionMethod::Deflated),
    ])
    .await;

    let outcome = resolve_package_document(&archive).await;
    assert!(outcome.is_success());
    assert_eq!(outcome.messages(), vec!["No container file"]);
}

#[tokio::test]
async fn reports_every_missing_piece() {
    let archive = open(&[("mimetype", MIMETYPE, CompressionMethod::Stored)]).await;

    let outcome = resolve_package_document(&archive).await;
    assert!(!outcome.is_success());
    assert_eq!(
        outcome.messages(),
        vec!["No container file", "No file for path: OEBPS/content.opf"]
    );
}

#[tokio::test]
async fn container_pointing_nowhere() {
    let archive = open(&[(CONTAINER_PATH, CONTAINER.as_bytes(), CompressionMethod::Deflated)]).await;

    let outcome = resolve_package_document(&archive).await;
    assert!(!outcome.is_success());
    assert_eq!(outcome.messages(), vec!["No file for path: EPUB/package.opf"]);
}

#[tokio::test]
async fn malformed_package_document() {
    let archive = open(&[
        (CONTAINER_PATH, CONTAINER.as_bytes(), CompressionMethod::Stored),
        ("EPUB/package.opf", b"<package><metadata></package>".as_slice(), CompressionMethod::Stored),
    ])
    .await;

    let outcome = resolve_package_document(&archive).await;
    assert!(!outcome.is_success());
    assert_eq!(outcome.messages(), vec!["Can not parse EPUB/package.opf"]);
}

#[tokio::test]
async fn options_shape_the_package_document() {
    let archive = open(&book()).await;
    let options = ResolveOptions {
        parse: ParseOptions {
            preserve_comments: true,
            remove_trailing_whitespaces: true,
        },
    };

    let outcome = resolve_package_document_with(&archive, &options).await;
    let tree = outcome.value().unwrap();
    let package = tree.root_element().unwrap();
    let first = package.children().next().unwrap();
    assert!(first.is_comment());
    assert_eq!(first.content(), Some(" generated "));
}

#[tokio::test]
async fn prints_the_spine() {
    let archive = open(&book()).await;
    let outcome = resolve_package_document(&archive).await;
    let tree = outcome.value().unwrap();

    let spine = child_for_path(tree.root(), &["package", "spine"]).unwrap();
    assert_eq!(
        xml2string(spine, 1),
        "<spine>\n    <itemref idref=\"c1\"/>\n  </spine>"
    );
    assert_eq!(xml2string(spine, 0), "<spine/>");
}

#[tokio::test]
async fn latin1_package_document() {
    let mut opf = b"<?xml version='1.0' encoding='ISO-8859-1'?><package><metadata><title>Caf".to_vec();
    opf.push(0xE9);
    opf.extend_from_slice(b"</title></metadata></package>");
    let archive = open(&[(DEFAULT_PACKAGE_PATH, opf.as_slice(), CompressionMethod::Deflated)]).await;

    let outcome = resolve_package_document(&archive).await;
    let tree = outcome.value().unwrap();
    let title = child_for_path(tree.root(), &["package", "metadata", "title"]).unwrap();
    assert_eq!(extract_all_text(title), "Café");
}

#[tokio::test]
async fn not_a_zip() {
    let result = EpubArchive::open(Arc::new(MemoryReader::new(b"plain text, not an archive".to_vec()))).await;
    assert!(result.is_err());
}
