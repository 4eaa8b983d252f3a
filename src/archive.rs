//! Reading EPUB entries as text.

use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use encoding_rs::{Encoding, UTF_8};
use quick_xml::Reader;
use quick_xml::events::Event;

use crate::io::{LocalFileReader, ReadAt};
use crate::zip::{ZipExtractor, ZipFileEntry};

/// Text access to the entries of an archive.
#[async_trait]
pub trait ArchiveText: Send + Sync {
    /// Content of the entry at exactly `path`, decoded as text.
    ///
    /// A missing entry is `Ok(None)`. Errors mean the entry exists but could
    /// not be read.
    async fn read_entry_as_text(&self, path: &str) -> Result<Option<String>>;
}

/// An opened EPUB container.
///
/// The central directory is read once, when the archive is opened.
pub struct EpubArchive<R: ReadAt> {
    extractor: ZipExtractor<R>,
    entries: Vec<ZipFileEntry>,
}

/// Open an EPUB file from the local filesystem.
pub async fn open_epub(path: &Path) -> Result<EpubArchive<LocalFileReader>> {
    let reader = LocalFileReader::new(path)?;
    EpubArchive::open(Arc::new(reader)).await
}

impl<R: ReadAt> EpubArchive<R> {
    pub async fn open(reader: Arc<R>) -> Result<Self> {
        let extractor = ZipExtractor::new(reader);
        let entries = extractor.list_files().await?;
        tracing::debug!(entries = entries.len(), "opened archive");
        Ok(Self { extractor, entries })
    }

    /// Entries in central directory order
    pub fn entries(&self) -> &[ZipFileEntry] {
        &self.entries
    }

    /// The entry named exactly `name`
    pub fn entry(&self, name: &str) -> Option<&ZipFileEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Raw bytes of the entry named `name`, `None` if there is no such entry
    pub async fn read_entry(&self, name: &str) -> Result<Option<Vec<u8>>> {
        match self.entry(name) {
            Some(entry) => Ok(Some(self.extractor.extract_to_memory(entry).await?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl<R: ReadAt> ArchiveText for EpubArchive<R> {
    async fn read_entry_as_text(&self, path: &str) -> Result<Option<String>> {
        let Some(bytes) = self.read_entry(path).await? else {
            tracing::debug!(path, "no such entry");
            return Ok(None);
        };
        Ok(Some(decode_text(&bytes).into_owned()))
    }
}

/// Decode entry bytes: byte order mark first, then the encoding declared in
/// an XML declaration, then UTF-8. Malformed sequences are replaced.
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let encoding = declared_encoding(bytes).unwrap_or(UTF_8);
    // BOM sniffing inside decode takes precedence over the declaration
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        tracing::warn!(encoding = used.name(), "replaced malformed byte sequences");
    }
    text
}

/// Encoding named by `<?xml ... encoding="..."?>` at the very start of the data.
fn declared_encoding(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = &bytes[..bytes.len().min(1024)];
    let head = head.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(head);
    let Ok(Event::Decl(decl)) = Reader::from_reader(head).read_event() else {
        return None;
    };
    let label = decl.encoding()?.ok()?;
    // The declaration was readable as ASCII, so UTF-16 labels are wrong here
    Encoding::for_label(&label).filter(|e| e.is_ascii_compatible())
}
