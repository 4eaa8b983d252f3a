use flate2::Crc;
use flate2::read::DeflateDecoder;
use std::io::Read;
use std::sync::Arc;

use crate::io::ReadAt;
use anyhow::{Context, Result, bail};

use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipFileEntry};

/// Output buffer reserved up front when inflating; larger entries grow as they decode
const INFLATE_RESERVE: u64 = 1 << 20;

/// Reads entries out of a ZIP archive
pub struct ZipExtractor<R: ReadAt> {
    parser: ZipParser<R>,
}

impl<R: ReadAt> ZipExtractor<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self {
            parser: ZipParser::new(reader),
        }
    }

    /// List all entries in the archive
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        self.parser.list_files().await
    }

    /// Decompress an entry into memory, verifying its size and CRC-32.
    ///
    /// Inflation stops one byte past the declared size, so an entry that
    /// decodes to more than it claims fails without being fully expanded.
    pub async fn extract_to_memory(&self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        if entry.is_encrypted() {
            bail!("Encrypted entries are not supported: {}", entry.name);
        }

        let data_offset = self.parser.data_offset(entry).await?;
        let compressed_size = usize::try_from(entry.compressed_size)
            .with_context(|| format!("{} is too large to read", entry.name))?;
        let raw = self.parser.read_exact_at(data_offset, compressed_size).await?;

        let data = match entry.compression_method {
            CompressionMethod::Stored => raw,
            CompressionMethod::Deflate => {
                let reserve = entry.uncompressed_size.min(INFLATE_RESERVE) as usize;
                let mut out = Vec::with_capacity(reserve);
                DeflateDecoder::new(raw.as_slice())
                    .take(entry.uncompressed_size.saturating_add(1))
                    .read_to_end(&mut out)
                    .with_context(|| format!("cannot inflate {}", entry.name))?;
                out
            }
            CompressionMethod::Unknown(method) => {
                bail!(
                    "Unsupported compression method {} for {} (only STORED and DEFLATE are supported)",
                    method,
                    entry.name
                );
            }
        };

        if data.len() as u64 > entry.uncompressed_size {
            bail!(
                "{} decodes to more than its declared {} bytes",
                entry.name,
                entry.uncompressed_size
            );
        }
        if (data.len() as u64) < entry.uncompressed_size {
            bail!(
                "Size mismatch for {}: expected {} bytes, got {}",
                entry.name,
                entry.uncompressed_size,
                data.len()
            );
        }

        let mut crc = Crc::new();
        crc.update(&data);
        if crc.sum() != entry.crc32 {
            bail!("CRC mismatch for {}", entry.name);
        }

        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{ArchiveText, EpubArchive};
    use crate::io::MemoryReader;
    use crate::package::{CONTAINER_PATH, resolve_package_document};
    use crate::zip::{CDFH_SIGNATURE, EndOfCentralDirectory, LFH_SIGNATURE};
    use flate2::Compression;
    use flate2::write::DeflateEncoder;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    /// One entry as the central directory describes it. Sizes that do not
    /// fit in 32 bits go to a ZIP64 extra field.
    struct RawEntry<'a> {
        name: &'a str,
        method: u16,
        crc32: u32,
        data: &'a [u8],
        compressed_size: u64,
        uncompressed_size: u64,
    }

    impl<'a> RawEntry<'a> {
        fn stored(name: &'a str, data: &'a [u8]) -> Self {
            Self {
                name,
                method: 0,
                crc32: crc32(data),
                data,
                compressed_size: data.len() as u64,
                uncompressed_size: data.len() as u64,
            }
        }
    }

    fn crc32(data: &[u8]) -> u32 {
        let mut crc = Crc::new();
        crc.update(data);
        crc.sum()
    }

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    /// Local header, data, central directory and EOCD for a single entry.
    fn raw_archive(entry: &RawEntry<'_>) -> Vec<u8> {
        let zip64 = entry.compressed_size >= 0xFFFFFFFF || entry.uncompressed_size >= 0xFFFFFFFF;
        let (csize32, usize32) = if zip64 {
            (u32::MAX, u32::MAX)
        } else {
            (entry.compressed_size as u32, entry.uncompressed_size as u32)
        };
        let name_len = (entry.name.len() as u16).to_le_bytes();

        let mut out = Vec::new();
        out.extend_from_slice(LFH_SIGNATURE);
        out.extend_from_slice(&20u16.to_le_bytes()); // version needed
        out.extend_from_slice(&0u16.to_le_bytes()); // flags
        out.extend_from_slice(&entry.method.to_le_bytes());
        out.extend_from_slice(&[0u8; 4]); // time, date
        out.extend_from_slice(&entry.crc32.to_le_bytes());
        out.extend_from_slice(&csize32.to_le_bytes());
        out.extend_from_slice(&usize32.to_le_bytes());
        out.extend_from_slice(&name_len);
        out.extend_from_slice(&0u16.to_le_bytes()); // extra length
        out.extend_from_slice(entry.name.as_bytes());
        out.extend_from_slice(entry.data);

        let mut extra = Vec::new();
        if zip64 {
            extra.extend_from_slice(&0x0001u16.to_le_bytes());
            extra.extend_from_slice(&16u16.to_le_bytes());
            extra.extend_from_slice(&entry.uncompressed_size.to_le_bytes());
            extra.extend_from_slice(&entry.compressed_size.to_le_bytes());
        }

        let cd_offset = out.len();
        out.extend_from_slice(CDFH_SIGNATURE);
        out.extend_from_slice(&45u16.to_le_bytes()); // version made by
        out.extend_from_slice(&45u16.to_le_bytes()); // version needed
        out.extend_from_slice(&0u16.to_le_bytes()); // flags
        out.extend_from_slice(&entry.method.to_le_bytes());
        out.extend_from_slice(&[0u8; 4]); // time, date
        out.extend_from_slice(&entry.crc32.to_le_bytes());
        out.extend_from_slice(&csize32.to_le_bytes());
        out.extend_from_slice(&usize32.to_le_bytes());
        out.extend_from_slice(&name_len);
        out.extend_from_slice(&(extra.len() as u16).to_le_bytes());
        out.extend_from_slice(&[0u8; 6]); // comment length, disk, internal attrs
        out.extend_from_slice(&[0u8; 4]); // external attrs
        out.extend_from_slice(&0u32.to_le_bytes()); // local header offset
        out.extend_from_slice(entry.name.as_bytes());
        out.extend_from_slice(&extra);
        let cd_size = out.len() - cd_offset;

        out.extend_from_slice(EndOfCentralDirectory::SIGNATURE);
        out.extend_from_slice(&[0u8; 4]); // disk numbers
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&(cd_size as u32).to_le_bytes());
        out.extend_from_slice(&(cd_offset as u32).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out
    }

    async fn extract(entry: &RawEntry<'_>) -> Result<Vec<u8>> {
        let extractor = ZipExtractor::new(Arc::new(MemoryReader::new(raw_archive(entry))));
        let entries = extractor.list_files().await?;
        assert_eq!(entries.len(), 1);
        extractor.extract_to_memory(&entries[0]).await
    }

    #[tokio::test]
    async fn extracts_stored_and_deflated_entries() {
        let text = b"<container/>".repeat(20);
        assert_eq!(extract(&RawEntry::stored("a.xml", &text)).await.unwrap(), text);

        let packed = deflate(&text);
        let entry = RawEntry {
            method: 8,
            compressed_size: packed.len() as u64,
            data: &packed,
            ..RawEntry::stored("a.xml", &text)
        };
        assert_eq!(extract(&entry).await.unwrap(), text);
    }

    #[tokio::test]
    async fn zip64_sizes_past_the_archive_are_errors() {
        let entry = RawEntry {
            compressed_size: u64::MAX,
            uncompressed_size: u64::MAX,
            ..RawEntry::stored(CONTAINER_PATH, b"<container/>")
        };
        let extractor = ZipExtractor::new(Arc::new(MemoryReader::new(raw_archive(&entry))));
        let entries = extractor.list_files().await.unwrap();
        assert_eq!(entries[0].compressed_size, u64::MAX);
        assert_eq!(entries[0].uncompressed_size, u64::MAX);

        let err = extractor.extract_to_memory(&entries[0]).await.unwrap_err();
        assert!(err.to_string().contains("past the end of the archive"), "{err}");
    }

    #[tokio::test]
    async fn compressed_size_beyond_the_archive() {
        let entry = RawEntry {
            compressed_size: 1_000_000,
            ..RawEntry::stored("a.xml", b"short")
        };
        assert!(extract(&entry).await.is_err());
    }

    #[tokio::test]
    async fn inflation_stops_at_the_declared_size() {
        let zeros = vec![0u8; 1 << 20];
        let packed = deflate(&zeros);
        let entry = RawEntry {
            method: 8,
            crc32: crc32(&zeros),
            compressed_size: packed.len() as u64,
            uncompressed_size: 10,
            data: &packed,
            name: "bomb.xml",
        };

        let err = extract(&entry).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "bomb.xml decodes to more than its declared 10 bytes"
        );
    }

    #[tokio::test]
    async fn short_output_and_bad_crc() {
        let entry = RawEntry {
            uncompressed_size: 50,
            ..RawEntry::stored("a.xml", b"twelve bytes")
        };
        let err = extract(&entry).await.unwrap_err();
        assert!(err.to_string().starts_with("Size mismatch for a.xml"));

        let entry = RawEntry {
            crc32: 0xDEADBEEF,
            ..RawEntry::stored("a.xml", b"twelve bytes")
        };
        let err = extract(&entry).await.unwrap_err();
        assert_eq!(err.to_string(), "CRC mismatch for a.xml");
    }

    #[tokio::test]
    async fn corrupt_container_becomes_a_diagnostic() {
        let entry = RawEntry {
            compressed_size: u64::MAX,
            uncompressed_size: u64::MAX,
            ..RawEntry::stored(CONTAINER_PATH, b"<container/>")
        };
        let archive = EpubArchive::open(Arc::new(MemoryReader::new(raw_archive(&entry))))
            .await
            .unwrap();
        assert!(archive.read_entry_as_text(CONTAINER_PATH).await.is_err());

        let outcome = resolve_package_document(&archive).await;
        assert!(!outcome.is_success());
        assert_eq!(
            outcome.messages(),
            vec!["No container file", "No file for path: OEBPS/content.opf"]
        );
        assert!(outcome.diagnostics()[0].data.is_some());
    }
}
