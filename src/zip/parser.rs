//! Central directory reader.
//!
//! An archive is read from its tail: the End of Central Directory record
//! (and its ZIP64 counterpart when sizes overflow) locates the central
//! directory, which describes every entry. Entry data is only touched when a
//! caller extracts it, through the entry's Local File Header.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};
use std::sync::Arc;

use crate::io::ReadAt;
use anyhow::{Result, bail};

use super::structures::*;

/// Largest archive comment the format allows, which bounds the EOCD search.
const MAX_COMMENT_SIZE: u64 = 65535;

/// ZIP64 extended information extra field
const ZIP64_EXTRA_ID: u16 = 0x0001;

/// Reads ZIP structures from any [`ReadAt`] source.
///
/// Usually driven through [`ZipExtractor`](super::ZipExtractor).
pub struct ZipParser<R: ReadAt> {
    reader: Arc<R>,
    size: u64,
}

impl<R: ReadAt> ZipParser<R> {
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Read exactly `len` bytes at `offset`, failing on a truncated source.
    ///
    /// The range is checked against the archive size before anything is
    /// allocated, so sizes taken from a corrupt directory fail cleanly.
    pub async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        if offset.checked_add(len as u64).is_none_or(|end| end > self.size) {
            bail!(
                "Range of {len} bytes at offset {offset} lies outside the archive ({} bytes)",
                self.size
            );
        }
        let mut buf = vec![0u8; len];
        let n = self.reader.read_at(offset, &mut buf).await?;
        if n < len {
            bail!("Unexpected end of archive at offset {offset} (wanted {len} bytes, got {n})");
        }
        Ok(buf)
    }

    /// Locate the End of Central Directory record.
    ///
    /// Returns the record and its offset in the archive.
    pub async fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        let eocd_size = EndOfCentralDirectory::SIZE as u64;
        if self.size < eocd_size {
            bail!("Not a valid ZIP file");
        }

        // Common case: no archive comment
        let offset = self.size - eocd_size;
        let buf = self.read_exact_at(offset, EndOfCentralDirectory::SIZE).await?;
        if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && buf[20..22] == [0, 0] {
            return Ok((EndOfCentralDirectory::from_bytes(&buf)?, offset));
        }

        // Otherwise scan backwards through the space a comment could occupy
        let search_size = (MAX_COMMENT_SIZE + eocd_size).min(self.size);
        let search_start = self.size - search_size;
        let buf = self.read_exact_at(search_start, search_size as usize).await?;

        for i in (0..=buf.len() - EndOfCentralDirectory::SIZE).rev() {
            if &buf[i..i + 4] != EndOfCentralDirectory::SIGNATURE {
                continue;
            }
            let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;
            if comment_len == buf.len() - i - EndOfCentralDirectory::SIZE {
                let eocd =
                    EndOfCentralDirectory::from_bytes(&buf[i..i + EndOfCentralDirectory::SIZE])?;
                return Ok((eocd, search_start + i as u64));
            }
        }

        bail!("Not a valid ZIP file")
    }

    /// Read the ZIP64 record through the locator that precedes the EOCD.
    pub async fn read_zip64_eocd(&self, eocd_offset: u64) -> Result<Zip64EOCD> {
        let Some(locator_offset) = eocd_offset.checked_sub(Zip64EOCDLocator::SIZE as u64) else {
            bail!("Invalid ZIP64 locator");
        };
        let locator_buf = self
            .read_exact_at(locator_offset, Zip64EOCDLocator::SIZE)
            .await?;
        let locator = Zip64EOCDLocator::from_bytes(&locator_buf)?;

        let eocd64_buf = self
            .read_exact_at(locator.eocd64_offset, Zip64EOCD::MIN_SIZE)
            .await?;
        Zip64EOCD::from_bytes(&eocd64_buf)
    }

    /// Read every entry of the central directory, in directory order.
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        let (eocd, eocd_offset) = self.find_eocd().await?;

        let (cd_offset, cd_size, total_entries) = if eocd.is_zip64() {
            let eocd64 = self.read_zip64_eocd(eocd_offset).await?;
            (eocd64.cd_offset, eocd64.cd_size, eocd64.total_entries)
        } else {
            (
                eocd.cd_offset as u64,
                eocd.cd_size as u64,
                eocd.total_entries as u64,
            )
        };

        if cd_offset.saturating_add(cd_size) > self.size {
            bail!("Central directory lies outside the archive");
        }

        // One read for the whole directory
        let cd_data = self.read_exact_at(cd_offset, cd_size as usize).await?;
        let mut cursor = Cursor::new(cd_data.as_slice());

        // Each header is at least 46 bytes, so a lying entry count cannot over-allocate
        let mut entries = Vec::with_capacity((total_entries as usize).min(cd_data.len() / 46));
        for _ in 0..total_entries {
            entries.push(Self::parse_cdfh(&mut cursor)?);
        }

        tracing::trace!(entries = entries.len(), "read central directory");
        Ok(entries)
    }

    /// Parse one Central Directory File Header at the cursor.
    fn parse_cdfh(cursor: &mut Cursor<&[u8]>) -> Result<ZipFileEntry> {
        let mut sig = [0u8; 4];
        cursor.read_exact(&mut sig)?;
        if sig != CDFH_SIGNATURE {
            bail!("Invalid Central Directory File Header");
        }

        let _version_made_by = cursor.read_u16::<LittleEndian>()?;
        let _version_needed = cursor.read_u16::<LittleEndian>()?;
        let flags = cursor.read_u16::<LittleEndian>()?;
        let compression_method = cursor.read_u16::<LittleEndian>()?;
        let last_mod_time = cursor.read_u16::<LittleEndian>()?;
        let last_mod_date = cursor.read_u16::<LittleEndian>()?;
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let mut compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let mut uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let name_length = cursor.read_u16::<LittleEndian>()?;
        let extra_length = cursor.read_u16::<LittleEndian>()?;
        let comment_length = cursor.read_u16::<LittleEndian>()?;
        let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
        let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
        let _external_attrs = cursor.read_u32::<LittleEndian>()?;
        let mut lfh_offset = cursor.read_u32::<LittleEndian>()? as u64;

        let mut name_bytes = vec![0u8; name_length as usize];
        cursor.read_exact(&mut name_bytes)?;
        let name = String::from_utf8_lossy(&name_bytes).into_owned();

        // ZIP64 values are present only for the header fields saturated at 0xFFFFFFFF
        let extra_end = cursor.position() + extra_length as u64;
        while cursor.position() + 4 <= extra_end {
            let header_id = cursor.read_u16::<LittleEndian>()?;
            let field_size = cursor.read_u16::<LittleEndian>()? as u64;
            let field_end = (cursor.position() + field_size).min(extra_end);

            if header_id == ZIP64_EXTRA_ID {
                if uncompressed_size == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                    uncompressed_size = cursor.read_u64::<LittleEndian>()?;
                }
                if compressed_size == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                    compressed_size = cursor.read_u64::<LittleEndian>()?;
                }
                if lfh_offset == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                    lfh_offset = cursor.read_u64::<LittleEndian>()?;
                }
            }
            cursor.set_position(field_end);
        }

        cursor.set_position(extra_end + comment_length as u64);

        Ok(ZipFileEntry {
            name,
            compression_method: CompressionMethod::from_u16(compression_method),
            flags,
            compressed_size,
            uncompressed_size,
            crc32,
            lfh_offset,
            last_mod_time,
            last_mod_date,
        })
    }

    /// Offset of the entry's data, past its Local File Header.
    ///
    /// The local header's variable fields may differ in length from the
    /// central directory's copy, so the header itself is read. Fails when
    /// the entry's compressed data would run past the end of the archive.
    pub async fn data_offset(&self, entry: &ZipFileEntry) -> Result<u64> {
        let lfh = self.read_exact_at(entry.lfh_offset, LFH_SIZE).await?;
        if &lfh[0..4] != LFH_SIGNATURE {
            bail!("Invalid Local File Header for {}", entry.name);
        }

        let mut cursor = Cursor::new(&lfh[26..]);
        let name_length = cursor.read_u16::<LittleEndian>()? as u64;
        let extra_length = cursor.read_u16::<LittleEndian>()? as u64;

        let offset = entry.lfh_offset + LFH_SIZE as u64 + name_length + extra_length;
        if offset.checked_add(entry.compressed_size).is_none_or(|end| end > self.size) {
            bail!(
                "Data of {} ({} bytes) extends past the end of the archive",
                entry.name,
                entry.compressed_size
            );
        }
        Ok(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryReader;

    #[tokio::test]
    async fn rejects_non_zip_data() {
        let parser = ZipParser::new(Arc::new(MemoryReader::new(b"definitely not a zip".to_vec())));
        assert!(parser.find_eocd().await.is_err());

        let parser = ZipParser::new(Arc::new(MemoryReader::new(vec![0u8; 200])));
        assert!(parser.list_files().await.is_err());
    }

    #[tokio::test]
    async fn empty_archive_has_no_entries() {
        let mut data = EndOfCentralDirectory::SIGNATURE.to_vec();
        data.extend_from_slice(&[0u8; 18]);
        let parser = ZipParser::new(Arc::new(MemoryReader::new(data)));
        assert!(parser.list_files().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn finds_eocd_behind_a_comment() {
        let mut data = b"junk before".to_vec();
        data.extend_from_slice(EndOfCentralDirectory::SIGNATURE);
        data.extend_from_slice(&[0u8; 16]);
        data.extend_from_slice(&7u16.to_le_bytes());
        data.extend_from_slice(b"comment");

        let parser = ZipParser::new(Arc::new(MemoryReader::new(data)));
        let (eocd, offset) = parser.find_eocd().await.unwrap();
        assert_eq!(offset, 11);
        assert_eq!(eocd.comment_len, 7);
    }

    #[tokio::test]
    async fn truncated_reads_are_errors() {
        let parser = ZipParser::new(Arc::new(MemoryReader::new(vec![1u8; 10])));
        assert!(parser.read_exact_at(5, 10).await.is_err());
        assert_eq!(parser.read_exact_at(5, 5).await.unwrap(), vec![1u8; 5]);
    }

    #[tokio::test]
    async fn oversized_ranges_fail_before_allocating() {
        let parser = ZipParser::new(Arc::new(MemoryReader::new(vec![1u8; 10])));
        assert!(parser.read_exact_at(0, usize::MAX).await.is_err());
        assert!(parser.read_exact_at(u64::MAX, 1).await.is_err());
        let err = parser.read_exact_at(8, 3).await.unwrap_err();
        assert!(err.to_string().contains("outside the archive"));
    }
}
