//! ZIP container reading.
//!
//! An EPUB is a ZIP archive. This module lists an archive's entries and
//! decompresses individual entries, reading only the parts of the archive
//! it needs through [`ReadAt`](crate::io::ReadAt).
//!
//! - `structures`: fixed records of the format (EOCD, ZIP64 EOCD, entries)
//! - `parser`: central directory and local header parsing
//! - `extractor`: entry decompression (STORED, DEFLATE) with CRC checks
//!
//! Encryption, multi-disk archives and other compression methods are not
//! supported.

mod extractor;
mod parser;
mod structures;

pub use extractor::ZipExtractor;
pub use parser::ZipParser;
pub use structures::*;
