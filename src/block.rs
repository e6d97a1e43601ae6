//! Block framing: the per-block header and the CRC32 footer.
//!
//! ```text
//! type u16 | compression u16 | uncompressed_size u32 | [compressed_size u32]
//! parameters (type specific) | payload | [crc32 u32]
//! ```
//!
//! `compressed_size` is present iff `compression != None`. The footer is
//! present iff the file header selects CRC32, and covers every byte from the
//! start of the block header to the end of the payload exactly as read.

use byteorder::{LittleEndian, ReadBytesExt};
use crc32fast::Hasher;
use serde::Serialize;
use std::fmt;
use std::io::{self, Read};

use crate::error::{DecodeError, Result, Stage};

pub const BLOCK_HEADER_SIZE:          usize = 8;
pub const BLOCK_HEADER_EXTENDED_SIZE: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BlockType {
    FileMetadata,
    GCode,
    SlicerMetadata,
    PrinterMetadata,
    PrintMetadata,
    Thumbnail,
}

impl BlockType {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(BlockType::FileMetadata),
            1 => Some(BlockType::GCode),
            2 => Some(BlockType::SlicerMetadata),
            3 => Some(BlockType::PrinterMetadata),
            4 => Some(BlockType::PrintMetadata),
            5 => Some(BlockType::Thumbnail),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BlockType::FileMetadata    => "file metadata",
            BlockType::GCode           => "gcode",
            BlockType::SlicerMetadata  => "slicer metadata",
            BlockType::PrinterMetadata => "printer metadata",
            BlockType::PrintMetadata   => "print metadata",
            BlockType::Thumbnail       => "thumbnail",
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Compression {
    None,
    Deflate,
    Heatshrink11_4,
    Heatshrink12_4,
}

impl Compression {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(Compression::None),
            1 => Some(Compression::Deflate),
            2 => Some(Compression::Heatshrink11_4),
            3 => Some(Compression::Heatshrink12_4),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Compression::None           => "none",
            Compression::Deflate        => "deflate",
            Compression::Heatshrink11_4 => "heatshrink-11/4",
            Compression::Heatshrink12_4 => "heatshrink-12/4",
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockHeader {
    pub block_type:        BlockType,
    pub compression:       Compression,
    pub uncompressed_size: u32,
    /// Present only when `compression != None`.
    pub compressed_size:   Option<u32>,
}

impl BlockHeader {
    /// Read one block header.
    ///
    /// Returns `Ok(None)` when the stream ends cleanly before the first
    /// header byte. The type and compression fields are validated before the
    /// extended field is touched.
    pub fn read<R: Read>(mut reader: R) -> Result<Option<Self>> {
        let mut basic = [0u8; BLOCK_HEADER_SIZE];
        if !fill_or_eof(&mut reader, &mut basic)? {
            return Ok(None);
        }
        let mut basic = &basic[..];
        let raw_type        = basic.read_u16::<LittleEndian>()?;
        let raw_compression = basic.read_u16::<LittleEndian>()?;
        let uncompressed_size = basic.read_u32::<LittleEndian>()?;

        let block_type = BlockType::from_u16(raw_type)
            .ok_or(DecodeError::UnsupportedBlockType(raw_type))?;
        let compression = Compression::from_u16(raw_compression)
            .ok_or(DecodeError::UnsupportedCompression(raw_compression))?;

        let compressed_size = match compression {
            Compression::None => None,
            _ => Some(
                reader
                    .read_u32::<LittleEndian>()
                    .map_err(|e| DecodeError::from_read(e, Stage::BlockHeader))?,
            ),
        };
        Ok(Some(Self { block_type, compression, uncompressed_size, compressed_size }))
    }

    /// Number of payload bytes stored on the wire.
    pub fn payload_len(&self) -> u32 {
        self.compressed_size.unwrap_or(self.uncompressed_size)
    }

    pub fn size(&self) -> usize {
        match self.compressed_size {
            Some(_) => BLOCK_HEADER_EXTENDED_SIZE,
            None    => BLOCK_HEADER_SIZE,
        }
    }
}

/// Fill `buf` completely. `Ok(false)` means the stream was already at EOF;
/// EOF after a partial read is a truncated block header.
fn fill_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => return Err(DecodeError::TruncatedStream(Stage::BlockHeader)),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}

/// Reader adapter that keeps a copy of every byte pulled through it.
///
/// The framer reads a block's header, parameters and payload through this
/// so the CRC32 footer can be checked against the exact wire bytes.
pub struct RecordingReader<'a, R: Read> {
    inner:    &'a mut R,
    recorded: Vec<u8>,
}

impl<'a, R: Read> RecordingReader<'a, R> {
    pub fn new(inner: &'a mut R) -> Self {
        Self { inner, recorded: Vec::new() }
    }

    pub fn recorded(&self) -> &[u8] {
        &self.recorded
    }

    pub fn into_recorded(self) -> Vec<u8> {
        self.recorded
    }
}

impl<R: Read> Read for RecordingReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.recorded.extend_from_slice(&buf[..n]);
        Ok(n)
    }
}

pub fn crc32(bytes: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

/// Read the 4-byte footer and compare it with the CRC32 of `wire_bytes`.
pub fn verify_checksum<R: Read>(mut reader: R, wire_bytes: &[u8]) -> Result<()> {
    let expected = reader
        .read_u32::<LittleEndian>()
        .map_err(|e| DecodeError::from_read(e, Stage::Checksum))?;
    let actual = crc32(wire_bytes);
    if expected != actual {
        return Err(DecodeError::ChecksumMismatch { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_header(block_type: u16, compression: u16, size: u32, compressed: Option<u32>) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&block_type.to_le_bytes());
        out.extend_from_slice(&compression.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        if let Some(c) = compressed {
            out.extend_from_slice(&c.to_le_bytes());
        }
        out
    }

    #[test]
    fn uncompressed_header_has_no_extended_field() {
        let bytes = raw_header(1, 0, 42, None);
        let mut reader = bytes.as_slice();
        let hdr = BlockHeader::read(&mut reader).unwrap().unwrap();
        assert_eq!(hdr.block_type, BlockType::GCode);
        assert_eq!(hdr.compressed_size, None);
        assert_eq!(hdr.payload_len(), 42);
        assert_eq!(hdr.size(), BLOCK_HEADER_SIZE);
        assert!(reader.is_empty());
    }

    #[test]
    fn compressed_header_uses_compressed_size() {
        let bytes = raw_header(5, 3, 1000, Some(17));
        let hdr = BlockHeader::read(bytes.as_slice()).unwrap().unwrap();
        assert_eq!(hdr.compression, Compression::Heatshrink12_4);
        assert_eq!(hdr.payload_len(), 17);
        assert_eq!(hdr.size(), BLOCK_HEADER_EXTENDED_SIZE);
    }

    #[test]
    fn clean_eof_is_end_of_blocks() {
        assert!(BlockHeader::read(&b""[..]).unwrap().is_none());
    }

    #[test]
    fn partial_header_is_truncated() {
        let bytes = raw_header(0, 0, 1, None);
        let err = BlockHeader::read(&bytes[..5]).unwrap_err();
        assert!(matches!(err, DecodeError::TruncatedStream(Stage::BlockHeader)));
    }

    #[test]
    fn missing_extended_field_is_truncated() {
        let bytes = raw_header(0, 1, 1, None);
        let err = BlockHeader::read(bytes.as_slice()).unwrap_err();
        assert!(matches!(err, DecodeError::TruncatedStream(Stage::BlockHeader)));
    }

    #[test]
    fn invalid_enums_fail_before_extended_field() {
        // Only the basic header is present; reading further would truncate.
        let bytes = raw_header(6, 1, 100, None);
        let err = BlockHeader::read(bytes.as_slice()).unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedBlockType(6)));

        let bytes = raw_header(1, 4, 100, None);
        let err = BlockHeader::read(bytes.as_slice()).unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedCompression(4)));
    }

    #[test]
    fn recording_reader_keeps_consumed_bytes() {
        let data = b"header+payload trailing".to_vec();
        let mut src = data.as_slice();
        let mut rec = RecordingReader::new(&mut src);
        let mut buf = [0u8; 14];
        rec.read_exact(&mut buf).unwrap();
        assert_eq!(rec.recorded(), b"header+payload");
        assert_eq!(src, b" trailing");
    }

    #[test]
    fn checksum_footer_is_compared() {
        let wire = b"some block bytes";
        let footer = crc32(wire).to_le_bytes();
        verify_checksum(&footer[..], wire).unwrap();

        let bad = (crc32(wire) ^ 1).to_le_bytes();
        let err = verify_checksum(&bad[..], wire).unwrap_err();
        assert!(matches!(err, DecodeError::ChecksumMismatch { .. }));

        let err = verify_checksum(&footer[..2], wire).unwrap_err();
        assert!(matches!(err, DecodeError::TruncatedStream(Stage::Checksum)));
    }
}
