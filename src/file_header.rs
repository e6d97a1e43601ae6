use byteorder::{LittleEndian, ReadBytesExt};
use serde::Serialize;
use std::io::Read;

use crate::error::{DecodeError, Result, Stage};

/// `GCDE` read as a little-endian u32.
pub const MAGIC: u32 = 0x4544_4347;
pub const VERSION: u32 = 1;
pub const FILE_HEADER_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChecksumType {
    None,
    Crc32,
}

impl ChecksumType {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(ChecksumType::None),
            1 => Some(ChecksumType::Crc32),
            _ => None,
        }
    }

    /// Size of the footer trailing every block.
    pub fn footer_size(self) -> usize {
        match self {
            ChecksumType::None  => 0,
            ChecksumType::Crc32 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct FileHeader {
    pub magic:         u32,
    pub version:       u32,
    pub checksum_type: ChecksumType,
}

impl FileHeader {
    /// Read and validate the fixed header at the start of the stream.
    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let eof = |e| DecodeError::from_read(e, Stage::FileHeader);
        let magic = reader.read_u32::<LittleEndian>().map_err(eof)?;
        if magic != MAGIC {
            return Err(DecodeError::InvalidContainer(magic));
        }
        let version = reader.read_u32::<LittleEndian>().map_err(eof)?;
        if version != VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }
        let raw_checksum = reader.read_u16::<LittleEndian>().map_err(eof)?;
        let checksum_type = ChecksumType::from_u16(raw_checksum)
            .ok_or(DecodeError::UnsupportedChecksumMode(raw_checksum))?;
        Ok(Self { magic, version, checksum_type })
    }
}
