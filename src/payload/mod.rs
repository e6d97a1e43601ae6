//! Type-specific block payloads.
//!
//! Every block type has a small parameter record between the block header
//! and the payload bytes. Metadata and G-code payloads go through the
//! block's compression codec; thumbnails are stored as-is.

use byteorder::{LittleEndian, ReadBytesExt};
use log::trace;
use serde::Serialize;
use std::io::Read;

use crate::block::{BlockHeader, BlockType};
use crate::codec;
use crate::error::{DecodeError, Result, Stage};
use crate::meatpack;

pub mod key_value;
pub mod thumbnail;

pub use key_value::{KeyValue, KeyValues};
pub use thumbnail::{Thumbnail, ThumbnailFormat};

/// The only metadata encoding defined.
pub const METADATA_ENCODING_INI: u16 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GCodeEncoding {
    Raw,
    MeatPack,
    MeatPackComments,
}

impl GCodeEncoding {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(GCodeEncoding::Raw),
            1 => Some(GCodeEncoding::MeatPack),
            2 => Some(GCodeEncoding::MeatPackComments),
            _ => None,
        }
    }

    pub fn is_packed(self) -> bool {
        !matches!(self, GCodeEncoding::Raw)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GCode {
    pub encoding: GCodeEncoding,
    #[serde(skip)]
    pub text:     String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Payload {
    FileMetadata(KeyValues),
    GCode(GCode),
    SlicerMetadata(KeyValues),
    PrinterMetadata(KeyValues),
    PrintMetadata(KeyValues),
    Thumbnail(Thumbnail),
}

impl Payload {
    pub fn block_type(&self) -> BlockType {
        match self {
            Payload::FileMetadata(_)    => BlockType::FileMetadata,
            Payload::GCode(_)           => BlockType::GCode,
            Payload::SlicerMetadata(_)  => BlockType::SlicerMetadata,
            Payload::PrinterMetadata(_) => BlockType::PrinterMetadata,
            Payload::PrintMetadata(_)   => BlockType::PrintMetadata,
            Payload::Thumbnail(_)       => BlockType::Thumbnail,
        }
    }

    /// Read the parameters and payload following `header` and decode them.
    pub fn read<R: Read>(reader: R, header: &BlockHeader) -> Result<Self> {
        RawBlock::read(reader, header)?.decode()
    }
}

/// Parameter record stored between the block header and the payload.
///
/// Values are kept as read. They are covered by the block checksum, so they
/// are only interpreted by [`RawBlock::decode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Parameters {
    Metadata { encoding: u16 },
    GCode { encoding: u16 },
    Thumbnail { format: u16, width: u16, height: u16 },
}

/// A block as it sits on the wire: parameters and payload read but not yet
/// interpreted. Decoding is deferred so the checksum can be verified first.
#[derive(Debug, Clone)]
pub struct RawBlock {
    pub header: BlockHeader,
    pub params: Parameters,
    pub body:   Vec<u8>,
}

impl RawBlock {
    pub fn read<R: Read>(mut reader: R, header: &BlockHeader) -> Result<Self> {
        let params = match header.block_type {
            BlockType::FileMetadata
            | BlockType::SlicerMetadata
            | BlockType::PrinterMetadata
            | BlockType::PrintMetadata => Parameters::Metadata { encoding: read_param(&mut reader)? },
            BlockType::GCode => Parameters::GCode { encoding: read_param(&mut reader)? },
            BlockType::Thumbnail => Parameters::Thumbnail {
                format: read_param(&mut reader)?,
                width:  read_param(&mut reader)?,
                height: read_param(&mut reader)?,
            },
        };
        let body = read_body(&mut reader, header)?;
        Ok(Self { header: *header, params, body })
    }

    /// Validate the parameters, then decompress and decode the payload.
    pub fn decode(self) -> Result<Payload> {
        let header = self.header;
        Ok(match (header.block_type, self.params) {
            (_, Parameters::Thumbnail { format, width, height }) => {
                let format = ThumbnailFormat::from_u16(format)
                    .ok_or(DecodeError::UnsupportedThumbnailFormat(format))?;
                // Thumbnails carry their own image encoding.
                Payload::Thumbnail(Thumbnail { format, width, height, data: self.body })
            }
            (_, Parameters::GCode { encoding }) => {
                let encoding = GCodeEncoding::from_u16(encoding)
                    .ok_or(DecodeError::UnsupportedEncoding(encoding))?;
                let body = inflate(&header, &self.body)?;
                let text = if encoding.is_packed() {
                    trace!("unpacking {} MeatPack bytes", body.len());
                    meatpack::unpack(&body)?
                } else {
                    String::from_utf8_lossy(&body).into_owned()
                };
                Payload::GCode(GCode { encoding, text })
            }
            (block_type, Parameters::Metadata { encoding }) => {
                if encoding != METADATA_ENCODING_INI {
                    return Err(DecodeError::UnsupportedEncoding(encoding));
                }
                let table = KeyValues::parse(&inflate(&header, &self.body)?)?;
                match block_type {
                    BlockType::PrinterMetadata => Payload::PrinterMetadata(table),
                    BlockType::PrintMetadata   => Payload::PrintMetadata(table),
                    BlockType::SlicerMetadata  => Payload::SlicerMetadata(table),
                    _                          => Payload::FileMetadata(table),
                }
            }
        })
    }
}

fn read_param<R: Read>(reader: &mut R) -> Result<u16> {
    reader
        .read_u16::<LittleEndian>()
        .map_err(|e| DecodeError::from_read(e, Stage::BlockParameters))
}

/// Read exactly `header.payload_len()` bytes without trusting the length
/// for the allocation up front.
fn read_body<R: Read>(reader: &mut R, header: &BlockHeader) -> Result<Vec<u8>> {
    let len = header.payload_len() as u64;
    let mut body = Vec::new();
    reader.take(len).read_to_end(&mut body)?;
    if (body.len() as u64) < len {
        return Err(DecodeError::TruncatedStream(Stage::Payload));
    }
    Ok(body)
}

fn inflate(header: &BlockHeader, body: &[u8]) -> Result<Vec<u8>> {
    codec::decompress(header.compression, body).map_err(|source| DecodeError::DecompressionFailed {
        compression: header.compression,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Compression;

    fn header(block_type: BlockType, size: u32) -> BlockHeader {
        BlockHeader {
            block_type,
            compression: Compression::None,
            uncompressed_size: size,
            compressed_size: None,
        }
    }

    #[test]
    fn metadata_block() {
        let body = b"Producer = TestSlicer\n";
        let mut bytes = 0u16.to_le_bytes().to_vec();
        bytes.extend_from_slice(body);
        let p = Payload::read(bytes.as_slice(), &header(BlockType::PrinterMetadata, body.len() as u32)).unwrap();
        let Payload::PrinterMetadata(kv) = p else { panic!("wrong payload") };
        assert_eq!(kv.first("Producer"), "TestSlicer");
    }

    #[test]
    fn metadata_rejects_unknown_encoding() {
        let bytes = 1u16.to_le_bytes();
        let err = Payload::read(&bytes[..], &header(BlockType::SlicerMetadata, 0)).unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedEncoding(1)));
    }

    #[test]
    fn raw_gcode_is_kept_verbatim() {
        let body = b"G1X10\n\n";
        let mut bytes = 0u16.to_le_bytes().to_vec();
        bytes.extend_from_slice(body);
        let p = Payload::read(bytes.as_slice(), &header(BlockType::GCode, body.len() as u32)).unwrap();
        assert_eq!(p, Payload::GCode(GCode { encoding: GCodeEncoding::Raw, text: "G1X10\n\n".into() }));
    }

    #[test]
    fn both_packed_encodings_unpack() {
        for encoding in [1u16, 2] {
            let body = [0xFF, 0xFF, 0xFB, 0x1D, 0xCC];
            let mut bytes = encoding.to_le_bytes().to_vec();
            bytes.extend_from_slice(&body);
            let p = Payload::read(bytes.as_slice(), &header(BlockType::GCode, body.len() as u32)).unwrap();
            let Payload::GCode(g) = p else { panic!("wrong payload") };
            assert!(g.encoding.is_packed());
            assert_eq!(g.text, "G1\n");
        }
    }

    #[test]
    fn gcode_rejects_unknown_encoding() {
        let bytes = 3u16.to_le_bytes();
        let err = Payload::read(&bytes[..], &header(BlockType::GCode, 0)).unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedEncoding(3)));
    }

    #[test]
    fn thumbnail_block() {
        let mut bytes = Vec::new();
        for v in [2u16, 32, 24] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes.extend_from_slice(b"qoif");
        let p = Payload::read(bytes.as_slice(), &header(BlockType::Thumbnail, 4)).unwrap();
        let Payload::Thumbnail(t) = p else { panic!("wrong payload") };
        assert_eq!((t.format, t.width, t.height), (ThumbnailFormat::Qoi, 32, 24));
        assert_eq!(t.data, b"qoif");
    }

    #[test]
    fn parameters_are_checked_on_decode_only() {
        let mut bytes = Vec::new();
        for v in [7u16, 16, 16] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let raw = RawBlock::read(bytes.as_slice(), &header(BlockType::Thumbnail, 0)).unwrap();
        assert_eq!(raw.params, Parameters::Thumbnail { format: 7, width: 16, height: 16 });
        assert!(matches!(raw.decode(), Err(DecodeError::UnsupportedThumbnailFormat(7))));

        let bytes = 9u16.to_le_bytes();
        let raw = RawBlock::read(&bytes[..], &header(BlockType::GCode, 0)).unwrap();
        assert!(matches!(raw.decode(), Err(DecodeError::UnsupportedEncoding(9))));
    }

    #[test]
    fn short_payload_is_truncated() {
        let mut bytes = 0u16.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"G1");
        let err = Payload::read(bytes.as_slice(), &header(BlockType::GCode, 10)).unwrap_err();
        assert!(matches!(err, DecodeError::TruncatedStream(Stage::Payload)));
    }

    #[test]
    fn missing_parameters_are_truncated() {
        let err = Payload::read(&[0u8][..], &header(BlockType::Thumbnail, 0)).unwrap_err();
        assert!(matches!(err, DecodeError::TruncatedStream(Stage::BlockParameters)));
    }
}
