//! Error type shared by every decoding stage.
//!
//! Every error is terminal: the first one aborts the whole decode and no
//! partial document is returned.

use std::io;
use thiserror::Error;

use crate::block::{BlockType, Compression};
use crate::codec::CodecError;

/// Which structure was being read when the input ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FileHeader,
    BlockHeader,
    BlockParameters,
    Payload,
    Checksum,
    PackCommand,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Stage::FileHeader      => "file header",
            Stage::BlockHeader     => "block header",
            Stage::BlockParameters => "block parameters",
            Stage::Payload         => "block payload",
            Stage::Checksum        => "checksum footer",
            Stage::PackCommand     => "MeatPack command",
        })
    }
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Invalid container: bad magic number {0:#010x}")]
    InvalidContainer(u32),
    #[error("Unsupported version: {0}")]
    UnsupportedVersion(u32),
    #[error("Unsupported checksum type: {0}")]
    UnsupportedChecksumMode(u16),
    #[error("Unsupported block type: {0}")]
    UnsupportedBlockType(u16),
    #[error("Unsupported compression: {0}")]
    UnsupportedCompression(u16),
    #[error("Truncated stream while reading {0}")]
    TruncatedStream(Stage),
    #[error("{compression} decompression failed: {source}")]
    DecompressionFailed {
        compression: Compression,
        #[source]
        source: CodecError,
    },
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(u16),
    #[error("Unsupported thumbnail format: {0}")]
    UnsupportedThumbnailFormat(u16),
    #[error("Malformed key-value pair on line {line}")]
    MalformedKeyValue { line: usize },
    #[error("Checksum mismatch: footer {expected:#010x}, computed {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },
    /// Wraps a failure inside a framed block so the caller learns where it happened.
    #[error("Block #{index} ({block_type}): {source}")]
    Block {
        index:      usize,
        block_type: BlockType,
        #[source]
        source:     Box<DecodeError>,
    },
    /// A block header that could not be framed, so its type is unknown.
    #[error("Block #{index} header: {source}")]
    BlockHeader {
        index:  usize,
        #[source]
        source: Box<DecodeError>,
    },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl DecodeError {
    /// Strip any block context and return the underlying kind.
    pub fn root(&self) -> &DecodeError {
        match self {
            DecodeError::Block { source, .. } | DecodeError::BlockHeader { source, .. } => source.root(),
            other => other,
        }
    }

    /// Map an I/O error from `stage`, turning a short read into `TruncatedStream`.
    pub(crate) fn from_read(err: io::Error, stage: Stage) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            DecodeError::TruncatedStream(stage)
        } else {
            DecodeError::Io(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, DecodeError>;
