//! Streaming decoder: file header, then one block at a time.
//!
//! [`BgcodeReader`] validates the file header on construction and then
//! frames blocks on demand. Every block is read through a recording reader
//! so its CRC32 footer is checked against the exact wire bytes before the
//! payload is decompressed or unpacked.
//!
//! Decoding is all-or-nothing: the first error ends the stream, and no
//! partial [`Document`] is produced by [`decode`].

use log::debug;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::block::{verify_checksum, BlockHeader, RecordingReader};
use crate::document::Document;
use crate::error::{DecodeError, Result};
use crate::file_header::{ChecksumType, FileHeader};
use crate::payload::{Payload, RawBlock};

/// One framed, verified and decoded block.
#[derive(Debug, Clone)]
pub struct Block {
    pub header:  BlockHeader,
    pub payload: Payload,
}

pub struct BgcodeReader<R: Read> {
    reader:          R,
    pub file_header: FileHeader,
    blocks_read:     usize,
}

impl<R: Read> BgcodeReader<R> {
    pub fn new(mut reader: R) -> Result<Self> {
        let file_header = FileHeader::read(&mut reader)?;
        debug!("bgcode v{}, checksum {:?}", file_header.version, file_header.checksum_type);
        Ok(Self { reader, file_header, blocks_read: 0 })
    }

    /// Number of blocks framed so far.
    pub fn blocks_read(&self) -> usize {
        self.blocks_read
    }

    /// Frame the next block. `Ok(None)` at a clean end of stream.
    pub fn next_block(&mut self) -> Result<Option<Block>> {
        let index = self.blocks_read;
        let mut recorder = RecordingReader::new(&mut self.reader);
        let framed = BlockHeader::read(&mut recorder)
            .map_err(|source| DecodeError::BlockHeader { index, source: Box::new(source) })?;
        let header = match framed {
            Some(h) => h,
            None    => return Ok(None),
        };
        debug!(
            "block #{index}: {} ({}), {} bytes on wire, {} uncompressed",
            header.block_type,
            header.compression,
            header.payload_len(),
            header.uncompressed_size,
        );
        let in_block = |source: DecodeError| DecodeError::Block {
            index,
            block_type: header.block_type,
            source: Box::new(source),
        };

        let raw = RawBlock::read(&mut recorder, &header).map_err(in_block)?;
        let wire_bytes = recorder.into_recorded();
        if self.file_header.checksum_type == ChecksumType::Crc32 {
            verify_checksum(&mut self.reader, &wire_bytes).map_err(in_block)?;
        }
        let payload = raw.decode().map_err(in_block)?;

        self.blocks_read += 1;
        Ok(Some(Block { header, payload }))
    }

    /// Decode every remaining block into a [`Document`].
    pub fn into_document(mut self) -> Result<Document> {
        let mut document = Document::new();
        while let Some(block) = self.next_block()? {
            document.push(block.payload);
        }
        Ok(document)
    }
}

impl<R: Read> Iterator for BgcodeReader<R> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_block().transpose()
    }
}

/// Decode a whole `.bgcode` stream into G-code text.
pub fn decode<R: Read>(reader: R) -> Result<String> {
    Ok(BgcodeReader::new(reader)?.into_document()?.render())
}

pub fn decode_file<P: AsRef<Path>>(path: P) -> Result<String> {
    decode(BufReader::new(File::open(path)?))
}
