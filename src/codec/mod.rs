//! Payload decompression, selected by the block header's compression field.
//!
//! The codec set is closed: `None`, zlib-wrapped DEFLATE, and heatshrink
//! with an 11- or 12-bit window and a 4-bit lookahead.

use std::io::{self, Read};
use flate2::read::ZlibDecoder;
use log::trace;
use thiserror::Error;

use crate::block::Compression;

pub mod heatshrink;

pub use heatshrink::HeatshrinkCodec;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Decompression error: {0}")]
    Decompression(String),
    #[error("Invalid codec parameters: {0}")]
    InvalidParameters(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub trait Codec {
    fn compression(&self) -> Compression;
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;
}

pub struct NoneCodec;
impl Codec for NoneCodec {
    fn compression(&self) -> Compression { Compression::None }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> { Ok(data.to_vec()) }
}

pub struct DeflateCodec;
impl Codec for DeflateCodec {
    fn compression(&self) -> Compression { Compression::Deflate }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        ZlibDecoder::new(data)
            .read_to_end(&mut out)
            .map_err(|e| CodecError::Decompression(e.to_string()))?;
        Ok(out)
    }
}

/// Resolve a compression selector to its codec.
pub fn get_codec(compression: Compression) -> Result<Box<dyn Codec>, CodecError> {
    match compression {
        Compression::None           => Ok(Box::new(NoneCodec)),
        Compression::Deflate        => Ok(Box::new(DeflateCodec)),
        Compression::Heatshrink11_4 => Ok(Box::new(HeatshrinkCodec::new(11, 4)?)),
        Compression::Heatshrink12_4 => Ok(Box::new(HeatshrinkCodec::new(12, 4)?)),
    }
}

/// Decompress a raw block payload.
pub fn decompress(compression: Compression, data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let codec = get_codec(compression)?;
    let out = codec.decompress(data)?;
    trace!("{}: {} -> {} bytes", codec.compression(), data.len(), out.len());
    Ok(out)
}
