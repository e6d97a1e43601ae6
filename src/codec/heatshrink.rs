//! Heatshrink (LZSS) decoder.
//!
//! The bitstream is read MSB-first. Each token starts with a tag bit:
//! `1` is followed by an 8-bit literal, `0` by a `window_bits` back-reference
//! index and a `lookahead_bits` count, both stored minus one. Running out of
//! input inside a token is the normal end of stream (the encoder pads the
//! last byte with zero bits).

use super::{Codec, CodecError};
use crate::block::Compression;

pub struct HeatshrinkCodec {
    window_bits:    u8,
    lookahead_bits: u8,
}

impl HeatshrinkCodec {
    pub fn new(window_bits: u8, lookahead_bits: u8) -> Result<Self, CodecError> {
        if !(4..=15).contains(&window_bits) || lookahead_bits < 3 || lookahead_bits >= window_bits {
            return Err(CodecError::InvalidParameters(format!(
                "window {window_bits} bits, lookahead {lookahead_bits} bits"
            )));
        }
        Ok(Self { window_bits, lookahead_bits })
    }
}

impl Codec for HeatshrinkCodec {
    fn compression(&self) -> Compression {
        match self.window_bits {
            11 => Compression::Heatshrink11_4,
            _  => Compression::Heatshrink12_4,
        }
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut bits = BitReader::new(data);
        let mut out = Vec::with_capacity(data.len() * 2);

        loop {
            let Some(tag) = bits.take(1) else { break };
            if tag == 1 {
                let Some(literal) = bits.take(8) else { break };
                out.push(literal as u8);
                continue;
            }
            let Some(index) = bits.take(self.window_bits) else { break };
            let Some(count) = bits.take(self.lookahead_bits) else { break };
            let distance = index as usize + 1;
            // The window starts zero-filled, so reaching before the first
            // output byte yields zeros.
            for _ in 0..=count {
                let byte = if distance <= out.len() { out[out.len() - distance] } else { 0 };
                out.push(byte);
            }
        }
        Ok(out)
    }
}

struct BitReader<'a> {
    data: &'a [u8],
    pos:  usize,
    mask: u8,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0, mask: 0x80 }
    }

    /// Read `count` bits MSB-first, or `None` if fewer remain.
    fn take(&mut self, count: u8) -> Option<u16> {
        let remaining = (self.data.len() - self.pos) * 8 - (self.mask.leading_zeros() as usize);
        if (count as usize) > remaining {
            return None;
        }
        let mut value = 0u16;
        for _ in 0..count {
            value <<= 1;
            if self.data[self.pos] & self.mask != 0 {
                value |= 1;
            }
            self.mask >>= 1;
            if self.mask == 0 {
                self.mask = 0x80;
                self.pos += 1;
            }
        }
        Some(value)
    }
}
