//! MeatPack decoder for G-code block bodies.
//!
//! MeatPack squeezes the most common G-code characters into 4-bit codes, two
//! per byte (low nibble first). Code `0b1111` means "not packable": the real
//! character follows as a whole byte. Two `0xFF` signal bytes followed by a
//! command byte switch packing and no-spaces mode on or off.
//!
//! Decoding never fails on malformed data, it only garbles the text. The one
//! exception is a stream that ends right after the two signal bytes, which is
//! reported as truncated.

use log::trace;

use crate::error::{DecodeError, Result, Stage};

pub const SIGNAL_BYTE: u8 = 0xFF;

pub const COMMAND_ENABLE_PACKING:    u8 = 251;
pub const COMMAND_DISABLE_PACKING:   u8 = 250;
pub const COMMAND_RESET_ALL:         u8 = 249;
pub const COMMAND_ENABLE_NO_SPACES:  u8 = 247;
pub const COMMAND_DISABLE_NO_SPACES: u8 = 246;

const ESCAPE: u8 = 0b1111;

/// Parameter letters that get a separating space on `G` lines.
const GLINE_PARAMETERS: &[u8] = b"XYZEFIJRPWHCA";

/// Decoder state threaded through every input byte.
#[derive(Debug, Default)]
pub struct MeatPackDecoder {
    packing:          bool,
    no_spaces:        bool,
    /// A single signal byte seen, waiting to learn if a second follows.
    pending_signal:   bool,
    /// Two signal bytes seen; the next byte is a command.
    command_pending:  bool,
    /// Whole bytes still owed to escaped nibbles (0..=2).
    pending_literals: u8,
    /// Second character of a packed byte whose first nibble was escaped.
    held:             Option<u8>,
    queue:            CharQueue,
    shaper:           LineShaper,
}

impl MeatPackDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, byte: u8) {
        if self.packing && self.pending_literals > 0 && !self.pending_signal && !self.command_pending {
            // Bytes owed to the escape path are always literal.
            self.receive(byte);
        } else if byte == SIGNAL_BYTE && self.pending_signal {
            self.command_pending = true;
            self.pending_signal = false;
        } else if byte == SIGNAL_BYTE {
            self.pending_signal = true;
        } else if self.command_pending {
            self.handle_command(byte);
            self.command_pending = false;
        } else {
            if self.pending_signal {
                self.receive(SIGNAL_BYTE);
                self.pending_signal = false;
            }
            self.receive(byte);
        }

        for ch in self.queue.drain() {
            self.shaper.push(ch);
        }
    }

    pub fn feed_all(&mut self, data: &[u8]) {
        for &byte in data {
            self.feed(byte);
        }
    }

    /// Finish decoding and return the shaped text bytes.
    ///
    /// A lone trailing signal byte is dropped.
    pub fn finish(self) -> Result<Vec<u8>> {
        if self.command_pending {
            return Err(DecodeError::TruncatedStream(Stage::PackCommand));
        }
        Ok(self.shaper.out)
    }

    fn handle_command(&mut self, command: u8) {
        match command {
            COMMAND_ENABLE_PACKING    => self.packing = true,
            COMMAND_DISABLE_PACKING   => self.packing = false,
            COMMAND_RESET_ALL         => self.packing = false,
            COMMAND_ENABLE_NO_SPACES  => self.no_spaces = true,
            COMMAND_DISABLE_NO_SPACES => self.no_spaces = false,
            _ => {}
        }
        trace!("meatpack command {command}: packing={} no_spaces={}", self.packing, self.no_spaces);
    }

    fn receive(&mut self, byte: u8) {
        if !self.packing {
            self.queue.push(byte);
            return;
        }

        if self.pending_literals > 0 {
            self.queue.push(byte);
            if let Some(held) = self.held.take() {
                self.queue.push(held);
            }
            self.pending_literals -= 1;
            return;
        }

        let low = byte & 0x0F;
        let high = byte >> 4;
        if low == ESCAPE {
            self.pending_literals += 1;
            if high == ESCAPE {
                self.pending_literals += 1;
            } else {
                self.held = Some(self.char_for(high));
            }
            return;
        }

        let first = self.char_for(low);
        self.queue.push(first);
        // A packed newline ends the byte; its high nibble is padding.
        if first == b'\n' {
            return;
        }
        if high == ESCAPE {
            self.pending_literals += 1;
            return;
        }
        self.queue.push(self.char_for(high));
    }

    fn char_for(&self, code: u8) -> u8 {
        match code {
            0..=9 => b'0' + code,
            10 => b'.',
            11 if self.no_spaces => b'E',
            11 => b' ',
            12 => b'\n',
            13 => b'G',
            14 => b'X',
            _ => 0,
        }
    }
}

/// Characters produced by one input byte, at most two.
#[derive(Debug, Default)]
struct CharQueue {
    chars: [u8; 2],
    len:   usize,
}

impl CharQueue {
    fn push(&mut self, ch: u8) {
        self.chars[self.len] = ch;
        self.len += 1;
    }

    fn drain(&mut self) -> impl Iterator<Item = u8> {
        let chars = self.chars;
        let len = std::mem::take(&mut self.len);
        chars.into_iter().take(len)
    }
}

/// Re-inserts the spaces packing dropped and folds repeated newlines.
#[derive(Debug, Default)]
struct LineShaper {
    out:       Vec<u8>,
    add_space: bool,
}

impl LineShaper {
    fn push(&mut self, ch: u8) {
        let prev = self.out.last().copied();
        if ch == b'G' && matches!(prev, None | Some(b'\n')) {
            self.add_space = true;
        } else if ch == b'\n' {
            self.add_space = false;
        }
        if self.add_space && prev != Some(b' ') && GLINE_PARAMETERS.contains(&ch) {
            self.out.push(b' ');
        }
        if ch != b'\n' || prev != Some(b'\n') {
            self.out.push(ch);
        }
    }
}

/// Decode a whole MeatPack stream into text.
pub fn unpack(data: &[u8]) -> Result<String> {
    let mut decoder = MeatPackDecoder::new();
    decoder.feed_all(data);
    let bytes = decoder.finish()?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
