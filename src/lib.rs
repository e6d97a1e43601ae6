//! Decoder for binary G-code (`.bgcode`) files.
//!
//! ```no_run
//! let text = bgcode::decode_file("print.bgcode")?;
//! std::fs::write("print.gcode", text)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod file_header;
pub mod block;
pub mod codec;
pub mod meatpack;
pub mod payload;
pub mod document;
pub mod io_stream;

pub use error::{DecodeError, Result, Stage};
pub use file_header::{FileHeader, ChecksumType};
pub use block::{BlockHeader, BlockType, Compression};
pub use payload::{Payload, KeyValues, Thumbnail, GCode, GCodeEncoding};
pub use document::Document;
pub use io_stream::{BgcodeReader, Block, decode, decode_file};
