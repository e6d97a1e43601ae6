use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use std::fmt;

/// Width of a base64 line in the rendered comment block.
const LINE_WIDTH: usize = 78;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ThumbnailFormat {
    Png,
    Jpg,
    Qoi,
}

impl ThumbnailFormat {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(ThumbnailFormat::Png),
            1 => Some(ThumbnailFormat::Jpg),
            2 => Some(ThumbnailFormat::Qoi),
            _ => None,
        }
    }
}

impl fmt::Display for ThumbnailFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ThumbnailFormat::Png => "PNG",
            ThumbnailFormat::Jpg => "JPG",
            ThumbnailFormat::Qoi => "QOI",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Thumbnail {
    pub format: ThumbnailFormat,
    pub width:  u16,
    pub height: u16,
    #[serde(skip)]
    pub data:   Vec<u8>,
}

impl Thumbnail {
    /// Embed the image as a base64 `; thumbnail begin` comment block.
    pub fn render(&self) -> String {
        let encoded = STANDARD.encode(&self.data);
        let mut out = String::new();
        out.push_str(";\n");
        out.push_str(&format!("; thumbnail begin {}x{} {}\n", self.width, self.height, encoded.len()));
        let mut rest = encoded.as_str();
        while rest.len() > LINE_WIDTH {
            let (chunk, tail) = rest.split_at(LINE_WIDTH);
            out.push_str(&format!("; {chunk}\n"));
            rest = tail;
        }
        out.push_str(&format!("; {rest}\n"));
        out.push_str("; thumbnail end\n");
        out.push_str(";\n");
        out
    }
}
