//! Assembly of decoded blocks into the final G-code text.
//!
//! Output order is fixed regardless of where blocks sit in the file:
//! file metadata, printer metadata, thumbnails, G-code, print metadata,
//! slicer metadata.

use log::warn;

use crate::payload::{GCode, KeyValues, Payload, Thumbnail};

#[derive(Debug, Clone, Default)]
pub struct Document {
    /// Only the first block of each metadata type is kept.
    pub file_metadata:    Option<KeyValues>,
    pub printer_metadata: Option<KeyValues>,
    pub print_metadata:   Option<KeyValues>,
    pub slicer_metadata:  Option<KeyValues>,
    pub thumbnails:       Vec<Thumbnail>,
    pub gcode:            Vec<GCode>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, payload: Payload) {
        let block_type = payload.block_type();
        let slot = match payload {
            Payload::Thumbnail(t) => return self.thumbnails.push(t),
            Payload::GCode(g)     => return self.gcode.push(g),
            Payload::FileMetadata(kv)    => (&mut self.file_metadata, kv),
            Payload::PrinterMetadata(kv) => (&mut self.printer_metadata, kv),
            Payload::PrintMetadata(kv)   => (&mut self.print_metadata, kv),
            Payload::SlicerMetadata(kv)  => (&mut self.slicer_metadata, kv),
        };
        match slot {
            (Some(_), _) => warn!("ignoring duplicate {block_type} block"),
            (empty, kv)  => *empty = Some(kv),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(kv) = &self.file_metadata {
            out.push_str("; generated by ");
            out.push_str(kv.first("Producer"));
            out.push_str("\n\n");
        }
        if let Some(kv) = &self.printer_metadata {
            out.push('\n');
            out.push_str(&kv.render());
        }
        for thumbnail in &self.thumbnails {
            out.push('\n');
            out.push_str(&thumbnail.render());
        }
        if !self.gcode.is_empty() {
            out.push('\n');
            for block in &self.gcode {
                out.push_str(&block.text);
            }
        }
        if let Some(kv) = &self.print_metadata {
            out.push('\n');
            out.push_str(&kv.render());
        }
        if let Some(kv) = &self.slicer_metadata {
            out.push('\n');
            out.push_str("; prusaslicer_config = begin\n");
            out.push_str(&kv.render());
            out.push_str("; prusaslicer_config = end\n\n");
        }
        out
    }
}
