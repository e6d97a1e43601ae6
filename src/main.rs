use clap::{Parser, Subcommand};
use serde::Serialize;
use bgcode::{BgcodeReader, BlockHeader, Payload};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bgcode", about = "Binary G-code (.bgcode) decoder")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a .bgcode file to plain G-code
    Decode {
        input: PathBuf,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the blocks of a .bgcode file
    Info {
        input: PathBuf,
        /// Print one JSON object per block
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct BlockInfo<'a> {
    index:  usize,
    header: &'a BlockHeader,
    detail: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command {

        Commands::Decode { input, output } => {
            let text = bgcode::decode_file(&input)?;
            match output {
                Some(path) => std::fs::write(&path, text)?,
                None       => std::io::stdout().lock().write_all(text.as_bytes())?,
            }
        }

        Commands::Info { input, json } => {
            let mut reader = BgcodeReader::new(BufReader::new(File::open(&input)?))?;
            if !json {
                println!("File: {}", input.display());
                println!("  Version   {}", reader.file_header.version);
                println!("  Checksum  {:?}", reader.file_header.checksum_type);
                println!("{:>4}  {:<17} {:<16} {:>10} {:>12}  Detail",
                         "#", "Type", "Compression", "Stored", "Uncompressed");
            }
            let mut index = 0;
            while let Some(block) = reader.next_block()? {
                let info = BlockInfo { index, header: &block.header, detail: describe(&block.payload) };
                if json {
                    println!("{}", serde_json::to_string(&info)?);
                } else {
                    println!("{:>4}  {:<17} {:<16} {:>10} {:>12}  {}",
                        info.index,
                        info.header.block_type.name(),
                        info.header.compression.name(),
                        info.header.payload_len(),
                        info.header.uncompressed_size,
                        info.detail);
                }
                index += 1;
            }
        }
    }

    Ok(())
}

fn describe(payload: &Payload) -> String {
    match payload {
        Payload::Thumbnail(t) => format!(
            "{} {}x{}, {} bytes",
            t.format, t.width, t.height, t.data.len()
        ),
        Payload::GCode(g) => format!("{:?}, {} lines", g.encoding, g.text.lines().count()),
        Payload::FileMetadata(kv)
        | Payload::PrinterMetadata(kv)
        | Payload::PrintMetadata(kv)
        | Payload::SlicerMetadata(kv) => format!("{} entries", kv.len()),
    }
}
