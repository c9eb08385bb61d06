//! `mizmaster compress` — Signature-only rendering of a Lua source file.

use mizmaster_tools::compress_source;
use std::path::PathBuf;

use super::read_input;

pub async fn run(file: Option<PathBuf>, stats: bool) -> Result<(), Box<dyn std::error::Error>> {
    let source = read_input(file.as_deref()).await?;
    let result = compress_source(&source);

    if stats {
        println!("Original:   {} bytes", result.original_length);
        println!("Compressed: {} bytes", result.compressed_length);
        println!("Saved:      {:.1}%", result.ratio);
    } else {
        println!("{}", result.compressed_text);
    }
    Ok(())
}
