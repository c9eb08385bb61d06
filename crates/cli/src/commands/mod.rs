pub mod completions;
pub mod compress;
pub mod config_cmd;
pub mod docs;
pub mod hard_deck;
pub mod prompt;
pub mod validate;

use std::io::Read;
use std::path::Path;

/// Read a file, or all of stdin when no path is given.
pub async fn read_input(file: Option<&Path>) -> Result<String, Box<dyn std::error::Error>> {
    match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read {}: {e}", path.display()).into()),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}
