//! Semantic compression of Lua source.
//!
//! Large framework files are reduced to the lines the model needs to call
//! into them: comments, class declarations, function signatures and short
//! top-level assignments. Function bodies are elided.

use regex_lite::Regex;

/// Appended to a multi-line function signature whose body was dropped.
pub const ELISION_MARKER: &str = "-- [Implementation Hidden by Semantic Architect]";

/// `local` and upper-case assignments at or above this length are dropped.
const MAX_DECLARATION_LEN: usize = 100;

/// Separator comments (`----------`, `==========`) at or above this length
/// carry no information and are dropped.
const MIN_SEPARATOR_LEN: usize = 10;

const CLASS_ASSIGNMENT: &str = r"^[A-Z_0-9]+\s*=\s*[A-Z_0-9.:]+";

const UPPER_ASSIGNMENT: &str = r"^[A-Z_]+\s*=";

fn matches(pattern: &str, text: &str) -> bool {
    Regex::new(pattern).is_ok_and(|re| re.is_match(text))
}

/// Numbers describing one compression. Lengths are in bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionResult {
    /// Banner, blank line, then the filtered body
    pub compressed_text: String,
    pub original_length: usize,
    /// Length of the body that follows the banner
    pub compressed_length: usize,
    /// Percentage saved, one decimal place
    pub ratio: f64,
}

/// Compress Lua source. Never fails; empty input yields empty output.
pub fn compress(raw: &str) -> String {
    compress_source(raw).compressed_text
}

/// Compress Lua source and report the sizes.
pub fn compress_source(raw: &str) -> CompressionResult {
    if raw.is_empty() {
        return CompressionResult {
            compressed_text: String::new(),
            original_length: 0,
            compressed_length: 0,
            ratio: 0.0,
        };
    }

    let body = filter_lines(raw).join("\n");
    let original_length = raw.len();
    let compressed_length = body.len();
    let ratio = compression_ratio(original_length, compressed_length);

    let compressed_text = format!(
        "{}\n\n{body}",
        banner(original_length, compressed_length, ratio)
    );

    CompressionResult {
        compressed_text,
        original_length,
        compressed_length,
        ratio,
    }
}

fn compression_ratio(original: usize, compressed: usize) -> f64 {
    let saved = (1.0 - compressed as f64 / original as f64) * 100.0;
    (saved * 10.0).round() / 10.0
}

fn banner(original: usize, compressed: usize, ratio: f64) -> String {
    [
        "--- [SEMANTIC COMPRESSION ACTIVE]".to_string(),
        format!("--- Original Size: {original} bytes"),
        format!("--- Compressed Size: {compressed} bytes"),
        format!("--- Compression Ratio: {ratio:.1}%"),
        "--- NOTE: Implementation logic has been stripped. Function signatures are accurate."
            .to_string(),
        "-".repeat(60),
    ]
    .join("\n")
}

fn filter_lines(raw: &str) -> Vec<String> {
    let mut kept = Vec::new();

    for line in raw.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with("--") {
            if !is_separator(trimmed) {
                kept.push(line.to_string());
            }
        } else if matches(CLASS_ASSIGNMENT, trimmed) {
            kept.push(line.to_string());
        } else if trimmed.starts_with("function") {
            if trimmed.ends_with("end") {
                kept.push(line.to_string());
            } else {
                kept.push(format!("{line} {ELISION_MARKER}"));
                kept.push("end".to_string());
            }
        } else if trimmed.starts_with("local ") || matches(UPPER_ASSIGNMENT, trimmed) {
            if trimmed.len() < MAX_DECLARATION_LEN {
                kept.push(line.to_string());
            }
        }
    }

    kept
}

/// A line made of one repeated punctuation character.
fn is_separator(trimmed: &str) -> bool {
    let mut chars = trimmed.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    first.is_ascii_punctuation()
        && trimmed.len() >= MIN_SEPARATOR_LEN
        && chars.all(|c| c == first)
}
