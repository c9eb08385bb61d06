//! Pre-flight checks for Lua snippets.
//!
//! Three passes, cheapest first:
//! 1. Restricted-library scan over comment-free text
//! 2. Bracket nesting over text with comments and literals masked
//! 3. Block keyword balance, reported as an advisory only

use serde::Serialize;
use tracing::debug;

use crate::lexer::{mask_comments, mask_literals};

/// Library prefixes and loader functions that are unavailable in the
/// sanitized mission scripting environment.
pub const RESTRICTED_TOKENS: &[&str] = &[
    "os.",
    "io.",
    "lfs.",
    "debug.",
    "package.",
    "loadlib",
    "loadstring",
    "dofile",
    "loadfile",
    "require",
];

/// Outcome of [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// 1-based line of the failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_number: Option<usize>,

    /// Matched restricted token or offending bracket
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offending: Option<String>,

    /// Block-balance note; never affects `is_valid`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisory: Option<String>,
}

impl ValidationResult {
    fn valid(advisory: Option<String>) -> Self {
        Self {
            is_valid: true,
            error_message: None,
            line_number: None,
            offending: None,
            advisory,
        }
    }

    fn invalid(message: String, line: usize, offending: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            error_message: Some(message),
            line_number: Some(line),
            offending: Some(offending.into()),
            advisory: None,
        }
    }
}

/// Validate a Lua snippet.
pub fn validate(code: &str) -> ValidationResult {
    if let Some((line, token)) = find_restricted(code) {
        debug!(line, token, "Restricted library usage");
        return ValidationResult::invalid(
            format!("Restricted library '{token}' is not available in the mission environment"),
            line,
            token,
        );
    }

    let masked = mask_literals(code);

    if let Err(failure) = check_brackets(&masked) {
        debug!(line = failure.line, bracket = %failure.bracket, "Bracket check failed");
        return ValidationResult::invalid(failure.message, failure.line, failure.bracket);
    }

    ValidationResult::valid(block_balance_advisory(&masked))
}

/// First restricted token in reading order, with its 1-based line.
fn find_restricted(code: &str) -> Option<(usize, &'static str)> {
    let uncommented = mask_comments(code);

    for (idx, line) in uncommented.lines().enumerate() {
        let lower = line.to_ascii_lowercase();
        let hit = RESTRICTED_TOKENS
            .iter()
            .filter_map(|&token| {
                lower
                    .match_indices(token)
                    .find(|(pos, _)| at_identifier_boundary(&lower, *pos, token))
                    .map(|(pos, _)| (pos, token))
            })
            .min_by_key(|(pos, _)| *pos);

        if let Some((_, token)) = hit {
            return Some((idx + 1, token));
        }
    }

    None
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// `pos.x` must not match `os.`, and `self.io.x` is a field, not the library.
fn at_identifier_boundary(line: &str, pos: usize, token: &str) -> bool {
    let bytes = line.as_bytes();
    let before_ok = pos == 0 || !(is_ident_byte(bytes[pos - 1]) || bytes[pos - 1] == b'.');

    let end = pos + token.len();
    let needs_tail_check = token.as_bytes().last().is_some_and(|&b| is_ident_byte(b));
    let after_ok = !needs_tail_check || bytes.get(end).is_none_or(|&b| !is_ident_byte(b));

    before_ok && after_ok
}

struct BracketFailure {
    message: String,
    line: usize,
    bracket: char,
}

fn closer_for(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

fn check_brackets(masked: &str) -> Result<(), BracketFailure> {
    let mut stack: Vec<(char, usize)> = Vec::new();

    for (idx, line) in masked.lines().enumerate() {
        let line_no = idx + 1;
        for ch in line.chars() {
            match ch {
                '(' | '[' | '{' => stack.push((ch, line_no)),
                ')' | ']' | '}' => match stack.pop() {
                    None => {
                        return Err(BracketFailure {
                            message: format!("Unexpected closing bracket '{ch}'"),
                            line: line_no,
                            bracket: ch,
                        });
                    }
                    Some((open, opened_on)) if closer_for(open) != ch => {
                        return Err(BracketFailure {
                            message: format!(
                                "Mismatched bracket '{ch}': '{open}' opened on line {opened_on} expects '{}'",
                                closer_for(open)
                            ),
                            line: line_no,
                            bracket: ch,
                        });
                    }
                    Some(_) => {}
                },
                _ => {}
            }
        }
    }

    match stack.pop() {
        Some((open, line)) => Err(BracketFailure {
            message: format!("Unclosed bracket '{open}'"),
            line,
            bracket: open,
        }),
        None => Ok(()),
    }
}

/// `for`/`while` loops open with `do`, so counting `do` covers them.
fn block_balance_advisory(masked: &str) -> Option<String> {
    let (mut opens, mut closes) = (0usize, 0usize);

    for word in masked.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_')) {
        match word {
            "function" | "if" | "do" | "repeat" => opens += 1,
            "end" | "until" => closes += 1,
            _ => {}
        }
    }

    (opens != closes).then(|| {
        format!("Block keywords may be unbalanced: {opens} openers, {closes} closers")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restricted_call_reports_token_and_line() {
        let code = "local g = GROUP:FindByName('Blue')\n\nos.remove('mission.log')";
        let result = validate(code);
        assert!(!result.is_valid);
        assert_eq!(result.offending.as_deref(), Some("os."));
        assert_eq!(result.line_number, Some(3));
    }

    #[test]
    fn restricted_scan_is_case_insensitive() {
        let result = validate("IO.write('x')");
        assert_eq!(result.offending.as_deref(), Some("io."));
    }

    #[test]
    fn first_token_on_line_wins() {
        let result = validate("local f = dofile(os.getenv('X'))");
        assert_eq!(result.offending.as_deref(), Some("dofile"));
    }

    #[test]
    fn tokens_only_in_comments_pass() {
        let code = "-- os.remove is not allowed\n--[[ io.open('x')\nlfs.writedir() ]]\nlocal x = 1 -- debug.traceback()";
        let result = validate(code);
        assert!(result.is_valid, "{result:?}");
    }

    #[test]
    fn identifier_suffix_is_not_a_library() {
        let result = validate("local pos = unit:getPoint()\nlocal x = pos.x\nlocal y = self.io.y");
        assert!(result.is_valid, "{result:?}");
    }

    #[test]
    fn loader_name_inside_identifier_passes() {
        assert!(validate("local mydofile_count = 1").is_valid);
    }

    #[test]
    fn require_is_restricted_as_a_whole_word() {
        let result = validate("local json = 1\nlocal lib = require('socket')");
        assert!(!result.is_valid);
        assert_eq!(result.offending.as_deref(), Some("require"));
        assert_eq!(result.line_number, Some(2));

        assert!(validate("local requirements = {}\nlocal x = unit.require_escort").is_valid);
    }

    #[test]
    fn unmatched_open_paren_fails() {
        let result = validate(r#"trigger.action.outText(("unbalanced", 10)"#);
        assert!(!result.is_valid);
        assert_eq!(result.offending.as_deref(), Some("("));
        assert_eq!(result.line_number, Some(1));
    }

    #[test]
    fn unexpected_closer_fails() {
        let result = validate("local t = {}\nlocal x = t[1]]");
        assert!(!result.is_valid);
        assert_eq!(result.offending.as_deref(), Some("]"));
        assert_eq!(result.line_number, Some(2));
    }

    #[test]
    fn mismatched_pair_fails() {
        let result = validate("local t = { 1, 2 )");
        assert!(!result.is_valid);
        assert_eq!(result.offending.as_deref(), Some(")"));
        assert!(result.error_message.unwrap().contains("expects '}'"));
    }

    #[test]
    fn innermost_unclosed_is_reported() {
        let result = validate("f(\n  { a = g(1)\n");
        assert_eq!(result.offending.as_deref(), Some("{"));
        assert_eq!(result.line_number, Some(2));
    }

    #[test]
    fn brackets_in_strings_are_ignored() {
        let code = "local msg = \"Status: (ok] {\"\nlocal raw = [[ ((( ]]\ntrigger.action.outText(msg, 10)";
        let result = validate(code);
        assert!(result.is_valid, "{result:?}");
    }

    #[test]
    fn block_imbalance_is_advisory_only() {
        let result = validate("function f()\n  if x then\n    return 1\nend");
        assert!(result.is_valid);
        assert!(result.advisory.unwrap().contains("2 openers, 1 closers"));
    }

    #[test]
    fn balanced_blocks_have_no_advisory() {
        let code = "for i = 1, 3 do\n  repeat x = x + 1 until x > 3\nend";
        let result = validate(code);
        assert!(result.is_valid);
        assert!(result.advisory.is_none());
    }

    #[test]
    fn result_serializes_without_empty_fields() {
        let json = serde_json::to_value(validate("local a = 1")).unwrap();
        assert_eq!(json, serde_json::json!({ "is_valid": true }));
    }
}
