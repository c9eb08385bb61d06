//! Lua lexical masking.
//!
//! Both masks replace the hidden characters with spaces and keep newlines,
//! so line numbers and columns of the masked text line up with the input.

/// Blank out line comments (`-- ...`) and block comments (`--[[ ... ]]`,
/// `--[==[ ... ]==]`). String literals are kept, but they are still lexed so
/// a `--` inside a string is not mistaken for a comment.
pub fn mask_comments(code: &str) -> String {
    mask(code, false)
}

/// Blank out comments plus quoted strings and long strings (`[[ ... ]]`).
pub fn mask_literals(code: &str) -> String {
    mask(code, true)
}

fn mask(code: &str, hide_strings: bool) -> String {
    let chars: Vec<char> = code.chars().collect();
    let mut out = String::with_capacity(code.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '-' && chars.get(i + 1) == Some(&'-') {
            let end = match long_bracket_level(&chars, i + 2) {
                Some(level) => long_bracket_end(&chars, i + 2 + level + 2, level),
                None => line_end(&chars, i),
            };
            emit(&mut out, &chars[i..end], true);
            i = end;
        } else if c == '"' || c == '\'' {
            let end = quoted_end(&chars, i);
            emit(&mut out, &chars[i..end], hide_strings);
            i = end;
        } else if let Some(level) = long_bracket_level(&chars, i) {
            let end = long_bracket_end(&chars, i + level + 2, level);
            emit(&mut out, &chars[i..end], hide_strings);
            i = end;
        } else {
            out.push(c);
            i += 1;
        }
    }

    out
}

fn emit(out: &mut String, span: &[char], hidden: bool) {
    if hidden {
        out.extend(span.iter().map(|&ch| if ch == '\n' { '\n' } else { ' ' }));
    } else {
        out.extend(span.iter());
    }
}

/// `[` followed by `n` equals signs and another `[` opens a level-`n` long
/// bracket.
fn long_bracket_level(chars: &[char], at: usize) -> Option<usize> {
    if chars.get(at) != Some(&'[') {
        return None;
    }
    let mut level = 0;
    while chars.get(at + 1 + level) == Some(&'=') {
        level += 1;
    }
    (chars.get(at + 1 + level) == Some(&'[')).then_some(level)
}

/// Index just past the matching `]=*]`, or the end of input when unclosed.
fn long_bracket_end(chars: &[char], from: usize, level: usize) -> usize {
    let mut j = from;
    while j < chars.len() {
        if chars[j] == ']'
            && (1..=level).all(|k| chars.get(j + k) == Some(&'='))
            && chars.get(j + level + 1) == Some(&']')
        {
            return j + level + 2;
        }
        j += 1;
    }
    chars.len()
}

/// Index of the next newline (not consumed), or the end of input.
fn line_end(chars: &[char], from: usize) -> usize {
    chars[from..]
        .iter()
        .position(|&c| c == '\n')
        .map_or(chars.len(), |p| from + p)
}

/// Quoted strings end at the matching quote; an unterminated one ends at the
/// newline.
fn quoted_end(chars: &[char], start: usize) -> usize {
    let quote = chars[start];
    let mut j = start + 1;
    while j < chars.len() {
        match chars[j] {
            '\\' => j += 2,
            '\n' => return j,
            c if c == quote => return j + 1,
            _ => j += 1,
        }
    }
    j.min(chars.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_comment_is_blanked() {
        let code = "local a = 1 -- os.exit()\nlocal b = 2";
        let masked = mask_comments(code);
        assert_eq!(masked.len(), code.len());
        let lines: Vec<&str> = masked.lines().collect();
        assert_eq!(lines[0].trim_end(), "local a = 1");
        assert_eq!(lines[1], "local b = 2");
    }

    #[test]
    fn block_comment_keeps_line_structure() {
        let code = "x = 1\n--[[ io.open\nlfs.dir ]]\ny = 2";
        let masked = mask_comments(code);
        assert_eq!(masked.lines().count(), 4);
        assert!(!masked.contains("io.open"));
        assert!(!masked.contains("lfs.dir"));
        assert!(masked.ends_with("y = 2"));
    }

    #[test]
    fn leveled_block_comment_ignores_inner_close() {
        let masked = mask_comments("--[==[ a ]] b ]==]z");
        assert_eq!(masked.trim(), "z");
    }

    #[test]
    fn dashes_inside_string_are_not_a_comment() {
        let code = r#"trigger.action.outText("--- BRIEFING ---", 10)"#;
        assert_eq!(mask_comments(code), code);
    }

    #[test]
    fn literals_are_blanked_for_structure() {
        let masked = mask_literals(r#"f("(", '[', [[ { ]])"#);
        assert!(!masked.contains('['));
        assert!(!masked.contains('{'));
        assert_eq!(masked.matches('(').count(), 1);
        assert_eq!(masked.matches(')').count(), 1);
    }

    #[test]
    fn escaped_quote_stays_inside_string() {
        let masked = mask_literals(r#"s = "say \"(\"" x"#);
        assert!(!masked.contains('('));
        assert!(masked.ends_with(" x"));
    }

    #[test]
    fn unterminated_string_stops_at_newline() {
        let masked = mask_literals("a = \"open\nb = (1)");
        assert!(masked.ends_with("b = (1)"));
    }

    #[test]
    fn table_index_is_not_a_long_string() {
        let code = "t[1] = u[k]";
        assert_eq!(mask_literals(code), code);
    }
}
