//! `mizmaster validate` — Check a Lua snippet before it goes into a mission.

use mizmaster_security::{ValidationResult, validate};
use std::path::PathBuf;

use super::read_input;

pub async fn run(file: Option<PathBuf>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let code = read_input(file.as_deref()).await?;
    let result = validate(&code);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", report(&result));
    }

    if result.is_valid {
        Ok(())
    } else {
        Err("validation failed".into())
    }
}

/// Human-readable rendering of a result.
pub fn report(result: &ValidationResult) -> String {
    let mut out = String::new();
    if result.is_valid {
        out.push_str("✅ Snippet passed validation\n");
    } else {
        let message = result.error_message.as_deref().unwrap_or("invalid snippet");
        match result.line_number {
            Some(line) => out.push_str(&format!("❌ Line {line}: {message}\n")),
            None => out.push_str(&format!("❌ {message}\n")),
        }
    }
    if let Some(advisory) = &result.advisory {
        out.push_str(&format!("⚠️  {advisory}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_names_line_of_failure() {
        let text = report(&validate("local x = 1\nos.remove('a')"));
        assert!(text.starts_with("❌ Line 2:"));
        assert!(text.contains("os."));
    }

    #[test]
    fn report_for_clean_snippet() {
        assert_eq!(
            report(&validate("trigger.action.outText('hi', 10)")),
            "✅ Snippet passed validation\n"
        );
    }
}
