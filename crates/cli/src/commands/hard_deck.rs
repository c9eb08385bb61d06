//! `mizmaster hard-deck` — Verified scripting engine signatures.

use mizmaster_tools::hard_deck;

pub fn run(category: &str, list: bool) -> Result<(), Box<dyn std::error::Error>> {
    if list {
        for name in hard_deck::categories() {
            println!("{name}");
        }
        return Ok(());
    }

    let output = hard_deck::render(category);
    println!("{output}");
    if output.starts_with("ERROR:") {
        return Err(format!("unknown category '{category}'").into());
    }
    Ok(())
}
