//! `mizmaster prompt` — The system instruction a model session receives.

use mizmaster_agent::effective_instruction;
use mizmaster_config::AppConfig;

pub async fn run(model: Option<String>, desanitized: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let model = model.unwrap_or(config.model);
    println!("{}", effective_instruction(&model, desanitized || config.desanitized));
    Ok(())
}
