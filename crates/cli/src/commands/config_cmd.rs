//! `mizmaster config` — Configuration management commands.

use mizmaster_config::AppConfig;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();
            if config.github_token.is_none() {
                warnings.push(
                    "No GitHub token set (60 tree requests/hour; set MIZMASTER_GITHUB_TOKEN)",
                );
            }
            if config.desanitized {
                warnings.push("Desanitized mode is on: os/io/lfs advice will be allowed");
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Model:         {}", config.model);
            println!("   Max turns:     {}", config.engine.max_turns);
            println!("   Context:       {} tokens / {} messages", config.context.max_tokens, config.context.max_messages);
            println!("   Tree TTL:      {} h", config.librarian.tree_cache_ttl_hours);
            println!("   Repositories:  {}", config.repositories.len());
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if config.github_token.is_some() {
        config.github_token = Some("[REDACTED]".into());
    }
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", config_path().display());
    Ok(())
}

pub async fn init(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path();
    if path.exists() && !force {
        return Err(format!("{} already exists (use --force to overwrite)", path.display()).into());
    }
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    tokio::fs::write(&path, AppConfig::default_toml()).await?;
    println!("✅ Wrote {}", path.display());
    Ok(())
}

fn config_path() -> std::path::PathBuf {
    AppConfig::config_dir().join("config.toml")
}
