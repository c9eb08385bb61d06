//! `mizmaster docs` — Fetch a framework module the way the model does.

use mizmaster_config::AppConfig;
use mizmaster_core::{Framework, FrameworkDocsArgs, ToolDispatcher, ToolRequest};
use mizmaster_tools::Librarian;
use tracing::info;

pub async fn run(
    framework: &str,
    module: &str,
    branch: Option<&str>,
    no_cache: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let framework: Framework = framework.parse()?;

    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if no_cache {
        config.librarian.cache_dir = None;
    } else if config.librarian.cache_dir.is_none() {
        config.librarian.cache_dir = Some(AppConfig::default_cache_dir());
    }

    info!(%framework, module, branch, "Fetching documentation");
    let librarian = Librarian::from_config(&config)?;
    let request = ToolRequest::FrameworkDocs(FrameworkDocsArgs {
        framework,
        module_name: module.to_string(),
        branch: branch.map(str::to_string),
    });

    let output = librarian.dispatch(&request).await;
    println!("{output}");

    if output.starts_with("ERROR:") {
        return Err("documentation lookup failed".into());
    }
    Ok(())
}
