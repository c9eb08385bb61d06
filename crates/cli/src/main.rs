//! MizMaster CLI — offline access to the scripting assistant's tooling.
//!
//! Commands:
//! - `validate`    — Check a Lua snippet against the mission sandbox rules
//! - `compress`    — Signature-only rendering of a Lua source file
//! - `docs`        — Fetch a MOOSE or DML module through the librarian
//! - `hard-deck`   — Print verified scripting engine signatures
//! - `prompt`      — Print the system instruction a session would receive
//! - `config`      — Show, locate, initialize or validate configuration
//! - `completions` — Generate shell completions

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "mizmaster",
    about = "MizMaster — DCS mission scripting assistant",
    version,
    author
)]
pub(crate) struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a Lua snippet (file path, or stdin when omitted)
    Validate {
        file: Option<PathBuf>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compress a Lua source file to its signatures
    Compress {
        file: Option<PathBuf>,

        /// Print only the size statistics
        #[arg(long)]
        stats: bool,
    },

    /// Fetch framework documentation (raw Lua source)
    Docs {
        /// MOOSE or DML
        framework: String,

        /// Module or class name, e.g. Airboss or cloneZones
        module: String,

        /// STABLE or DEVELOP (MOOSE only)
        #[arg(short, long)]
        branch: Option<String>,

        /// Keep the tree cache in memory instead of on disk
        #[arg(long)]
        no_cache: bool,
    },

    /// Print hard deck definitions
    HardDeck {
        /// Category name, or All
        #[arg(default_value = "All")]
        category: String,

        /// List category names only
        #[arg(short, long)]
        list: bool,
    },

    /// Print the effective system instruction
    Prompt {
        /// Model id (defaults to the configured model)
        #[arg(short, long)]
        model: Option<String>,

        /// Show the desanitized variant
        #[arg(long)]
        desanitized: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for (bash, zsh, fish, powershell, elvish)
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Validate the config file
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Validate { file, json } => commands::validate::run(file, json).await?,
        Commands::Compress { file, stats } => commands::compress::run(file, stats).await?,
        Commands::Docs {
            framework,
            module,
            branch,
            no_cache,
        } => commands::docs::run(&framework, &module, branch.as_deref(), no_cache).await?,
        Commands::HardDeck { category, list } => commands::hard_deck::run(&category, list)?,
        Commands::Prompt { model, desanitized } => {
            commands::prompt::run(model, desanitized).await?
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Init { force } => commands::config_cmd::init(force).await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
        },
        Commands::Completions { shell } => commands::completions::run(shell),
    }

    Ok(())
}
