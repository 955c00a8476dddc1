// CLI module - flags for the chat session and the `config` subcommand
//
//   ragchat [--backend URL] [--session ID]      start chatting
//   ragchat config --show|--path|--reset|--edit|--update

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;

use crate::config::{Config, VERSION};

/// Terminal client for a retrieval-augmented chat backend
#[derive(Parser)]
#[command(name = "ragchat")]
#[command(version = VERSION)]
#[command(about = "Chat with a RAG backend: ask, add tools, upload files, correct answers", long_about = None)]
pub struct Cli {
    /// Backend base URL (overrides RAGCHAT_BACKEND_URL and the config file)
    #[arg(long, value_name = "URL")]
    pub backend: Option<String>,

    /// Resume an existing session instead of starting a new one
    #[arg(long, value_name = "ID")]
    pub session: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect or rewrite the config file
    Config(ConfigArgs),
}

#[derive(Args)]
#[group(multiple = false)]
pub struct ConfigArgs {
    /// Print the effective configuration (env > file > defaults)
    #[arg(long)]
    show: bool,

    /// Print the config file location
    #[arg(long)]
    path: bool,

    /// Overwrite the config file with defaults
    #[arg(long)]
    reset: bool,

    /// Open the config file in $EDITOR
    #[arg(long)]
    edit: bool,

    /// Rewrite the config file in the current layout, keeping values
    #[arg(long)]
    update: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigAction {
    Show,
    Path,
    Reset,
    Edit,
    Update,
}

impl ConfigArgs {
    fn action(&self) -> Option<ConfigAction> {
        [
            (self.show, ConfigAction::Show),
            (self.path, ConfigAction::Path),
            (self.reset, ConfigAction::Reset),
            (self.edit, ConfigAction::Edit),
            (self.update, ConfigAction::Update),
        ]
        .into_iter()
        .find_map(|(set, action)| set.then_some(action))
    }
}

impl Cli {
    /// Flags take precedence over env and file values
    pub fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.backend {
            config.backend_url = url.clone();
        }
        if let Some(id) = &self.session {
            config.session_id = Some(id.clone());
        }
    }
}

/// Run a subcommand to completion
pub fn handle_command(command: Commands) -> Result<()> {
    let Commands::Config(args) = command;
    match args.action() {
        Some(ConfigAction::Show) => show_config(),
        Some(ConfigAction::Path) => println!("{}", config_path()?.display()),
        Some(ConfigAction::Reset) => reset_config()?,
        Some(ConfigAction::Edit) => edit_config()?,
        Some(ConfigAction::Update) => update_config()?,
        None => println!("Usage: ragchat config [--show|--path|--reset|--edit|--update]"),
    }
    Ok(())
}

fn config_path() -> Result<PathBuf> {
    Config::config_path().context("Could not determine config path (no home directory)")
}

fn show_config() {
    let source = match Config::config_path() {
        Some(path) if path.exists() => path.display().to_string(),
        _ => "defaults (no config file)".to_string(),
    };

    println!("# Effective configuration, loaded from {}", source);
    println!("# Environment variables (RAGCHAT_*) already applied");
    println!();
    print!("{}", Config::from_env().to_toml());
}

fn confirm(question: &str) -> Result<bool> {
    eprint!("{} [y/N] ", question);
    std::io::stderr().flush()?;

    let mut answer = String::new();
    std::io::stdin()
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

fn reset_config() -> Result<()> {
    let path = config_path()?;

    if path.exists() && !confirm(&format!("Overwrite {}?", path.display()))? {
        println!("Aborted.");
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }
    std::fs::write(&path, Config::default().to_toml()).context("Failed to write config")?;
    println!("Wrote defaults to {}", path.display());
    Ok(())
}

fn edit_config() -> Result<()> {
    let path = config_path()?;
    if Config::ensure_config_exists() {
        println!("Created {}", path.display());
    }

    let editor = ["EDITOR", "VISUAL"]
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| if cfg!(windows) { "notepad" } else { "nano" }.to_string());

    let status = Command::new(&editor)
        .arg(&path)
        .status()
        .with_context(|| format!("Failed to launch '{}' (set $EDITOR)", editor))?;
    if !status.success() {
        bail!("{} exited with {}", editor, status);
    }
    Ok(())
}

fn update_config() -> Result<()> {
    let path = config_path()?;
    if Config::ensure_config_exists() {
        println!("Created {}", path.display());
        return Ok(());
    }

    // render before touching the file so a parse failure leaves it intact
    let rendered = Config::from_env().to_toml();

    let backup = path.with_extension("toml.bak");
    std::fs::copy(&path, &backup)
        .with_context(|| format!("Failed to back up config to {}", backup.display()))?;
    std::fs::write(&path, rendered).context("Failed to write config")?;

    println!("Rewrote {} (previous version at {})", path.display(), backup.display());
    Ok(())
}
