// Startup module - banner and feature status before the prompt appears

use crate::config::{Config, Features, VERSION};

/// ANSI color codes for terminal output
pub(crate) mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const MAGENTA: &str = "\x1b[35m";
    pub const RED: &str = "\x1b[31m";
}

/// Feature row for display
pub struct FeatureStatus {
    pub name: &'static str,
    pub enabled: bool,
    pub description: &'static str,
}

/// Print the banner, config source and feature switches
pub fn print_startup(config: &Config) {
    use colors::*;

    println!();
    println!("  {BOLD}{CYAN}ragchat{RESET} {DIM}v{VERSION}{RESET}");
    println!("  {DIM}Terminal client for a retrieval-augmented chat backend{RESET}");
    println!();

    if let Some(path) = Config::config_path() {
        if path.exists() {
            println!("  {DIM}Config:{RESET} {GREEN}✓{RESET} {}", path.display());
        } else {
            println!("  {DIM}Config:{RESET} {DIM}(using defaults){RESET}");
        }
    }
    println!();

    for feature in &feature_status(config) {
        print_feature_status(feature);
    }
    println!();

    println!(
        "  {MAGENTA}▸{RESET} Backend {BOLD}{}{RESET}",
        config.backend_url
    );
    match &config.session_id {
        Some(id) => println!("  {MAGENTA}▸{RESET} Resuming session {BOLD}{}{RESET}", id),
        None => println!("  {MAGENTA}▸{RESET} New session {DIM}(created on first message){RESET}"),
    }
    if config.request_timeout.is_none() {
        println!("  {YELLOW}▸{RESET} {DIM}No request timeout configured{RESET}");
    }
    println!("  {DIM}Type /help for commands.{RESET}");
    println!();
}

fn feature_status(config: &Config) -> Vec<FeatureStatus> {
    let Features {
        transcript,
        history,
        tool_added_notice,
    } = &config.features;

    vec![
        FeatureStatus {
            name: "transcript",
            enabled: *transcript,
            description: "JSONL event log",
        },
        FeatureStatus {
            name: "history",
            enabled: *history,
            description: "Earlier exchanges on resume",
        },
        FeatureStatus {
            name: "tool-notice",
            enabled: *tool_added_notice,
            description: "Notice before tool re-run",
        },
        FeatureStatus {
            name: "file-log",
            enabled: config.logging.file_enabled,
            description: "JSON trace files",
        },
    ]
}

fn print_feature_status(feature: &FeatureStatus) {
    use colors::*;

    let (icon, style) = if feature.enabled {
        (format!("{GREEN}✓{RESET}"), "")
    } else {
        (format!("{DIM}○{RESET}"), DIM)
    };

    println!(
        "    {icon} {style}{:<12}{RESET} {DIM}{}{RESET}",
        feature.name, feature.description
    );
}

/// Record the startup configuration in the log buffer
pub fn log_startup(config: &Config) {
    tracing::info!("ragchat v{} starting", VERSION);
    for feature in &feature_status(config) {
        let icon = if feature.enabled { "✓" } else { "○" };
        tracing::info!("  {} {} - {}", icon, feature.name, feature.description);
    }
    tracing::info!("Backend: {}", config.backend_url);
}
