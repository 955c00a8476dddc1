//! Configuration for the chat client
//!
//! Configuration is loaded in order of precedence:
//! 1. Environment variables (highest priority)
//! 2. Config file (~/.config/ragchat/config.toml)
//! 3. Built-in defaults (lowest priority)
//!
//! Command-line flags are applied on top by the binary.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ─────────────────────────────────────────────────────────────────────────────
// Submodules
// ─────────────────────────────────────────────────────────────────────────────

mod features;
mod logging;
mod serialization;


pub use features::{Features, FileFeatures};
pub use logging::{FileLogging, LogRotation, LoggingConfig};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
const DEFAULT_LOG_DIR: &str = "./logs";

// ─────────────────────────────────────────────────────────────────────────────
// Application Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the chat backend
    pub backend_url: String,

    /// Directory for transcript files
    pub log_dir: PathBuf,

    /// Session to resume on startup (a new one is created lazily otherwise)
    pub session_id: Option<String>,

    /// Per-request HTTP timeout; `None` waits indefinitely
    pub request_timeout: Option<Duration>,

    /// Feature flags for optional behavior
    pub features: Features,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            session_id: None,
            request_timeout: None,
            features: Features::default(),
            logging: LoggingConfig::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File Configuration (deserialization layer)
// ─────────────────────────────────────────────────────────────────────────────

/// `config.toml` as written; every key optional
#[derive(Debug, Deserialize, Default)]
pub(crate) struct FileConfig {
    pub backend_url: Option<String>,
    pub log_dir: Option<String>,
    pub session_id: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub features: Option<FileFeatures>,
    pub logging: Option<FileLogging>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration Loading
// ─────────────────────────────────────────────────────────────────────────────

const ENV_BACKEND_URL: &str = "RAGCHAT_BACKEND_URL";
const ENV_LOG_DIR: &str = "RAGCHAT_LOG_DIR";
const ENV_SESSION: &str = "RAGCHAT_SESSION";
const ENV_TIMEOUT_SECS: &str = "RAGCHAT_TIMEOUT_SECS";

/// Report an unusable config file and exit; running on silently guessed
/// values would hide the mistake.
fn config_fatal(path: &Path, headline: &str, error: &dyn std::fmt::Display, tips: &[&str]) -> ! {
    eprintln!();
    eprintln!("  ┌─ CONFIG ERROR ───────────────────────────────────────────────");
    eprintln!("  │ {}", headline);
    eprintln!("  │ File:  {}", path.display());
    eprintln!("  │ Error: {}", error);
    for tip in tips {
        eprintln!("  │   - {}", tip);
    }
    eprintln!("  └─ Run `ragchat config --reset` to start from defaults.");
    eprintln!();
    std::process::exit(1);
}

impl Config {
    /// `~/.config/ragchat/config.toml` on every platform
    pub fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config").join("ragchat").join("config.toml"))
    }

    /// Write the default file on first run. Returns whether a file was created.
    ///
    /// The file is a convenience; failures to create it are ignored.
    pub fn ensure_config_exists() -> bool {
        let Some(path) = Self::config_path() else {
            return false;
        };
        if path.exists() {
            return false;
        }

        let created = path
            .parent()
            .map_or(Ok(()), std::fs::create_dir_all)
            .and_then(|()| std::fs::write(&path, Self::default().to_toml()));
        created.is_ok()
    }

    fn load_file_config() -> FileConfig {
        let Some(path) = Self::config_path() else {
            return FileConfig::default();
        };

        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return FileConfig::default(),
            Err(e) => config_fatal(&path, "Cannot read the configuration file", &e, &[]),
        };

        toml::from_str(&contents).unwrap_or_else(|e| {
            config_fatal(
                &path,
                "Cannot parse the configuration file",
                &e,
                &[
                    "string values need quotes (backend_url = \"http://...\")",
                    "booleans are true/false",
                    "request_timeout_secs is a bare number",
                ],
            )
        })
    }

    /// Environment over file over defaults
    pub fn from_env() -> Self {
        Self::merge(Self::load_file_config(), |key| std::env::var(key).ok())
    }

    /// Combine a parsed file with an environment lookup
    pub(crate) fn merge(file: FileConfig, env: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let session_id = env(ENV_SESSION)
            .or(file.session_id)
            .filter(|id| !id.trim().is_empty());

        // a malformed env value falls through to the file; 0 disables
        let request_timeout = env(ENV_TIMEOUT_SECS)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .or(file.request_timeout_secs)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Self {
            backend_url: env(ENV_BACKEND_URL)
                .or(file.backend_url)
                .unwrap_or(defaults.backend_url),
            log_dir: env(ENV_LOG_DIR)
                .or(file.log_dir)
                .map(PathBuf::from)
                .unwrap_or(defaults.log_dir),
            session_id,
            request_timeout,
            features: Features::from_file(file.features),
            logging: LoggingConfig::from_file(file.logging),
        }
    }
}
