//! `[logging]` section: filter level and the optional JSON trace files

use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing_appender::rolling::{self, RollingFileAppender};

/// How often the JSON trace file is rolled over
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogRotation {
    Hourly,
    #[default]
    Daily,
    /// Single file, appended forever
    Never,
}

impl LogRotation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Never => "never",
        }
    }
}

impl fmt::Display for LogRotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogRotation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hourly" => Ok(Self::Hourly),
            "daily" => Ok(Self::Daily),
            "never" => Ok(Self::Never),
            other => Err(format!(
                "unknown file_rotation '{}' (expected hourly, daily or never)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Bare level ("debug") or a full filter directive ("ragchat=debug,reqwest=warn")
    pub level: String,
    pub file_enabled: bool,
    pub file_dir: PathBuf,
    pub file_rotation: LogRotation,
    /// File name stem; the appender adds the date suffix
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_enabled: false,
            file_dir: PathBuf::from("./logs/trace"),
            file_rotation: LogRotation::default(),
            file_prefix: "ragchat".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileLogging {
    pub level: Option<String>,
    pub file_enabled: Option<bool>,
    pub file_dir: Option<String>,
    pub file_rotation: Option<String>,
    pub file_prefix: Option<String>,
}

impl LoggingConfig {
    pub fn from_file(file: Option<FileLogging>) -> Self {
        let Some(file) = file else {
            return Self::default();
        };
        let defaults = Self::default();

        // tracing is not up yet; a bad value falls back with a note on stderr
        let file_rotation = match file.file_rotation.as_deref().map(str::parse) {
            None => defaults.file_rotation,
            Some(Ok(rotation)) => rotation,
            Some(Err(e)) => {
                eprintln!("Warning: {}; using {}", e, defaults.file_rotation);
                defaults.file_rotation
            }
        };

        Self {
            level: file
                .level
                .filter(|l| !l.trim().is_empty())
                .unwrap_or(defaults.level),
            file_enabled: file.file_enabled.unwrap_or(defaults.file_enabled),
            file_dir: file.file_dir.map(PathBuf::from).unwrap_or(defaults.file_dir),
            file_rotation,
            file_prefix: file.file_prefix.unwrap_or(defaults.file_prefix),
        }
    }

    /// Directive for `EnvFilter` when `RUST_LOG` is unset.
    ///
    /// A bare level applies to this crate only, keeping dependency noise out.
    pub fn filter_directive(&self) -> String {
        let level = self.level.trim();
        if level.contains('=') || level.contains(',') {
            level.to_string()
        } else {
            format!("ragchat={}", level)
        }
    }

    /// Appender for the JSON trace files
    pub fn file_appender(&self) -> RollingFileAppender {
        match self.file_rotation {
            LogRotation::Hourly => rolling::hourly(&self.file_dir, &self.file_prefix),
            LogRotation::Daily => rolling::daily(&self.file_dir, &self.file_prefix),
            LogRotation::Never => {
                rolling::never(&self.file_dir, format!("{}.log", self.file_prefix))
            }
        }
    }
}
