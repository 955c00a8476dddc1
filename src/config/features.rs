//! Feature flags configuration

use serde::Deserialize;

/// Feature flags for optional behavior
#[derive(Debug, Clone, PartialEq)]
pub struct Features {
    /// Write controller events to a JSONL transcript
    pub transcript: bool,

    /// Load read-only history when resuming a session
    pub history: bool,

    /// Show "Tool added successfully..." before re-running a query (opt-in)
    pub tool_added_notice: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            transcript: true,
            history: true,
            tool_added_notice: false,
        }
    }
}

/// Feature flags as loaded from config file
#[derive(Debug, Deserialize, Default)]
pub struct FileFeatures {
    pub transcript: Option<bool>,
    pub history: Option<bool>,
    pub tool_added_notice: Option<bool>,
}

impl Features {
    /// Create from file config with defaults
    pub fn from_file(file: Option<FileFeatures>) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::default();

        Self {
            transcript: file.transcript.unwrap_or(defaults.transcript),
            history: file.history.unwrap_or(defaults.history),
            tool_added_notice: file.tool_added_notice.unwrap_or(defaults.tool_added_notice),
        }
    }
}
