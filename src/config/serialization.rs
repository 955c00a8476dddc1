//! Config serialization to TOML
//!
//! Single source of truth for the config file format: the generated
//! template, `config --show` and `config --update` all come from here.

use super::Config;

impl Config {
    /// Optional keys are written commented-out when unset
    fn optional_keys_to_toml(&self) -> String {
        let session = match &self.session_id {
            Some(id) => format!("session_id = \"{}\"\n", id),
            None => "# session_id = \"<id from `/sessions`>\"\n".to_string(),
        };
        let timeout = match self.request_timeout {
            Some(timeout) => format!("request_timeout_secs = {}\n", timeout.as_secs()),
            None => "# request_timeout_secs = 60   # unset or 0: wait indefinitely\n".to_string(),
        };
        format!("{}{}", session, timeout)
    }

    /// Serialize config to TOML format
    pub fn to_toml(&self) -> String {
        format!(
            r#"# ragchat configuration

# Chat backend base URL
backend_url = "{backend_url}"

# Directory for session transcripts (ragchat-<run>.jsonl)
log_dir = "{log_dir}"

# Session to resume on startup; per-request HTTP timeout
{optional}
# Feature flags
[features]
transcript = {transcript}
history = {history}
tool_added_notice = {notice}

# Logging configuration (RUST_LOG env var overrides)
[logging]
level = "{log_level}"
# JSON file logging (in addition to the in-memory /logs buffer)
file_enabled = {log_file_enabled}
file_dir = "{log_file_dir}"
file_rotation = "{log_file_rotation}"  # hourly, daily, never
file_prefix = "{log_file_prefix}"
"#,
            backend_url = self.backend_url,
            log_dir = self.log_dir.display(),
            optional = self.optional_keys_to_toml(),
            transcript = self.features.transcript,
            history = self.features.history,
            notice = self.features.tool_added_notice,
            log_level = self.logging.level,
            log_file_enabled = self.logging.file_enabled,
            log_file_dir = self.logging.file_dir.display(),
            log_file_rotation = self.logging.file_rotation.as_str(),
            log_file_prefix = self.logging.file_prefix,
        )
    }
}
