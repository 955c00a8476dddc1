// Storage module - writes controller events to disk as JSON Lines
//
// One file per run: ragchat-YYYYMMDD-HHMMSS-XXXX.jsonl in the log directory.
// Example: jq 'select(.type == "query_resolved") | .outcome.kind' logs/ragchat-*.jsonl

use crate::events::ChatEvent;
use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Identifier for this process's transcript file
/// Format: YYYYMMDD-HHMMSS-XXXX (timestamp + 4 random hex chars)
pub fn new_run_id() -> String {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let timestamp = chrono::Utc::now().format("%Y%m%d-%H%M%S");
    let random = RandomState::new().build_hasher().finish();
    format!("{}-{:04x}", timestamp, random & 0xFFFF)
}

/// Appends every received event to the run's transcript file
pub struct TranscriptWriter {
    log_dir: PathBuf,
    run_id: String,
    event_rx: mpsc::Receiver<ChatEvent>,
}

impl TranscriptWriter {
    pub fn new(
        log_dir: PathBuf,
        run_id: String,
        event_rx: mpsc::Receiver<ChatEvent>,
    ) -> Result<Self> {
        fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

        Ok(Self {
            log_dir,
            run_id,
            event_rx,
        })
    }

    /// Path of this run's transcript
    pub fn file_path(&self) -> PathBuf {
        self.log_dir.join(format!("ragchat-{}.jsonl", self.run_id))
    }

    /// Write events until the channel closes
    pub async fn run(mut self) -> Result<()> {
        tracing::info!("Transcript: {:?}", self.file_path());

        while let Some(event) = self.event_rx.recv().await {
            if let Err(e) = self.write_event(&event) {
                // keep going; one bad write should not end the transcript
                tracing::error!("Failed to write event: {:?}", e);
            }
        }

        tracing::debug!("Transcript writer shutting down");
        Ok(())
    }

    fn write_event(&self, event: &ChatEvent) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.file_path())
            .context("Failed to open transcript file")?;

        let json = serde_json::to_string(event).context("Failed to serialize event")?;
        writeln!(file, "{}", json).context("Failed to write transcript")?;

        // visible even if the process dies mid-session
        file.flush().context("Failed to flush transcript")?;
        Ok(())
    }
}
