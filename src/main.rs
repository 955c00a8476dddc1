// ragchat - terminal client for a retrieval-augmented chat backend
//
// Startup order:
// 1. Parse flags; config subcommands run and exit
// 2. Load config (env > file > defaults), apply flags
// 3. Tracing: in-memory buffer for /logs, optional JSON files
// 4. Transcript writer task (JSONL event log)
// 5. Controller, optional resume, then the REPL

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ragchat::backend::{HttpBackend, SessionId};
use ragchat::chat::{ChatController, ControllerSettings};
use ragchat::cli::{self, Cli};
use ragchat::config::Config;
use ragchat::logging::{LogBuffer, ReplLogLayer};
use ragchat::repl::Repl;
use ragchat::startup;
use ragchat::storage::{new_run_id, TranscriptWriter};

/// Capacity of the controller -> transcript channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();
    if let Some(command) = cli.command.take() {
        return cli::handle_command(command);
    }

    Config::ensure_config_exists();
    let mut config = Config::from_env();
    cli.apply(&mut config);

    let log_buffer = LogBuffer::new();

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.filter_directive()));

    // The guard flushes buffered file logs on drop; it must outlive the REPL
    let (file_layer, _file_guard) = if config.logging.file_enabled {
        std::fs::create_dir_all(&config.logging.file_dir)
            .context("Failed to create log file directory")?;
        let (non_blocking, guard) = tracing_appender::non_blocking(config.logging.file_appender());

        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_ansi(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(ReplLogLayer::new(log_buffer.clone()))
        .with(file_layer)
        .init();

    startup::print_startup(&config);
    startup::log_startup(&config);

    let backend = Arc::new(
        HttpBackend::new(&config.backend_url, config.request_timeout)
            .context("Failed to create backend client")?,
    );
    let settings = ControllerSettings {
        tool_added_notice: config.features.tool_added_notice,
    };
    let mut controller = ChatController::new(backend, settings);

    let writer_task = if config.features.transcript {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let writer = TranscriptWriter::new(config.log_dir.clone(), new_run_id(), rx)
            .context("Failed to initialize transcript")?;
        controller = controller.with_events(tx);
        Some(tokio::spawn(writer.run()))
    } else {
        None
    };

    let mut resumed = false;
    if let Some(id) = &config.session_id {
        match controller.resume(SessionId::new(id.clone())).await {
            Ok(()) => resumed = true,
            Err(e) => {
                tracing::error!("Failed to resume session {}: {}", id, e);
                println!("  Could not resume session {}: {}", id, e);
                println!("  A new session will be created on your first message.");
                println!();
            }
        }
    }
    if resumed && config.features.history {
        match controller.load_history().await {
            Ok(pairs) => tracing::info!("Loaded {} earlier exchanges", pairs),
            Err(e) => tracing::warn!("Failed to load history: {}", e),
        }
    }

    let repl = Repl::new(controller, log_buffer);
    if resumed {
        repl.show_transcript();
    }

    // dropping the controller (and its sender) inside run() ends the writer
    repl.run().await?;

    if let Some(task) = writer_task {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("Transcript writer failed: {:?}", e),
            Err(e) => tracing::error!("Transcript writer panicked: {:?}", e),
        }
    }

    Ok(())
}
