// Luma Chat - AI chat over a client's insurance policies
//
// Startup wires the pieces together:
// - Config (env > file > defaults) and logging
// - SQLite backend (file, or in-memory demo data) with the configured assistant
// - Chat service task owning the chat state
// - TUI, or a headless subcommand

mod assistant;
mod backend;
mod chat;
mod cli;
mod config;
mod logging;
mod model;
mod tui;

use anyhow::{Context, Result};
use backend::SqliteBackend;
use chat::ChatService;
use clap::Parser;
use cli::{Cli, Commands};
use config::{Config, LogRotation};
use logging::{LogBuffer, TuiLogLayer};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Config commands run before anything else is set up
    let command = match cli.command {
        Some(Commands::Config { show, reset, path }) => {
            cli::handle_config(show, reset, path);
            return Ok(());
        }
        other => other,
    };

    // Ensure config template exists (helps users discover options)
    Config::ensure_config_exists();

    let mut config = Config::from_env();
    if cli.demo {
        config.demo_mode = true;
    }

    // In TUI mode logs go to the in-memory buffer (stderr would garble the
    // alternate screen); headless commands log to stderr
    let tui_mode = command.is_none();
    let log_buffer = LogBuffer::new();
    let _file_guard = init_logging(&config, tui_mode, &log_buffer);

    let backend = open_backend(&config).await?;
    tracing::info!(
        operator = %config.operator.id,
        role = %config.operator.role,
        assistant = backend.assistant_name(),
        demo = config.demo_mode,
        "Luma Chat starting"
    );

    match command {
        Some(Commands::Seed) => {
            match backend.seed_demo().await? {
                Some(summary) => println!(
                    "Seeded {} clients, {} policies, {} conversations into {}",
                    summary.clients,
                    summary.policies,
                    summary.conversations,
                    config.db_path.display()
                ),
                None => println!(
                    "{} already has users; nothing seeded",
                    config.db_path.display()
                ),
            }
        }
        Some(Commands::Ask { client, question }) => {
            let handle = ChatService::spawn(Arc::new(backend), config.operator.to_operator());
            cli::ask(&handle, &client, &question).await?;
        }
        Some(Commands::Config { .. }) | None => {
            let handle = ChatService::spawn(Arc::new(backend), config.operator.to_operator());
            tui::run_tui(handle, log_buffer, config).await?;
        }
    }

    Ok(())
}

/// Open the configured database, or a seeded in-memory one in demo mode
async fn open_backend(config: &Config) -> Result<SqliteBackend> {
    let assistant = assistant::create_assistant(&config.assistant);
    let max_history = config.assistant.max_history;

    if config.demo_mode {
        let backend = SqliteBackend::in_memory(assistant, max_history)?;
        backend
            .seed_demo()
            .await
            .context("Failed to seed demo data")?;
        return Ok(backend);
    }

    let backend = SqliteBackend::open(&config.db_path, assistant, max_history)
        .with_context(|| format!("Failed to open database {}", config.db_path.display()))?;
    Ok(backend)
}

/// Initialize tracing
///
/// Precedence: RUST_LOG env var > config file > default "info". The returned
/// guard flushes the log file and must live until exit.
fn init_logging(config: &Config, tui_mode: bool, log_buffer: &LogBuffer) -> Option<WorkerGuard> {
    let default_filter = format!("luma_chat={}", config.logging.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    let tui_layer = tui_mode.then(|| TuiLogLayer::new(log_buffer.clone()));
    let stderr_layer =
        (!tui_mode).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    let (file_layer, guard) = if config.logging.file_enabled {
        match std::fs::create_dir_all(&config.logging.file_dir) {
            Ok(()) => {
                let dir = &config.logging.file_dir;
                let prefix = &config.logging.file_prefix;
                let file_appender = match config.logging.file_rotation {
                    LogRotation::Hourly => tracing_appender::rolling::hourly(dir, prefix),
                    LogRotation::Daily => tracing_appender::rolling::daily(dir, prefix),
                    LogRotation::Never => tracing_appender::rolling::never(dir, prefix),
                };

                // Wrap in non-blocking writer (writes happen in background thread)
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
                let layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(non_blocking)
                    .with_ansi(false);
                (Some(layer), Some(guard))
            }
            Err(e) => {
                eprintln!(
                    "Warning: Could not create log directory {:?}: {}",
                    config.logging.file_dir, e
                );
                (None, None)
            }
        }
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tui_layer)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}
