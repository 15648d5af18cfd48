// CLI module - command-line argument parsing and handlers
//
// Without a subcommand the chat screen starts. Subcommands:
// - config --show/--path/--reset: inspect or regenerate the config file
// - seed: load the demo clients into the configured database
// - ask: one question for one client, reply streamed to stdout

use crate::chat::{ChatCommand, ChatHandle, ChatSnapshot};
use crate::config::{Config, VERSION};
use crate::model::MessageKind;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use tokio::sync::watch;

/// Luma Chat - ask about a client's insurance policies
#[derive(Parser)]
#[command(name = "luma-chat")]
#[command(version = VERSION)]
#[command(about = "AI chat over a client's insurance policies", long_about = None)]
pub struct Cli {
    /// Use an in-memory database with demo clients
    #[arg(long, global = true)]
    pub demo: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Reset config file to defaults
        #[arg(long)]
        reset: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Insert demo clients, policies and conversations into the database
    Seed,

    /// Ask one question about a client and print the reply
    Ask {
        /// Client id
        #[arg(long)]
        client: String,

        /// The question
        question: String,
    },
}

pub fn handle_config(show: bool, reset: bool, path: bool) {
    if path {
        handle_config_path();
    } else if show {
        handle_config_show();
    } else if reset {
        handle_config_reset();
    } else {
        // No flag provided, show help
        println!("Usage: luma-chat config [--show|--reset|--path]");
        println!();
        println!("Options:");
        println!("  --show    Display effective configuration");
        println!("  --reset   Reset config file to defaults");
        println!("  --path    Show config file path");
    }
}

fn handle_config_path() {
    match Config::config_path() {
        Some(path) => println!("{}", path.display()),
        None => {
            eprintln!("Error: Could not determine config path");
            std::process::exit(1);
        }
    }
}

fn handle_config_show() {
    let config = Config::from_env();

    println!("# Effective configuration (env > file > defaults)");
    println!();
    println!("db_path = {:?}", config.db_path.display().to_string());
    println!("theme = {:?}", config.theme);
    println!("demo_mode = {}", config.demo_mode);
    println!();
    println!("[operator]");
    println!("id = {:?}", config.operator.id);
    println!("role = {:?}", config.operator.role.as_str());
    if let Some(office) = &config.operator.office_id {
        println!("office_id = {:?}", office);
    }
    println!();
    println!("[assistant]");
    println!("provider = {:?}", config.assistant.provider.as_str());
    println!("api_base = {:?}", config.assistant.api_base);
    println!("model = {:?}", config.assistant.model);
    println!(
        "api_key = {}",
        if config.assistant.api_key.is_some() {
            "\"(set)\""
        } else {
            "\"(unset)\""
        }
    );
    println!("timeout_secs = {}", config.assistant.timeout_secs);
    println!("max_history = {}", config.assistant.max_history);
    println!();
    println!("[ui]");
    println!("composer_min_lines = {}", config.ui.composer_min_lines);
    println!("composer_max_lines = {}", config.ui.composer_max_lines);
    println!("toast_secs = {}", config.ui.toast_secs);
    println!("tick_ms = {}", config.ui.tick_ms);
    println!();
    println!("[logging]");
    println!("level = {:?}", config.logging.level);
    println!("file_enabled = {}", config.logging.file_enabled);
    println!(
        "file_dir = {:?}",
        config.logging.file_dir.display().to_string()
    );
    println!("file_rotation = {:?}", config.logging.file_rotation.as_str());
    println!("file_prefix = {:?}", config.logging.file_prefix);

    // Show source info
    println!();
    if let Some(path) = Config::config_path() {
        if path.exists() {
            println!("# Source: {}", path.display());
        } else {
            println!("# Source: defaults (no config file)");
        }
    }
}

fn handle_config_reset() {
    let Some(path) = Config::config_path() else {
        eprintln!("Error: Could not determine config path");
        std::process::exit(1);
    };

    // Confirm if file exists
    if path.exists() {
        eprint!(
            "Config file exists at {}. Overwrite? [y/N] ",
            path.display()
        );
        let _ = std::io::stderr().flush();

        let mut input = String::new();
        if std::io::stdin().read_line(&mut input).is_err()
            || !input.trim().eq_ignore_ascii_case("y")
        {
            println!("Aborted.");
            return;
        }
    }

    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            eprintln!("Error creating directory: {}", e);
            std::process::exit(1);
        }
    }

    // Write the default config (using Config's single source of truth)
    if let Err(e) = std::fs::write(&path, Config::default().to_toml()) {
        eprintln!("Error writing config: {}", e);
        std::process::exit(1);
    }

    println!("Config reset to defaults: {}", path.display());
}

/// Ask one question through the chat service, streaming the reply to stdout
///
/// Uses the same path as the chat screen: select the client, then send
/// without a conversation so one is created from the question.
pub async fn ask(handle: &ChatHandle, client_id: &str, question: &str) -> Result<()> {
    let mut snapshots = handle.subscribe();

    // Reloading publishes a loading state first, so the wait below cannot
    // pass on the empty initial snapshot
    handle.execute(ChatCommand::ReloadClients).await?;
    wait_until_loaded(&mut snapshots).await?;

    handle.change_user(client_id).await?;
    wait_until_loaded(&mut snapshots).await?;

    handle.send_message(question).await?;

    let mut stdout = std::io::stdout();
    let mut printed = 0;
    loop {
        snapshots
            .changed()
            .await
            .context("chat service stopped during the reply")?;
        let snapshot = snapshots.borrow_and_update().clone();

        if let Some(reply) = current_reply(&snapshot) {
            if reply.len() > printed && reply.is_char_boundary(printed) {
                write!(stdout, "{}", &reply[printed..])?;
                stdout.flush()?;
                printed = reply.len();
            }
        }

        if !snapshot.is_streaming() {
            writeln!(stdout)?;
            if snapshot.failed_message().is_some() {
                bail!(
                    "{}",
                    snapshot
                        .last_error
                        .clone()
                        .unwrap_or_else(|| "the reply failed".to_string())
                );
            }
            if let Some(tokens) = snapshot.messages.last().and_then(|m| m.tokens) {
                eprintln!("({} tokens)", tokens);
            }
            return Ok(());
        }
    }
}

async fn wait_until_loaded(snapshots: &mut watch::Receiver<ChatSnapshot>) -> Result<()> {
    let snapshot = snapshots
        .wait_for(|s| !s.is_loading)
        .await
        .context("chat service stopped while loading")?;
    if let Some(error) = &snapshot.last_error {
        bail!("{}", error);
    }
    Ok(())
}

/// Text of the AI message after the newest user message, if any
fn current_reply(snapshot: &ChatSnapshot) -> Option<&str> {
    let last_user = snapshot.messages.iter().rposition(|m| m.is_user())?;
    snapshot.messages[last_user + 1..]
        .iter()
        .find(|m| m.kind == MessageKind::Ai)
        .map(|m| m.content.as_str())
}
