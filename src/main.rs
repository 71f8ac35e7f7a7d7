mod chat;
mod client;
mod clipboard;
mod config;
mod events;
mod llm;
mod prompts;
mod relay;
mod session;
#[cfg(test)]
mod testing;
mod ui;
mod voice;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[derive(Parser)]
#[command(name = "vision")]
#[command(version)]
#[command(about = "Vision AI: a Gemini chat relay and terminal chat client", long_about = None)]
struct Cli {
    /// Path to a config file (defaults to ~/.vision/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the chat UI (default)
    Chat {
        /// Base URL of the relay
        #[arg(long)]
        base_url: Option<String>,
        /// Session key for a private conversation on a shared relay
        #[arg(long)]
        session: Option<String>,
    },
    /// Run the prompt relay
    Serve {
        /// Address to listen on
        #[arg(long)]
        bind: Option<String>,
    },
}

/// Log to stderr for the relay; the chat UI owns the terminal, so it logs to a file.
fn init_tracing(config: &Config, to_file: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vision=info"));

    if to_file {
        let path = config.log_path();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Chat {
        base_url: None,
        session: None,
    }) {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.relay.bind = bind;
            }
            init_tracing(&config, false)?;
            relay::serve(&config).await
        }
        Commands::Chat { base_url, session } => {
            if let Some(base_url) = base_url {
                config.client.base_url = base_url;
            }
            if session.is_some() {
                config.client.session = session;
            }
            init_tracing(&config, true)?;
            ui::run(&config).await
        }
    }
}
