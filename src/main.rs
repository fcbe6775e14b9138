use anyhow::{Context, Result};
use clap::Parser;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::entities::{ComposeForm, MessageFeed};
use crate::net::ChatNetworkService;
use crate::tui::{TuiApp, chat_state::ChatState};

mod config;
mod entities;
mod net;
mod tui;

#[derive(Parser)]
#[command(name = "chat-feed", version, about = "Terminal client for a Socket.IO chat room")]
struct Cli {
    /// Path to TOML config file [default: ~/.config/chat-feed/config.toml]
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Chat server base URL
    #[arg(long, value_name = "URL")]
    server: Option<String>,

    /// Initial user name
    #[arg(long, value_name = "NAME")]
    user: Option<String>,

    /// Locale for message times, e.g. en_US or de_DE
    #[arg(long, value_name = "NAME")]
    locale: Option<String>,

    /// Log file path
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

impl Cli {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(server) = &self.server {
            config.server_url = server.clone();
        }
        if let Some(user) = &self.user {
            config.username = user.clone();
        }
        if let Some(locale) = &self.locale {
            config.locale = locale.clone();
        }
        if let Some(log_file) = &self.log_file {
            config.log_file = log_file.clone();
        }
    }
}

/// The terminal belongs to the UI, so logs go to a file.
fn init_logging(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::default_config_path().unwrap_or_else(|_| PathBuf::from("config.toml")),
    };
    let mut config = Config::load_from_path(&config_path)?;
    cli.apply_overrides(&mut config);

    init_logging(&config.log_path(&config_path))?;
    tracing::info!("Starting chat-feed against {}", config.server_url);

    let feed = MessageFeed::new(config.time_formatter()?, config.history_policy);
    let chat_state = ChatState::new(feed, ComposeForm::with_user(config.username.clone()));

    let mut network = ChatNetworkService::new();
    network.connect(&config.server_url, config.engine_io);

    let mut app = TuiApp::new(chat_state, network);
    let mut terminal = ratatui::init();
    let result = app.run(&mut terminal);
    ratatui::restore();

    result
}
