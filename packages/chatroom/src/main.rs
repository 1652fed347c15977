use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::prelude::*;

use chatroom::config::{self, ClientConfig, FileConfig};

mod cli;

#[derive(Parser)]
#[command(name = "chatroom")]
#[command(about = "Browse and join chat sessions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Base URL of the chat service (overrides config and env)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Path to config.toml (defaults to ~/.chatroom/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List available sessions
    List(ListArgs),

    /// Create a new session
    Create(CreateArgs),

    /// Join a session and chat interactively
    Join(JoinArgs),
}

#[derive(Parser)]
struct ListArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Parser)]
struct CreateArgs {
    /// Display name for the new session
    name: String,
}

#[derive(Parser)]
struct JoinArgs {
    /// Session name, ID, or ID prefix
    target: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so they never interleave with chat output on stdout
    let default_directive = if cli.debug {
        "chatroom=debug,info"
    } else {
        "chatroom=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();

    let config_path = cli.config.clone().or_else(config::default_config_path);
    let file_config: FileConfig = config::load_config(config_path.as_deref())
        .extract()
        .context("Failed to load configuration")?;
    let config = ClientConfig::from_file(&file_config).with_base_url(cli.base_url);
    debug!(base_url = %config.base_url, "resolved configuration");

    match cli.command {
        Commands::List(args) => cli::list_command(&config, args.json).await,
        Commands::Create(args) => cli::create_command(&config, &args.name).await,
        Commands::Join(args) => cli::join_command(&config, &args.target).await,
    }
}
