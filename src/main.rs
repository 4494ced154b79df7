//! # ragchat CLI
//!
//! ## Usage
//!
//! ```bash
//! ragchat --config ./config/ragchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragchat serve` | Rescan the upload folder, watch it, and serve the HTTP API |
//! | `ragchat rescan` | Clear the index and re-index the upload folder once |
//! | `ragchat ask "<query>"` | Augment and answer one query |
//!
//! `OPENAI_API_KEY` and `PINECONE_API_KEY` must be set (a `.env` file in
//! the working directory is loaded first). Log verbosity follows
//! `RUST_LOG`, default `info`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ragchat::app::{run_ask, run_rescan, run_serve};
use ragchat::config::{load_config, Credentials};
use tracing_subscriber::EnvFilter;

/// Retrieval-augmented chat over a folder of PDFs.
#[derive(Parser)]
#[command(
    name = "ragchat",
    about = "Retrieval-augmented chat over a folder of PDFs",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/ragchat.toml`. A missing file means built-in
    /// defaults.
    #[arg(long, global = true, default_value = "./config/ragchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default).
    ///
    /// Clears the index, re-indexes every PDF in the upload folder, then
    /// watches the folder and serves until Ctrl-C.
    Serve,

    /// Clear the index and re-index the upload folder, then exit.
    Rescan,

    /// Answer a single query and print the augmented prompt and response.
    Ask {
        /// The question to ask.
        query: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let credentials = Credentials::from_env()?;
    let cfg = load_config(&cli.config)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_serve(cfg, &credentials).await?,
        Commands::Rescan => run_rescan(cfg, &credentials).await?,
        Commands::Ask { query } => run_ask(cfg, &credentials, &query).await?,
    }

    Ok(())
}
