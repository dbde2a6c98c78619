//! # docgate CLI
//!
//! ```bash
//! docgate --config ./config/docgate.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docgate init` | Ensure the vector collection exists |
//! | `docgate ingest [TARGET]` | Load, chunk, embed and upsert documents |
//! | `docgate search "<query>"` | Access-filtered retrieval from the terminal |
//! | `docgate serve` | Start the HTTP gateway |
//!
//! Logs go to stderr; set `RUST_LOG` to adjust verbosity.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use docgate::{config, engine, ingest, search, server};

/// docgate: group-aware document retrieval gateway.
#[derive(Parser)]
#[command(name = "docgate", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docgate.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the vector collection if it does not exist yet.
    Init,

    /// Ingest a file or directory tree.
    ///
    /// TARGET defaults to `paths.docs_root`. Relative targets are resolved
    /// under the document root. Access groups are taken from the first
    /// folder below the root.
    Ingest {
        target: Option<PathBuf>,

        /// Load and chunk only; nothing is embedded or written.
        #[arg(long)]
        dry_run: bool,
    },

    /// Search indexed chunks.
    Search {
        query: String,

        /// Number of hits (defaults to `retrieval.top_k`).
        #[arg(long)]
        top_k: Option<usize>,

        /// Restrict to documents in these groups plus public documents.
        /// Repeatable. Without it, search is unrestricted.
        #[arg(long = "group")]
        groups: Vec<String>,
    },

    /// Start the HTTP gateway on `server.bind`.
    Serve,
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
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            engine::connect(&cfg).await?;
            println!(
                "Collection '{}' is ready at {}.",
                cfg.index.collection, cfg.index.url
            );
        }
        Commands::Ingest { target, dry_run } => {
            ingest::run_ingest(&cfg, target.as_deref(), dry_run).await?;
        }
        Commands::Search {
            query,
            top_k,
            groups,
        } => {
            search::run_search(&cfg, &query, top_k, &groups).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
