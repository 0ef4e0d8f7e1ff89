//! Feedback CLI - run and inspect the feedback service.

mod commands;
mod ui;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "feedback")]
#[command(about = "Feedback collection service")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the feedback server
    Serve {
        /// Config file (defaults to ~/.feedback/feedback.json)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address
        #[arg(long)]
        bind: Option<String>,

        /// Directory of the feedback database
        #[arg(long)]
        store_path: Option<PathBuf>,
    },

    /// Check whether a server is running
    Status {
        /// Port to probe (defaults to the configured port)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Variables from a local .env file, if present
    let dotenv = dotenvy::dotenv();

    init_logging(cli.verbose, cli.log_json);

    if let Ok(path) = dotenv {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    match cli.command {
        Commands::Serve {
            config,
            port,
            bind,
            store_path,
        } => {
            let args = commands::serve::ServeArgs {
                config,
                port,
                bind,
                store_path,
            };
            commands::run_serve(args).await?;
        }

        Commands::Status { port } => {
            commands::run_status(commands::status::StatusArgs { port }).await?;
        }
    }

    Ok(())
}

/// Install the global tracing subscriber. `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().with_target(false)).init();
    }
}
