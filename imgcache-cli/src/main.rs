//! imgcache CLI - Command-line interface
//!
//! Loads images through the deduplicating two-tier cache and manages the
//! cache's contents.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::cache::{InvalidateArgs, Scope};
use commands::load::GetArgs;
use error::CliError;
use runner::CliRunner;

#[derive(Parser)]
#[command(name = "imgcache")]
#[command(version = imgcache::VERSION)]
#[command(about = "Fetch images through a deduplicating memory and disk cache", long_about = None)]
struct Cli {
    /// Config file (default: ~/.imgcache/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Mirror log output to stdout
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load one image and print its dimensions
    Get {
        /// URL, file path, or embedded:<name>
        source: String,

        /// Cache under this key instead of the source
        #[arg(long)]
        cache_key: Option<String>,

        /// Save the decoded image as PNG
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Warm the memory and disk caches for one or more sources
    Preload {
        #[arg(required = true)]
        sources: Vec<String>,
    },
    /// Persist raw bytes for one or more sources
    Download {
        #[arg(required = true)]
        sources: Vec<String>,
    },
    /// Print the cache key for a source
    Key {
        source: String,

        /// Derive from this custom key instead
        #[arg(long)]
        cache_key: Option<String>,
    },
    /// Remove cached entries
    Invalidate {
        /// Tiers to clear
        #[arg(long, value_enum, default_value = "all")]
        scope: Scope,

        /// Only remove this source's entry
        #[arg(long, conflicts_with = "cache_key")]
        entry: Option<String>,

        /// Only remove the entry stored under this custom cache key
        #[arg(long)]
        cache_key: Option<String>,

        /// Return without waiting for the disk removal to finish
        #[arg(long)]
        no_wait: bool,
    },
    /// Show cache statistics
    Stats,
    /// Run a disk garbage collection cycle now
    Gc,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        e.exit();
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    if let Commands::Key { source, cache_key } = &cli.command {
        commands::load::key(source, cache_key.as_deref());
        return Ok(());
    }

    let runner = CliRunner::new(cli.config.as_deref(), cli.verbose)?;

    match cli.command {
        Commands::Get {
            source,
            cache_key,
            output,
        } => {
            runner.log_startup("get");
            commands::load::get(
                &runner,
                GetArgs {
                    source,
                    cache_key,
                    output,
                },
            )
            .await
        }
        Commands::Preload { sources } => {
            runner.log_startup("preload");
            commands::load::preload(&runner, sources).await
        }
        Commands::Download { sources } => {
            runner.log_startup("download");
            commands::load::download(&runner, sources).await
        }
        Commands::Invalidate {
            scope,
            entry,
            cache_key,
            no_wait,
        } => {
            runner.log_startup("invalidate");
            commands::cache::invalidate(
                &runner,
                InvalidateArgs {
                    scope,
                    entry,
                    cache_key,
                    no_wait,
                },
            )
            .await
        }
        Commands::Stats => {
            runner.log_startup("stats");
            commands::cache::stats(&runner).await
        }
        Commands::Gc => {
            runner.log_startup("gc");
            commands::cache::gc(&runner).await
        }
        Commands::Key { .. } => Ok(()),
    }
}
