//! sqlwire - SQLite queries and results over a compact binary wire format
//!
//! Runs queries against SQLite databases, writes the encoded results and
//! inspects encoded files.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use config::Config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sqlwire")]
#[command(about = "Run SQLite queries and inspect sqlwire-encoded data")]
#[command(version)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, env = "SQLWIRE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a query and print the result, or write it encoded
    Select {
        /// Database file (defaults to the configured database)
        #[arg(long)]
        db: Option<PathBuf>,

        /// SQL with `?` placeholders
        sql: String,

        /// Arguments: integers, floats, NULL, x'hex' blobs, anything else is text
        #[arg(allow_hyphen_values = true)]
        args: Vec<String>,

        /// Write the encoded result to this file
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Always compress the written result
        #[arg(long)]
        compress: bool,
    },

    /// Run a statement that returns no rows
    Exec {
        /// Database file (defaults to the configured database)
        #[arg(long)]
        db: Option<PathBuf>,

        /// SQL with `?` placeholders
        sql: String,

        /// Arguments: integers, floats, NULL, x'hex' blobs, anything else is text
        #[arg(allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Encode a query to a file
    EncodeQuery {
        /// SQL with `?` placeholders
        sql: String,

        /// Arguments: integers, floats, NULL, x'hex' blobs, anything else is text
        #[arg(allow_hyphen_values = true)]
        args: Vec<String>,

        /// Output file
        #[arg(short, long)]
        out: PathBuf,

        /// Always compress the written query
        #[arg(long)]
        compress: bool,
    },

    /// Decode an encoded query or result file
    Decode {
        /// Encoded file
        file: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print an annotated hex dump of an encoded file
    Inspect {
        /// Encoded file
        file: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries command output only
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(c) => {
            if let Some(path) = &cli.config {
                tracing::debug!("Loaded config from {}", path.display());
            }
            c
        }
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            return Err(e.into());
        }
    };

    match commands::execute(&config, cli.command) {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    }

    Ok(())
}
