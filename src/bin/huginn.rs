//! huginn: telemetry tooling on the command line.
//!
//! Completes and merges telemetry records read as JSON, and prints the
//! effective configuration.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::debug;

use huginn::{Config, HuginnError, TelemetryMap, ensure_complete_value, merge_telemetry};

/// Huginn telemetry tool
#[derive(Parser)]
#[command(name = "huginn")]
#[command(version = huginn::PKG_VERSION)]
#[command(about = "Complete and merge telemetry records")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, global = true, env = "HUGINN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Complete a partial or legacy telemetry record
    Complete {
        /// JSON file (or omit to read from stdin)
        file: Option<PathBuf>,
        /// Omit fields still at their defaults
        #[arg(long)]
        sparse: bool,
    },

    /// Merge telemetry records from several files
    Merge {
        /// JSON files, each holding one record
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print the effective configuration as TOML
    Config,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;

    // RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .init();

    debug!(version = huginn::version_string(), "huginn starting");

    match args.command {
        Command::Complete { file, sparse } => {
            let input = match file {
                Some(path) => read_file(&path)?,
                None => {
                    let mut buf = String::new();
                    io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            let value: serde_json::Value = serde_json::from_str(&input)?;
            let record = ensure_complete_value(&value);
            let output = if sparse {
                record.to_sparse_map()
            } else {
                record.to_map()
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Merge { files } => {
            let maps = files
                .iter()
                .map(|path| read_record(path))
                .collect::<Result<Vec<_>, _>>()?;
            let merged = merge_telemetry(&maps);
            println!("{}", serde_json::to_string_pretty(&merged.to_map())?);
        }
        Command::Config => {
            let rendered = toml::to_string_pretty(&config)
                .map_err(|e| HuginnError::Configuration(format!("Failed to render config: {e}")))?;
            print!("{rendered}");
        }
    }

    Ok(())
}

fn read_file(path: &Path) -> Result<String, HuginnError> {
    fs::read_to_string(path).map_err(HuginnError::from)
}

/// Read one record; non-object JSON counts as an empty record.
fn read_record(path: &Path) -> Result<TelemetryMap, HuginnError> {
    let value: serde_json::Value = serde_json::from_str(&read_file(path)?)?;
    Ok(value.as_object().cloned().unwrap_or_default())
}
