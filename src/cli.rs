use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::update::Algorithm;

/// Self-extracting installer builder
#[derive(Parser)]
#[command(name = "mksfx")]
#[command(about = "Build integrity-verified self-extracting installers and incremental updates", long_about = None)]
pub struct Cli {
    /// Log every pipeline step to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file (defaults to ./mksfx.toml when present)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build an installer bundle from a payload directory
    Build {
        /// Payload source directory
        source: PathBuf,
        /// Output bundle path [default: installer.tar.gz]
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Payload version [default: 1.0.0]
        #[arg(long = "version", value_name = "VERSION")]
        payload_version: Option<String>,
        /// Entrypoint script, relative to SOURCE [default: bootstrap.sh]
        #[arg(short, long)]
        entrypoint: Option<String>,
        /// Gzip level 0-9 [default: 9]
        #[arg(short, long)]
        compression: Option<u32>,
        /// Extra manifest field, repeatable
        #[arg(short, long = "metadata", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        metadata: Vec<(String, String)>,
    },
    /// Build an incremental update between two bundles
    Update {
        /// Previous bundle
        old: PathBuf,
        /// New bundle
        new: PathBuf,
        /// Output path [default: update-<old>-to-<new>.tar.gz]
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Per-file delta algorithm [default: auto]
        #[arg(short, long, value_enum)]
        algorithm: Option<Algorithm>,
        /// Gzip level 0-9 [default: 9]
        #[arg(short, long)]
        compression: Option<u32>,
    },
    /// Check a bundle's checksums and manifest
    Verify {
        /// Bundle path
        archive: PathBuf,
    },
    /// Describe a bundle
    Info {
        /// Bundle path
        archive: PathBuf,
        /// List payload files
        #[arg(long)]
        files: bool,
    },
    /// Scaffold a new payload directory
    Init {
        /// Directory to create
        name: PathBuf,
        /// Entrypoint script name
        #[arg(short, long, default_value = crate::bundle::DEFAULT_ENTRYPOINT)]
        entrypoint: String,
    },
    /// Print the tool version
    Version,
}

/// `KEY=VALUE`, split on the first `=`.
fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}
