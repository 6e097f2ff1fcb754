use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use tracing_subscriber::EnvFilter;

use mksfx::bundle::{BuildOptions, InfoOptions, bundle_info, build_bundle, verify_bundle};
use mksfx::cli::{Cli, Commands};
use mksfx::config::{Config, merge_metadata};
use mksfx::error::exit_code;
use mksfx::init::init_payload;
use mksfx::output;
use mksfx::update::{UpdateOptions, create_update};

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    if let Err(err) = run(cli) {
        eprintln!("error: {:#}", err);
        std::process::exit(exit_code(&err));
    }
}

fn run(cli: Cli) -> Result<()> {
    let json = cli.json;

    match cli.command {
        Commands::Build {
            source,
            output: out,
            payload_version,
            entrypoint,
            compression,
            metadata,
        } => {
            let config = load_config(cli.config.as_deref())?.build;
            let defaults = BuildOptions::default();
            let options = BuildOptions {
                output: out.or(config.output).unwrap_or(defaults.output),
                version: payload_version.or(config.version).unwrap_or(defaults.version),
                entrypoint: entrypoint.or(config.entrypoint).unwrap_or(defaults.entrypoint),
                compression: compression.or(config.compression).unwrap_or(defaults.compression),
                metadata: merge_metadata(&config.metadata, &metadata),
            };
            let result = build_bundle(&source, &options)
                .with_context(|| format!("failed to build bundle from {}", source.display()))?;
            if json {
                output::print_json(&result)?;
            } else {
                output::print_build(&result);
            }
        }
        Commands::Update {
            old,
            new,
            output: out,
            algorithm,
            compression,
        } => {
            let config = load_config(cli.config.as_deref())?.update;
            let defaults = UpdateOptions::default();
            let options = UpdateOptions {
                output: out,
                algorithm: algorithm.or(config.algorithm).unwrap_or(defaults.algorithm),
                compression: compression.or(config.compression).unwrap_or(defaults.compression),
            };
            let result = create_update(&old, &new, &options).context("failed to create update")?;
            if json {
                output::print_json(&result)?;
            } else {
                output::print_update(&result);
            }
        }
        Commands::Verify { archive } => {
            let result =
                verify_bundle(&archive).with_context(|| format!("verification failed for {}", archive.display()))?;
            if json {
                output::print_json(&result)?;
            } else {
                output::print_verify(&result);
            }
        }
        Commands::Info { archive, files } => {
            let result = bundle_info(&archive, &InfoOptions { list_files: files })
                .with_context(|| format!("failed to inspect {}", archive.display()))?;
            if json {
                output::print_json(&result)?;
            } else {
                output::print_info(&result);
            }
        }
        Commands::Init { name, entrypoint } => {
            let result = init_payload(&name, &entrypoint)?;
            if json {
                output::print_json(&result)?;
            } else {
                output::print_init(&result);
            }
        }
        Commands::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let cwd = std::env::current_dir().context("failed to resolve the current directory")?;
    Ok(Config::load(explicit, &cwd)?)
}
