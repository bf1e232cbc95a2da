use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wl_cli::commands::{migrate, report, status, track};
use wl_cli::{Cli, Commands, Config};
use wl_store::RecordStore;

/// Load config and open the record store, creating the storage directory.
fn open_store(config_path: Option<&Path>) -> Result<(RecordStore, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    let store = RecordStore::open(config.storage_dir())
        .context("failed to initialize session storage")?;
    Ok((store, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    match &cli.command {
        Some(Commands::Track) => {
            let config = Config::load_from(cli.config.as_deref())
                .context("failed to load configuration")?;
            tracing::debug!(?config, "loaded configuration");
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("failed to start async runtime")?;
            runtime.block_on(track::run(&config))?;
        }
        Some(Commands::Report {
            day,
            week: _,
            from,
            to,
            project,
            json,
        }) => {
            let (store, _config) = open_store(cli.config.as_deref())?;
            let period = match (from, to) {
                (Some(from), Some(to)) => report::Period::Range(*from, *to),
                _ if *day => report::Period::Day,
                _ => report::Period::Week,
            };
            report::run(
                &mut std::io::stdout(),
                &store,
                period,
                project.as_deref(),
                *json,
            )?;
        }
        Some(Commands::Status) => {
            let (store, _config) = open_store(cli.config.as_deref())?;
            status::run(&mut std::io::stdout(), &store)?;
        }
        Some(Commands::Migrate { legacy }) => {
            let (store, config) = open_store(cli.config.as_deref())?;
            let legacy_path = legacy.clone().unwrap_or_else(|| config.legacy_store_path());
            migrate::run(&mut std::io::stdout(), &store, &legacy_path)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
