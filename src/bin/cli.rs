//! seatwatch CLI
//!
//! Local execution entry point. For AWS Lambda, use `seatwatch-lambda`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use seatwatch::{
    error::{AppError, Result},
    models::Config,
    pipeline::{self, Watcher},
    storage::{BlobStore, LocalStorage, StateStore},
    utils::url::is_valid_target_url,
};

/// seatwatch - TestFlight seat watcher
#[derive(Parser, Debug)]
#[command(
    name = "seatwatch",
    version,
    about = "Watches TestFlight beta pages and announces seat changes"
)]
struct Cli {
    /// Directory holding the watch list and state records
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Path to config file (default: {storage_dir}/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use the S3-compatible store from S3_BUCKET / S3_PREFIX / S3_ENDPOINT_URL
    #[cfg(feature = "s3")]
    #[arg(long)]
    s3: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single pass over the watch list
    Poll,

    /// Run passes on a fixed interval until interrupted
    Watch {
        /// Seconds between passes (default: watcher.interval_secs)
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Print the last known state of every watched URL
    Status,

    /// Check store connectivity and webhook configuration
    Health,

    /// Validate the configuration and the watch list
    Validate,

    /// Print the state key a URL is stored under
    Fingerprint {
        /// Beta page URL
        url: String,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.storage_dir.join("config.toml"));

    let mut config = if path.exists() {
        log::info!("Loaded configuration from {}", path.display());
        Config::load(&path)?
    } else {
        log::info!("No config at {}, using defaults", path.display());
        Config::default()
    };
    config.apply_env();
    Ok(config)
}

async fn open_storage(cli: &Cli) -> Result<Arc<dyn BlobStore>> {
    #[cfg(feature = "s3")]
    if cli.s3 {
        let storage = seatwatch::storage::s3::S3Storage::from_env().await?;
        return Ok(Arc::new(storage));
    }

    log::debug!("Using local storage at {}", cli.storage_dir.display());
    Ok(Arc::new(LocalStorage::new(cli.storage_dir.clone())))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli)?;
    if let Err(e) = config.validate() {
        log::error!("Config validation failed: {}", e);
        return Err(e);
    }
    let blobs = open_storage(&cli).await?;

    match &cli.command {
        Command::Poll => {
            let watcher = Watcher::new(&config, blobs)?;
            let summary = watcher.run_pass().await?;
            print_json(&summary)?;
        }

        Command::Watch { interval } => {
            let every = Duration::from_secs(interval.unwrap_or(config.watcher.interval_secs).max(1));
            let watcher = Watcher::new(&config, blobs)?;
            log::info!("Watching every {}s, press Ctrl-C to stop", every.as_secs());

            loop {
                match watcher.run_pass().await {
                    Ok(summary) => log::info!(
                        "Pass done: {} urls, {} changed, {} errored",
                        summary.total,
                        summary.changed,
                        summary.errored
                    ),
                    Err(e) => log::error!("Pass failed: {}", e),
                }

                tokio::select! {
                    _ = tokio::time::sleep(every) => {}
                    _ = tokio::signal::ctrl_c() => {
                        log::info!("Interrupted, stopping");
                        break;
                    }
                }
            }
        }

        Command::Status => {
            let store = StateStore::new(blobs, &config.storage);
            let report =
                pipeline::collect_statuses(&store, &config.target, config.notifier.offset()).await?;
            print_json(&report)?;
        }

        Command::Health => {
            let store = StateStore::new(blobs, &config.storage);
            let report = pipeline::check_health(
                &store,
                config.notifier.webhook_url.is_some(),
                config.notifier.offset(),
            )
            .await;
            print_json(&report)?;
        }

        Command::Validate => {
            log::info!("✓ Config OK");

            let store = StateStore::new(blobs, &config.storage);
            let Some(urls) = store.load_watch_list().await? else {
                return Err(AppError::validation(format!(
                    "Watch list not found at {}",
                    store.blobs().location(store.watch_list_key())
                )));
            };

            let invalid: Vec<&String> = urls
                .iter()
                .filter(|url| !is_valid_target_url(url, &config.target))
                .collect();
            for url in &invalid {
                log::warn!("Invalid URL in watch list: {}", url);
            }
            log::info!(
                "✓ Watch list: {} urls, {} invalid",
                urls.len(),
                invalid.len()
            );
            if config.notifier.webhook_url.is_none() {
                log::warn!("No webhook configured, changes will be recorded silently");
            }
        }

        Command::Fingerprint { url } => {
            if !is_valid_target_url(url, &config.target) {
                log::warn!("{} is not a valid target URL and would never be polled", url);
            }
            let store = StateStore::new(blobs, &config.storage);
            println!("{}", store.blobs().location(&store.state_key(url)));
        }
    }

    Ok(())
}
