//! discodump CLI
//!
//! Dumps a Discogs record collection to CSV, optionally producing a QR
//! code image and downloading cover art per record. Interruptible with
//! Ctrl-C and resumable from saved progress.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use discodump::{
    api::{CatalogApi, DiscogsClient, PageFetcher, RateLimiter},
    enrich::{DiskAssetWriter, EnrichRequest, EnrichmentScheduler},
    error::Result,
    export,
    models::{AssetKind, Config},
    pipeline::{CollectionPipeline, RunOptions},
    state::CheckpointStore,
    utils::{http, shutdown},
};

/// discodump - Discogs Collection Dumper
#[derive(Parser, Debug)]
#[command(
    name = "discodump",
    version,
    about = "Dumps a Discogs record collection to CSV with QR codes and cover art"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "discodump.toml")]
    config: PathBuf,

    /// Override the checkpoint state directory
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the collection and export it to CSV
    Export {
        /// Output file path (default: export.output_path from the config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Generate a QR code image for each record
        #[arg(long)]
        include_qr: bool,

        /// Download cover art for each record
        #[arg(long)]
        include_covers: bool,

        /// Resume from saved progress instead of starting over
        #[arg(long)]
        resume: bool,

        /// Regenerate assets whose files already exist
        #[arg(long)]
        overwrite: bool,

        /// Records per API page (1-100)
        #[arg(long)]
        page_size: Option<u32>,
    },

    /// Show the collection's estimated monetary value
    Stats,

    /// Show saved progress
    Info,

    /// Delete saved progress
    Reset,

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load_or_default(&cli.config);
    if let Some(dir) = &cli.state_dir {
        config.checkpoint.state_dir = dir.to_string_lossy().into_owned();
    }

    match cli.command {
        Command::Export {
            output,
            include_qr,
            include_covers,
            resume,
            overwrite,
            page_size,
        } => {
            if let Some(size) = page_size {
                config.api.page_size = size;
            }
            config.validate()?;

            let options = RunOptions {
                resume,
                request: EnrichRequest {
                    qr: include_qr,
                    covers: include_covers,
                    overwrite,
                },
            };
            run_export(config, options, output).await?;
        }

        Command::Stats => {
            config.validate()?;
            let credentials = config.auth.resolve()?;
            let client = DiscogsClient::new(&config.api, &credentials)?;

            log::info!("Fetching collection value for {}...", credentials.username);
            let value = client.get_value(&credentials.username).await?;
            log::info!("{}", value.summary());
        }

        Command::Info => {
            let store = CheckpointStore::new(&config.checkpoint.state_dir);
            log::info!("Config file: {}", cli.config.display());
            log::info!("Progress file: {}", store.path().display());

            match store.load_any().await? {
                Some(checkpoint) => {
                    log::info!(
                        "Saved progress for {}: page {}/{}, {} items total",
                        checkpoint.username,
                        checkpoint.last_page,
                        checkpoint.total_pages,
                        checkpoint.total_items
                    );
                    log::info!(
                        "Completed assets: {} QR codes, {} covers",
                        checkpoint.completed_count(AssetKind::Qr),
                        checkpoint.completed_count(AssetKind::Cover)
                    );
                    log::info!("Last saved: {}", checkpoint.saved_at);
                    if checkpoint.completed {
                        log::info!("The last run finished; a resume restarts from page 1 and reuses finished assets.");
                    }
                }
                None => log::info!("No saved progress."),
            }
        }

        Command::Reset => {
            let store = CheckpointStore::new(&config.checkpoint.state_dir);
            store.clear().await?;
            log::info!("Saved progress cleared from {}", store.path().display());
        }

        Command::Validate => {
            let config = Config::load(&cli.config)?;
            config.validate()?;
            log::info!("Config OK: {}", cli.config.display());
        }
    }

    Ok(())
}

/// Run the full pipeline and write the CSV.
async fn run_export(config: Config, options: RunOptions, output: Option<PathBuf>) -> Result<()> {
    let credentials = config.auth.resolve()?;
    log::info!("Dumping collection for {}", credentials.username);

    let (handle, shutdown) = shutdown::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received; finishing in-flight work (Ctrl-C again to abort)");
            handle.trigger();
            if tokio::signal::ctrl_c().await.is_ok() {
                log::error!("Second interrupt, aborting");
                std::process::exit(130);
            }
        }
    });

    let client = Arc::new(DiscogsClient::new(&config.api, &credentials)?);
    let limiter = Arc::new(RateLimiter::new(
        config.api.rate_quota,
        Duration::from_secs(config.api.rate_window_secs),
    ));
    let fetcher = PageFetcher::new(client, limiter, config.retry.clone(), shutdown.clone());

    let asset_client = http::create_async_client(&config.api)?;
    let writer = Arc::new(DiskAssetWriter::new(
        asset_client,
        &config.enrich,
        shutdown.clone(),
    ));
    let scheduler = EnrichmentScheduler::new(writer, &config.enrich, shutdown.clone());

    let store = CheckpointStore::new(&config.checkpoint.state_dir);
    let pipeline = CollectionPipeline::new(
        &config,
        &credentials.username,
        fetcher,
        scheduler,
        store,
        shutdown,
    );

    let report = pipeline.run(options).await?;

    if report.interrupted {
        log::warn!("Run interrupted; progress saved. Re-run with --resume to continue.");
        std::process::exit(130);
    }

    if report.is_partial() {
        log::warn!(
            "Resumed from page {}: the CSV covers only records from that page on. \
             Run again without --resume for the full sheet (finished assets are reused).",
            report.start_page
        );
    }

    let out_path = output.unwrap_or_else(|| PathBuf::from(&config.export.output_path));
    let written = export::write_csv(&report.records, &out_path, &config.export)?;
    log::info!(
        "Done! {} records exported to {}",
        report.records.len(),
        written.display()
    );

    Ok(())
}
