//! Fotis-Harvest main entry point
//!
//! This is the command-line interface for the catalog harvester.

use anyhow::Context;
use clap::Parser;
use fotis_harvest::config::{load_config_with_hash, Config};
use fotis_harvest::crawler::{Coordinator, CrawlReport};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Fotis-Harvest: a resumable archival photo catalog crawler
///
/// Crawls every page of the catalog listing, extracts the photo rows and
/// merges them into a Parquet snapshot. Pages already in the snapshot are
/// skipped, so re-running continues an interrupted harvest.
#[derive(Parser, Debug)]
#[command(name = "fotis-harvest")]
#[command(version)]
#[command(about = "A resumable archival photo catalog crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with_all = ["stats", "subjects"])]
    dry_run: bool,

    /// Show statistics of the stored snapshot and exit
    #[arg(long, conflicts_with_all = ["dry_run", "subjects"])]
    stats: bool,

    /// Run the batched per-subject search crawl instead of the catalog crawl
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    subjects: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(config, cli.subjects).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("fotis_harvest=info,warn"),
            1 => EnvFilter::new("fotis_harvest=debug,info"),
            2 => EnvFilter::new("fotis_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the configuration and the resume state
fn handle_dry_run(config: Config) -> anyhow::Result<()> {
    println!("=== Fotis-Harvest Dry Run ===\n");

    println!("Catalog:");
    println!("  Listing: {}", config.catalog.listing_url);
    println!("  Page parameter: {}", config.catalog.page_param);
    println!("  First page: {}", config.catalog.first_page);
    match config.catalog.page_count_fallback {
        Some(fallback) => println!("  Page count fallback: {}", fallback),
        None => println!("  Page count fallback: none (discovery failure aborts)"),
    }

    println!("\nCrawler:");
    println!("  Workers: {}", config.crawler.workers);
    println!("  Connect timeout: {}ms", config.crawler.connect_timeout_ms);
    println!("  Request timeout: {}ms", config.crawler.request_timeout_ms);
    println!(
        "  Backoff: {}ms base, {}ms cap, {} attempts",
        config.retry.base_delay_ms, config.retry.max_delay_ms, config.retry.max_attempts
    );

    if let Some(subjects) = &config.subjects {
        let pages: u32 = subjects.entries.iter().map(|s| s.pages).sum();
        println!("\nSubjects ({}, {} pages):", subjects.entries.len(), pages);
        for entry in &subjects.entries {
            println!("  - {} ({} pages)", entry.name, entry.pages);
        }
    }

    let store_path = config.output.store_path.clone();
    let fallback = config.catalog.page_count_fallback;
    let coordinator = Coordinator::new(config)?;
    let resume = coordinator.resume_index()?;
    println!("\nSnapshot: {}", store_path);
    println!("  Stored records: {}", resume.prior_records().len());
    println!("  Stored pages: {}", resume.seen_pages().len());

    match (coordinator.offline_plan(&resume), fallback) {
        (Some(plan), Some(count)) => println!(
            "  Planned pages: {} (assuming {} pages from page-count-fallback)",
            plan.len(),
            count
        ),
        _ => println!("  Planned pages: unknown, the page count is discovered from the listing"),
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the --stats mode: shows statistics of the stored snapshot
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    use fotis_harvest::output::{load_statistics, print_statistics};
    use fotis_harvest::storage::ParquetStore;

    println!("Snapshot: {}\n", config.output.store_path);

    let store = ParquetStore::new(&config.output.store_path);
    let stats = load_statistics(&store)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the crawl itself; Ctrl-C stops the workers and keeps what was collected
async fn handle_crawl(config: Config, subjects: bool) -> anyhow::Result<()> {
    tracing::info!(
        "Listing: {}, workers: {}",
        config.catalog.listing_url,
        config.crawler.workers
    );

    let coordinator = Coordinator::new(config)?;

    let cancel = coordinator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping workers (press Ctrl-C again to exit now)");
            cancel.cancel();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::error!("Second interrupt received, exiting without saving");
            std::process::exit(130);
        }
    });

    let result = if subjects {
        coordinator.run_subjects().await
    } else {
        coordinator.run().await
    };

    match result {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}

fn print_report(report: &CrawlReport) {
    tracing::info!(
        "Crawl completed: {}/{} pages, {} failed, {} records stored",
        report.completed,
        report.planned,
        report.failed,
        report.stored_records
    );
}
