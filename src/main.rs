//! Pricecrawl main entry point
//!
//! Command-line driver for the product data crawler.

use anyhow::Context;
use clap::Parser;
use pricecrawl::config::load_config_with_hash;
use pricecrawl::model::CrawlStatus;
use pricecrawl::CrawlSession;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Pricecrawl: batch collection of product data from e-commerce sites
///
/// Runs every crawler defined in the configuration file to completion and
/// writes one JSON array of product records per crawler.
#[derive(Parser, Debug)]
#[command(name = "pricecrawl")]
#[command(version = "1.0.0")]
#[command(about = "Batch product data crawler", long_about = None)]
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

    /// Validate config and show what would be crawled without fetching anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config, &config_hash);
        return Ok(());
    }

    handle_crawl(config).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("pricecrawl=info,warn"),
            1 => EnvFilter::new("pricecrawl=debug,info"),
            2 => EnvFilter::new("pricecrawl=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows the crawl plan
fn handle_dry_run(config: &pricecrawl::Config, config_hash: &str) {
    println!("=== Pricecrawl Dry Run ===\n");

    println!("Config hash: {}", config_hash);
    println!("Output directory: {}", config.output.directory);

    println!("\nCrawlers ({}):", config.crawlers.len());
    for crawler in &config.crawlers {
        println!("  - {}", crawler.name);
        println!("    Start URL: {}", crawler.start_url);
        println!("    Fetch: {:?}", crawler.fetch);
        println!("    Batch size: {}", crawler.batch_size);
        println!("    User agent: {}", crawler.user_agent);
        if crawler.dedup {
            println!("    De-duplication: on");
        }
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would run {} crawler(s)", config.crawlers.len());
}

/// Handles the main crawl operation
async fn handle_crawl(config: pricecrawl::Config) -> anyhow::Result<()> {
    let session = CrawlSession::new(&config);

    // Ctrl-C stops the session between page fetches, leaving every store
    // flushed and consistent
    let cancel = session.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling crawl session");
            cancel.cancel();
        }
    });

    let results = session.run(&config.crawlers).await;

    println!("\n=== Crawl Report ===\n");
    let mut failed = 0;
    for result in &results {
        let status = match result.status {
            CrawlStatus::Success => "success",
            CrawlStatus::PartialFailure => "partial failure",
            CrawlStatus::Failure => "FAILURE",
        };
        println!(
            "  {:<20} {:<16} {} page(s), {} record(s)",
            result.crawler_name, status, result.pages_visited, result.records_written
        );
        if let Some(error) = &result.error {
            println!("    cause: {}", error);
        }
        if result.status == CrawlStatus::Failure {
            failed += 1;
        }
    }
    println!();

    if failed == results.len() && !results.is_empty() {
        anyhow::bail!("all crawlers failed");
    }
    Ok(())
}
