//! Shelfcrawl main entry point
//!
//! This is the command-line interface for the shelfcrawl store catalog
//! crawler.

use clap::Parser;
use shelfcrawl::config::load_config_with_hash;
use shelfcrawl::crawler::{crawl, Orchestrator};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Shelfcrawl: a storefront catalog crawler
///
/// Shelfcrawl traverses paginated storefront listings to discover entry
/// identifiers, then enriches each identifier from the configured detail
/// sources. Everything lands in a local SQLite database, one write per
/// item, so interrupted runs keep what they finished.
#[derive(Parser, Debug)]
#[command(name = "shelfcrawl")]
#[command(version = "0.5.1")]
#[command(about = "A storefront catalog crawler", long_about = None)]
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

    /// Run discovery only, skipping enrichment
    #[arg(long, conflicts_with = "enrich_only")]
    discover_only: bool,

    /// Run enrichment only, for the named source
    #[arg(long, value_name = "SOURCE", conflicts_with = "discover_only")]
    enrich_only: Option<String>,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with_all = ["stats", "discover_only", "enrich_only"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "discover_only", "enrich_only"])]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(config, config_hash, cli.discover_only, cli.enrich_only).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("shelfcrawl=info,warn"),
            1 => EnvFilter::new("shelfcrawl=debug,info"),
            2 => EnvFilter::new("shelfcrawl=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows the crawl surface
fn handle_dry_run(config: &shelfcrawl::Config) -> anyhow::Result<()> {
    println!("=== Shelfcrawl Dry Run ===\n");

    println!("Render:");
    match &config.render.endpoint {
        Some(endpoint) => println!("  Browser: attach to {}", endpoint),
        None => println!("  Browser: launch headless"),
    }
    println!(
        "  Navigation timeout: {}s",
        config.render.navigation_timeout_secs
    );
    println!("  Settle delay: {}ms", config.render.settle_millis);

    println!("\nCrawl:");
    println!(
        "  Timeout cooldown: {}s",
        config.crawl.timeout_cooldown_secs
    );
    match config.crawl.refresh_after_days {
        Some(days) => println!("  Refresh window: {} days", days),
        None => println!("  Refresh window: none (enrich each identifier once)"),
    }

    println!("\nStore:");
    println!("  Database: {}", config.store.database_path);

    println!("\nListings ({}):", config.listing.len());
    for target in &config.listing {
        println!("  - {} ({})", target.name, target.url);
    }

    println!("\nSources:");
    if let Some(storefront) = &config.sources.storefront {
        println!("  - storefront ({})", storefront.base_url);
    }
    if let Some(profile) = &config.sources.profile {
        match profile.wait_timeout_secs {
            Some(wait) => println!("  - profile ({}, wait {}s)", profile.base_url, wait),
            None => println!("  - profile ({})", profile.base_url),
        }
    }

    let source_count = shelfcrawl::sources::enabled_sources(&config.sources).len();
    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would traverse {} listings and enrich via {} sources",
        config.listing.len(),
        source_count
    );

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &shelfcrawl::Config) -> anyhow::Result<()> {
    use shelfcrawl::store::{RecordStore, SqliteStore};
    use std::path::Path;

    println!("Database: {}\n", config.store.database_path);

    let store = SqliteStore::new(Path::new(&config.store.database_path))?;

    println!("Records: {}", store.count_records()?);

    let sources = store.enrichment_sources()?;
    if sources.is_empty() {
        println!("Enrichments: none");
    } else {
        println!("Enrichments:");
        for source in &sources {
            println!("  {}: {}", source, store.count_enriched(source)?);
        }
    }

    let runs = store.latest_runs(5)?;
    if !runs.is_empty() {
        println!("\nRecent runs:");
        for run in &runs {
            let source = run.source.as_deref().unwrap_or("-");
            let finished = run.finished_at.as_deref().unwrap_or("unfinished");
            println!(
                "  #{} {} ({}) started {} finished {}: {} discovered, {} inserted, {} updated, {} skipped",
                run.id,
                run.kind.to_db_string(),
                source,
                run.started_at,
                finished,
                run.counts.discovered,
                run.counts.inserted,
                run.counts.updated,
                run.counts.skipped
            );
        }
    }

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: shelfcrawl::Config,
    config_hash: String,
    discover_only: bool,
    enrich_only: Option<String>,
) -> anyhow::Result<()> {
    let source_names: Vec<&str> = shelfcrawl::sources::enabled_sources(&config.sources)
        .iter()
        .map(|source| source.name())
        .collect();
    tracing::info!(
        "Listings: {}, enabled sources: {:?}",
        config.listing.len(),
        source_names
    );

    let result = if discover_only {
        let mut orchestrator = Orchestrator::from_config(config, config_hash).await?;
        orchestrator.discover_only().await
    } else if let Some(source) = enrich_only {
        let mut orchestrator = Orchestrator::from_config(config, config_hash).await?;
        orchestrator.enrich_only(&source).await
    } else {
        crawl(config, config_hash).await
    };

    match result {
        Ok(_counts) => {
            tracing::info!("Crawl completed successfully");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
