//! lemma-search main entry point
//!
//! This is the command-line interface for the lemma-search crawler and
//! search engine.

use anyhow::Context;
use clap::{Parser, Subcommand};
use lemma_search::config::{load_config_with_hash, Config};
use lemma_search::stats::print_statistics;
use lemma_search::{SearchError, SearchService};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// How often `index` checks whether the workers have finished
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// lemma-search: crawl configured sites and search them by word roots
///
/// Pages are indexed by lemma, so a query for "cats" also finds "cat".
/// Results contain every query word and are ranked by relevance.
#[derive(Parser, Debug)]
#[command(name = "lemma-search")]
#[command(version)]
#[command(about = "Site crawler with a lemma-keyed search index", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate the configuration and show what would be indexed
    Check,

    /// Crawl every configured site (Ctrl-C stops the run)
    Index,

    /// Re-index a single page of a configured site
    IndexPage {
        /// Absolute page URL
        url: String,
    },

    /// Remove a single page from the index
    DeletePage {
        /// Absolute page URL
        url: String,
    },

    /// Search the index
    Search {
        /// Query text
        query: String,

        /// Root URL of the site to search (default: all sites)
        #[arg(long)]
        site: Option<String>,

        /// Number of results to skip
        #[arg(long, allow_hyphen_values = true)]
        offset: Option<i64>,

        /// Maximum number of results
        #[arg(long, allow_hyphen_values = true)]
        limit: Option<i64>,
    },

    /// Show statistics from the database
    Stats,

    /// Check lemma frequencies against the index
    Verify {
        /// Rewrite mismatched frequencies
        #[arg(long)]
        repair: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    match cli.command {
        Command::Check => handle_check(&config),
        command => {
            let service = SearchService::new(config).context("failed to open the index")?;
            run_command(&service, command).await?;
        }
    }

    Ok(())
}

/// Runs one command against an opened index
async fn run_command(service: &SearchService, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Check => handle_check(service.config()),
        Command::Index => handle_index(service).await?,
        Command::IndexPage { url } => {
            let page = service.index_page(&url).await?;
            println!(
                "✓ Indexed {} (status {}, {} lemmas)",
                page.path, page.status_code, page.lemma_count
            );
        }
        Command::DeletePage { url } => {
            if service.delete_page(&url)? {
                println!("✓ Removed {}", url);
            } else {
                println!("Page not in the index: {}", url);
            }
        }
        Command::Search {
            query,
            site,
            offset,
            limit,
        } => handle_search(service, &query, site.as_deref(), offset, limit)?,
        Command::Stats => print_statistics(&service.get_statistics()?),
        Command::Verify { repair } => handle_verify(service, repair)?,
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("lemma_search=info,warn"),
            1 => EnvFilter::new("lemma_search=debug,info"),
            2 => EnvFilter::new("lemma_search=trace,debug"),
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

/// Handles `check`: shows the validated configuration
fn handle_check(config: &Config) {
    println!("=== lemma-search Configuration ===\n");

    println!("Connection:");
    println!("  User agent: {}", config.connection.user_agent);
    println!("  Referrer: {}", config.connection.referrer);
    println!("  Timeout: {}ms", config.connection.timeout_ms);
    println!(
        "  Delay: {}ms + up to {}ms",
        config.connection.delay_base_ms, config.connection.delay_jitter_ms
    );

    println!("\nSearch:");
    println!("  Frequency cutoff: {}", config.search.frequency_cutoff);
    println!(
        "  Default offset/limit: {}/{}",
        config.search.default_offset, config.search.default_limit
    );
    println!("  Snippet words: {}", config.search.snippet_words);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\nSites ({}):", config.sites.len());
    for site in &config.sites {
        println!("  - {} ({})", site.name, site.url);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles `index`: runs a full crawl until it finishes or Ctrl-C
async fn handle_index(service: &SearchService) -> anyhow::Result<()> {
    service.start_indexing()?;

    let mut interrupted = false;
    while service.is_running() {
        tokio::select! {
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
            signal = tokio::signal::ctrl_c(), if !interrupted => {
                signal.context("failed to listen for Ctrl-C")?;
                tracing::info!("Interrupted; stopping indexing");
                interrupted = true;
                match service.stop_indexing().await {
                    Ok(()) | Err(SearchError::NotRunning) => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }
    }

    if interrupted {
        println!("Indexing stopped\n");
    } else {
        println!("✓ Indexing finished\n");
    }
    print_statistics(&service.get_statistics()?);
    Ok(())
}

/// Handles `search`: prints ranked results
fn handle_search(
    service: &SearchService,
    query: &str,
    site: Option<&str>,
    offset: Option<i64>,
    limit: Option<i64>,
) -> anyhow::Result<()> {
    let results = service.search(query, site, offset, limit)?;

    println!("{} matching pages\n", results.count);
    for item in &results.items {
        let title = if item.title.is_empty() {
            "(untitled)"
        } else {
            item.title.as_str()
        };
        println!("[{:.3}] {}", item.relevance, title);
        println!("  {}{} ({})", item.site, item.uri, item.site_name);
        println!("  {}", item.snippet);
        println!();
    }

    Ok(())
}

/// Handles `verify`: reports and optionally repairs lemma frequencies
fn handle_verify(service: &SearchService, repair: bool) -> anyhow::Result<()> {
    let mismatches = service.verify()?;

    if mismatches.is_empty() {
        println!("✓ All lemma frequencies match the index");
        return Ok(());
    }

    println!("{} lemma frequencies disagree with the index:", mismatches.len());
    for mismatch in &mismatches {
        println!(
            "  site {} '{}': stored {}, indexed on {} pages",
            mismatch.site_id, mismatch.lemma, mismatch.stored, mismatch.actual
        );
    }

    if repair {
        let corrected = service.repair()?;
        println!("\n✓ Repaired {} lemma frequencies", corrected);
    }

    Ok(())
}
