//! bibnotes - Bibliographic DOI Resolution & Cross-Linked Notes Pipeline
//!
//! Resolves the DOIs cited by a folder of bibliographic records against
//! the Crossref works API, maintains a persistent title cache, and writes
//! one cross-linked markdown note per record.
//!
//! ## Usage
//!
//! ```bash
//! bibnotes generate --records JSON_folder --notes md_folder
//! bibnotes resolve --records JSON_folder --sequential
//! bibnotes cache stats
//! ```

use anyhow::{Context, Result};
use bibnotes::cache::TitleCache;
use bibnotes::pipeline::{self, PipelineConfig};
use bibnotes::resolver::ResolutionMode;
use bibnotes::scheduler::DEFAULT_CHUNK_SIZE;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Bibliographic DOI Resolution & Cross-Linked Notes Pipeline
#[derive(Parser)]
#[command(name = "bibnotes")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve cited DOIs and write cross-linked markdown notes
    Generate {
        /// Directory of record JSON files
        #[arg(long, default_value = "JSON_folder")]
        records: PathBuf,

        /// Output directory for markdown notes
        #[arg(long, default_value = "md_folder")]
        notes: PathBuf,

        /// DOI title cache file
        #[arg(long, default_value = "doi_title_cache.json")]
        cache: PathBuf,

        /// Resolve one DOI at a time instead of using the bounded pool
        #[arg(long)]
        sequential: bool,

        /// DOIs per resolution chunk
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,

        /// Re-attempt DOIs cached as unresolved
        #[arg(long)]
        retry_unresolved: bool,
    },

    /// Resolve cited DOIs into the cache without writing notes
    Resolve {
        /// Directory of record JSON files
        #[arg(long, default_value = "JSON_folder")]
        records: PathBuf,

        /// DOI title cache file
        #[arg(long, default_value = "doi_title_cache.json")]
        cache: PathBuf,

        /// Resolve one DOI at a time instead of using the bounded pool
        #[arg(long)]
        sequential: bool,

        /// DOIs per resolution chunk
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,

        /// Re-attempt DOIs cached as unresolved
        #[arg(long)]
        retry_unresolved: bool,
    },

    /// Inspect or maintain the title cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show entry counts
    Stats {
        /// DOI title cache file
        #[arg(long, default_value = "doi_title_cache.json")]
        cache: PathBuf,
    },
    /// Drop entries recorded as unresolved so they become candidates again
    ClearUnresolved {
        /// DOI title cache file
        #[arg(long, default_value = "doi_title_cache.json")]
        cache: PathBuf,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .init();

    match cli.command {
        Commands::Generate {
            records,
            notes,
            cache,
            sequential,
            chunk_size,
            retry_unresolved,
        } => {
            let config =
                build_config(records, notes, cache, sequential, chunk_size, retry_unresolved);
            let summary = pipeline::run(&config).await.context("Pipeline run failed")?;
            print_reports(&summary);
            println!("Notes written: {}", summary.notes_written);
            Ok(())
        }
        Commands::Resolve {
            records,
            cache,
            sequential,
            chunk_size,
            retry_unresolved,
        } => {
            // notes dir unused on this path
            let config = build_config(
                records,
                PathBuf::new(),
                cache,
                sequential,
                chunk_size,
                retry_unresolved,
            );
            let summary = pipeline::resolve_only(&config)
                .await
                .context("Resolution run failed")?;
            print_reports(&summary);
            Ok(())
        }
        Commands::Cache { action } => handle_cache(action),
    }
}

fn build_config(
    records: PathBuf,
    notes: PathBuf,
    cache: PathBuf,
    sequential: bool,
    chunk_size: usize,
    retry_unresolved: bool,
) -> PipelineConfig {
    let mut config = PipelineConfig::new(records, notes, cache);
    config.mode = if sequential {
        ResolutionMode::Sequential
    } else {
        ResolutionMode::Concurrent
    };
    config.chunk_size = chunk_size;
    config.retry_unresolved = retry_unresolved;
    config
}

fn print_reports(summary: &pipeline::PipelineSummary) {
    for report in &summary.chunk_reports {
        println!(
            "Chunk {}/{}: {} resolved, {} unresolved ({:.1}s)",
            report.index,
            report.total_chunks,
            report.resolved,
            report.unresolved,
            report.elapsed.as_secs_f64()
        );
    }
    println!("Records processed: {}", summary.records);
    println!("Cited DOIs: {}", summary.cited_dois);
    println!(
        "Cache: {} resolved / {} entries",
        summary.resolved_titles, summary.cache_entries
    );
}

// ============================================================================
// Cache Maintenance
// ============================================================================

fn handle_cache(action: CacheAction) -> Result<()> {
    match action {
        CacheAction::Stats { cache } => {
            let cache = TitleCache::open(&cache);
            println!("Cache file: {}", cache.path().display());
            println!(
                "{} entries ({} resolved, {} unresolved)",
                cache.len(),
                cache.resolved_count(),
                cache.len() - cache.resolved_count()
            );
            Ok(())
        }
        CacheAction::ClearUnresolved { cache } => {
            let mut cache = TitleCache::open(&cache);
            let removed = cache.clear_unresolved();
            cache.flush().context("Failed to write cache")?;
            println!("Removed {} unresolved entries", removed);
            Ok(())
        }
    }
}
