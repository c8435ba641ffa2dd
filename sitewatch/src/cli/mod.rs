//! CLI module for sitewatch
//!
//! Provides command-line interface for the website health watcher.

pub mod check;
pub mod lookup;
pub mod targets;
pub mod watch;

use clap::{Parser, Subcommand};

/// sitewatch - Periodic availability and latency checks for registered websites
#[derive(Parser, Debug)]
#[command(name = "sitewatch")]
#[command(version, about, long_about = None)]
#[command(after_help = r#"ENVIRONMENT VARIABLES:
    SITEWATCH_WATCH_PERIOD_SECS   Seconds between batches (default: 300)
    SITEWATCH_WORKERS             Concurrent probes per batch (default: 20)
    SITEWATCH_PROBE_TIMEOUT_SECS  Per-probe timeout (default: 10)
    SITEWATCH_CACHE_TAG           Cache tag invalidated after each batch (default: website)
    SITEWATCH_CACHE_TTL_SECS      Lifetime of cached lookups (default: 60)
    SITEWATCH_DATABASE_URL        Database URL (default: sqlite://sitewatch.db?mode=rwc)
    SITEWATCH_ON_BATCH_FAILURE    abort | continue (default: abort)
    SITEWATCH_LOG_LEVEL           Log filter (default: info)
    SITEWATCH_LOG_DIR             Directory for JSON log files (default: logs)
"#)]
pub struct Cli {
    /// Subcommand to execute (defaults to `watch`)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run batches periodically until interrupted
    Watch(watch::WatchArgs),
    /// Probe a single URL once and print the result as JSON
    Check(check::CheckArgs),
    /// Register websites to watch
    Add(targets::AddArgs),
    /// Unregister websites
    Remove(targets::RemoveArgs),
    /// List registered websites with their latest result
    List(targets::ListArgs),
    /// Print the available website with the lowest latency
    Fastest,
    /// Print the available website with the highest latency
    Slowest,
    /// Print the latest result for a URL, checking it once if not registered
    Get(lookup::GetArgs),
}
