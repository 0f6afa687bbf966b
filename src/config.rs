//! Configuration types for tree-crawler
//!
//! This module defines:
//! - Runtime crawl configuration with validation
//! - CLI argument parsing for the `tree-crawl` binary using clap derive macros
//! - Conversion from CLI arguments into validated options

use crate::error::ConfigError;
use crate::fs::LocalLister;
use clap::Parser;
use regex::Regex;
use std::path::PathBuf;
use std::time::Duration;

/// Maximum reasonable worker count
pub const MAX_WORKERS: usize = 512;

/// Default soft capacity of the pending directory queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Default capacity of the result channel
pub const DEFAULT_OUTPUT_CAPACITY: usize = 1000;

/// Default interval between heartbeat broadcasts
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(10);

/// Validated runtime configuration for one crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlConfig {
    /// Number of worker threads
    pub parallelism: usize,

    /// Soft capacity of the pending queue (preallocated, never blocks)
    pub queue_capacity: usize,

    /// Result channel capacity; a full channel blocks emitting workers
    pub output_capacity: usize,

    /// Interval of the safety-net wake-up broadcast
    pub heartbeat_interval: Duration,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self::new(default_workers())
    }
}

impl CrawlConfig {
    /// Configuration with `parallelism` workers and default capacities
    pub fn new(parallelism: usize) -> Self {
        Self {
            parallelism,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            output_capacity: DEFAULT_OUTPUT_CAPACITY,
            heartbeat_interval: DEFAULT_HEARTBEAT,
        }
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_output_capacity(mut self, capacity: usize) -> Self {
        self.output_capacity = capacity;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Check every field against its limits
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.parallelism == 0 || self.parallelism > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: self.parallelism,
                max: MAX_WORKERS,
            });
        }

        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidQueueSize {
                size: self.queue_capacity,
                min: 1,
            });
        }

        if self.output_capacity == 0 {
            return Err(ConfigError::InvalidOutputCapacity {
                size: self.output_capacity,
                min: 1,
            });
        }

        if self.heartbeat_interval.is_zero() {
            return Err(ConfigError::InvalidHeartbeat);
        }

        Ok(())
    }
}

/// Parallel directory crawler
#[derive(Parser, Debug, Clone)]
#[command(
    name = "tree-crawl",
    version,
    about = "Parallel directory crawler",
    long_about = "Crawls a local directory tree with a pool of worker threads.\n\n\
                  Each directory is listed exactly once; files are streamed as they are found\n\
                  and unreadable directories are reported without stopping the crawl.",
    after_help = "EXAMPLES:\n    \
        tree-crawl /data\n    \
        tree-crawl /data -w 32 --exclude '\\.snapshot'\n    \
        tree-crawl /home -d 3 --list -q"
)]
pub struct CliArgs {
    /// Directory to crawl
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,

    /// Number of worker threads
    #[arg(
        short = 'w',
        long,
        default_value_t = default_workers(),
        value_name = "NUM"
    )]
    pub workers: usize,

    /// Pending directory queue capacity
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY, value_name = "NUM")]
    pub queue_size: usize,

    /// Result channel capacity
    #[arg(long, default_value_t = DEFAULT_OUTPUT_CAPACITY, value_name = "NUM")]
    pub output_capacity: usize,

    /// Seconds between heartbeat wake-ups
    #[arg(long, default_value = "10", value_name = "SECS")]
    pub heartbeat_secs: u64,

    /// Maximum directory depth (unlimited if not set)
    #[arg(short = 'd', long, value_name = "NUM")]
    pub max_depth: Option<usize>,

    /// Exclude paths matching pattern (can be repeated)
    #[arg(long = "exclude", value_name = "PATTERN", action = clap::ArgAction::Append)]
    pub exclude_patterns: Vec<String>,

    /// Descend into symlinked directories (no cycle detection)
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Print every entry path to stdout
    #[arg(short = 'l', long)]
    pub list: bool,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output (show per-directory errors and debug logs)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

fn default_workers() -> usize {
    // Listing is I/O bound
    (num_cpus::get() * 2).min(MAX_WORKERS)
}

/// Validated options for one `tree-crawl` run
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Directory to start from
    pub root: PathBuf,

    /// Engine configuration
    pub crawl: CrawlConfig,

    /// Filesystem enumeration settings
    pub lister: LocalLister,

    /// Show progress indicator
    pub show_progress: bool,

    /// Print entry paths
    pub list: bool,

    /// Verbose logging
    pub verbose: bool,
}

impl WalkOptions {
    /// Create and validate options from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        if !args.root.is_dir() {
            return Err(ConfigError::InvalidRoot {
                path: args.root.clone(),
                reason: "not a directory or not accessible".into(),
            });
        }

        let crawl = CrawlConfig::new(args.workers)
            .with_queue_capacity(args.queue_size)
            .with_output_capacity(args.output_capacity)
            .with_heartbeat_interval(Duration::from_secs(args.heartbeat_secs));
        crawl.validate()?;

        // Compile exclude patterns
        let exclude_patterns = args
            .exclude_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| ConfigError::InvalidExcludePattern {
                    pattern: p.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let lister = LocalLister::new()
            .with_max_depth(args.max_depth)
            .with_exclude_patterns(exclude_patterns)
            .with_follow_symlinks(args.follow_symlinks);

        Ok(Self {
            root: args.root,
            crawl,
            lister,
            show_progress: !args.quiet,
            list: args.list,
            verbose: args.verbose,
        })
    }
}
