//! tree-crawl - Parallel Directory Crawler
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tree_crawler::config::{CliArgs, WalkOptions};
use tree_crawler::progress::{print_header, print_summary, CrawlSummary, ProgressReporter};
use tree_crawler::{CancellationToken, Crawler, LocalDir};

/// Minimum time between progress bar refreshes
const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.verbose)?;

    // Validate and create options
    let opts = WalkOptions::from_args(args).context("Invalid configuration")?;

    if opts.show_progress {
        print_header(&opts.root.display().to_string(), opts.crawl.parallelism);
    }

    // Setup signal handler for graceful shutdown
    let cancel = CancellationToken::new();
    let shutdown_flag = cancel.flag();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, shutting down...");
        shutdown_flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    let crawler = Crawler::new(opts.crawl.clone()).context("Failed to initialize crawler")?;
    let lister = opts.lister.clone();

    let start = Instant::now();
    let mut stream = crawler
        .crawl(&cancel, LocalDir::root(&opts.root), move |dir, out| {
            lister.enumerate(dir, out)
        })
        .context("Failed to start crawl")?;

    let progress = opts.show_progress.then(ProgressReporter::new);
    let mut bytes = 0u64;
    let mut last_update = Instant::now();

    while let Some(result) = stream.next() {
        match result {
            Ok(entry) => {
                bytes += entry.size;
                if opts.list {
                    match &progress {
                        Some(p) => p.println(&entry.path.display().to_string()),
                        None => println!("{}", entry.path.display()),
                    }
                }
            }
            Err(e) => {
                if e.is_recoverable() {
                    info!(path = %e.path().display(), error = %e, "Directory skipped");
                } else {
                    warn!(path = %e.path().display(), error = %e, "Directory failed");
                }
            }
        }

        if let Some(p) = &progress {
            if last_update.elapsed() >= PROGRESS_INTERVAL {
                p.update(&stream.progress(), bytes);
                last_update = Instant::now();
            }
        }
    }

    let cancelled = cancel.is_cancelled();
    let snapshot = stream.progress();

    if let Some(p) = &progress {
        if cancelled {
            p.finish("Crawl interrupted");
        } else {
            p.finish("Crawl completed");
        }
    }

    if opts.show_progress {
        print_summary(&CrawlSummary {
            dirs: snapshot.dirs,
            entries: snapshot.entries,
            bytes,
            errors: snapshot.errors,
            duration: start.elapsed(),
            cancelled,
        });
    }

    if cancelled {
        info!("Crawl was interrupted before completion");
    }

    if snapshot.errors > 0 {
        info!(errors = snapshot.errors, "Crawl completed with errors");
    }

    if snapshot.panics > 0 {
        warn!(panics = snapshot.panics, "Some directories could not be listed");
    }

    Ok(())
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("tree_crawler=debug,tree_crawl=debug,warn")
    } else {
        EnvFilter::new("tree_crawler=info,tree_crawl=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
