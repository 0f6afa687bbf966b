//! Progress reporting for the crawler CLI
//!
//! Provides real-time progress display using indicatif progress bars.

use crate::crawler::CrawlProgress;
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress reporter that displays crawl status
pub struct ProgressReporter {
    /// Progress bar
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        if let Ok(spinner) = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
        {
            bar.set_style(spinner.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
        }

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update the progress display
    pub fn update(&self, progress: &CrawlProgress, bytes: u64) {
        self.bar.set_message(format_progress(progress, bytes));
    }

    /// Print a line above the spinner
    pub fn println(&self, line: &str) {
        self.bar.println(line);
    }

    /// Finish the progress display with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

fn format_progress(progress: &CrawlProgress, bytes: u64) -> String {
    format!(
        "Dirs: {} | Entries: {} | Size: {} | Rate: {:.0}/s | Queue: {} | Active: {}/{}",
        format_number(progress.dirs),
        format_number(progress.entries),
        format_size(bytes, BINARY),
        progress.entries_per_second(),
        progress.pending,
        progress.in_flight,
        progress.total_workers,
    )
}

/// Format a number with thousands separators
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut out = String::with_capacity(s.len() + s.len() / 3);
    for (i, ch) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Totals printed once the crawl is over
#[derive(Debug, Clone, Default)]
pub struct CrawlSummary {
    pub dirs: u64,
    pub entries: u64,
    pub bytes: u64,
    pub errors: u64,
    pub duration: Duration,
    pub cancelled: bool,
}

/// Print a summary of the crawl results
pub fn print_summary(summary: &CrawlSummary) {
    let duration_secs = summary.duration.as_secs_f64();
    let rate = if duration_secs > 0.0 {
        summary.entries as f64 / duration_secs
    } else {
        0.0
    };

    let title = if summary.cancelled {
        style("Crawl Cancelled").yellow().bold()
    } else {
        style("Crawl Complete").green().bold()
    };

    println!();
    println!("{}", title);
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Directories:").bold(), format_number(summary.dirs));
    println!("  {} {}", style("Entries:").bold(), format_number(summary.entries));
    println!("  {} {}", style("Total Size:").bold(), format_size(summary.bytes, BINARY));
    println!(
        "  {} {:.1}s ({:.0} entries/sec)",
        style("Duration:").bold(),
        duration_secs,
        rate
    );
    if summary.errors > 0 {
        println!(
            "  {} {}",
            style("Errors:").yellow().bold(),
            format_number(summary.errors)
        );
    }
    println!();
}

/// Print a header at the start of the crawl
pub fn print_header(root: &str, workers: usize) {
    println!();
    println!(
        "{} {}",
        style("tree-crawl").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Root:").bold(), root);
    println!("  {} {}", style("Workers:").bold(), workers);
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
        assert_eq!(format_number(1234567890), "1,234,567,890");
    }

    #[test]
    fn test_format_progress() {
        let progress = CrawlProgress {
            dirs: 1200,
            entries: 5000,
            errors: 0,
            panics: 0,
            pending: 7,
            in_flight: 3,
            total_workers: 8,
            elapsed: Duration::from_secs(5),
        };
        let line = format_progress(&progress, 2048);

        assert!(line.contains("Dirs: 1,200"));
        assert!(line.contains("Entries: 5,000"));
        assert!(line.contains("2 KiB"));
        assert!(line.contains("Rate: 1000/s"));
        assert!(line.contains("Active: 3/8"));
    }
}
