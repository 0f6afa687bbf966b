//! tree-crawler - Parallel Tree Crawling Engine
//!
//! Crawls a tree of "directories" whose shape is unknown in advance. The
//! caller supplies the root and a function that lists one directory; the
//! engine runs that function on a bounded pool of worker threads, visits
//! every reachable directory exactly once, and streams leaf entries and
//! per-directory errors back as soon as they are found.
//!
//! # Features
//!
//! - **Exact termination**: the crawl ends when the pending queue is empty
//!   and no directory is in flight, observed atomically under one lock.
//!
//! - **Fault isolation**: an error listing one directory is delivered on
//!   the stream and never stops the rest of the crawl; a panic is caught,
//!   counted and costs only that directory.
//!
//! - **Cooperative cancellation**: checked between work units and on every
//!   wake-up; a heartbeat bounds how long a parked worker can miss it.
//!
//! - **Backpressure**: results flow through a bounded channel, so a slow
//!   consumer slows the workers instead of growing memory.
//!
//! # Example
//!
//! ```no_run
//! use tree_crawler::{crawl, CancellationToken, LocalDir, LocalLister};
//!
//! let lister = LocalLister::new();
//! let cancel = CancellationToken::new();
//! let stream = crawl(
//!     &cancel,
//!     LocalDir::root("/data"),
//!     move |dir, out| lister.enumerate(dir, out),
//!     8,
//! )?;
//!
//! for result in stream {
//!     match result {
//!         Ok(entry) => println!("{}", entry.path.display()),
//!         Err(e) => eprintln!("{e}"),
//!     }
//! }
//! # Ok::<(), tree_crawler::WalkerError>(())
//! ```

pub mod cancel;
pub mod config;
pub mod crawler;
pub mod error;
pub mod fs;
pub mod progress;

pub use cancel::CancellationToken;
pub use config::{CliArgs, CrawlConfig, WalkOptions};
pub use crawler::{crawl, CrawlProgress, CrawlStream, Crawler, Discovery};
pub use error::{ConfigError, ListError, Result, WalkerError, WorkerError};
pub use fs::{EntryKind, LocalDir, LocalEntry, LocalLister};
