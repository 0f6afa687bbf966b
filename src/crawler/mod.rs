//! Parallel tree crawler
//!
//! Crawls a tree whose shape is only discovered while crawling. A pool of
//! worker threads shares one pending queue; each worker lists a directory
//! with the caller's enumeration function, streams entries to the result
//! channel and feeds sub-directories back into the queue.
//!
//! # Architecture
//!
//! ```text
//!                  ┌──────────────────────────────┐
//!   seed(root) ──▶ │ SharedState                  │ ◀── Heartbeat
//!                  │  pending queue + in-flight   │     (periodic wake)
//!                  │  Mutex + Condvar             │
//!                  └──────────────┬───────────────┘
//!            try_acquire ▲        │        ▲ release(children)
//!       ┌────────────────┼────────┼────────┼───────────────┐
//!  ┌────┴─────┐    ┌─────┴────┐   │   ┌────┴─────┐
//!  │ Worker 1 │    │ Worker 2 │  ...  │ Worker N │   enumerate(dir) runs
//!  └────┬─────┘    └────┬─────┘       └────┬─────┘   with the lock released
//!       └───────────────┼──────────────────┘
//!                       ▼
//!          result channel (crossbeam bounded)
//!                       │
//!                       ▼
//!               CrawlStream (Iterator)
//! ```
//!
//! The crawl ends when a worker sees an empty queue and zero directories in
//! flight under one lock acquisition. The coordinator thread then joins the
//! pool, stops the heartbeat and closes the result channel.
//!
//! Cancellation is cooperative: it takes effect between work units, never
//! within one. A cancelled crawl simply ends early; no error is emitted for
//! it, so check [`CancellationToken::is_cancelled`] to tell the cases apart.
//!
//! A panic inside the enumeration function is caught by the worker. Children
//! reported before the panic are still crawled; the panic is counted in
//! [`CrawlStream::panic_count`] rather than sent on the stream.

pub mod heartbeat;
pub mod state;
pub mod worker;

pub use heartbeat::Heartbeat;
pub use state::{Acquire, QueueStats, SharedState};
pub use worker::{CrawlStats, Discovery, Worker};

use crate::cancel::CancellationToken;
use crate::config::CrawlConfig;
use crate::error::{Result, WorkerError};
use crossbeam_channel::{bounded, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info};
use worker::WorkerContext;

/// Type-erased view of the shared state for the stream handle
trait StateProbe: Send + Sync {
    fn pending_len(&self) -> usize;
    fn in_flight(&self) -> usize;
    fn queue_stats(&self) -> QueueStats;
    fn halt(&self);
}

impl<D: Send> StateProbe for SharedState<D> {
    fn pending_len(&self) -> usize {
        SharedState::pending_len(self)
    }

    fn in_flight(&self) -> usize {
        SharedState::in_flight(self)
    }

    fn queue_stats(&self) -> QueueStats {
        SharedState::queue_stats(self)
    }

    fn halt(&self) {
        SharedState::halt(self)
    }
}

/// Runs crawls with a fixed configuration
#[derive(Debug, Clone)]
pub struct Crawler {
    config: CrawlConfig,
}

impl Crawler {
    /// Create a crawler; fails if the configuration is out of range
    pub fn new(config: CrawlConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Start crawling from `root` in the background
    ///
    /// `enumerate` is called once per directory, possibly from several
    /// threads at once with different directories. It reports children and
    /// entries through the [`Discovery`] it is given; an error it returns is
    /// delivered on the stream and does not stop the crawl.
    ///
    /// The returned stream yields entries and errors as they are produced
    /// and ends once the crawl is complete or cancelled. Dropping it early
    /// halts the crawl.
    pub fn crawl<D, T, E, F>(
        &self,
        cancel: &CancellationToken,
        root: D,
        enumerate: F,
    ) -> Result<CrawlStream<T, E>>
    where
        D: Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
        F: Fn(D, &mut Discovery<'_, D, T, E>) -> std::result::Result<(), E>
            + Send
            + Sync
            + 'static,
    {
        let started = Instant::now();
        let parallelism = self.config.parallelism;

        let state = Arc::new(SharedState::new(self.config.queue_capacity));
        state.seed(root);

        let (output_tx, output_rx) = bounded(self.config.output_capacity);
        let stats = Arc::new(CrawlStats::default());
        let enumerate = Arc::new(enumerate);

        let heartbeat = {
            let state = Arc::clone(&state);
            Heartbeat::start(self.config.heartbeat_interval, move || state.wake_all())
        }
        .map_err(|e| WorkerError::SupportThreadFailed {
            role: "heartbeat",
            reason: e.to_string(),
        })?;

        info!(
            workers = parallelism,
            queue_capacity = self.config.queue_capacity,
            output_capacity = self.config.output_capacity,
            heartbeat_ms = self.config.heartbeat_interval.as_millis() as u64,
            "Starting crawl"
        );

        let mut workers = Vec::with_capacity(parallelism);
        for id in 0..parallelism {
            let ctx = WorkerContext {
                state: Arc::clone(&state),
                cancel: cancel.clone(),
                enumerate: Arc::clone(&enumerate),
                output: output_tx.clone(),
                stats: Arc::clone(&stats),
            };

            match Worker::spawn(id, ctx) {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    error!(worker = id, error = %e, "Failed to spawn worker, abandoning crawl");
                    state.halt();
                    // Unblock anyone waiting on a full channel
                    drop(output_rx);
                    join_workers(workers);
                    heartbeat.stop();
                    return Err(e.into());
                }
            }
        }

        let coordinator = {
            let state = Arc::clone(&state);
            let stats = Arc::clone(&stats);
            let cancel = cancel.clone();

            thread::Builder::new()
                .name("crawl-coordinator".into())
                .spawn(move || {
                    join_workers(workers);
                    heartbeat.stop();
                    // Last sender: the result channel closes here, once
                    drop(output_tx);

                    let queue = state.queue_stats();
                    info!(
                        dirs = stats.dirs(),
                        entries = stats.entry_count(),
                        errors = stats.error_count(),
                        panics = stats.panic_count(),
                        unvisited = state.pending_len(),
                        peak_pending = queue.peak_pending,
                        cancelled = cancel.is_cancelled() || state.is_halted(),
                        duration_ms = started.elapsed().as_millis() as u64,
                        "Crawl complete"
                    );
                })
        };

        let coordinator = match coordinator {
            Ok(handle) => handle,
            Err(e) => {
                // The closure (workers, heartbeat, sender) was dropped with it
                state.halt();
                return Err(WorkerError::SupportThreadFailed {
                    role: "coordinator",
                    reason: e.to_string(),
                }
                .into());
            }
        };

        Ok(CrawlStream {
            receiver: output_rx,
            stats,
            probe: state,
            coordinator: Some(coordinator),
            parallelism,
            started,
        })
    }
}

/// Start a crawl with `parallelism` workers and default capacities
///
/// See [`Crawler::crawl`].
pub fn crawl<D, T, E, F>(
    cancel: &CancellationToken,
    root: D,
    enumerate: F,
    parallelism: usize,
) -> Result<CrawlStream<T, E>>
where
    D: Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
    F: Fn(D, &mut Discovery<'_, D, T, E>) -> std::result::Result<(), E> + Send + Sync + 'static,
{
    Crawler::new(CrawlConfig::new(parallelism))?.crawl(cancel, root, enumerate)
}

/// Join every worker, logging the ones that panicked
fn join_workers(workers: Vec<Worker>) -> usize {
    let mut failed = 0;
    for worker in workers {
        let id = worker.id();
        if let Err(e) = worker.join() {
            failed += 1;
            error!(worker = id, error = %e, "Worker failed");
        }
    }
    failed
}

/// Results of a running crawl, in the order workers produced them
///
/// Iteration blocks until the next result is available and ends when the
/// crawl is over. Entries from one directory keep their emit order; across
/// directories they interleave freely.
pub struct CrawlStream<T, E> {
    receiver: Receiver<std::result::Result<T, E>>,
    stats: Arc<CrawlStats>,
    probe: Arc<dyn StateProbe>,
    coordinator: Option<JoinHandle<()>>,
    parallelism: usize,
    started: Instant,
}

impl<T, E> CrawlStream<T, E> {
    /// Underlying channel, for use with `crossbeam_channel::select!`
    pub fn receiver(&self) -> &Receiver<std::result::Result<T, E>> {
        &self.receiver
    }

    /// Whether the crawl has finished and the channel is closed
    ///
    /// Buffered results may still be waiting to be read.
    pub fn is_finished(&self) -> bool {
        self.coordinator.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Snapshot of crawl progress
    pub fn progress(&self) -> CrawlProgress {
        CrawlProgress {
            dirs: self.stats.dirs(),
            entries: self.stats.entry_count(),
            errors: self.stats.error_count(),
            panics: self.stats.panic_count(),
            pending: self.probe.pending_len(),
            in_flight: self.probe.in_flight(),
            total_workers: self.parallelism,
            elapsed: self.started.elapsed(),
        }
    }

    /// Enumeration calls that panicked so far
    ///
    /// A panic skips the rest of that one directory; the crawl carries on.
    pub fn panic_count(&self) -> u64 {
        self.stats.panic_count()
    }

    /// Queue traffic counters so far
    pub fn queue_stats(&self) -> QueueStats {
        self.probe.queue_stats()
    }
}

impl<T, E> Iterator for CrawlStream<T, E> {
    type Item = std::result::Result<T, E>;

    fn next(&mut self) -> Option<Self::Item> {
        self.receiver.recv().ok()
    }
}

impl<T, E> Drop for CrawlStream<T, E> {
    fn drop(&mut self) {
        if !self.is_finished() {
            self.probe.halt();
        }
    }
}

/// Progress information for display
#[derive(Debug, Clone, Default)]
pub struct CrawlProgress {
    /// Directories processed
    pub dirs: u64,

    /// Entries emitted
    pub entries: u64,

    /// Directory errors emitted
    pub errors: u64,

    /// Directories whose enumeration panicked (no error is emitted for them)
    pub panics: u64,

    /// Directories waiting in the queue
    pub pending: usize,

    /// Directories being listed right now
    pub in_flight: usize,

    /// Total workers
    pub total_workers: usize,

    /// Elapsed time
    pub elapsed: Duration,
}

impl CrawlProgress {
    /// Calculate entries per second rate
    pub fn entries_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.entries as f64 / secs
        } else {
            0.0
        }
    }

    /// Calculate dirs per second rate
    pub fn dirs_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.dirs as f64 / secs
        } else {
            0.0
        }
    }
}
