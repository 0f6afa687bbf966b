//! Worker thread logic for the parallel crawl
//!
//! Each worker:
//! - Acquires one pending directory under the shared lock
//! - Runs the caller's enumeration function on it with the lock released
//! - Sends entries to the result channel as soon as they are reported
//! - Publishes buffered sub-directories back into the shared queue
//! - Sends the directory's error, if any, after publishing

use crate::cancel::CancellationToken;
use crate::crawler::state::{Acquire, SharedState};
use crate::error::WorkerError;
use crossbeam_channel::Sender;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, trace};

/// Statistics shared by all workers of one crawl
#[derive(Debug, Default)]
pub struct CrawlStats {
    /// Directories whose enumeration returned (successfully or not)
    pub dirs_processed: AtomicU64,

    /// Entries delivered to the result channel
    pub entries: AtomicU64,

    /// Per-directory errors delivered to the result channel
    pub errors: AtomicU64,

    /// Enumeration calls that panicked (their directory counts as processed)
    pub panics: AtomicU64,
}

impl CrawlStats {
    fn record_dir(&self) {
        self.dirs_processed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_entry(&self) {
        self.entries.fetch_add(1, Ordering::Relaxed);
    }

    fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    fn record_panic(&self) {
        self.panics.fetch_add(1, Ordering::Relaxed);
    }

    /// Directories processed so far
    pub fn dirs(&self) -> u64 {
        self.dirs_processed.load(Ordering::Relaxed)
    }

    /// Entries emitted so far
    pub fn entry_count(&self) -> u64 {
        self.entries.load(Ordering::Relaxed)
    }

    /// Errors emitted so far
    pub fn error_count(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Panicked enumeration calls so far
    pub fn panic_count(&self) -> u64 {
        self.panics.load(Ordering::Relaxed)
    }
}

/// Callbacks handed to the enumeration function for one directory
///
/// Sub-directories are buffered and only become visible to other workers
/// once the enumeration function returns. Entries go to the result channel
/// immediately, in the order they are emitted.
pub struct Discovery<'a, D, T, E> {
    children: &'a mut Vec<D>,
    output: &'a Sender<Result<T, E>>,
    stats: &'a CrawlStats,
    abandoned: bool,
}

impl<'a, D, T, E> Discovery<'a, D, T, E> {
    fn new(
        children: &'a mut Vec<D>,
        output: &'a Sender<Result<T, E>>,
        stats: &'a CrawlStats,
    ) -> Self {
        Self {
            children,
            output,
            stats,
            abandoned: false,
        }
    }

    /// Report a sub-directory to crawl later
    pub fn enqueue_dir(&mut self, dir: D) {
        self.children.push(dir);
    }

    /// Report a leaf entry; blocks while the result channel is full
    pub fn emit(&mut self, entry: T) {
        if self.abandoned {
            return;
        }
        match self.output.send(Ok(entry)) {
            Ok(()) => self.stats.record_entry(),
            Err(_) => self.abandoned = true,
        }
    }

    /// True once the consumer has dropped the result stream
    ///
    /// Further entries are discarded; enumeration functions may return early.
    pub fn is_abandoned(&self) -> bool {
        self.abandoned
    }
}

/// One in-flight slot; publishes its children when dropped
///
/// Releasing on drop keeps the in-flight count exact on every exit path,
/// including an unwind that escapes the worker loop.
struct InFlightSlot<'a, D> {
    state: &'a SharedState<D>,
    children: Vec<D>,
}

impl<'a, D> InFlightSlot<'a, D> {
    fn new(state: &'a SharedState<D>) -> Self {
        Self {
            state,
            children: Vec::with_capacity(16),
        }
    }
}

impl<D> Drop for InFlightSlot<'_, D> {
    fn drop(&mut self) {
        self.state.release(std::mem::take(&mut self.children));
    }
}

/// Everything a worker thread needs, shared across the pool
pub(crate) struct WorkerContext<D, T, E, F> {
    pub state: Arc<SharedState<D>>,
    pub cancel: CancellationToken,
    pub enumerate: Arc<F>,
    pub output: Sender<Result<T, E>>,
    pub stats: Arc<CrawlStats>,
}

/// A worker thread that processes directories until the crawl ends
pub struct Worker {
    /// Worker ID
    id: usize,

    /// Thread handle
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawn a new worker thread
    pub(crate) fn spawn<D, T, E, F>(
        id: usize,
        ctx: WorkerContext<D, T, E, F>,
    ) -> Result<Self, WorkerError>
    where
        D: Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
        F: Fn(D, &mut Discovery<'_, D, T, E>) -> Result<(), E> + Send + Sync + 'static,
    {
        let handle = thread::Builder::new()
            .name(format!("crawler-{}", id))
            .spawn(move || worker_loop(id, ctx))
            .map_err(|e| WorkerError::SpawnFailed {
                id,
                reason: e.to_string(),
            })?;

        Ok(Self {
            id,
            handle: Some(handle),
        })
    }

    /// Get worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Wait for the worker to finish
    pub fn join(mut self) -> Result<(), WorkerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|payload| WorkerError::Panicked {
                id: self.id,
                message: panic_message(payload.as_ref()),
            }),
            None => Ok(()),
        }
    }
}

/// Main worker loop: Acquiring -> Processing -> Publishing, until Done
fn worker_loop<D, T, E, F>(id: usize, ctx: WorkerContext<D, T, E, F>)
where
    F: Fn(D, &mut Discovery<'_, D, T, E>) -> Result<(), E>,
{
    debug!(worker = id, "Worker starting");

    let mut dirs = 0u64;
    let mut errors = 0u64;
    let mut panics = 0u64;

    while !ctx.state.should_stop(&ctx.cancel) {
        let dir = match ctx.state.try_acquire(&ctx.cancel) {
            Acquire::Work(dir) => dir,
            Acquire::Finished | Acquire::Stopped => break,
        };

        let (result, children, abandoned) = {
            let mut slot = InFlightSlot::new(ctx.state.as_ref());
            let mut discovery = Discovery::new(&mut slot.children, &ctx.output, &ctx.stats);
            // A panic costs this directory only: children reported before it
            // are still published and the worker keeps going
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                (*ctx.enumerate)(dir, &mut discovery)
            }));
            let abandoned = discovery.is_abandoned();
            (result, slot.children.len(), abandoned)
            // slot drops here: children published, in-flight decremented
        };

        dirs += 1;
        ctx.stats.record_dir();
        trace!(
            worker = id,
            children = children,
            ok = matches!(result, Ok(Ok(()))),
            "Directory processed"
        );

        if abandoned {
            debug!(worker = id, "Result stream dropped, halting crawl");
            ctx.state.halt();
            break;
        }

        let result = match result {
            Ok(result) => result,
            Err(payload) => {
                panics += 1;
                ctx.stats.record_panic();
                error!(
                    worker = id,
                    message = %panic_message(payload.as_ref()),
                    "Enumeration panicked, directory skipped"
                );
                continue;
            }
        };

        if let Err(e) = result {
            // One bad directory does not stop the crawl
            errors += 1;
            if ctx.output.send(Err(e)).is_err() {
                ctx.state.halt();
                break;
            }
            ctx.stats.record_error();
        }
    }

    debug!(
        worker = id,
        dirs = dirs,
        errors = errors,
        panics = panics,
        "Worker shutting down"
    );
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_crawl_stats() {
        let stats = CrawlStats::default();

        stats.record_dir();
        stats.record_entry();
        stats.record_entry();
        stats.record_error();
        stats.record_panic();

        assert_eq!(stats.dirs(), 1);
        assert_eq!(stats.entry_count(), 2);
        assert_eq!(stats.error_count(), 1);
        assert_eq!(stats.panic_count(), 1);
    }

    #[test]
    fn test_discovery_buffers_dirs_and_streams_entries() {
        let (tx, rx) = unbounded::<Result<&str, ()>>();
        let stats = CrawlStats::default();
        let mut children = Vec::new();

        let mut discovery = Discovery::new(&mut children, &tx, &stats);
        discovery.enqueue_dir(7u32);
        discovery.emit("first");
        discovery.enqueue_dir(8);
        discovery.emit("second");
        assert!(!discovery.is_abandoned());

        assert_eq!(children, vec![7, 8]);
        assert_eq!(rx.try_recv().unwrap(), Ok("first"));
        assert_eq!(rx.try_recv().unwrap(), Ok("second"));
        assert_eq!(stats.entry_count(), 2);
    }

    #[test]
    fn test_discovery_detects_dropped_consumer() {
        let (tx, rx) = unbounded::<Result<u8, ()>>();
        drop(rx);
        let stats = CrawlStats::default();
        let mut children: Vec<u8> = Vec::new();

        let mut discovery = Discovery::new(&mut children, &tx, &stats);
        discovery.emit(1);
        assert!(discovery.is_abandoned());
        assert_eq!(stats.entry_count(), 0);
    }

    #[test]
    fn test_slot_releases_on_drop() {
        let state = SharedState::new(4);
        let cancel = CancellationToken::new();
        state.seed(0u32);
        assert_eq!(state.try_acquire(&cancel), Acquire::Work(0));

        {
            let mut slot = InFlightSlot::new(&state);
            slot.children.push(1);
        }

        assert_eq!(state.in_flight(), 0);
        assert_eq!(state.pending_len(), 1);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");

        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }
}
