//! Shared crawl state and the termination protocol
//!
//! One mutex guards both the pending queue and the in-flight counter. The
//! crawl is over only when a worker observes, under a single acquisition of
//! that lock, an empty queue together with zero directories in flight. Every
//! mutation broadcasts on the condition variable so that all parked workers
//! re-evaluate that predicate.

use crate::cancel::CancellationToken;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, warn};

/// Outcome of trying to acquire a directory
#[derive(Debug, PartialEq, Eq)]
pub enum Acquire<D> {
    /// A directory to process; the caller now owns one in-flight slot
    Work(D),

    /// Queue empty and nothing in flight: no more work will ever appear
    Finished,

    /// Cancellation was requested, or the crawl was halted
    Stopped,
}

/// Counters describing queue traffic over the life of a crawl
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Directories pushed into the queue (root included)
    pub enqueued: u64,

    /// Directories handed to workers
    pub dequeued: u64,

    /// Largest queue length observed
    pub peak_pending: usize,

    /// Releases that left the queue above its soft capacity
    pub over_capacity_events: u64,
}

/// Fields protected by the lock
#[derive(Debug)]
struct Pending<D> {
    queue: VecDeque<D>,
    in_flight: usize,
    stats: QueueStats,
}

impl<D> Pending<D> {
    fn push(&mut self, dir: D) {
        self.queue.push_back(dir);
        self.stats.enqueued += 1;
        self.stats.peak_pending = self.stats.peak_pending.max(self.queue.len());
    }
}

/// Pending queue, in-flight counter and the condition variable over them
#[derive(Debug)]
pub struct SharedState<D> {
    pending: Mutex<Pending<D>>,
    wake: Condvar,

    /// Soft capacity of the pending queue
    capacity: usize,

    /// Set when the consumer went away or startup failed part way
    halted: AtomicBool,
}

impl<D> SharedState<D> {
    /// Create empty state with room for `capacity` pending directories
    pub fn new(capacity: usize) -> Self {
        Self {
            pending: Mutex::new(Pending {
                queue: VecDeque::with_capacity(capacity),
                in_flight: 0,
                stats: QueueStats::default(),
            }),
            wake: Condvar::new(),
            capacity,
            halted: AtomicBool::new(false),
        }
    }

    /// Put the root in the queue (not counted as in flight)
    pub fn seed(&self, root: D) {
        let mut pending = self.pending.lock();
        pending.push(root);
        self.wake.notify_all();
    }

    /// Acquire one directory, parking until work appears or the crawl ends
    pub fn try_acquire(&self, cancel: &CancellationToken) -> Acquire<D> {
        let mut pending = self.pending.lock();

        // Nothing queued, but a directory in flight may still publish children
        while pending.queue.is_empty() && pending.in_flight > 0 && !self.should_stop(cancel) {
            self.wake.wait(&mut pending);
        }

        if self.should_stop(cancel) {
            return Acquire::Stopped;
        }

        match pending.queue.pop_front() {
            Some(dir) => {
                pending.in_flight += 1;
                pending.stats.dequeued += 1;
                self.wake.notify_all();
                Acquire::Work(dir)
            }
            None => {
                if pending.in_flight > 0 {
                    invariant_violation("queue drained with directories still in flight");
                }
                Acquire::Finished
            }
        }
    }

    /// Publish the children of a finished directory and give back its slot
    pub fn release(&self, children: Vec<D>) {
        let mut pending = self.pending.lock();
        if pending.in_flight == 0 {
            invariant_violation("release without a matching acquire");
        }

        let was_over = pending.queue.len() > self.capacity;
        for child in children {
            pending.push(child);
        }
        if !was_over && pending.queue.len() > self.capacity {
            pending.stats.over_capacity_events += 1;
            if pending.stats.over_capacity_events == 1 {
                warn!(
                    pending = pending.queue.len(),
                    capacity = self.capacity,
                    "Pending queue grew past its capacity"
                );
            }
        }

        pending.in_flight -= 1;
        self.wake.notify_all();
    }

    /// Wake every parked worker without changing state
    pub fn wake_all(&self) {
        self.wake.notify_all();
    }

    /// Stop the crawl regardless of the caller's token
    pub fn halt(&self) {
        self.halted.store(true, Ordering::SeqCst);
        // Take the lock so no worker is between its predicate check and its wait
        let _pending = self.pending.lock();
        self.wake.notify_all();
    }

    /// Whether [`SharedState::halt`] was called
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Whether workers should stop picking up work
    pub fn should_stop(&self, cancel: &CancellationToken) -> bool {
        cancel.is_cancelled() || self.is_halted()
    }

    /// Current pending queue length
    pub fn pending_len(&self) -> usize {
        self.pending.lock().queue.len()
    }

    /// Directories acquired but not yet released
    pub fn in_flight(&self) -> usize {
        self.pending.lock().in_flight
    }

    /// Queue traffic counters
    pub fn queue_stats(&self) -> QueueStats {
        self.pending.lock().stats
    }
}

/// The coordination protocol itself is broken: never recoverable
#[cold]
fn invariant_violation(what: &str) -> ! {
    error!(invariant = what, "Crawler invariant violated, aborting");
    eprintln!("tree-crawler: invariant violated: {what}");
    std::process::abort();
}
