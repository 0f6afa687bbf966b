//! Heartbeat guard
//!
//! A background thread that fires a wake-up on a fixed interval for the
//! lifetime of a crawl. It bounds how long a parked worker can miss a
//! cancellation or a lost signal. Stopping uses its own channel, never the
//! crawl's condition variable.

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::trace;

/// Running heartbeat thread; stops on [`Heartbeat::stop`] or drop
pub struct Heartbeat {
    /// Dropping this sender disconnects the thread's receiver
    stop: Option<Sender<()>>,

    handle: Option<JoinHandle<()>>,

    ticks: Arc<AtomicU64>,
}

impl Heartbeat {
    /// Start calling `pulse` every `interval`
    pub fn start<F>(interval: Duration, pulse: F) -> std::io::Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let ticks = Arc::new(AtomicU64::new(0));
        let thread_ticks = Arc::clone(&ticks);

        let handle = thread::Builder::new()
            .name("crawl-heartbeat".into())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        pulse();
                        let n = thread_ticks.fetch_add(1, Ordering::Relaxed) + 1;
                        trace!(ticks = n, "Heartbeat broadcast");
                    }
                    // Explicit stop or sender dropped
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                }
            })?;

        Ok(Self {
            stop: Some(stop_tx),
            handle: Some(handle),
            ticks,
        })
    }

    /// Number of pulses fired so far
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Stop the thread and wait for it to exit
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.try_send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_heartbeat_pulses() {
        let count = Arc::new(AtomicU64::new(0));
        let pulse_count = Arc::clone(&count);
        let heartbeat = Heartbeat::start(Duration::from_millis(5), move || {
            pulse_count.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while heartbeat.ticks() < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        assert!(heartbeat.ticks() >= 3);
        heartbeat.stop();
        assert!(count.load(Ordering::Relaxed) >= 3);
    }

    #[test]
    fn test_stop_is_prompt() {
        let heartbeat = Heartbeat::start(Duration::from_secs(3600), || {}).unwrap();
        let start = Instant::now();
        heartbeat.stop();
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_drop_stops_thread() {
        let count = Arc::new(AtomicU64::new(0));
        let pulse_count = Arc::clone(&count);
        let heartbeat = Heartbeat::start(Duration::from_millis(1), move || {
            pulse_count.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();
        drop(heartbeat);

        let after_drop = count.load(Ordering::Relaxed);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(count.load(Ordering::Relaxed), after_drop);
    }
}
