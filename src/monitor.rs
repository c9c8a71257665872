//! Background throughput reporting.
//!
//! A [`ThroughputCounter`] is a shared atomic counter that producers bump as
//! they make progress. A [`ThroughputMonitor`] owns a reporter thread that
//! wakes up on a fixed interval and logs how far the counter has moved.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use log::{info, warn};
use parking_lot::Mutex;

use crate::Result;

/// The default time between two reports
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(10);

/// A cheaply cloneable, lock-free progress counter
#[derive(Debug, Clone, Default)]
pub struct ThroughputCounter(Arc<AtomicU64>);
impl ThroughputCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(&self) {
        self.add(1);
    }

    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    #[must_use]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A point-in-time view of a monitored counter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThroughputReport {
    pub count: u64,
    pub elapsed: Duration,
    /// Items per second over `elapsed`; zero before any time has passed
    pub rate: f64,
}
impl ThroughputReport {
    fn new(count: u64, elapsed: Duration) -> Self {
        let secs = elapsed.as_secs_f64();
        let rate = if secs > 0.0 { count as f64 / secs } else { 0.0 };
        Self {
            count,
            elapsed,
            rate,
        }
    }
}
impl fmt::Display for ThroughputReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records in {:.1}s ({:.1}/s)",
            self.count,
            self.elapsed.as_secs_f64(),
            self.rate
        )
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Clock {
    started: Option<Instant>,
    stopped: Option<Instant>,
}
impl Clock {
    fn elapsed(&self) -> Duration {
        match (self.started, self.stopped) {
            (Some(start), Some(stop)) => stop.duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }
}

struct Worker {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

/// Periodically logs the progress of a [`ThroughputCounter`].
///
/// `start()` resets the clock and spawns the reporter; `stop()` joins it and
/// freezes the clock, so [`ThroughputMonitor::report`] keeps returning the
/// final numbers. Both are idempotent. Dropping a running monitor stops it.
///
/// ```rust
/// use std::time::Duration;
/// use varidx::{ThroughputCounter, ThroughputMonitor};
///
/// let counter = ThroughputCounter::new();
/// let mut monitor = ThroughputMonitor::new("calls", counter.clone())
///     .interval(Duration::from_millis(50));
/// monitor.start().unwrap();
/// counter.add(100);
/// monitor.stop();
/// assert_eq!(monitor.report().count, 100);
/// ```
pub struct ThroughputMonitor {
    label: Arc<str>,
    counter: ThroughputCounter,
    interval: Duration,
    clock: Arc<Mutex<Clock>>,
    worker: Option<Worker>,
}
impl ThroughputMonitor {
    pub fn new(label: impl Into<String>, counter: ThroughputCounter) -> Self {
        Self {
            label: Arc::from(label.into()),
            counter,
            interval: DEFAULT_REPORT_INTERVAL,
            clock: Arc::default(),
            worker: None,
        }
    }

    #[must_use]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn counter(&self) -> &ThroughputCounter {
        &self.counter
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Current count, time since `start()` and the resulting rate
    #[must_use]
    pub fn report(&self) -> ThroughputReport {
        ThroughputReport::new(self.counter.get(), self.clock.lock().elapsed())
    }

    /// Starts the reporter thread; a no-op if it is already running
    pub fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }
        *self.clock.lock() = Clock {
            started: Some(Instant::now()),
            stopped: None,
        };

        let (stop, signal) = bounded::<()>(1);
        let label = Arc::clone(&self.label);
        let counter = self.counter.clone();
        let clock = Arc::clone(&self.clock);
        let interval = self.interval;

        let handle = thread::Builder::new()
            .name(format!("monitor-{label}"))
            .spawn(move || loop {
                match signal.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        let report = ThroughputReport::new(counter.get(), clock.lock().elapsed());
                        info!("{label}: {report}");
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;

        self.worker = Some(Worker { stop, handle });
        Ok(())
    }

    /// Stops the reporter and freezes the clock; a no-op if not running
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.clock.lock().stopped = Some(Instant::now());

        // the receiver only disappears if the thread already exited
        let _ = worker.stop.send(());
        if worker.handle.join().is_err() {
            warn!("{}: reporter thread panicked", self.label);
        }
        info!("{}: finished, {}", self.label, self.report());
    }
}
impl Drop for ThroughputMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
