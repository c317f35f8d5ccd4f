//! Idle watchdog: one shared scheduler that detects stalled sessions.
//!
//! A single driver task owns a [`DelayQueue`] of pending checks for every
//! registered accumulator. Each check compares the time since the last
//! appended fragment with the threshold and fires
//! [`ContentAccumulator::on_idle_timeout`] at most once. The driver holds only
//! weak references, so a finished session is never kept alive by it.
//!
//! When the driver is gone (shut down, or no runtime was available) a
//! registration degrades to a no-op handle and the session relies on its
//! hard per-attempt timeout alone.

use super::accumulator::ContentAccumulator;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::time::{DelayQueue, delay_queue};
use tracing::{debug, info, warn};

/// Lower bound of the check interval.
pub const DEFAULT_MIN_CHECK_INTERVAL: Duration = Duration::from_secs(5);

enum Command {
    Watch {
        id: u64,
        accumulator: Weak<ContentAccumulator>,
        threshold: Duration,
        interval: Duration,
    },
    Unwatch(u64),
}

struct Entry {
    key: delay_queue::Key,
    accumulator: Weak<ContentAccumulator>,
    threshold: Duration,
    interval: Duration,
}

/// Shared idle-activity checker.
pub struct IdleWatchdog {
    commands: mpsc::UnboundedSender<Command>,
    shutdown: CancellationToken,
    driver: Mutex<Option<JoinHandle<()>>>,
    next_id: AtomicU64,
    min_interval: Duration,
}

/// Registration of one accumulator; checks stop when it is dropped.
#[must_use = "dropping the handle stops idle checks"]
pub struct WatchHandle {
    registration: Option<(u64, mpsc::UnboundedSender<Command>)>,
}

impl WatchHandle {
    /// Handle that watches nothing.
    pub fn noop() -> Self {
        Self { registration: None }
    }

    pub fn is_active(&self) -> bool {
        self.registration.is_some()
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        if let Some((id, commands)) = self.registration.take() {
            // Driver may already be gone
            let _ = commands.send(Command::Unwatch(id));
        }
    }
}

impl IdleWatchdog {
    /// Start the shared scheduler on the current tokio runtime.
    pub fn new() -> Self {
        Self::with_min_interval(DEFAULT_MIN_CHECK_INTERVAL)
    }

    /// Start the scheduler with a custom interval floor.
    pub fn with_min_interval(min_interval: Duration) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let driver = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => Some(runtime.spawn(drive(receiver, shutdown.clone()))),
            Err(e) => {
                warn!("Idle watchdog unavailable, no tokio runtime: {}", e);
                shutdown.cancel();
                None
            }
        };

        Self {
            commands,
            shutdown,
            driver: Mutex::new(driver),
            next_id: AtomicU64::new(0),
            min_interval,
        }
    }

    /// Check interval for a threshold: a quarter of it, never below the floor.
    pub fn check_interval(&self, threshold: Duration) -> Duration {
        (threshold / 4).max(self.min_interval)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Register an accumulator for idle checks.
    pub fn watch(&self, accumulator: &Arc<ContentAccumulator>, threshold: Duration) -> WatchHandle {
        if self.is_shut_down() {
            warn!("Idle watchdog is shut down; session relies on the attempt timeout only");
            return WatchHandle::noop();
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let command = Command::Watch {
            id,
            accumulator: Arc::downgrade(accumulator),
            threshold,
            interval: self.check_interval(threshold),
        };
        if self.commands.send(command).is_err() {
            warn!("Idle watchdog rejected a registration; session relies on the attempt timeout only");
            return WatchHandle::noop();
        }

        WatchHandle {
            registration: Some((id, self.commands.clone())),
        }
    }

    /// Stop the scheduler and wait for its driver to exit.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let driver = self
            .driver
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(driver) = driver {
            if let Err(e) = driver.await {
                warn!("Idle watchdog driver ended abnormally: {}", e);
            }
        }
    }
}

impl Default for IdleWatchdog {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IdleWatchdog {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn drive(mut commands: mpsc::UnboundedReceiver<Command>, shutdown: CancellationToken) {
    let mut queue: DelayQueue<u64> = DelayQueue::new();
    let mut entries: HashMap<u64, Entry> = HashMap::new();

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            command = commands.recv() => match command {
                Some(Command::Watch { id, accumulator, threshold, interval }) => {
                    let key = queue.insert(id, interval);
                    entries.insert(id, Entry { key, accumulator, threshold, interval });
                }
                Some(Command::Unwatch(id)) => {
                    if let Some(entry) = entries.remove(&id) {
                        queue.remove(&entry.key);
                    }
                }
                None => break,
            },
            Some(expired) = queue.next() => {
                let id = expired.into_inner();
                check(id, &mut queue, &mut entries);
            }
        }
    }

    if !entries.is_empty() {
        info!("Idle watchdog stopped with {} session(s) still registered", entries.len());
    }
}

fn check(id: u64, queue: &mut DelayQueue<u64>, entries: &mut HashMap<u64, Entry>) {
    let Some(entry) = entries.get_mut(&id) else {
        return;
    };

    let Some(accumulator) = entry.accumulator.upgrade() else {
        entries.remove(&id);
        return;
    };
    if accumulator.is_settled() {
        entries.remove(&id);
        return;
    }

    let elapsed = accumulator.idle_for();
    if elapsed >= entry.threshold {
        debug!(
            "Session idle for {}ms (threshold {}ms), forcing early termination",
            elapsed.as_millis(),
            entry.threshold.as_millis()
        );
        accumulator.on_idle_timeout(elapsed, entry.threshold);
        entries.remove(&id);
    } else {
        entry.key = queue.insert(id, entry.interval);
    }
}
