//! Explicitly constructed, explicitly torn-down run context.
//!
//! Holds the shared idle watchdog so orchestrators can share one scheduler
//! or use isolated ones (e.g. concurrent runs in tests).

use super::watchdog::IdleWatchdog;
use std::sync::Arc;
use std::time::Duration;

pub struct ReviewContext {
    watchdog: Arc<IdleWatchdog>,
}

impl ReviewContext {
    /// Create a context with a freshly started watchdog.
    pub fn new() -> Self {
        Self::with_watchdog(IdleWatchdog::new())
    }

    /// Create a context whose watchdog checks no less often than `min_interval`.
    pub fn with_min_check_interval(min_interval: Duration) -> Self {
        Self::with_watchdog(IdleWatchdog::with_min_interval(min_interval))
    }

    pub fn with_watchdog(watchdog: IdleWatchdog) -> Self {
        Self {
            watchdog: Arc::new(watchdog),
        }
    }

    pub fn watchdog(&self) -> &Arc<IdleWatchdog> {
        &self.watchdog
    }

    /// Release the shared scheduler.
    pub async fn shutdown(&self) {
        self.watchdog.shutdown().await;
    }
}

impl Default for ReviewContext {
    fn default() -> Self {
        Self::new()
    }
}
