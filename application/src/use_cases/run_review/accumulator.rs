//! Content accumulator: single-writer buffer for streamed review output.
//!
//! The producer appends fragments as they arrive; the consumer waits for a
//! terminal state and reads the joined text. The joined string is built at
//! most once between appends and shared as an `Arc<str>`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::trace;

/// Terminal state of an accumulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    /// The stream finished normally.
    Completed,
    /// The idle watchdog fired.
    IdleTimeout { elapsed: Duration, threshold: Duration },
    /// The session reported an error.
    Failed(String),
    /// The consumer stopped waiting before any terminal transition.
    WaitTimeout,
}

/// What the consumer receives from [`ContentAccumulator::await_result`].
#[derive(Debug, Clone)]
pub struct AccumulatedContent {
    pub settlement: Settlement,
    pub content: Arc<str>,
}

#[derive(Debug, Default)]
struct Buffer {
    fragments: Vec<String>,
    next_index: u64,
    cached: Option<Arc<str>>,
}

#[derive(Debug)]
pub struct ContentAccumulator {
    origin: Instant,
    /// Millis since `origin` of the last append (or creation)
    last_activity: AtomicU64,
    buffer: Mutex<Buffer>,
    state: watch::Sender<Option<Settlement>>,
}

impl Default for ContentAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentAccumulator {
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self {
            origin: Instant::now(),
            last_activity: AtomicU64::new(0),
            buffer: Mutex::new(Buffer::default()),
            state,
        }
    }

    fn buffer(&self) -> MutexGuard<'_, Buffer> {
        self.buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append one streamed fragment and record activity.
    pub fn append(&self, fragment: &str, index: u64) {
        let mut buffer = self.buffer();
        if index != buffer.next_index {
            trace!(
                "Fragment index {} arrived while expecting {}",
                index, buffer.next_index
            );
        }
        buffer.next_index = index.saturating_add(1);
        buffer.fragments.push(fragment.to_string());
        buffer.cached = None;
        drop(buffer);

        let elapsed = Instant::now().saturating_duration_since(self.origin);
        self.last_activity
            .store(elapsed.as_millis() as u64, Ordering::Release);
    }

    pub fn is_empty(&self) -> bool {
        self.buffer().fragments.iter().all(|f| f.is_empty())
    }

    /// Joined content, cached until the next append.
    pub fn materialize(&self) -> Arc<str> {
        let mut buffer = self.buffer();
        if let Some(cached) = &buffer.cached {
            return Arc::clone(cached);
        }
        let joined: Arc<str> = Arc::from(buffer.fragments.concat());
        buffer.cached = Some(Arc::clone(&joined));
        joined
    }

    /// Time since the last append (or since creation).
    pub fn idle_for(&self) -> Duration {
        let last = self.origin + Duration::from_millis(self.last_activity.load(Ordering::Acquire));
        Instant::now().saturating_duration_since(last)
    }

    /// Terminal transition; only the first one wins.
    fn settle(&self, settlement: Settlement) -> bool {
        self.state.send_if_modified(|state| {
            if state.is_some() {
                return false;
            }
            *state = Some(settlement);
            true
        })
    }

    pub fn mark_complete(&self) -> bool {
        self.settle(Settlement::Completed)
    }

    pub fn mark_failed(&self, message: impl Into<String>) -> bool {
        self.settle(Settlement::Failed(message.into()))
    }

    /// Called by the idle watchdog once the inactivity threshold is reached.
    pub fn on_idle_timeout(&self, elapsed: Duration, threshold: Duration) -> bool {
        self.settle(Settlement::IdleTimeout { elapsed, threshold })
    }

    pub fn settlement(&self) -> Option<Settlement> {
        self.state.borrow().clone()
    }

    pub fn is_settled(&self) -> bool {
        self.state.borrow().is_some()
    }

    /// Wait up to `timeout` for a terminal state, then return the content.
    pub async fn await_result(&self, timeout: Duration) -> AccumulatedContent {
        let mut receiver = self.state.subscribe();
        let settled = tokio::time::timeout(timeout, receiver.wait_for(Option::is_some)).await;
        let settlement = match settled {
            Ok(Ok(state)) => state.clone().unwrap_or(Settlement::WaitTimeout),
            Ok(Err(_)) | Err(_) => Settlement::WaitTimeout,
        };
        AccumulatedContent {
            settlement,
            content: self.materialize(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_materialize_is_cached_until_append() {
        let accumulator = ContentAccumulator::new();
        accumulator.append("Hello, ", 0);
        accumulator.append("world", 1);

        let first = accumulator.materialize();
        let second = accumulator.materialize();
        assert_eq!(&*first, "Hello, world");
        assert!(Arc::ptr_eq(&first, &second));

        accumulator.append("!", 2);
        let third = accumulator.materialize();
        assert_eq!(&*third, "Hello, world!");
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn test_first_transition_wins() {
        let accumulator = ContentAccumulator::new();
        assert!(accumulator.mark_failed("boom"));
        assert!(!accumulator.mark_complete());
        assert!(!accumulator.on_idle_timeout(Duration::from_secs(1), Duration::from_secs(1)));
        assert_eq!(accumulator.settlement(), Some(Settlement::Failed("boom".into())));
    }

    #[test]
    fn test_is_empty() {
        let accumulator = ContentAccumulator::new();
        assert!(accumulator.is_empty());
        accumulator.append("", 0);
        assert!(accumulator.is_empty());
        accumulator.append("x", 1);
        assert!(!accumulator.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_for_tracks_last_append() {
        let accumulator = ContentAccumulator::new();
        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(accumulator.idle_for() >= Duration::from_secs(3));

        accumulator.append("x", 0);
        assert!(accumulator.idle_for() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_await_result_after_completion() {
        let accumulator = Arc::new(ContentAccumulator::new());
        let producer = {
            let accumulator = Arc::clone(&accumulator);
            tokio::spawn(async move {
                accumulator.append("review", 0);
                accumulator.mark_complete();
            })
        };

        let result = accumulator.await_result(Duration::from_secs(5)).await;
        producer.await.unwrap();
        assert_eq!(result.settlement, Settlement::Completed);
        assert_eq!(&*result.content, "review");
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_result_times_out_with_partial_content() {
        let accumulator = ContentAccumulator::new();
        accumulator.append("partial", 0);
        let result = accumulator.await_result(Duration::from_secs(1)).await;
        assert_eq!(result.settlement, Settlement::WaitTimeout);
        assert_eq!(&*result.content, "partial");
    }
}
