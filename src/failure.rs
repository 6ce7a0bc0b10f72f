use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::call::FailureKey;

/// Store of failure counts keyed by call shape.
///
/// Implementations must be safe under concurrent `add`/`get` on the same and
/// on independent keys, without a global lock across unrelated keys.
pub trait FailureTracker: Send + Sync {
    /// Current failure count for a call shape.
    fn get(&self, key: FailureKey) -> u64;

    /// Records one failure occurrence for a call shape.
    fn add(&self, key: FailureKey);

    /// Clears all state and stops any background work. Counts read after
    /// close are zero.
    fn close(&self);
}

/// Monotone per-key counters; never forgets a failure.
#[derive(Default)]
pub struct UnboundedTracker {
    counts: DashMap<FailureKey, u64>,
}

impl UnboundedTracker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FailureTracker for UnboundedTracker {
    fn get(&self, key: FailureKey) -> u64 {
        self.counts.get(&key).map(|count| *count).unwrap_or(0)
    }

    fn add(&self, key: FailureKey) {
        *self.counts.entry(key).or_insert(0) += 1;
    }

    fn close(&self) {
        self.counts.clear();
    }
}

/// Trailing-window tracker: a failure only counts while it is younger than
/// the window. Expired stamps are pruned lazily on read and by a sweep task
/// running at a quarter of the window period.
pub struct WindowedTracker {
    window: Duration,
    stamps: Arc<DashMap<FailureKey, Vec<Instant>>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl WindowedTracker {
    /// Must be called from within a tokio runtime; the sweep task is spawned
    /// immediately.
    pub fn new(window: Duration) -> Self {
        let stamps: Arc<DashMap<FailureKey, Vec<Instant>>> = Arc::new(DashMap::new());
        let sweeper = {
            let stamps = Arc::clone(&stamps);
            tokio::spawn(async move {
                let period = window / 4;
                let mut ticker = tokio::time::interval(period.max(Duration::from_millis(1)));
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    // A horizon predating the clock's zero point means
                    // nothing has expired yet.
                    let Some(horizon) = Instant::now().checked_sub(window) else {
                        continue;
                    };
                    stamps.retain(|_, stamps| {
                        stamps.retain(|stamp| *stamp > horizon);
                        !stamps.is_empty()
                    });
                }
            })
        };
        Self {
            window,
            stamps,
            sweeper: Mutex::new(Some(sweeper)),
        }
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.stamps.len()
    }
}

impl FailureTracker for WindowedTracker {
    fn get(&self, key: FailureKey) -> u64 {
        let Some(mut entry) = self.stamps.get_mut(&key) else {
            return 0;
        };
        if let Some(horizon) = Instant::now().checked_sub(self.window) {
            entry.retain(|stamp| *stamp > horizon);
        }
        entry.len() as u64
    }

    fn add(&self, key: FailureKey) {
        debug!(key = key.0, "failure stamp added to window");
        self.stamps.entry(key).or_default().push(Instant::now());
    }

    fn close(&self) {
        if let Some(sweeper) = self.sweeper.lock().take() {
            sweeper.abort();
        }
        self.stamps.clear();
    }
}

impl Drop for WindowedTracker {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u64) -> FailureKey {
        FailureKey(n)
    }

    #[test]
    fn unbounded_counts_monotonically() {
        let tracker = UnboundedTracker::new();
        assert_eq!(tracker.get(key(1)), 0);
        tracker.add(key(1));
        tracker.add(key(1));
        tracker.add(key(2));
        assert_eq!(tracker.get(key(1)), 2);
        assert_eq!(tracker.get(key(2)), 1);

        tracker.close();
        assert_eq!(tracker.get(key(1)), 0);
    }

    #[tokio::test]
    async fn windowed_forgets_after_window() {
        let tracker = WindowedTracker::new(Duration::from_millis(80));
        tracker.add(key(1));
        tracker.add(key(1));
        assert_eq!(tracker.get(key(1)), 2);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(tracker.get(key(1)), 0);
    }

    #[tokio::test]
    async fn windowed_keeps_recent_failures() {
        let tracker = WindowedTracker::new(Duration::from_secs(5));
        tracker.add(key(3));
        tokio::time::sleep(Duration::from_millis(20)).await;
        tracker.add(key(3));
        assert_eq!(tracker.get(key(3)), 2);
        tracker.close();
        assert_eq!(tracker.get(key(3)), 0);
    }

    #[tokio::test]
    async fn window_wider_than_the_clock_keeps_every_stamp() {
        // With a window this wide the expiry horizon predates the monotonic
        // clock's zero point; reads must count every stamp, not panic.
        let tracker = WindowedTracker::new(Duration::from_secs(100 * 365 * 24 * 60 * 60));
        tracker.add(key(7));
        tracker.add(key(7));
        assert_eq!(tracker.get(key(7)), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn windowed_sweep_prunes_without_reads() {
        let tracker = Arc::new(WindowedTracker::new(Duration::from_millis(60)));
        tracker.add(key(9));
        assert_eq!(tracker.tracked_keys(), 1);

        // Sweep period is window/4; well past the window every stamp and the
        // key itself must be gone without any `get` having pruned it.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(tracker.tracked_keys(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn windowed_is_safe_under_concurrent_adds() {
        let tracker = Arc::new(WindowedTracker::new(Duration::from_secs(10)));
        let mut tasks = Vec::new();
        for worker in 0..4u64 {
            let tracker = Arc::clone(&tracker);
            tasks.push(tokio::spawn(async move {
                for _ in 0..50 {
                    tracker.add(key(worker % 2));
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(tracker.get(key(0)) + tracker.get(key(1)), 200);
    }
}
