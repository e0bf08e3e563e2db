//! One-shot countdown timers

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::voice::Speaker;

/// Snapshot of a running timer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerInfo {
    pub id: u64,
    pub label: String,
    pub duration: Duration,
    pub remaining: Duration,
}

struct TimerEntry {
    label: String,
    duration: Duration,
    deadline: Instant,
    cancel: CancellationToken,
}

#[derive(Default)]
struct Registry {
    /// Last id handed out; ids start at 1 and are never reused
    last_id: u64,
    entries: HashMap<u64, TimerEntry>,
}

struct Inner {
    speaker: Arc<dyn Speaker>,
    registry: Mutex<Registry>,
    shutdown: CancellationToken,
}

/// Registry of running timers
///
/// Cloning is cheap; clones share the same registry. Insertion, expiry and
/// cancellation are serialized through one lock, so a timer either fires or
/// is cancelled, never both.
#[derive(Clone)]
pub struct TimerRegistry {
    inner: Arc<Inner>,
}

impl TimerRegistry {
    #[must_use]
    pub fn new(speaker: Arc<dyn Speaker>) -> Self {
        Self {
            inner: Arc::new(Inner {
                speaker,
                registry: Mutex::new(Registry::default()),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Start a countdown that speaks "`<label>` finished" on expiry
    ///
    /// Must be called from within a tokio runtime. Returns the timer id.
    pub fn start(&self, duration: Duration, label: &str) -> u64 {
        let cancel = self.inner.shutdown.child_token();

        let id = {
            let mut registry = self.lock();
            registry.last_id += 1;
            let id = registry.last_id;
            registry.entries.insert(
                id,
                TimerEntry {
                    label: label.to_string(),
                    duration,
                    deadline: Instant::now() + duration,
                    cancel: cancel.clone(),
                },
            );
            id
        };

        tracing::info!(id, label, secs = duration.as_secs(), "timer started");

        let this = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(duration) => this.fire(id),
                () = cancel.cancelled() => {
                    this.lock().entries.remove(&id);
                    tracing::debug!(id, "timer cancelled");
                }
            }
        });

        id
    }

    /// Cancel a running timer, returning whether it existed
    pub fn cancel(&self, id: u64) -> bool {
        let Some(entry) = self.lock().entries.remove(&id) else {
            return false;
        };

        entry.cancel.cancel();
        tracing::info!(id, label = %entry.label, "timer cancelled");
        true
    }

    /// Running timers, oldest first
    #[must_use]
    pub fn active(&self) -> Vec<TimerInfo> {
        let now = Instant::now();
        let mut timers: Vec<_> = self
            .lock()
            .entries
            .iter()
            .map(|(id, entry)| TimerInfo {
                id: *id,
                label: entry.label.clone(),
                duration: entry.duration,
                remaining: entry.deadline.saturating_duration_since(now),
            })
            .collect();
        timers.sort_by_key(|t| t.id);
        timers
    }

    /// Cancel every timer; expiry callbacks will not run afterwards
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let cancelled = {
            let mut registry = self.lock();
            let count = registry.entries.len();
            registry.entries.clear();
            count
        };
        tracing::debug!(cancelled, "timers shut down");
    }

    fn fire(&self, id: u64) {
        // Whoever removes the entry owns its outcome
        let Some(entry) = self.lock().entries.remove(&id) else {
            return;
        };

        tracing::info!(id, label = %entry.label, "timer finished");
        self.inner.speaker.speak(&format!("{} finished", entry.label));
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.inner
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Spoken(Mutex<Vec<String>>);

    impl Speaker for Spoken {
        fn speak(&self, text: &str) {
            self.0.lock().unwrap().push(text.to_string());
        }
    }

    impl Spoken {
        fn lines(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    async fn settle() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_once_and_is_removed() {
        let spoken = Arc::new(Spoken::default());
        let timers = TimerRegistry::new(spoken.clone());

        let id = timers.start(Duration::from_secs(60), "Tea");
        assert_eq!(timers.active().len(), 1);

        tokio::time::sleep(Duration::from_secs(59)).await;
        settle().await;
        assert!(spoken.lines().is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(spoken.lines(), ["Tea finished"]);
        assert!(timers.active().is_empty());
        assert!(!timers.cancel(id));

        let next = timers.start(Duration::from_secs(1), "Eggs");
        assert!(next > id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_fires() {
        let spoken = Arc::new(Spoken::default());
        let timers = TimerRegistry::new(spoken.clone());

        let id = timers.start(Duration::from_secs(30), "Pasta");
        assert!(timers.cancel(id));

        tokio::time::sleep(Duration::from_secs(60)).await;
        settle().await;
        assert!(spoken.lines().is_empty());
        assert!(timers.active().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_active_reports_remaining() {
        let timers = TimerRegistry::new(Arc::new(Spoken::default()));
        timers.start(Duration::from_secs(120), "Bread");
        timers.start(Duration::from_secs(60), "Rice");

        tokio::time::sleep(Duration::from_secs(30)).await;

        let active = timers.active();
        assert_eq!(active[0].label, "Bread");
        assert_eq!(active[0].remaining, Duration::from_secs(90));
        assert_eq!(active[1].remaining, Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_everything() {
        let spoken = Arc::new(Spoken::default());
        let timers = TimerRegistry::new(spoken.clone());
        timers.start(Duration::from_secs(5), "A");
        timers.start(Duration::from_secs(10), "B");

        timers.shutdown();
        tokio::time::sleep(Duration::from_secs(20)).await;
        settle().await;

        assert!(spoken.lines().is_empty());
        assert!(timers.active().is_empty());
    }
}
