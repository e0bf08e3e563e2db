//! Reminder poller
//!
//! Wakes once per interval, speaks every reminder due this minute and deletes
//! it. With exact matching a reminder whose minute is skipped (process
//! suspended, slow cycle) is never spoken; `catch_up` switches to matching
//! everything due up to now.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::config::ReminderConfig;
use crate::db::{DueMatch, ReminderStore, truncate_to_minute};
use crate::voice::Speaker;

/// Periodic reminder checker
pub struct ReminderPoller {
    store: Arc<dyn ReminderStore>,
    speaker: Arc<dyn Speaker>,
    interval: Duration,
    matching: DueMatch,
}

impl ReminderPoller {
    #[must_use]
    pub fn new(
        store: Arc<dyn ReminderStore>,
        speaker: Arc<dyn Speaker>,
        config: &ReminderConfig,
    ) -> Self {
        Self {
            store,
            speaker,
            interval: config.poll_interval,
            matching: if config.catch_up {
                DueMatch::UpTo
            } else {
                DueMatch::Exact
            },
        }
    }

    /// Run one poll cycle for `now`, returning how many reminders fired
    ///
    /// Each reminder is spoken and then deleted before the next is handled.
    ///
    /// # Errors
    ///
    /// Returns error if the due query fails. A failed delete is logged and
    /// does not stop the cycle.
    pub fn poll_once(&self, now: NaiveDateTime) -> Result<usize> {
        let minute = truncate_to_minute(now);
        let due = self.store.due(minute, self.matching)?;

        for reminder in &due {
            tracing::info!(id = reminder.id, message = %reminder.message, "reminder due");
            self.speaker.speak(&format!("Reminder: {}", reminder.message));

            if let Err(e) = self.store.delete(reminder.id) {
                tracing::warn!(id = reminder.id, error = %e, "failed to delete fired reminder");
            }
        }

        Ok(due.len())
    }

    /// Poll until `cancel` fires; the first cycle runs immediately
    ///
    /// Each cycle runs on the blocking pool since the store is synchronous.
    pub async fn run(self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            interval_secs = self.interval.as_secs(),
            matching = ?self.matching,
            "reminder poller started"
        );

        let poller = Arc::new(self);
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let cycle = Arc::clone(&poller);
                    let now = Local::now().naive_local();
                    match tokio::task::spawn_blocking(move || cycle.poll_once(now)).await {
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => tracing::warn!(error = %e, "reminder poll failed"),
                        Err(e) => tracing::warn!(error = %e, "reminder poll task failed"),
                    }
                }
            }
        }

        tracing::debug!("reminder poller stopped");
    }
}
