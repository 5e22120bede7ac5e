use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use ticklist_core::db::{SnapshotStore, WriteOutcome};
use ticklist_core::reminder::{due_for_reminder, ReminderPayload};
use ticklist_core::Result as CoreResult;

use crate::push::NotificationDispatcher;

/// What one scan tick accomplished
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub accounts: usize,
    pub notified: usize,
}

/// Background reminder scanner.
///
/// One scheduler instance owns the scan loop; a tick reads every account's
/// snapshot, dispatches notifications for due tasks, and records
/// `notified_at` through the same version-checked write path clients use.
/// Scans are awaited inside the loop and missed ticks are skipped, so two
/// scans never run at once.
pub struct ReminderScheduler {
    snapshots: SnapshotStore,
    dispatcher: Arc<NotificationDispatcher>,
    interval: Duration,
    window_ms: i64,
}

impl ReminderScheduler {
    pub fn new(
        snapshots: SnapshotStore,
        dispatcher: Arc<NotificationDispatcher>,
        interval: Duration,
        window: Duration,
    ) -> Self {
        Self {
            snapshots,
            dispatcher,
            interval,
            window_ms: i64::try_from(window.as_millis()).unwrap_or(i64::MAX),
        }
    }

    /// Run the scan loop forever
    pub async fn run(self) {
        let mut tick = tokio::time::interval(self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tick.tick().await;
            match self.scan().await {
                Ok(summary) if summary.notified > 0 => {
                    tracing::info!(
                        accounts = summary.accounts,
                        notified = summary.notified,
                        "Reminder scan delivered notifications"
                    );
                }
                Ok(_) => {}
                Err(error) => tracing::warn!(%error, "Reminder scan failed"),
            }
        }
    }

    /// Scan all accounts once.
    ///
    /// A failure in one account is logged and does not stop the rest of
    /// the scan.
    pub async fn scan(&self) -> CoreResult<ScanSummary> {
        let accounts = self.snapshots.accounts().await?;
        let mut summary = ScanSummary {
            accounts: accounts.len(),
            notified: 0,
        };

        for username in accounts {
            match self.scan_account(&username).await {
                Ok(notified) => summary.notified += notified,
                Err(error) => {
                    tracing::warn!(%error, "Skipping account after scan error");
                }
            }
        }

        Ok(summary)
    }

    async fn scan_account(&self, username: &str) -> CoreResult<usize> {
        let snapshot = self.snapshots.read(username).await?;
        let (mut tasks, version) = (snapshot.tasks, snapshot.version);
        let now = chrono::Utc::now().timestamp_millis();
        let mut notified = 0;

        for task in &mut tasks {
            if !due_for_reminder(task, now, self.window_ms) {
                continue;
            }

            let payload = ReminderPayload::for_task(task);
            match self.dispatcher.dispatch(username, &payload).await {
                // Only a confirmed delivery marks the reminder as handled;
                // anything else leaves the task due for the next tick
                // while the window is still open.
                Ok(true) => {
                    task.notified_at = Some(now);
                    notified += 1;
                }
                Ok(false) => {}
                Err(error) => {
                    tracing::warn!(%error, "Reminder dispatch failed");
                }
            }
        }

        if notified > 0 {
            let outcome = self
                .snapshots
                .write(username, &tasks, version, false)
                .await?;
            if let WriteOutcome::Conflict { server_version } = outcome {
                // A client replaced the snapshot mid-scan. Its copy wins;
                // the still-unmarked reminders are retried next tick.
                tracing::debug!(
                    server_version,
                    "Snapshot changed during scan, deferring notified_at update"
                );
                return Ok(notified);
            }
        }

        Ok(notified)
    }
}
