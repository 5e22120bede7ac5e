//! Reminder windowing and notification payload construction

use serde::{Deserialize, Serialize};

use crate::models::Task;

/// Default width of the window after `remind_at` in which a reminder may fire
pub const REMINDER_WINDOW_MS: i64 = 60_000;

/// Decide whether a task's reminder should fire at `now_ms`.
///
/// A task is due only inside `remind_at <= now < remind_at + window_ms`.
/// The bounded window is the idempotency guard: it lets a scan that ran
/// late still catch the reminder, but once the window has elapsed the task
/// is skipped for that `remind_at` value until the client sets a new one.
/// A recorded `notified_at >= remind_at` means this `remind_at` was already
/// delivered and supersedes the window entirely.
#[must_use]
pub fn due_for_reminder(task: &Task, now_ms: i64, window_ms: i64) -> bool {
    if task.is_deleted() || task.is_completed() {
        return false;
    }
    let Some(remind_at) = task.remind_at else {
        return false;
    };
    if remind_at <= 0 {
        return false;
    }
    if task.notified_at.is_some_and(|at| at >= remind_at) {
        return false;
    }
    now_ms >= remind_at && now_ms < remind_at.saturating_add(window_ms)
}

/// Content of one push notification.
///
/// `tag` is stable per task so client-side notification centers replace an
/// older reminder for the same task instead of stacking duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderPayload {
    pub title: String,
    pub body: String,
    pub url: String,
    pub tag: String,
}

impl ReminderPayload {
    /// Build the notification content for a due task
    #[must_use]
    pub fn for_task(task: &Task) -> Self {
        let title = task
            .title
            .as_deref()
            .filter(|title| !title.trim().is_empty())
            .unwrap_or("Reminder")
            .to_string();

        let body = match (task.date.as_deref(), task.start.as_deref()) {
            (Some(date), Some(start)) => format!("Scheduled for {date} at {start}"),
            (Some(date), None) => format!("Scheduled for {date}"),
            (None, Some(start)) => format!("Scheduled at {start}"),
            (None, None) => "It's time".to_string(),
        };

        Self {
            title,
            body,
            url: "/".to_string(),
            tag: format!("task-{}", task.id),
        }
    }

    /// Payload sent by the manual push test endpoint
    #[must_use]
    pub fn test() -> Self {
        Self {
            title: "ticklist".to_string(),
            body: "Push notifications are working".to_string(),
            url: "/".to_string(),
            tag: "task-test".to_string(),
        }
    }
}
