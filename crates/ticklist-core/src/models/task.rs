//! Task model

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Status value that marks a task as finished
pub const STATUS_COMPLETED: &str = "completed";

/// A task inside an account's collection
///
/// The sync engine treats the collection as opaque; only the fields below
/// are inspected (by the reminder scheduler). Everything else a client
/// stores on a task is kept in `extra` and round-trips untouched, so the
/// server never strips fields it does not understand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Client-assigned identifier (also used for notification tags)
    pub id: String,
    /// Display title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Scheduled day, client-formatted (e.g., "2026-08-28")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Scheduled start time, client-formatted (e.g., "14:30")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    /// Task status ("todo", "completed", ...); open set, clients may extend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Soft-delete timestamp (unix ms); present means deleted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<i64>,
    /// Instant the reminder should fire (unix ms)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remind_at: Option<i64>,
    /// Last instant a notification was sent for the current `remind_at`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notified_at: Option<i64>,
    /// All other client fields, preserved verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Task {
    /// Create a bare task with the given id (mostly useful in tests)
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            date: None,
            start: None,
            status: None,
            deleted_at: None,
            remind_at: None,
            notified_at: None,
            extra: Map::new(),
        }
    }

    /// Whether the task has been completed by the client
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status.as_deref() == Some(STATUS_COMPLETED)
    }

    /// Whether the task has been soft-deleted by the client
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_is_completed() {
        let mut task = Task::new("t1");
        assert!(!task.is_completed());

        task.status = Some("todo".to_string());
        assert!(!task.is_completed());

        task.status = Some("completed".to_string());
        assert!(task.is_completed());
    }

    #[test]
    fn test_is_deleted() {
        let mut task = Task::new("t1");
        assert!(!task.is_deleted());

        task.deleted_at = Some(1_700_000_000_000);
        assert!(task.is_deleted());
    }

    #[test]
    fn test_unknown_fields_round_trip() {
        let raw = serde_json::json!({
            "id": "t1",
            "title": "Buy milk",
            "remindAt": 1_700_000_000_000_i64,
            "priority": "high",
            "subtasks": [{"id": "s1", "done": false}],
        });

        let task: Task = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(task.id, "t1");
        assert_eq!(task.remind_at, Some(1_700_000_000_000));
        assert_eq!(task.extra["priority"], "high");

        let back = serde_json::to_value(&task).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn test_wire_names_are_camel_case() {
        let mut task = Task::new("t1");
        task.deleted_at = Some(1);
        task.remind_at = Some(2);
        task.notified_at = Some(3);

        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["deletedAt"], 1);
        assert_eq!(value["remindAt"], 2);
        assert_eq!(value["notifiedAt"], 3);
    }
}
