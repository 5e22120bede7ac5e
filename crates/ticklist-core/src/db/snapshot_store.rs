//! Versioned snapshot storage with optimistic conflict detection

use std::collections::HashMap;
use std::sync::Arc;

use libsql::Connection;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::models::{Snapshot, Task};

/// Result of a snapshot write attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Write applied; the snapshot now carries this version
    Accepted {
        /// New version stamp, strictly greater than the previous one
        version: i64,
    },
    /// Write rejected: the caller's version is behind the server's
    Conflict {
        /// Current server version, returned so the caller can re-fetch
        server_version: i64,
    },
}

/// Per-account versioned storage of whole task collections.
///
/// Writes are last-writer-wins with awareness: a caller must present a
/// version at least as new as the stored one (or pass `force`) before its
/// collection replaces the snapshot. The read-check-write sequence is a
/// critical section per account; operations on different accounts do not
/// contend on anything besides the underlying connection.
#[derive(Clone)]
pub struct SnapshotStore {
    conn: Connection,
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl SnapshotStore {
    /// Create a store over the given connection
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Read an account's snapshot.
    ///
    /// An account that never wrote one reads as the empty snapshot at
    /// version 0.
    pub async fn read(&self, username: &str) -> Result<Snapshot> {
        let mut rows = self
            .conn
            .query(
                "SELECT data, version FROM snapshots WHERE username = ?",
                [username],
            )
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(Snapshot::empty());
        };

        let data: String = row.get(0)?;
        let version: i64 = row.get(1)?;
        let tasks: Vec<Task> = serde_json::from_str(&data)?;
        Ok(Snapshot { tasks, version })
    }

    /// Replace an account's task collection.
    ///
    /// Rejected with [`WriteOutcome::Conflict`] when `client_version` is
    /// behind the stored version and `force` is false; the stored snapshot
    /// is untouched in that case. On accept the new version is the current
    /// unix-ms timestamp, bumped to `server_version + 1` when the clock
    /// would tie or regress, so versions increase strictly.
    pub async fn write(
        &self,
        username: &str,
        tasks: &[Task],
        client_version: i64,
        force: bool,
    ) -> Result<WriteOutcome> {
        let data = serde_json::to_string(tasks)?;

        let lock = self.account_lock(username).await;
        let _guard = lock.lock().await;

        let server_version = self.current_version(username).await?;
        if !force && client_version < server_version {
            return Ok(WriteOutcome::Conflict { server_version });
        }

        let version = chrono::Utc::now()
            .timestamp_millis()
            .max(server_version + 1);

        self.conn
            .execute(
                "INSERT INTO snapshots (username, data, version) VALUES (?, ?, ?)
                 ON CONFLICT(username) DO UPDATE SET
                     data = excluded.data,
                     version = excluded.version",
                libsql::params![username, data, version],
            )
            .await?;

        Ok(WriteOutcome::Accepted { version })
    }

    /// List all accounts that own a snapshot
    pub async fn accounts(&self) -> Result<Vec<String>> {
        let mut rows = self
            .conn
            .query("SELECT username FROM snapshots ORDER BY username", ())
            .await?;

        let mut usernames = Vec::new();
        while let Some(row) = rows.next().await? {
            usernames.push(row.get::<String>(0)?);
        }
        Ok(usernames)
    }

    async fn current_version(&self, username: &str) -> Result<i64> {
        let mut rows = self
            .conn
            .query(
                "SELECT version FROM snapshots WHERE username = ?",
                [username],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(row.get(0)?),
            None => Ok(0),
        }
    }

    async fn account_lock(&self, username: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(username.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::db::Database;

    async fn setup() -> SnapshotStore {
        let db = Database::open_in_memory().await.unwrap();
        SnapshotStore::new(db.connection().clone())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_missing_account_reads_empty() {
        let store = setup().await;

        let snapshot = store.read("alice").await.unwrap();
        assert!(snapshot.tasks.is_empty());
        assert_eq!(snapshot.version, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_first_write_accepted() {
        let store = setup().await;
        let tasks = vec![Task::new("t1")];

        let outcome = store.write("alice", &tasks, 0, false).await.unwrap();
        let WriteOutcome::Accepted { version } = outcome else {
            panic!("first write should be accepted: {outcome:?}");
        };
        assert!(version > 0);

        let stored = store.read("alice").await.unwrap();
        assert_eq!(stored.tasks, tasks);
        assert_eq!(stored.version, version);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stale_write_rejected_without_mutation() {
        let store = setup().await;
        let original = vec![Task::new("t1")];

        let WriteOutcome::Accepted { version } =
            store.write("alice", &original, 0, false).await.unwrap()
        else {
            panic!("seed write rejected");
        };

        // A second device that still believes version 0 must be refused.
        let stale = vec![Task::new("t2")];
        let outcome = store.write("alice", &stale, 0, false).await.unwrap();
        assert_eq!(
            outcome,
            WriteOutcome::Conflict {
                server_version: version
            }
        );

        let stored = store.read("alice").await.unwrap();
        assert_eq!(stored.tasks, original);
        assert_eq!(stored.version, version);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_write_with_current_version_accepted() {
        let store = setup().await;

        let WriteOutcome::Accepted { version } = store
            .write("alice", &[Task::new("t1")], 0, false)
            .await
            .unwrap()
        else {
            panic!("seed write rejected");
        };

        let outcome = store
            .write("alice", &[Task::new("t2")], version, false)
            .await
            .unwrap();
        assert!(matches!(outcome, WriteOutcome::Accepted { .. }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_force_write_ignores_version_check() {
        let store = setup().await;

        store
            .write("alice", &[Task::new("t1")], 0, false)
            .await
            .unwrap();

        let forced = vec![Task::new("t2")];
        let outcome = store.write("alice", &forced, 0, true).await.unwrap();
        assert!(matches!(outcome, WriteOutcome::Accepted { .. }));

        let stored = store.read("alice").await.unwrap();
        assert_eq!(stored.tasks, forced);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_versions_strictly_increase() {
        let store = setup().await;
        let tasks = vec![Task::new("t1")];

        // Back-to-back writes land within the same millisecond; the store
        // must still hand out distinct, increasing stamps.
        let mut last = 0;
        for _ in 0..5 {
            let WriteOutcome::Accepted { version } =
                store.write("alice", &tasks, 0, true).await.unwrap()
            else {
                panic!("forced write rejected");
            };
            assert!(version > last);
            last = version;
        }

        let stored = store.read("alice").await.unwrap();
        assert_eq!(stored.tasks, tasks);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_accounts_are_independent() {
        let store = setup().await;

        store
            .write("alice", &[Task::new("a1")], 0, false)
            .await
            .unwrap();

        // Alice's bumped version never blocks Bob's first write.
        let outcome = store
            .write("bob", &[Task::new("b1")], 0, false)
            .await
            .unwrap();
        assert!(matches!(outcome, WriteOutcome::Accepted { .. }));

        assert_eq!(store.accounts().await.unwrap(), vec!["alice", "bob"]);
    }
}
