//! Server settings repository

use libsql::Connection;

use crate::error::Result;

/// String key/value settings persisted server-side (e.g., push key material)
#[derive(Clone)]
pub struct SettingsRepository {
    conn: Connection,
}

impl SettingsRepository {
    /// Create a repository over the given connection
    pub const fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Look up a setting, `None` if it was never written
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM server_settings WHERE key = ?", [key])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    /// Write a setting, replacing any previous value
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO server_settings (key, value) VALUES (?, ?)",
                [key, value],
            )
            .await?;
        Ok(())
    }

    /// Write a setting only if the key was never written.
    ///
    /// Lets concurrent initializers race without overwriting each other.
    pub async fn set_if_absent(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO server_settings (key, value) VALUES (?, ?)",
                [key, value],
            )
            .await?;
        Ok(())
    }
}
