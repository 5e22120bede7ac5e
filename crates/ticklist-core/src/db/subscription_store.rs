//! Push subscription registry

use libsql::Connection;

use crate::error::Result;
use crate::models::Subscription;

/// Registry of push endpoints, many per account.
///
/// Removal is idempotent so concurrent dispatches can both prune a dead
/// endpoint without tripping over each other.
#[derive(Clone)]
pub struct SubscriptionStore {
    conn: Connection,
}

impl SubscriptionStore {
    /// Create a store over the given connection
    pub const fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Register a subscription, replacing any previous registration of the
    /// same endpoint
    pub async fn upsert(&self, subscription: &Subscription) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO subscriptions
                     (endpoint, username, p256dh, auth, expiration_time, created_at)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(endpoint) DO UPDATE SET
                     username = excluded.username,
                     p256dh = excluded.p256dh,
                     auth = excluded.auth,
                     expiration_time = excluded.expiration_time",
                libsql::params![
                    subscription.endpoint.as_str(),
                    subscription.username.as_str(),
                    subscription.p256dh.as_str(),
                    subscription.auth.as_str(),
                    subscription.expiration_time,
                    subscription.created_at,
                ],
            )
            .await?;
        Ok(())
    }

    /// All subscriptions registered for one account
    pub async fn list_for_user(&self, username: &str) -> Result<Vec<Subscription>> {
        let mut rows = self
            .conn
            .query(
                "SELECT endpoint, username, p256dh, auth, expiration_time, created_at
                 FROM subscriptions
                 WHERE username = ?
                 ORDER BY created_at",
                [username],
            )
            .await?;

        let mut subscriptions = Vec::new();
        while let Some(row) = rows.next().await? {
            subscriptions.push(Subscription {
                endpoint: row.get(0)?,
                username: row.get(1)?,
                p256dh: row.get(2)?,
                auth: row.get(3)?,
                expiration_time: row.get(4)?,
                created_at: row.get(5)?,
            });
        }
        Ok(subscriptions)
    }

    /// Remove a single endpoint; removing an unknown endpoint is a no-op
    pub async fn remove(&self, endpoint: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM subscriptions WHERE endpoint = ?", [endpoint])
            .await?;
        Ok(())
    }

    /// Remove an endpoint only if the given account owns it
    pub async fn remove_for_user(&self, endpoint: &str, username: &str) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM subscriptions WHERE endpoint = ? AND username = ?",
                [endpoint, username],
            )
            .await?;
        Ok(())
    }

    /// Remove every subscription an account has registered
    pub async fn remove_all_for_user(&self, username: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM subscriptions WHERE username = ?", [username])
            .await?;
        Ok(())
    }
}
