//! Push subscription model

use serde::{Deserialize, Serialize};

/// One device's push endpoint registered for one account.
///
/// The endpoint URL is the unique key; registering the same endpoint again
/// replaces the stored keys. A subscription is removed when the client opts
/// out or when a push delivery reports the endpoint as permanently gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Push service endpoint URL (unique key)
    pub endpoint: String,
    /// Owning account
    pub username: String,
    /// Client public key for payload encryption (p256dh)
    pub p256dh: String,
    /// Client auth secret
    pub auth: String,
    /// Optional expiration reported by the push service (unix ms)
    pub expiration_time: Option<i64>,
    /// Registration timestamp (unix ms)
    pub created_at: i64,
}

impl Subscription {
    /// Create a subscription registered now
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        p256dh: impl Into<String>,
        auth: impl Into<String>,
        expiration_time: Option<i64>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: username.into(),
            p256dh: p256dh.into(),
            auth: auth.into(),
            expiration_time,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}
