use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use tokio::task::JoinSet;

use ticklist_core::db::{SettingsRepository, SubscriptionStore};
use ticklist_core::reminder::ReminderPayload;
use ticklist_core::{Result as CoreResult, Subscription};

use crate::auth::user_fingerprint;
use crate::error::AppError;

/// Settings key under which the server's push public key is persisted
const PUSH_PUBLIC_KEY_SETTING: &str = "push_public_key";

/// Outcome of one push send to one endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The push service accepted the notification
    Sent,
    /// The endpoint is permanently invalid and should be pruned
    Expired,
    /// Transient failure; the subscription stays registered
    Failed,
}

/// Transport seam for push delivery, mocked in tests
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn send(&self, subscription: &Subscription, payload: &ReminderPayload) -> Delivery;
}

/// Best-effort HTTP push transport.
///
/// Posts the JSON payload to the subscription endpoint with a TTL header
/// and a per-request timeout, so one hung push service cannot stall a
/// dispatch. Delivery is fire-and-forget; there are no retries here.
pub struct HttpPushTransport {
    client: reqwest::Client,
    ttl_secs: u64,
}

impl HttpPushTransport {
    pub fn new(timeout: Duration, ttl_secs: u64) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| AppError::Config(format!("Push client setup failed: {error}")))?;
        Ok(Self { client, ttl_secs })
    }
}

#[async_trait]
impl PushTransport for HttpPushTransport {
    async fn send(&self, subscription: &Subscription, payload: &ReminderPayload) -> Delivery {
        let response = self
            .client
            .post(&subscription.endpoint)
            .header("TTL", self.ttl_secs)
            .json(payload)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => Delivery::Sent,
            Ok(response) => match response.status().as_u16() {
                // Gone/not-found/unauthorized mean the subscription is dead.
                401 | 403 | 404 | 410 => Delivery::Expired,
                status => {
                    tracing::debug!(status, "Push send rejected");
                    Delivery::Failed
                }
            },
            Err(error) => {
                tracing::debug!(%error, "Push send failed");
                Delivery::Failed
            }
        }
    }
}

/// Fan-out of one payload to every endpoint an account has registered.
///
/// Endpoints are contacted concurrently and independently; a dead endpoint
/// is removed from the registry on the spot. The caller only learns whether
/// at least one endpoint took the notification.
pub struct NotificationDispatcher {
    subscriptions: SubscriptionStore,
    transport: Arc<dyn PushTransport>,
}

impl NotificationDispatcher {
    pub fn new(subscriptions: SubscriptionStore, transport: Arc<dyn PushTransport>) -> Self {
        Self {
            subscriptions,
            transport,
        }
    }

    /// Send `payload` to all of `username`'s subscriptions.
    ///
    /// Returns whether at least one endpoint was notified; false when the
    /// account has no subscriptions or every attempt failed.
    pub async fn dispatch(&self, username: &str, payload: &ReminderPayload) -> CoreResult<bool> {
        let subscriptions = self.subscriptions.list_for_user(username).await?;
        if subscriptions.is_empty() {
            return Ok(false);
        }

        let mut sends = JoinSet::new();
        for subscription in subscriptions {
            let transport = Arc::clone(&self.transport);
            let payload = payload.clone();
            sends.spawn(async move {
                let outcome = transport.send(&subscription, &payload).await;
                (subscription.endpoint, outcome)
            });
        }

        let mut sent_any = false;
        while let Some(joined) = sends.join_next().await {
            let Ok((endpoint, outcome)) = joined else {
                continue;
            };
            match outcome {
                Delivery::Sent => sent_any = true,
                Delivery::Expired => {
                    tracing::info!(
                        user = user_fingerprint(username),
                        "Pruning expired push subscription"
                    );
                    // Idempotent delete; a concurrent dispatch may already
                    // have pruned this endpoint.
                    if let Err(error) = self.subscriptions.remove(&endpoint).await {
                        tracing::warn!(%error, "Failed to prune push subscription");
                    }
                }
                Delivery::Failed => {}
            }
        }

        Ok(sent_any)
    }
}

/// Return the server-wide push public key, generating and persisting it on
/// first use
pub async fn ensure_push_public_key(settings: &SettingsRepository) -> Result<String, AppError> {
    if let Some(key) = settings.get(PUSH_PUBLIC_KEY_SETTING).await? {
        return Ok(key);
    }

    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let key = URL_SAFE_NO_PAD.encode(bytes);

    settings.set_if_absent(PUSH_PUBLIC_KEY_SETTING, &key).await?;

    // Re-read so concurrent first callers agree on one key.
    settings
        .get(PUSH_PUBLIC_KEY_SETTING)
        .await?
        .ok_or_else(|| AppError::internal("Push key vanished after initialization"))
}
