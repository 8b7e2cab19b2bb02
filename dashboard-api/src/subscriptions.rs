//! Web Push subscriptions, keyed by a stable hash of their endpoint.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

/// A browser `PushSubscription` as produced by `PushSubscription.toJSON()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscription {
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<SubscriptionKeys>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

impl PushSubscription {
    pub fn validate(&self) -> Result<(), String> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err("Subscription endpoint is required.".to_string());
        }
        if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
            return Err("Subscription endpoint must be an http(s) URL.".to_string());
        }
        Ok(())
    }
}

/// Hex-encoded SHA-256 of the endpoint URL.
pub fn subscription_key(endpoint: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(endpoint.trim().as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Default)]
pub struct SubscriptionStore {
    inner: RwLock<HashMap<String, PushSubscription>>,
}

impl SubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a subscription. Returns its key and whether it was new.
    pub async fn upsert(&self, subscription: PushSubscription) -> (String, bool) {
        let key = subscription_key(&subscription.endpoint);
        let is_new = self
            .inner
            .write()
            .await
            .insert(key.clone(), subscription)
            .is_none();
        (key, is_new)
    }

    pub async fn get(&self, key: &str) -> Option<PushSubscription> {
        self.inner.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}
