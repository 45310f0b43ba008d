//! In-memory vault client

use crate::{SecretError, SecretName, SecretRecord, VaultClient};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

/// Serves secrets from an in-memory map.
///
/// Every vault name sees the same secrets. Lookups for names that were never
/// added fail with [`SecretError::NotFound`]; subscriptions added with
/// [`reject_subscription`](Self::reject_subscription) fail `set_context`.
#[derive(Debug, Default)]
pub struct StaticVaultClient {
    secrets: HashMap<String, String>,
    delays: HashMap<String, Duration>,
    rejected_subscriptions: HashSet<String>,
    contexts: Mutex<Vec<String>>,
}

impl StaticVaultClient {
    /// Create an empty client
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a secret.
    #[must_use]
    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), value.into());
        self
    }

    /// Delay every lookup of `name` by `delay`.
    #[must_use]
    pub fn with_delay(mut self, name: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(name.into(), delay);
        self
    }

    /// Make `set_context` fail for `subscription`.
    #[must_use]
    pub fn reject_subscription(mut self, subscription: impl Into<String>) -> Self {
        self.rejected_subscriptions.insert(subscription.into());
        self
    }

    /// Subscriptions successfully selected so far, in call order.
    #[must_use]
    pub fn contexts(&self) -> Vec<String> {
        self.contexts
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl VaultClient for StaticVaultClient {
    fn provider_name(&self) -> &'static str {
        "static"
    }

    async fn set_context(&self, subscription_id: &str) -> Result<(), SecretError> {
        if self.rejected_subscriptions.contains(subscription_id) {
            return Err(SecretError::ContextFailed {
                subscription: subscription_id.to_string(),
                message: "subscription rejected".to_string(),
            });
        }
        if let Ok(mut contexts) = self.contexts.lock() {
            contexts.push(subscription_id.to_string());
        }
        Ok(())
    }

    async fn get_secret(
        &self,
        name: &SecretName,
        vault: &str,
    ) -> Result<SecretRecord, SecretError> {
        if let Some(delay) = self.delays.get(name.as_str()) {
            tokio::time::sleep(*delay).await;
        }

        self.secrets
            .get(name.as_str())
            .map(|value| SecretRecord::new(name.as_str(), value.clone()))
            .ok_or_else(|| SecretError::NotFound {
                name: name.to_string(),
                vault: vault.to_string(),
            })
    }
}
