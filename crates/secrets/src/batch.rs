//! Ordered batch fetching with bounded concurrency
//!
//! Fetches are independent, so up to `concurrency` run at once. Results are
//! reassembled in input order regardless of completion order, and a failure
//! for one name never aborts the rest of the batch.

use crate::{SecretError, SecretName, SecretRecord, VaultClient};
use futures::stream::{self, StreamExt};

/// Default number of in-flight fetches.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// A name whose fetch failed, with the reason.
#[derive(Debug)]
pub struct FetchFailure {
    /// The requested name
    pub name: SecretName,
    /// Why the fetch failed
    pub error: SecretError,
}

/// Result of fetching a batch of names.
#[derive(Debug, Default)]
pub struct BatchFetch {
    /// Successfully fetched records, in input order
    pub records: Vec<SecretRecord>,
    /// Failed fetches, in input order
    pub failures: Vec<FetchFailure>,
}

impl BatchFetch {
    /// Total number of names attempted.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.records.len() + self.failures.len()
    }
}

/// Fetch every name from `vault`, at most `concurrency` at a time.
///
/// A `concurrency` of zero is treated as one. Failed fetches are logged at
/// warn level and collected in [`BatchFetch::failures`]. A secret whose
/// value is empty counts as failed.
pub async fn fetch_all<C>(
    client: &C,
    names: &[SecretName],
    vault: &str,
    concurrency: usize,
) -> BatchFetch
where
    C: VaultClient + ?Sized,
{
    let outcomes: Vec<_> = stream::iter(names)
        .map(|name| async move {
            tracing::info!(secret = %name, vault, "Fetching secret");
            let result = client
                .get_secret(name, vault)
                .await
                .and_then(|record| {
                    if record.value.is_empty() {
                        Err(SecretError::EmptyValue {
                            name: record.name,
                        })
                    } else {
                        Ok(record)
                    }
                });
            (name, result)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut batch = BatchFetch::default();
    for (name, result) in outcomes {
        match result {
            Ok(record) => batch.records.push(record),
            Err(error) => {
                tracing::warn!(secret = %name, error = %error, "Skipping secret");
                batch.failures.push(FetchFailure {
                    name: name.clone(),
                    error,
                });
            }
        }
    }

    tracing::debug!(
        provider = client.provider_name(),
        fetched = batch.records.len(),
        failed = batch.failures.len(),
        "Batch fetch complete"
    );

    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StaticVaultClient;
    use std::time::Duration;

    fn names(list: &[&str]) -> Vec<SecretName> {
        list.iter().map(|n| SecretName::new(n).unwrap()).collect()
    }

    #[tokio::test]
    async fn test_fetch_all_empty() {
        let client = StaticVaultClient::new();
        let batch = fetch_all(&client, &[], "kv", DEFAULT_CONCURRENCY).await;
        assert!(batch.records.is_empty());
        assert!(batch.failures.is_empty());
        assert_eq!(batch.attempted(), 0);
    }

    #[tokio::test]
    async fn test_fetch_all_skips_failures() {
        let client = StaticVaultClient::new()
            .with_secret("acme-db", "a=1")
            .with_secret("initech-db", "c=3");

        let batch = fetch_all(
            &client,
            &names(&["acme-db", "globex-db", "initech-db"]),
            "kv",
            2,
        )
        .await;

        let fetched: Vec<_> = batch.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(fetched, vec!["acme-db", "initech-db"]);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].name.as_str(), "globex-db");
        assert!(matches!(
            batch.failures[0].error,
            SecretError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_fetch_all_preserves_input_order() {
        // The first name finishes last; output order must still follow input.
        let client = StaticVaultClient::new()
            .with_secret("slow", "1")
            .with_secret("medium", "2")
            .with_secret("fast", "3")
            .with_delay("slow", Duration::from_millis(60))
            .with_delay("medium", Duration::from_millis(30));

        let batch = fetch_all(&client, &names(&["slow", "medium", "fast"]), "kv", 3).await;

        let fetched: Vec<_> = batch.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(fetched, vec!["slow", "medium", "fast"]);
    }

    #[tokio::test]
    async fn test_fetch_all_rejects_empty_values() {
        let client = StaticVaultClient::new()
            .with_secret("blank", "")
            .with_secret("full", "x=1");

        let batch = fetch_all(&client, &names(&["blank", "full"]), "kv", 1).await;

        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].name, "full");
        assert!(matches!(
            batch.failures[0].error,
            SecretError::EmptyValue { .. }
        ));
    }

    #[tokio::test]
    async fn test_fetch_all_zero_concurrency_is_sequential() {
        let client = StaticVaultClient::new().with_secret("only", "v");
        let batch = fetch_all(&client, &names(&["only", "only"]), "kv", 0).await;
        assert_eq!(batch.records.len(), 2);
    }
}
