//! Secret retrieval for kvexport
//!
//! Provides the [`VaultClient`] interface used by the export pipeline, the
//! value types that flow through it, and an ordered, bounded batch fetch.
//!
//! # Batch Fetching
//!
//! ```ignore
//! use kvexport_secrets::{SecretName, fetch_all};
//!
//! let names = vec![SecretName::new("acme-db")?, SecretName::new("globex-db")?];
//! let batch = fetch_all(&client, &names, "my-vault", 4).await;
//!
//! // Records come back in input order; failures are collected, not raised
//! for record in &batch.records {
//!     println!("{}", record.name);
//! }
//! ```

mod batch;
pub mod clients;
mod types;

pub use batch::{BatchFetch, DEFAULT_CONCURRENCY, FetchFailure, fetch_all};
pub use clients::StaticVaultClient;
pub use types::{SecretName, SecretRecord, SecureSecret};

// Provider implementations are in separate crates:
// - kvexport-azure: AzureKeyVaultClient (HTTP + az CLI)

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Error types for vault access
#[derive(Debug, Error)]
pub enum SecretError {
    /// Secret does not exist in the vault
    #[error("Secret '{name}' not found in vault '{vault}'")]
    NotFound {
        /// Secret name
        name: String,
        /// Vault that was searched
        vault: String,
    },

    /// Selecting the subscription context failed
    #[error("Failed to set subscription '{subscription}': {message}")]
    ContextFailed {
        /// Subscription identifier
        subscription: String,
        /// Error message from the client
        message: String,
    },

    /// Fetch failed (spawn error, non-zero exit, HTTP error)
    #[error("Failed to fetch secret '{name}': {message}")]
    FetchFailed {
        /// Secret name
        name: String,
        /// Error message from the client
        message: String,
    },

    /// The vault answered with something that is not a secret payload
    #[error("Malformed response for secret '{name}': {message}")]
    MalformedResponse {
        /// Secret name
        name: String,
        /// What was wrong with the response
        message: String,
    },

    /// An external call exceeded its time budget
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        /// Operation that timed out
        operation: String,
        /// Configured time budget
        timeout: Duration,
    },

    /// The vault returned an empty value
    #[error("Secret '{name}' has an empty value")]
    EmptyValue {
        /// Secret name
        name: String,
    },

    /// A client could not be constructed
    #[error("Client configuration error: {message}")]
    Configuration {
        /// What was wrong
        message: String,
    },

    /// A secret name failed validation
    #[error("Invalid secret name: {reason}")]
    InvalidName {
        /// Why the name was rejected
        reason: String,
    },
}

/// Narrow interface over a secret vault.
///
/// Implementors must provide:
/// - [`set_context`](VaultClient::set_context) - select the subscription all later calls resolve against
/// - [`get_secret`](VaultClient::get_secret) - one read-only lookup
///
/// Both calls are idempotent and safe to retry; no retry is built in.
#[async_trait]
pub trait VaultClient: Send + Sync {
    /// Make `subscription_id` the active context for subsequent calls.
    async fn set_context(&self, subscription_id: &str) -> Result<(), SecretError>;

    /// Fetch the current value of `name` from `vault`.
    async fn get_secret(&self, name: &SecretName, vault: &str)
    -> Result<SecretRecord, SecretError>;

    /// Get the provider name for this client.
    ///
    /// Examples: `"azure"`, `"static"`
    fn provider_name(&self) -> &'static str;
}
